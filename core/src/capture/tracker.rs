//! Resource tracker
//!
//! Maps live handles to stable ids and keeps a deep, reference-substituted
//! copy of every creation descriptor. Records live in an arena keyed by id;
//! handles are only lookup keys into it.

use std::collections::BTreeMap;

use framescope_shared::{ResourceId, ResourceKind, ResourceRecord, Value};
use hashbrown::HashMap;
use tracing::{debug, trace};

use super::arg::{Arg, Handle};
use super::error::CaptureError;
use super::ids::IdAllocator;
use crate::config::CaptureConfig;

#[derive(Debug, Clone)]
pub struct ResourceTracker {
    ids: IdAllocator,
    records: BTreeMap<ResourceId, ResourceRecord>,
    by_handle: HashMap<Handle, ResourceId>,
    handles: HashMap<ResourceId, Handle>,
    /// Mapped range handle -> owning buffer handle
    mapped_ranges: HashMap<Handle, Handle>,
    max_depth: usize,
    keep_destroyed: bool,
}

impl Default for ResourceTracker {
    fn default() -> Self {
        Self::new(&CaptureConfig::default())
    }
}

impl ResourceTracker {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            ids: IdAllocator::new(),
            records: BTreeMap::new(),
            by_handle: HashMap::new(),
            handles: HashMap::new(),
            mapped_ranges: HashMap::new(),
            max_depth: config.max_depth,
            keep_destroyed: config.keep_destroyed_records,
        }
    }

    /// Registers a freshly created object.
    ///
    /// The descriptor is substituted before an id is issued, so a rejected
    /// descriptor leaves the tracker untouched. Re-tracking a live handle
    /// points it at the new record; the old record stays in the arena.
    pub fn track(
        &mut self,
        handle: Handle,
        kind: ResourceKind,
        descriptor: &Arg,
    ) -> Result<ResourceId, CaptureError> {
        let descriptor = self.substitute(descriptor)?;
        Ok(self.track_value(handle, kind, descriptor))
    }

    /// Registers an object whose descriptor is already handle-free.
    pub fn track_value(&mut self, handle: Handle, kind: ResourceKind, descriptor: Value) -> ResourceId {
        let id = self.ids.allocate();

        if let Some(previous) = self.by_handle.insert(handle, id) {
            self.handles.remove(&previous);
            debug!(%handle, %previous, %id, "handle re-tracked");
        }
        self.handles.insert(id, handle);
        self.records.insert(
            id,
            ResourceRecord {
                id,
                kind,
                descriptor,
                data: None,
            },
        );

        debug!(%id, %kind, "tracked resource");
        id
    }

    /// Issues an id without a record, for encoders and passes.
    pub fn allocate_id(&mut self) -> ResourceId {
        self.ids.allocate()
    }

    /// Deep copy of `arg` with every handle replaced by its id.
    ///
    /// The caller's tree is never modified.
    pub fn substitute(&self, arg: &Arg) -> Result<Value, CaptureError> {
        self.substitute_at(arg, 0)
    }

    pub fn substitute_all(&self, args: &[Arg]) -> Result<Vec<Value>, CaptureError> {
        args.iter().map(|arg| self.substitute(arg)).collect()
    }

    fn substitute_at(&self, arg: &Arg, depth: usize) -> Result<Value, CaptureError> {
        if depth > self.max_depth {
            return Err(CaptureError::DescriptorTooDeep {
                limit: self.max_depth,
            });
        }

        Ok(match arg {
            Arg::Null => Value::Null,
            Arg::Bool(b) => Value::Bool(*b),
            Arg::Number(n) => Value::Number(n.clone()),
            Arg::String(s) => Value::String(s.clone()),
            Arg::Bytes(bytes) => Value::Bytes(bytes.clone()),
            Arg::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.substitute_at(item, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Arg::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, item)| Ok((key.clone(), self.substitute_at(item, depth + 1)?)))
                    .collect::<Result<_, CaptureError>>()?,
            ),
            Arg::Handle(handle) => Value::Ref(self.id_of(*handle)?),
        })
    }

    /// Correlates a mapped range with the buffer it was taken from.
    pub fn map_range(&mut self, range: Handle, buffer: Handle) -> Result<(), CaptureError> {
        self.id_of(buffer)?;
        self.mapped_ranges.insert(range, buffer);
        trace!(%range, %buffer, "mapped range registered");
        Ok(())
    }

    /// Stores content bytes on the record that owns `source`.
    ///
    /// `source` is either a tracked resource or a mapped range registered
    /// with [`map_range`](Self::map_range); the range correlation is consumed.
    pub fn attach_contents(
        &mut self,
        source: Handle,
        bytes: Vec<u8>,
    ) -> Result<ResourceId, CaptureError> {
        let owner = self.mapped_ranges.remove(&source).unwrap_or(source);
        let id = self.id_of(owner)?;
        let record = self
            .records
            .get_mut(&id)
            .ok_or(CaptureError::UnknownReference { handle: owner })?;

        debug!(%id, len = bytes.len(), "attached contents");
        record.data = Some(bytes);
        Ok(id)
    }

    pub fn id_of(&self, handle: Handle) -> Result<ResourceId, CaptureError> {
        self.by_handle
            .get(&handle)
            .copied()
            .ok_or(CaptureError::UnknownReference { handle })
    }

    pub fn record_of(&self, handle: Handle) -> Result<&ResourceRecord, CaptureError> {
        let id = self.id_of(handle)?;
        self.records
            .get(&id)
            .ok_or(CaptureError::UnknownReference { handle })
    }

    /// Live handle currently mapped to `id`, if any.
    pub fn handle_of(&self, id: ResourceId) -> Option<Handle> {
        self.handles.get(&id).copied()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.by_handle.contains_key(&handle)
    }

    /// Forgets a destroyed object.
    ///
    /// Ids already substituted into other records become stale; replay
    /// reports them as unknown references.
    pub fn untrack(&mut self, handle: Handle) -> Result<ResourceId, CaptureError> {
        let id = self
            .by_handle
            .remove(&handle)
            .ok_or(CaptureError::UnknownReference { handle })?;
        self.handles.remove(&id);
        self.mapped_ranges.retain(|_, buffer| *buffer != handle);
        if !self.keep_destroyed {
            self.records.remove(&id);
        }
        debug!(%id, "untracked resource");
        Ok(id)
    }

    /// Forgets a per-frame object and drops its record even when destroyed
    /// records are kept.
    pub fn discard(&mut self, handle: Handle) -> Option<ResourceId> {
        let id = self.by_handle.remove(&handle)?;
        self.handles.remove(&id);
        self.mapped_ranges.retain(|_, buffer| *buffer != handle);
        self.records.remove(&id);
        debug!(%id, "discarded resource");
        Some(id)
    }

    /// Records in ascending id order, which is creation order.
    pub fn records(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.by_handle.clear();
        self.handles.clear();
        self.mapped_ranges.clear();
    }
}
