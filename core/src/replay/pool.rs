//! Resource pool
//!
//! Rebuilds captured resources on a replay device the first time something
//! refers to them. Creation is depth first: a bind group pulls in its layout
//! and buffers before it is created itself. Every created object is memoized
//! under its id, so each record is built at most once per replay.

use framescope_shared::{ResourceId, ResourceKind, ResourceRecord, Value};
use hashbrown::{HashMap, HashSet};
use tracing::debug;

use super::device::ReplayDevice;
use super::error::ReplayError;
use super::resolved::Resolved;
use crate::config::ReplayConfig;

/// WebGPU `GPUTextureUsage.COPY_SRC`.
pub const TEXTURE_USAGE_COPY_SRC: u64 = 0x01;

/// A reconstructed texture view, kept for pixel inspection.
#[derive(Debug, Clone)]
pub struct TextureViewInfo<R> {
    pub view_id: ResourceId,
    pub texture_id: ResourceId,
    pub view: R,
    pub texture: R,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub label: Option<String>,
}

pub struct ResourcePool<D: ReplayDevice> {
    device: D,
    config: ReplayConfig,
    records: HashMap<ResourceId, ResourceRecord>,
    live: HashMap<ResourceId, D::Resource>,
    in_progress: HashSet<ResourceId>,
    /// Finished command buffers waiting for `submit`, in finish order
    pending: Vec<(ResourceId, D::CommandBuffer)>,
    texture_views: Vec<TextureViewInfo<D::Resource>>,
    created: usize,
}

impl<D> std::fmt::Debug for ResourcePool<D>
where
    D: ReplayDevice + std::fmt::Debug,
    D::Resource: std::fmt::Debug,
    D::CommandBuffer: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool")
            .field("device", &self.device)
            .field("config", &self.config)
            .field("records", &self.records)
            .field("live", &self.live)
            .field("in_progress", &self.in_progress)
            .field("pending", &self.pending)
            .field("texture_views", &self.texture_views)
            .field("created", &self.created)
            .finish()
    }
}

impl<D: ReplayDevice> ResourcePool<D> {
    pub fn new(
        device: D,
        records: Vec<ResourceRecord>,
        config: ReplayConfig,
    ) -> Result<Self, ReplayError> {
        let mut table = HashMap::with_capacity(records.len());
        for record in records {
            let id = record.id;
            if table.insert(id, record).is_some() {
                return Err(ReplayError::DuplicateResource { id });
            }
        }

        Ok(Self {
            device,
            config,
            records: table,
            live: HashMap::new(),
            in_progress: HashSet::new(),
            pending: Vec::new(),
            texture_views: Vec::new(),
            created: 0,
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    pub fn record(&self, id: ResourceId) -> Option<&ResourceRecord> {
        self.records.get(&id)
    }

    /// Already-created resource, without creating it.
    pub fn get(&self, id: ResourceId) -> Option<&D::Resource> {
        self.live.get(&id)
    }

    /// Number of resources created so far.
    pub fn created_count(&self) -> usize {
        self.created
    }

    pub fn texture_views(&self) -> &[TextureViewInfo<D::Resource>] {
        &self.texture_views
    }

    // === Resolution ===

    /// Resolves a snapshot value, creating referenced resources on demand.
    pub fn resolve(&mut self, value: &Value) -> Result<Resolved<D::Resource>, ReplayError> {
        self.resolve_at(value, 0)
    }

    pub fn resolve_all(
        &mut self,
        values: &[Value],
    ) -> Result<Vec<Resolved<D::Resource>>, ReplayError> {
        values.iter().map(|value| self.resolve(value)).collect()
    }

    fn resolve_at(
        &mut self,
        value: &Value,
        depth: usize,
    ) -> Result<Resolved<D::Resource>, ReplayError> {
        if depth > self.config.max_resolve_depth {
            return Err(ReplayError::TooDeep {
                limit: self.config.max_resolve_depth,
            });
        }

        Ok(match value {
            Value::Null => Resolved::Null,
            Value::Bool(b) => Resolved::Bool(*b),
            Value::Number(n) => Resolved::Number(n.clone()),
            Value::String(s) => Resolved::String(s.clone()),
            Value::Bytes(bytes) => Resolved::Bytes(bytes.clone()),
            Value::Array(items) => Resolved::Array(
                items
                    .iter()
                    .map(|item| self.resolve_at(item, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => {
                let mut out = std::collections::BTreeMap::new();
                for (key, item) in map {
                    out.insert(key.clone(), self.resolve_at(item, depth + 1)?);
                }
                Resolved::Object(out)
            }
            Value::Ref(id) => Resolved::Resource(self.get_or_create(*id)?),
        })
    }

    // === Creation ===

    pub fn get_or_create(&mut self, id: ResourceId) -> Result<D::Resource, ReplayError> {
        match self.live.get(&id) {
            Some(resource) => Ok(resource.clone()),
            None => self.create(id),
        }
    }

    /// Builds the resource for `id` and memoizes it.
    ///
    /// Fails with `DependencyCycle` if `id` is reached again while its own
    /// dependencies are still being built.
    pub fn create(&mut self, id: ResourceId) -> Result<D::Resource, ReplayError> {
        if !self.in_progress.insert(id) {
            return Err(ReplayError::DependencyCycle { id });
        }
        let result = self.build(id);
        self.in_progress.remove(&id);

        let resource = result?;
        self.live.insert(id, resource.clone());
        self.created += 1;
        Ok(resource)
    }

    fn build(&mut self, id: ResourceId) -> Result<D::Resource, ReplayError> {
        let record = self
            .records
            .get(&id)
            .ok_or(ReplayError::UnknownReference { id })?;
        let kind = record.kind;
        let descriptor = record.descriptor.clone();
        debug!(%id, %kind, "creating resource");

        let creation = |source| ReplayError::Creation { id, kind, source };

        match kind {
            ResourceKind::Buffer => {
                let desc = self.resolve(&descriptor)?;
                let mapped = desc
                    .field("mappedAtCreation")
                    .and_then(Resolved::as_bool)
                    .unwrap_or(false);
                let contents = match (mapped, self.records.get(&id)) {
                    (true, Some(record)) => record.data.clone(),
                    _ => None,
                };
                self.device
                    .create_buffer(&desc, contents.as_deref())
                    .map_err(creation)
            }
            ResourceKind::Texture | ResourceKind::SurfaceTexture => {
                let mut desc = self.resolve(&descriptor)?;
                if self.config.force_copy_src {
                    add_usage(&mut desc, TEXTURE_USAGE_COPY_SRC);
                }
                self.device.create_texture(&desc).map_err(creation)
            }
            ResourceKind::TextureView => self.build_texture_view(id, &descriptor),
            ResourceKind::PipelineBindGroupLayout => {
                let pipeline_id = descriptor
                    .get("pipeline")
                    .and_then(Value::as_ref_id)
                    .ok_or_else(|| invalid(id, kind, "missing `pipeline` reference"))?;
                let index = descriptor
                    .get("index")
                    .and_then(Value::as_u64)
                    .and_then(|i| u32::try_from(i).ok())
                    .ok_or_else(|| invalid(id, kind, "missing group `index`"))?;
                let pipeline = self.get_or_create(pipeline_id)?;
                self.device
                    .pipeline_bind_group_layout(&pipeline, index)
                    .map_err(creation)
            }
            ResourceKind::Sampler => {
                let desc = self.resolve(&descriptor)?;
                self.device.create_sampler(&desc).map_err(creation)
            }
            ResourceKind::ShaderModule => {
                let desc = self.resolve(&descriptor)?;
                self.device.create_shader_module(&desc).map_err(creation)
            }
            ResourceKind::BindGroupLayout => {
                let desc = self.resolve(&descriptor)?;
                self.device.create_bind_group_layout(&desc).map_err(creation)
            }
            ResourceKind::PipelineLayout => {
                let desc = self.resolve(&descriptor)?;
                self.device.create_pipeline_layout(&desc).map_err(creation)
            }
            ResourceKind::RenderPipeline => {
                let desc = self.resolve(&descriptor)?;
                self.device.create_render_pipeline(&desc).map_err(creation)
            }
            ResourceKind::ComputePipeline => {
                let desc = self.resolve(&descriptor)?;
                self.device.create_compute_pipeline(&desc).map_err(creation)
            }
            ResourceKind::BindGroup => {
                let desc = self.resolve(&descriptor)?;
                self.device.create_bind_group(&desc).map_err(creation)
            }
            ResourceKind::QuerySet => {
                let desc = self.resolve(&descriptor)?;
                self.device.create_query_set(&desc).map_err(creation)
            }
            ResourceKind::CommandBuffer => Err(ReplayError::NotReconstructible { id, kind }),
        }
    }

    /// Views are recorded as `{ texture, descriptor }`.
    fn build_texture_view(
        &mut self,
        id: ResourceId,
        descriptor: &Value,
    ) -> Result<D::Resource, ReplayError> {
        let kind = ResourceKind::TextureView;
        let texture_id = descriptor
            .get("texture")
            .and_then(Value::as_ref_id)
            .ok_or_else(|| invalid(id, kind, "missing `texture` reference"))?;
        let texture = self.get_or_create(texture_id)?;
        let view_desc = descriptor.get("descriptor").cloned().unwrap_or_default();
        let desc = self.resolve(&view_desc)?;
        let view = self
            .device
            .create_texture_view(&texture, &desc)
            .map_err(|source| ReplayError::Creation { id, kind, source })?;

        let texture_desc = self
            .records
            .get(&texture_id)
            .map(|record| record.descriptor.clone())
            .unwrap_or_default();
        let (width, height) = texture_extent(&texture_desc);
        let format = view_desc
            .get("format")
            .or_else(|| texture_desc.get("format"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let label = view_desc
            .get("label")
            .or_else(|| texture_desc.get("label"))
            .and_then(Value::as_str)
            .map(str::to_owned);

        self.texture_views.push(TextureViewInfo {
            view_id: id,
            texture_id,
            view: view.clone(),
            texture,
            format,
            width,
            height,
            label,
        });
        Ok(view)
    }

    // === Command buffers ===

    /// Parks a finished command buffer until a `submit` names it.
    pub fn add_command_buffer(&mut self, id: ResourceId, command_buffer: D::CommandBuffer) {
        self.pending.push((id, command_buffer));
    }

    pub fn pending_command_buffers(&self) -> usize {
        self.pending.len()
    }

    /// Removes the named command buffers, in the order they were finished.
    pub fn take_command_buffers(
        &mut self,
        ids: &[ResourceId],
    ) -> Result<Vec<D::CommandBuffer>, ReplayError> {
        if let Some(missing) = ids
            .iter()
            .find(|id| !self.pending.iter().any(|(pending, _)| pending == *id))
        {
            return Err(ReplayError::UnknownReference { id: *missing });
        }

        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(id, _)| ids.contains(id));
        self.pending = kept;
        Ok(taken.into_iter().map(|(_, cb)| cb).collect())
    }

    pub fn take_all_command_buffers(&mut self) -> Vec<D::CommandBuffer> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(_, cb)| cb)
            .collect()
    }
}

fn invalid(id: ResourceId, kind: ResourceKind, reason: &str) -> ReplayError {
    ReplayError::InvalidDescriptor {
        id,
        kind,
        reason: reason.to_owned(),
    }
}

/// ORs `bits` into a numeric `usage` field.
fn add_usage<R>(descriptor: &mut Resolved<R>, bits: u64) {
    if let Resolved::Object(map) = descriptor {
        let usage = map.get("usage").and_then(Resolved::as_u64).unwrap_or(0);
        map.insert("usage".to_owned(), Resolved::Number((usage | bits).into()));
    }
}

/// Width and height of a texture descriptor's `size`, which is either
/// `[w, h, d]` or `{ width, height, depthOrArrayLayers }`.
pub fn texture_extent(descriptor: &Value) -> (u32, u32) {
    let Some(size) = descriptor.get("size") else {
        return (0, 0);
    };
    let dim = |index: usize, key: &str, default: u64| -> u32 {
        let value = match size {
            Value::Array(items) => items.get(index),
            _ => size.get(key),
        };
        value
            .and_then(Value::as_u64)
            .unwrap_or(default)
            .try_into()
            .unwrap_or(u32::MAX)
    };
    (dim(0, "width", 0), dim(1, "height", 1))
}

#[cfg(test)]
mod tests;
