//! Capture session
//!
//! One session records one frame. It owns the resource tracker and the
//! command recorder and is the entry point the interception layer calls.
//! The first error poisons the session; a poisoned session never produces a
//! snapshot. Resource lifecycle calls keep reaching the tracker after that,
//! since the tracker outlives the frame.
//!
//! Command buffers are per-frame objects: their records are dropped from the
//! tracker once the session ends, whatever its outcome.

use framescope_shared::{
    EncoderOp, FrameSnapshot, PassKind, PassOp, QueueOp, ResourceId, ResourceKind, SurfaceSize,
    Timing, Value,
};
use tracing::{info, warn};

use super::arg::{Arg, Handle};
use super::error::CaptureError;
use super::recorder::CommandRecorder;
use super::tracker::ResourceTracker;

/// Frame metadata copied into the snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameInfo {
    pub frame_id: u64,
    pub start_time: f64,
    pub surface_size: SurfaceSize,
    pub surface_config: Value,
    pub adapter_options: Value,
    pub device_descriptor: Value,
}

#[derive(Debug)]
pub struct CaptureSession {
    info: FrameInfo,
    tracker: ResourceTracker,
    recorder: CommandRecorder,
    failure: Option<CaptureError>,
}

impl CaptureSession {
    /// Starts a session with an empty tracker.
    pub fn new(info: FrameInfo) -> Self {
        Self::with_tracker(info, ResourceTracker::default())
    }

    /// Starts a session that continues an existing tracker, so resources
    /// created before the capture keep their ids.
    pub fn with_tracker(info: FrameInfo, tracker: ResourceTracker) -> Self {
        Self {
            info,
            tracker,
            recorder: CommandRecorder::new(),
            failure: None,
        }
    }

    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    pub fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    pub fn recorder(&self) -> &CommandRecorder {
        &self.recorder
    }

    pub fn is_aborted(&self) -> bool {
        self.failure.is_some()
    }

    /// The error that poisoned this session.
    pub fn failure(&self) -> Option<&CaptureError> {
        self.failure.as_ref()
    }

    fn guard<T>(
        &mut self,
        op: impl FnOnce(&mut ResourceTracker, &mut CommandRecorder) -> Result<T, CaptureError>,
    ) -> Result<T, CaptureError> {
        if let Some(cause) = &self.failure {
            return Err(CaptureError::SessionAborted {
                cause: cause.to_string(),
            });
        }
        op(&mut self.tracker, &mut self.recorder).inspect_err(|err| {
            warn!(frame = self.info.frame_id, error = %err, "capture aborted");
            self.failure = Some(err.clone());
        })
    }

    /// Tracker updates are applied even on a poisoned session. An error
    /// still poisons the capture.
    fn lifecycle<T>(
        &mut self,
        op: impl FnOnce(&mut ResourceTracker) -> Result<T, CaptureError>,
    ) -> Result<T, CaptureError> {
        op(&mut self.tracker).inspect_err(|err| {
            if self.failure.is_none() {
                warn!(frame = self.info.frame_id, error = %err, "capture aborted");
                self.failure = Some(err.clone());
            }
        })
    }

    // === Resources ===

    pub fn track(
        &mut self,
        handle: Handle,
        kind: ResourceKind,
        descriptor: &Arg,
    ) -> Result<ResourceId, CaptureError> {
        self.lifecycle(|tracker| tracker.track(handle, kind, descriptor))
    }

    pub fn map_range(&mut self, range: Handle, buffer: Handle) -> Result<(), CaptureError> {
        self.lifecycle(|tracker| tracker.map_range(range, buffer))
    }

    pub fn attach_contents(
        &mut self,
        source: Handle,
        bytes: Vec<u8>,
    ) -> Result<ResourceId, CaptureError> {
        self.lifecycle(|tracker| tracker.attach_contents(source, bytes))
    }

    pub fn untrack(&mut self, handle: Handle) -> Result<ResourceId, CaptureError> {
        self.lifecycle(|tracker| tracker.untrack(handle))
    }

    /// Lookup only; an unknown handle does not poison the session.
    pub fn id_of(&self, handle: Handle) -> Result<ResourceId, CaptureError> {
        self.tracker.id_of(handle)
    }

    // === Commands ===

    pub fn record_base(&mut self, opcode: QueueOp, args: &[Arg]) -> Result<u64, CaptureError> {
        self.guard(|tracker, recorder| recorder.record_base(tracker, opcode, args))
    }

    pub fn begin_encoder(
        &mut self,
        encoder: Handle,
        descriptor: &Arg,
    ) -> Result<ResourceId, CaptureError> {
        self.guard(|tracker, recorder| recorder.begin_encoder(tracker, encoder, descriptor))
    }

    pub fn begin_pass(
        &mut self,
        encoder: Handle,
        pass: Handle,
        pass_kind: PassKind,
        descriptor: &Arg,
    ) -> Result<ResourceId, CaptureError> {
        self.guard(|tracker, recorder| {
            recorder.begin_pass(tracker, encoder, pass, pass_kind, descriptor)
        })
    }

    pub fn record_pass(
        &mut self,
        encoder: Handle,
        pass: Handle,
        opcode: PassOp,
        args: &[Arg],
    ) -> Result<u64, CaptureError> {
        self.guard(|tracker, recorder| recorder.record_pass(tracker, encoder, pass, opcode, args))
    }

    pub fn record_encoder(
        &mut self,
        encoder: Handle,
        opcode: EncoderOp,
        args: &[Arg],
    ) -> Result<u64, CaptureError> {
        self.guard(|tracker, recorder| recorder.record_encoder(tracker, encoder, opcode, args))
    }

    pub fn seal_encoder(
        &mut self,
        encoder: Handle,
        command_buffer: Handle,
        args: &[Arg],
    ) -> Result<ResourceId, CaptureError> {
        self.guard(|tracker, recorder| {
            recorder.seal_encoder(tracker, encoder, command_buffer, args)
        })
    }

    // === Completion ===

    /// Assembles the frame snapshot.
    pub fn finish(self, end_time: f64) -> Result<FrameSnapshot, CaptureError> {
        self.finish_retaining_resources(end_time).0
    }

    /// Assembles the frame snapshot and hands the tracker back so the next
    /// frame can keep resolving handles created before it.
    pub fn finish_retaining_resources(
        self,
        end_time: f64,
    ) -> (Result<FrameSnapshot, CaptureError>, ResourceTracker) {
        let CaptureSession {
            info,
            mut tracker,
            recorder,
            failure,
        } = self;
        let command_buffers = recorder.command_buffers().to_vec();

        let result = match failure {
            Some(cause) => Err(CaptureError::SessionAborted {
                cause: cause.to_string(),
            }),
            None => assemble(info, end_time, &tracker, recorder),
        };

        for handle in command_buffers {
            tracker.discard(handle);
        }
        (result, tracker)
    }
}

/// Pure aggregation of metadata, records and commands into a snapshot.
pub fn assemble(
    info: FrameInfo,
    end_time: f64,
    tracker: &ResourceTracker,
    recorder: CommandRecorder,
) -> Result<FrameSnapshot, CaptureError> {
    let commands = recorder.into_commands()?;
    let resources: Vec<_> = tracker.records().cloned().collect();

    info!(
        frame = info.frame_id,
        resources = resources.len(),
        commands = commands.len(),
        "frame captured"
    );

    Ok(FrameSnapshot {
        frame_id: info.frame_id,
        timing: Timing {
            start: info.start_time,
            end: end_time,
        },
        surface_size: info.surface_size,
        surface_config: info.surface_config,
        adapter_options: info.adapter_options,
        device_descriptor: info.device_descriptor,
        resources,
        commands,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use framescope_shared::FrameCommand;

    #[test]
    fn test_finish_assembles_metadata() {
        let info = FrameInfo {
            frame_id: 7,
            start_time: 1.5,
            surface_size: SurfaceSize {
                width: 300,
                height: 150,
            },
            surface_config: Value::object([("format", Value::from("bgra8unorm"))]),
            ..FrameInfo::default()
        };
        let mut session = CaptureSession::new(info);
        session
            .track(Handle::new(1), ResourceKind::Buffer, &Arg::Null)
            .unwrap();
        session
            .record_base(QueueOp::Submit, &[Arg::array([])])
            .unwrap();

        let snapshot = session.finish(3.0).unwrap();
        assert_eq!(snapshot.frame_id, 7);
        assert_eq!(snapshot.timing, Timing { start: 1.5, end: 3.0 });
        assert_eq!(snapshot.surface_size.width, 300);
        assert_eq!(snapshot.resources.len(), 1);
        assert!(matches!(snapshot.commands[0], FrameCommand::Base(_)));
    }

    #[test]
    fn test_first_error_poisons_session() {
        let mut session = CaptureSession::new(FrameInfo::default());
        let err = session
            .record_base(QueueOp::Submit, &[Arg::from(Handle::new(9))])
            .unwrap_err();
        assert!(matches!(err, CaptureError::UnknownReference { .. }));
        assert!(session.is_aborted());

        let later = session
            .record_base(QueueOp::Submit, &[Arg::array([])])
            .unwrap_err();
        assert!(matches!(later, CaptureError::SessionAborted { .. }));
        assert!(matches!(
            session.finish(1.0),
            Err(CaptureError::SessionAborted { .. })
        ));
    }

    #[test]
    fn test_poisoned_session_still_tracks_resources() {
        let mut session = CaptureSession::new(FrameInfo::default());
        session
            .track(Handle::new(1), ResourceKind::Buffer, &Arg::Null)
            .unwrap();
        let _ = session.record_base(QueueOp::Submit, &[Arg::from(Handle::new(9))]);
        assert!(session.is_aborted());

        let sampler = session
            .track(Handle::new(2), ResourceKind::Sampler, &Arg::Null)
            .unwrap();
        session.untrack(Handle::new(1)).unwrap();

        let (result, tracker) = session.finish_retaining_resources(1.0);
        assert!(matches!(result, Err(CaptureError::SessionAborted { .. })));
        assert_eq!(tracker.id_of(Handle::new(2)).unwrap(), sampler);
        assert!(!tracker.contains(Handle::new(1)));
    }

    #[test]
    fn test_command_buffers_leave_tracker_after_finish() {
        let mut session = CaptureSession::new(FrameInfo::default());
        session.begin_encoder(Handle::new(10), &Arg::Null).unwrap();
        let buffer = session
            .seal_encoder(Handle::new(10), Handle::new(30), &[])
            .unwrap();
        session
            .record_base(QueueOp::Submit, &[Arg::array([Arg::from(Handle::new(30))])])
            .unwrap();

        let (result, tracker) = session.finish_retaining_resources(1.0);
        let snapshot = result.unwrap();
        assert!(snapshot.record(buffer).is_some());
        assert!(!tracker.contains(Handle::new(30)));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_lookup_does_not_poison() {
        let session = CaptureSession::new(FrameInfo::default());
        assert!(session.id_of(Handle::new(1)).is_err());
        assert!(!session.is_aborted());
    }

    #[test]
    fn test_retained_tracker_survives_failure() {
        let mut session = CaptureSession::new(FrameInfo::default());
        let id = session
            .track(Handle::new(1), ResourceKind::Buffer, &Arg::Null)
            .unwrap();
        let _ = session.untrack(Handle::new(2));

        let (result, tracker) = session.finish_retaining_resources(0.0);
        assert!(result.is_err());
        assert_eq!(tracker.id_of(Handle::new(1)).unwrap(), id);
    }
}
