//! Frame-boundary capture control.
//!
//! Resources are tracked for the whole life of the device so a frame can
//! refer to objects created long before it. Commands are only recorded while
//! a capture is active. A requested capture starts at the next frame boundary
//! and completes at the one after it.

use framescope_shared::{FrameSnapshot, ResourceId, ResourceKind, SurfaceSize, Value};
use tracing::{debug, info, warn};

use super::arg::{Arg, Handle};
use super::error::CaptureError;
use super::session::{CaptureSession, FrameInfo};
use super::tracker::ResourceTracker;
use crate::config::CaptureConfig;

/// Result of a completed capture.
#[derive(Debug)]
pub enum FrameOutcome {
    Captured(FrameSnapshot),
    Failed { frame_id: u64, error: CaptureError },
}

#[derive(Debug)]
enum State {
    Idle(ResourceTracker),
    Capturing(CaptureSession),
}

#[derive(Debug)]
pub struct FrameController {
    config: CaptureConfig,
    state: State,
    frame_count: u64,
    requested: bool,
    surface_size: SurfaceSize,
    surface_config: Value,
    adapter_options: Value,
    device_descriptor: Value,
}

impl FrameController {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            state: State::Idle(ResourceTracker::new(&config)),
            config,
            frame_count: 0,
            requested: false,
            surface_size: SurfaceSize::default(),
            surface_config: Value::Null,
            adapter_options: Value::Null,
            device_descriptor: Value::Null,
        }
    }

    // === Persistent frame metadata ===

    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface_size = SurfaceSize { width, height };
    }

    pub fn set_surface_config(&mut self, config: Value) {
        self.surface_config = config;
    }

    pub fn set_adapter_options(&mut self, options: Value) {
        self.adapter_options = options;
    }

    pub fn set_device_descriptor(&mut self, descriptor: Value) {
        self.device_descriptor = descriptor;
    }

    // === Capture control ===

    /// Arms a capture for the next frame. Returns `false` if one is already
    /// armed or running.
    pub fn request_capture(&mut self) -> bool {
        if self.requested || self.is_capturing() {
            return false;
        }
        self.requested = true;
        debug!("capture requested");
        true
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.state, State::Capturing(_))
    }

    /// Frame boundaries seen so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Called once per presented frame, before the next frame's work.
    ///
    /// Completes the running capture first, then starts an armed one.
    pub fn on_frame_boundary(&mut self, now: f64) -> Option<FrameOutcome> {
        self.frame_count += 1;

        let (outcome, tracker) = match self.take_state() {
            State::Idle(tracker) => (None, tracker),
            State::Capturing(session) => {
                let frame_id = session.info().frame_id;
                let (result, tracker) = session.finish_retaining_resources(now);
                let outcome = match result {
                    Ok(snapshot) => FrameOutcome::Captured(snapshot),
                    Err(error) => {
                        warn!(frame = frame_id, %error, "frame discarded");
                        FrameOutcome::Failed { frame_id, error }
                    }
                };
                (Some(outcome), tracker)
            }
        };

        self.state = if std::mem::take(&mut self.requested) {
            let info = FrameInfo {
                frame_id: self.frame_count,
                start_time: now,
                surface_size: self.surface_size,
                surface_config: self.surface_config.clone(),
                adapter_options: self.adapter_options.clone(),
                device_descriptor: self.device_descriptor.clone(),
            };
            info!(frame = info.frame_id, "capture started");
            State::Capturing(CaptureSession::with_tracker(info, tracker))
        } else {
            State::Idle(tracker)
        };

        outcome
    }

    /// Drops the running capture (and any armed one). Tracked resources stay.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.requested || self.is_capturing();
        self.requested = false;
        self.state = match self.take_state() {
            State::Capturing(session) => State::Idle(session.finish_retaining_resources(0.0).1),
            idle => idle,
        };
        if was_active {
            debug!("capture cancelled");
        }
        was_active
    }

    /// Forgets every tracked resource, e.g. when the page navigates away.
    pub fn reset(&mut self) {
        self.requested = false;
        self.state = State::Idle(ResourceTracker::new(&self.config));
        debug!("capture state reset");
    }

    /// The running capture, if any. Commands go here.
    pub fn session_mut(&mut self) -> Option<&mut CaptureSession> {
        match &mut self.state {
            State::Capturing(session) => Some(session),
            State::Idle(_) => None,
        }
    }

    fn take_state(&mut self) -> State {
        std::mem::replace(&mut self.state, State::Idle(ResourceTracker::default()))
    }

    // === Resource calls, valid whether or not a capture is running ===

    pub fn track(
        &mut self,
        handle: Handle,
        kind: ResourceKind,
        descriptor: &Arg,
    ) -> Result<ResourceId, CaptureError> {
        match &mut self.state {
            State::Idle(tracker) => tracker.track(handle, kind, descriptor),
            State::Capturing(session) => session.track(handle, kind, descriptor),
        }
    }

    pub fn map_range(&mut self, range: Handle, buffer: Handle) -> Result<(), CaptureError> {
        match &mut self.state {
            State::Idle(tracker) => tracker.map_range(range, buffer),
            State::Capturing(session) => session.map_range(range, buffer),
        }
    }

    pub fn attach_contents(
        &mut self,
        source: Handle,
        bytes: Vec<u8>,
    ) -> Result<ResourceId, CaptureError> {
        match &mut self.state {
            State::Idle(tracker) => tracker.attach_contents(source, bytes),
            State::Capturing(session) => session.attach_contents(source, bytes),
        }
    }

    pub fn untrack(&mut self, handle: Handle) -> Result<ResourceId, CaptureError> {
        match &mut self.state {
            State::Idle(tracker) => tracker.untrack(handle),
            State::Capturing(session) => session.untrack(handle),
        }
    }
}

impl Default for FrameController {
    fn default() -> Self {
        Self::new(CaptureConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framescope_shared::QueueOp;

    #[test]
    fn test_capture_spans_one_frame() {
        let mut frames = FrameController::default();
        assert!(frames.on_frame_boundary(0.0).is_none());
        assert!(frames.session_mut().is_none());

        assert!(frames.request_capture());
        assert!(!frames.request_capture());
        assert!(frames.on_frame_boundary(16.0).is_none());
        assert!(frames.is_capturing());

        frames
            .session_mut()
            .unwrap()
            .record_base(QueueOp::Submit, &[Arg::array([])])
            .unwrap();

        let Some(FrameOutcome::Captured(snapshot)) = frames.on_frame_boundary(32.0) else {
            panic!("expected a captured frame");
        };
        assert_eq!(snapshot.frame_id, 2);
        assert_eq!(snapshot.timing.start, 16.0);
        assert_eq!(snapshot.timing.end, 32.0);
        assert_eq!(snapshot.commands.len(), 1);
        assert!(!frames.is_capturing());
    }

    #[test]
    fn test_resources_created_before_capture_are_included() {
        let mut frames = FrameController::default();
        let buffer = frames
            .track(Handle::new(1), ResourceKind::Buffer, &Arg::Null)
            .unwrap();

        frames.request_capture();
        frames.on_frame_boundary(0.0);
        frames
            .session_mut()
            .unwrap()
            .record_base(QueueOp::WriteBuffer, &[Arg::from(Handle::new(1))])
            .unwrap();

        let Some(FrameOutcome::Captured(snapshot)) = frames.on_frame_boundary(1.0) else {
            panic!("expected a captured frame");
        };
        assert_eq!(snapshot.resources[0].id, buffer);
    }

    #[test]
    fn test_failed_capture_is_reported_and_tracking_continues() {
        let mut frames = FrameController::default();
        frames.request_capture();
        frames.on_frame_boundary(0.0);
        let _ = frames
            .session_mut()
            .unwrap()
            .record_base(QueueOp::Submit, &[Arg::from(Handle::new(42))]);

        assert!(matches!(
            frames.on_frame_boundary(1.0),
            Some(FrameOutcome::Failed { frame_id: 1, .. })
        ));
        assert!(
            frames
                .track(Handle::new(1), ResourceKind::Sampler, &Arg::Null)
                .is_ok()
        );
    }

    #[test]
    fn test_resources_created_after_a_failure_stay_tracked() {
        let mut frames = FrameController::default();
        frames
            .track(Handle::new(1), ResourceKind::Buffer, &Arg::Null)
            .unwrap();
        frames.request_capture();
        frames.on_frame_boundary(0.0);
        let _ = frames
            .session_mut()
            .unwrap()
            .record_base(QueueOp::Submit, &[Arg::from(Handle::new(42))]);

        // the rest of the failed frame still creates and destroys objects
        let buffer = frames
            .track(Handle::new(7), ResourceKind::Buffer, &Arg::Null)
            .unwrap();
        frames.untrack(Handle::new(1)).unwrap();
        assert!(matches!(
            frames.on_frame_boundary(1.0),
            Some(FrameOutcome::Failed { .. })
        ));

        frames.request_capture();
        frames.on_frame_boundary(2.0);
        frames
            .session_mut()
            .unwrap()
            .record_base(QueueOp::WriteBuffer, &[Arg::from(Handle::new(7))])
            .unwrap();
        let Some(FrameOutcome::Captured(snapshot)) = frames.on_frame_boundary(3.0) else {
            panic!("expected a captured frame");
        };
        let ids: Vec<_> = snapshot.resources.iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![buffer]);
    }

    #[test]
    fn test_command_buffers_do_not_leak_into_later_frames() {
        let mut frames = FrameController::default();
        let encoder = Handle::new(10);
        let command_buffer = Handle::new(30);

        frames.request_capture();
        frames.on_frame_boundary(0.0);
        let session = frames.session_mut().unwrap();
        session.begin_encoder(encoder, &Arg::Null).unwrap();
        session.seal_encoder(encoder, command_buffer, &[]).unwrap();
        session
            .record_base(QueueOp::Submit, &[Arg::array([Arg::from(command_buffer)])])
            .unwrap();
        let Some(FrameOutcome::Captured(first)) = frames.on_frame_boundary(1.0) else {
            panic!("expected a captured frame");
        };
        assert_eq!(first.resources.len(), 1);
        assert_eq!(first.resources[0].kind, ResourceKind::CommandBuffer);

        frames.request_capture();
        frames.on_frame_boundary(2.0);
        frames
            .session_mut()
            .unwrap()
            .record_base(QueueOp::Submit, &[Arg::array([])])
            .unwrap();
        let Some(FrameOutcome::Captured(second)) = frames.on_frame_boundary(3.0) else {
            panic!("expected a captured frame");
        };
        assert!(second.resources.is_empty());
        assert!(frames.untrack(command_buffer).is_err());
    }

    #[test]
    fn test_cancel_discards_running_capture() {
        let mut frames = FrameController::default();
        frames
            .track(Handle::new(1), ResourceKind::Buffer, &Arg::Null)
            .unwrap();
        frames.request_capture();
        frames.on_frame_boundary(0.0);

        assert!(frames.cancel());
        assert!(!frames.is_capturing());
        assert!(frames.on_frame_boundary(1.0).is_none());
        assert!(frames.untrack(Handle::new(1)).is_ok());
        assert!(!frames.cancel());
    }

    #[test]
    fn test_reset_forgets_resources() {
        let mut frames = FrameController::default();
        frames
            .track(Handle::new(1), ResourceKind::Buffer, &Arg::Null)
            .unwrap();
        frames.reset();
        assert!(frames.untrack(Handle::new(1)).is_err());
    }
}
