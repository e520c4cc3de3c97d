//! Frame capture
//!
//! The capture side turns a stream of intercepted API calls into one
//! [`FrameSnapshot`](framescope_shared::FrameSnapshot).
//!
//! # Architecture
//!
//! - [`ResourceTracker`] - handle to id mapping plus deep-copied descriptors
//! - [`CommandRecorder`] - queue / encoder / pass hierarchy with shared sequence numbers
//! - [`CaptureSession`] - owns both for one frame; first error poisons it
//! - [`FrameController`] - starts and stops sessions at frame boundaries
//!
//! # Usage
//!
//! ```ignore
//! let mut frames = FrameController::new(config.capture.clone());
//! frames.track(handle, ResourceKind::Buffer, &descriptor)?;
//! frames.request_capture();
//!
//! // each presented frame
//! if let Some(FrameOutcome::Captured(snapshot)) = frames.on_frame_boundary(now) {
//!     snapshot.write_to(&path)?;
//! }
//! if let Some(session) = frames.session_mut() {
//!     session.record_pass(encoder, pass, PassOp::Draw, &[Arg::from(3u32)])?;
//! }
//! ```

mod arg;
mod error;
mod frame;
mod ids;
mod recorder;
mod session;
mod tracker;

pub use arg::{Arg, Handle};
pub use error::CaptureError;
pub use frame::{FrameController, FrameOutcome};
pub use ids::{IdAllocator, SequenceCounter};
pub use recorder::CommandRecorder;
pub use session::{CaptureSession, FrameInfo, assemble};
pub use tracker::ResourceTracker;
