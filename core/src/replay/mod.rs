//! Frame replay
//!
//! Rebuilds a captured frame on a fresh device:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ FrameSnapshot                                                │
//! │   resources ─→ ResourcePool (lazy, dependencies first)       │
//! │   commands  ─→ Replayer ─→ ReplayDevice                      │
//! │                   │                                          │
//! │                   ├─ queue writes / submit                   │
//! │                   ├─ encoders ─→ passes ─→ draws/dispatches  │
//! │                   └─ finish ─→ pending command buffers       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Devices:
//!
//! - [`TraceDevice`] - records every call; used by `validate` and tests
//! - `WgpuDevice` - headless wgpu backend (feature `wgpu`)
//!
//! # Usage
//!
//! ```ignore
//! use framescope_core::replay::{TraceDevice, replay_frame};
//!
//! let snapshot = FrameSnapshot::from_json(&text)?;
//! let (report, pool) = replay_frame(TraceDevice::new(), snapshot, ReplayConfig::default())?;
//! println!("{} draws", report.draws);
//! ```

pub mod calls;
pub mod device;
pub mod error;
#[cfg(feature = "wgpu")]
pub mod gpu;
pub mod pool;
pub mod replayer;
pub mod resolved;
pub mod trace;

pub use calls::{
    ComputeCall, EncoderCall, IndexFormat, QueueCall, RenderCall, decode_compute, decode_encoder,
    decode_queue, decode_render,
};
pub use device::{Descriptor, MAX_BUFFER_SIZE, ReplayDevice, buffer_storage};
pub use error::{DeviceError, ReplayError, ReplayFailure};
#[cfg(feature = "wgpu")]
pub use gpu::{GpuResource, ReadbackError, WgpuDevice};
pub use pool::{ResourcePool, TEXTURE_USAGE_COPY_SRC, TextureViewInfo, texture_extent};
pub use replayer::{ReplayReport, Replayer, replay_frame};
pub use resolved::Resolved;
pub use trace::{TraceCommandBuffer, TraceDevice, TraceEvent, TraceObject};
