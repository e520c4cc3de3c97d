//! Framescope Core - WebGPU frame capture and replay
//!
//! Captures everything one frame does through a WebGPU-style API, stores it
//! as a self-contained [`FrameSnapshot`], and replays it on a fresh device.
//!
//! # Architecture
//!
//! - [`capture`] - resource tracking, command recording, frame boundaries
//! - [`replay`] - lazy resource pool, replay engine, device backends
//! - [`inspect`] - dependency graphs and texture read-back decoding
//! - [`config`] - `framescope.toml` settings

pub mod capture;
pub mod config;
pub mod inspect;
pub mod replay;

// Re-export the snapshot format
pub use framescope_shared::{FrameSnapshot, ResourceId, ResourceKind, Value};

// Re-export capture types
pub use capture::{
    Arg, CaptureError, CaptureSession, FrameController, FrameInfo, FrameOutcome, Handle,
    ResourceTracker,
};

// Re-export replay types
pub use replay::{
    ReplayDevice, ReplayError, ReplayFailure, ReplayReport, Replayer, ResourcePool, TraceDevice,
    replay_frame,
};

pub use config::{CaptureConfig, Config, ReplayConfig};
