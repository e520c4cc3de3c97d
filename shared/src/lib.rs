//! Shared types for framescope frame snapshots.
//!
//! A frame snapshot is the one portable artifact passed from the capture side
//! to the replay side. Everything in it is plain data: resources are keyed by
//! [`ResourceId`], cross references inside descriptors and arguments are
//! [`Value::Ref`] nodes, and commands keep the queue / encoder / pass nesting
//! they were recorded with.
//!
//! The JSON encoding is self-describing. A reference is a single-key object
//! `{"$ref": 12}` and a byte payload is `{"$bytes": [1, 2, 3]}`; every other
//! node maps onto the matching JSON literal.

pub mod commands;
pub mod id;
pub mod kind;
pub mod ops;
pub mod snapshot;
pub mod value;

pub use commands::{
    BaseCommand, EncoderCommand, EncoderItem, EncoderRecord, FrameCommand, PassCommand, PassRecord,
};
pub use id::ResourceId;
pub use kind::ResourceKind;
pub use ops::{EncoderOp, PassKind, PassOp, QueueOp, UnknownOpcode};
pub use snapshot::{
    FrameSnapshot, ResourceRecord, SnapshotError, SnapshotSummary, SurfaceSize, Timing,
};
pub use value::{BYTES_KEY, REF_KEY, Value, ValueError};

#[cfg(test)]
mod tests;
