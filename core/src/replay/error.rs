//! Replay error types.

use framescope_shared::{ResourceId, ResourceKind};

/// Failure reported by a [`ReplayDevice`](super::ReplayDevice) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct DeviceError(pub String);

impl DeviceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplayError {
    #[error("reference to {id}, which is not in the snapshot")]
    UnknownReference { id: ResourceId },

    #[error("{id} is a {kind} and cannot be rebuilt from a descriptor")]
    NotReconstructible { id: ResourceId, kind: ResourceKind },

    #[error("dependency cycle through {id}")]
    DependencyCycle { id: ResourceId },

    #[error("{id} appears more than once in the snapshot")]
    DuplicateResource { id: ResourceId },

    #[error("invalid descriptor for {kind} {id}: {reason}")]
    InvalidDescriptor {
        id: ResourceId,
        kind: ResourceKind,
        reason: String,
    },

    #[error("invalid arguments for `{opcode}`: {reason}")]
    InvalidArgument { opcode: String, reason: String },

    #[error("descriptor nesting exceeds {limit} levels")]
    TooDeep { limit: usize },

    #[error("command stream breaks encoder protocol: {0}")]
    ProtocolViolation(String),

    #[error("device failed to create {kind} {id}: {source}")]
    Creation {
        id: ResourceId,
        kind: ResourceKind,
        source: DeviceError,
    },

    #[error("device rejected `{operation}`: {source}")]
    Device {
        operation: String,
        source: DeviceError,
    },
}

impl ReplayError {
    pub(crate) fn invalid_argument(opcode: impl ToString, reason: impl Into<String>) -> Self {
        ReplayError::InvalidArgument {
            opcode: opcode.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn device(operation: impl ToString) -> impl FnOnce(DeviceError) -> Self {
        let operation = operation.to_string();
        move |source| ReplayError::Device { operation, source }
    }

    /// The resource this error implicates, if any.
    pub fn resource(&self) -> Option<ResourceId> {
        match self {
            ReplayError::UnknownReference { id }
            | ReplayError::NotReconstructible { id, .. }
            | ReplayError::DependencyCycle { id }
            | ReplayError::DuplicateResource { id }
            | ReplayError::InvalidDescriptor { id, .. }
            | ReplayError::Creation { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Operator-facing replay failure: which frame, which command, what went wrong.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "replay of frame {frame_id} failed{}: {source}",
    location(.command_index, .sequence)
)]
pub struct ReplayFailure {
    pub frame_id: u64,
    /// Index into the snapshot's top-level command list
    pub command_index: Option<usize>,
    /// Sequence number of the failing item
    pub sequence: Option<u64>,
    #[source]
    pub source: ReplayError,
}

fn location(command_index: &Option<usize>, sequence: &Option<u64>) -> String {
    match (command_index, sequence) {
        (Some(index), Some(sequence)) => format!(" at command {index} (sequence {sequence})"),
        (Some(index), None) => format!(" at command {index}"),
        (None, Some(sequence)) => format!(" at sequence {sequence}"),
        (None, None) => String::new(),
    }
}
