//! Capture error types.

use framescope_shared::{EncoderOp, PassKind, PassOp, ResourceId};

use super::arg::Handle;

/// Errors raised while recording a frame.
///
/// The first one poisons the session that produced it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    #[error("{handle} is not tracked")]
    UnknownReference { handle: Handle },

    #[error("encoder {handle} was never begun")]
    UnknownEncoder { handle: Handle },

    #[error("encoder {handle} is already open")]
    EncoderAlreadyOpen { handle: Handle },

    #[error("pass {handle} does not belong to an open encoder")]
    UnknownPass { handle: Handle },

    #[error("`{opcode}` recorded on pass {pass} after it ended")]
    PassEnded { pass: ResourceId, opcode: PassOp },

    #[error("encoder {encoder} still has pass {pass} open")]
    PassStillOpen { encoder: ResourceId, pass: ResourceId },

    #[error("`{opcode}` recorded on encoder {encoder} after finish")]
    EncoderSealed {
        encoder: ResourceId,
        opcode: EncoderOp,
    },

    #[error("{pass_kind} pass begun on encoder {encoder} after finish")]
    PassAfterFinish {
        encoder: ResourceId,
        pass_kind: PassKind,
    },

    #[error("`{opcode}` is not valid in a {pass_kind} pass")]
    InvalidPassOp { opcode: PassOp, pass_kind: PassKind },

    #[error("`finish` must go through seal_encoder")]
    FinishOutsideSeal,

    #[error("descriptor nesting exceeds {limit} levels")]
    DescriptorTooDeep { limit: usize },

    #[error("capture aborted by an earlier error: {cause}")]
    SessionAborted { cause: String },

    #[error("frame cannot be assembled: {reason}")]
    IncompleteFrame { reason: String },
}
