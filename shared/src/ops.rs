//! Opcodes for the three command levels.
//!
//! Every opcode has a fixed camelCase wire name. Interception layers that only
//! see method names can go through [`std::str::FromStr`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An opcode name that is not part of the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {level} opcode `{name}`")]
pub struct UnknownOpcode {
    pub level: &'static str,
    pub name: String,
}

macro_rules! opcodes {
    (
        $(#[$meta:meta])*
        $name:ident ($level:literal) {
            $($variant:ident => $wire:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownOpcode;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)*
                    _ => Err(UnknownOpcode { level: $level, name: s.to_owned() }),
                }
            }
        }
    };
}

opcodes! {
    /// Commands issued directly on the queue.
    QueueOp ("queue") {
        WriteBuffer => "writeBuffer",
        WriteTexture => "writeTexture",
        Submit => "submit",
    }
}

opcodes! {
    /// Commands issued on an encoder outside any pass.
    EncoderOp ("encoder") {
        CopyBufferToBuffer => "copyBufferToBuffer",
        CopyBufferToTexture => "copyBufferToTexture",
        CopyTextureToBuffer => "copyTextureToBuffer",
        CopyTextureToTexture => "copyTextureToTexture",
        ClearBuffer => "clearBuffer",
        ResolveQuerySet => "resolveQuerySet",
        PushDebugGroup => "pushDebugGroup",
        PopDebugGroup => "popDebugGroup",
        InsertDebugMarker => "insertDebugMarker",
        Finish => "finish",
    }
}

opcodes! {
    /// Commands issued inside a render or compute pass.
    PassOp ("pass") {
        SetPipeline => "setPipeline",
        SetBindGroup => "setBindGroup",
        SetVertexBuffer => "setVertexBuffer",
        SetIndexBuffer => "setIndexBuffer",
        Draw => "draw",
        DrawIndexed => "drawIndexed",
        DrawIndirect => "drawIndirect",
        DrawIndexedIndirect => "drawIndexedIndirect",
        SetViewport => "setViewport",
        SetScissorRect => "setScissorRect",
        SetBlendConstant => "setBlendConstant",
        SetStencilReference => "setStencilReference",
        DispatchWorkgroups => "dispatchWorkgroups",
        DispatchWorkgroupsIndirect => "dispatchWorkgroupsIndirect",
        PushDebugGroup => "pushDebugGroup",
        PopDebugGroup => "popDebugGroup",
        InsertDebugMarker => "insertDebugMarker",
        End => "end",
    }
}

/// Pass flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PassKind {
    Render,
    Compute,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PassKind::Render => "render",
            PassKind::Compute => "compute",
        })
    }
}

impl PassOp {
    /// Whether a pass of `kind` accepts this opcode.
    pub fn allowed_in(self, kind: PassKind) -> bool {
        match self {
            PassOp::SetVertexBuffer
            | PassOp::SetIndexBuffer
            | PassOp::Draw
            | PassOp::DrawIndexed
            | PassOp::DrawIndirect
            | PassOp::DrawIndexedIndirect
            | PassOp::SetViewport
            | PassOp::SetScissorRect
            | PassOp::SetBlendConstant
            | PassOp::SetStencilReference => kind == PassKind::Render,
            PassOp::DispatchWorkgroups | PassOp::DispatchWorkgroupsIndirect => {
                kind == PassKind::Compute
            }
            PassOp::SetPipeline
            | PassOp::SetBindGroup
            | PassOp::PushDebugGroup
            | PassOp::PopDebugGroup
            | PassOp::InsertDebugMarker
            | PassOp::End => true,
        }
    }

    pub fn is_draw(self) -> bool {
        matches!(
            self,
            PassOp::Draw | PassOp::DrawIndexed | PassOp::DrawIndirect | PassOp::DrawIndexedIndirect
        )
    }

    pub fn is_dispatch(self) -> bool {
        matches!(
            self,
            PassOp::DispatchWorkgroups | PassOp::DispatchWorkgroupsIndirect
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names_match_as_str() {
        for op in PassOp::ALL {
            assert_eq!(serde_json::to_string(op).unwrap(), format!("\"{op}\""));
        }
        for op in EncoderOp::ALL {
            assert_eq!(serde_json::to_string(op).unwrap(), format!("\"{op}\""));
        }
        for op in QueueOp::ALL {
            assert_eq!(serde_json::to_string(op).unwrap(), format!("\"{op}\""));
        }
    }

    #[test]
    fn test_from_str_round_trips() {
        for op in PassOp::ALL {
            assert_eq!(op.as_str().parse::<PassOp>().unwrap(), *op);
        }
        assert_eq!("finish".parse::<EncoderOp>().unwrap(), EncoderOp::Finish);
        assert_eq!("submit".parse::<QueueOp>().unwrap(), QueueOp::Submit);
    }

    #[test]
    fn test_unknown_opcode_names_level() {
        let err = "beginOcclusionQuery".parse::<PassOp>().unwrap_err();
        assert_eq!(err.level, "pass");
        assert_eq!(err.to_string(), "unknown pass opcode `beginOcclusionQuery`");
    }

    #[test]
    fn test_pass_kind_restrictions() {
        assert!(PassOp::Draw.allowed_in(PassKind::Render));
        assert!(!PassOp::Draw.allowed_in(PassKind::Compute));
        assert!(PassOp::DispatchWorkgroups.allowed_in(PassKind::Compute));
        assert!(!PassOp::DispatchWorkgroups.allowed_in(PassKind::Render));
        assert!(PassOp::SetBindGroup.allowed_in(PassKind::Compute));
        assert!(PassOp::End.allowed_in(PassKind::Render));
    }
}
