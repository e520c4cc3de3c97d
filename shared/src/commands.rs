//! Recorded command hierarchy.
//!
//! The top level of a frame is a list of [`FrameCommand`]s in the order they
//! started: queue-level commands stand alone, encoders carry their own items,
//! and passes sit inside their encoder. Every begin and every command draws
//! its `sequence` from one counter, so sorting by it recovers global order.

use serde::{Deserialize, Serialize};

use crate::id::ResourceId;
use crate::ops::{EncoderOp, PassKind, PassOp, QueueOp};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FrameCommand {
    Base(BaseCommand),
    Encoder(EncoderRecord),
}

impl FrameCommand {
    /// Sequence number at which this command (or encoder) started.
    pub fn start_sequence(&self) -> u64 {
        match self {
            FrameCommand::Base(cmd) => cmd.sequence,
            FrameCommand::Encoder(encoder) => encoder.start_sequence,
        }
    }
}

/// Queue-level command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseCommand {
    pub sequence: u64,
    pub opcode: QueueOp,
    #[serde(default)]
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncoderRecord {
    pub id: ResourceId,
    #[serde(default)]
    pub descriptor: Value,
    pub start_sequence: u64,
    /// Id registered for the command buffer produced by `finish`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_buffer: Option<ResourceId>,
    #[serde(default)]
    pub items: Vec<EncoderItem>,
}

impl EncoderRecord {
    pub fn is_sealed(&self) -> bool {
        self.command_buffer.is_some()
    }

    pub fn passes(&self) -> impl Iterator<Item = &PassRecord> {
        self.items.iter().filter_map(|item| match item {
            EncoderItem::Pass(pass) => Some(pass),
            EncoderItem::Command(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EncoderItem {
    Pass(PassRecord),
    Command(EncoderCommand),
}

/// Encoder-level command outside any pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderCommand {
    pub sequence: u64,
    pub opcode: EncoderOp,
    #[serde(default)]
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassRecord {
    pub id: ResourceId,
    pub pass_kind: PassKind,
    pub start_sequence: u64,
    #[serde(default)]
    pub descriptor: Value,
    /// Set once `end` has been recorded; nothing may follow it.
    pub ended: bool,
    #[serde(default)]
    pub items: Vec<PassCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassCommand {
    pub sequence: u64,
    pub opcode: PassOp,
    #[serde(default)]
    pub args: Vec<Value>,
}
