//! Frame snapshots: the portable result of one capture.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::commands::{EncoderItem, FrameCommand};
use crate::id::ResourceId;
use crate::kind::ResourceKind;
use crate::value::Value;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One captured resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub kind: ResourceKind,
    #[serde(default)]
    pub descriptor: Value,
    /// Contents attached after creation (mapped ranges, written data).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Timing {
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

/// Everything needed to rebuild and re-issue one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSnapshot {
    pub frame_id: u64,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub surface_size: SurfaceSize,
    #[serde(default)]
    pub surface_config: Value,
    #[serde(default)]
    pub adapter_options: Value,
    #[serde(default)]
    pub device_descriptor: Value,
    pub resources: Vec<ResourceRecord>,
    pub commands: Vec<FrameCommand>,
}

/// Counts reported by `framescope inspect`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SnapshotSummary {
    pub resources: BTreeMap<ResourceKind, usize>,
    pub base_commands: usize,
    pub encoders: usize,
    pub passes: usize,
    pub encoder_commands: usize,
    pub pass_commands: usize,
    pub draws: usize,
    pub dispatches: usize,
}

impl FrameSnapshot {
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn read_from(path: &Path) -> Result<Self, SnapshotError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), SnapshotError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn record(&self, id: ResourceId) -> Option<&ResourceRecord> {
        self.resources.iter().find(|record| record.id == id)
    }

    /// Every sequence number in the frame, in document order.
    ///
    /// Encoders interleave with queue commands, so document order is not
    /// sorted. Sort the result to recover recording order.
    pub fn iter_sequences(&self) -> impl Iterator<Item = u64> + '_ {
        self.commands.iter().flat_map(|command| {
            let mut out = Vec::new();
            match command {
                FrameCommand::Base(cmd) => out.push(cmd.sequence),
                FrameCommand::Encoder(encoder) => {
                    out.push(encoder.start_sequence);
                    for item in &encoder.items {
                        match item {
                            EncoderItem::Pass(pass) => {
                                out.push(pass.start_sequence);
                                out.extend(pass.items.iter().map(|cmd| cmd.sequence));
                            }
                            EncoderItem::Command(cmd) => out.push(cmd.sequence),
                        }
                    }
                }
            }
            out
        })
    }

    pub fn max_sequence(&self) -> Option<u64> {
        self.iter_sequences().max()
    }

    /// Number of recorded commands at all levels, excluding begins.
    pub fn command_count(&self) -> usize {
        let summary = self.summary();
        summary.base_commands + summary.encoder_commands + summary.pass_commands
    }

    pub fn summary(&self) -> SnapshotSummary {
        let mut summary = SnapshotSummary::default();
        for record in &self.resources {
            *summary.resources.entry(record.kind).or_default() += 1;
        }
        for command in &self.commands {
            match command {
                FrameCommand::Base(_) => summary.base_commands += 1,
                FrameCommand::Encoder(encoder) => {
                    summary.encoders += 1;
                    for item in &encoder.items {
                        match item {
                            EncoderItem::Command(_) => summary.encoder_commands += 1,
                            EncoderItem::Pass(pass) => {
                                summary.passes += 1;
                                summary.pass_commands += pass.items.len();
                                summary.draws +=
                                    pass.items.iter().filter(|c| c.opcode.is_draw()).count();
                                summary.dispatches +=
                                    pass.items.iter().filter(|c| c.opcode.is_dispatch()).count();
                            }
                        }
                    }
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{BaseCommand, EncoderRecord, PassCommand, PassRecord};
    use crate::ops::{PassKind, PassOp, QueueOp};

    fn sample() -> FrameSnapshot {
        let buffer = ResourceId::new(1);
        FrameSnapshot {
            frame_id: 3,
            timing: Timing { start: 10.0, end: 26.5 },
            surface_size: SurfaceSize { width: 640, height: 480 },
            surface_config: Value::object([("format", Value::from("bgra8unorm"))]),
            adapter_options: Value::Null,
            device_descriptor: Value::Null,
            resources: vec![ResourceRecord {
                id: buffer,
                kind: ResourceKind::Buffer,
                descriptor: Value::object([
                    ("size", Value::from(4u64)),
                    ("mappedAtCreation", Value::from(true)),
                ]),
                data: Some(vec![1, 2, 3, 4]),
            }],
            commands: vec![
                FrameCommand::Encoder(EncoderRecord {
                    id: ResourceId::new(2),
                    descriptor: Value::Null,
                    start_sequence: 0,
                    command_buffer: None,
                    items: vec![EncoderItem::Pass(PassRecord {
                        id: ResourceId::new(3),
                        pass_kind: PassKind::Render,
                        start_sequence: 2,
                        descriptor: Value::Null,
                        ended: true,
                        items: vec![
                            PassCommand {
                                sequence: 3,
                                opcode: PassOp::Draw,
                                args: vec![Value::from(3u32)],
                            },
                            PassCommand {
                                sequence: 4,
                                opcode: PassOp::End,
                                args: vec![],
                            },
                        ],
                    })],
                }),
                FrameCommand::Base(BaseCommand {
                    sequence: 1,
                    opcode: QueueOp::WriteBuffer,
                    args: vec![Value::Ref(buffer), Value::from(0u32), Value::Bytes(vec![5])],
                }),
            ],
        }
    }

    #[test]
    fn test_json_round_trip() {
        let snapshot = sample();
        let json = snapshot.to_json().unwrap();
        assert_eq!(FrameSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_wire_shape() {
        let json: serde_json::Value = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["frameId"], 3);
        assert_eq!(json["surfaceSize"]["width"], 640);
        assert_eq!(json["resources"][0]["kind"], "buffer");
        assert_eq!(json["commands"][0]["kind"], "encoder");
        assert_eq!(json["commands"][0]["items"][0]["kind"], "pass");
        assert_eq!(json["commands"][0]["items"][0]["passKind"], "render");
        assert_eq!(json["commands"][1]["kind"], "base");
        assert_eq!(json["commands"][1]["args"][0]["$ref"], 1);
    }

    #[test]
    fn test_sequences_sort_into_recording_order() {
        let snapshot = sample();
        let mut sequences: Vec<u64> = snapshot.iter_sequences().collect();
        assert_eq!(sequences, vec![0, 2, 3, 4, 1]);
        sequences.sort_unstable();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
        assert_eq!(snapshot.max_sequence(), Some(4));
    }

    #[test]
    fn test_summary_counts() {
        let summary = sample().summary();
        assert_eq!(summary.resources.get(&ResourceKind::Buffer), Some(&1));
        assert_eq!(summary.encoders, 1);
        assert_eq!(summary.passes, 1);
        assert_eq!(summary.pass_commands, 2);
        assert_eq!(summary.draws, 1);
        assert_eq!(summary.base_commands, 1);
        assert_eq!(sample().command_count(), 3);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.json");
        let snapshot = sample();
        snapshot.write_to(&path).unwrap();
        assert_eq!(FrameSnapshot::read_from(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_unknown_kind_fails_to_load() {
        let json = r#"{"frameId":1,"resources":[{"id":1,"kind":"swapChain","descriptor":null}],"commands":[]}"#;
        assert!(matches!(
            FrameSnapshot::from_json(json),
            Err(SnapshotError::Json(_))
        ));
    }
}
