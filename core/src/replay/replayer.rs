//! Command replay engine
//!
//! Re-issues a frame snapshot's commands against a [`ReplayDevice`] in
//! recorded order. Resources are created through the [`ResourcePool`] the
//! first time a descriptor or argument refers to them.

use framescope_shared::{
    BaseCommand, EncoderItem, EncoderOp, EncoderRecord, FrameCommand, FrameSnapshot, PassKind,
    PassOp, PassRecord, QueueOp, ResourceId, Value,
};
use serde::Serialize;
use tracing::{debug, info};

use super::calls::{decode_compute, decode_encoder, decode_queue, decode_render};
use super::device::ReplayDevice;
use super::error::{ReplayError, ReplayFailure};
use super::pool::ResourcePool;
use super::resolved::Resolved;
use crate::config::ReplayConfig;

/// Totals for one replayed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReplayReport {
    pub frame_id: u64,
    pub encoders: usize,
    pub passes: usize,
    /// Every replayed command, `end` and `finish` included
    pub commands: usize,
    pub draws: usize,
    pub dispatches: usize,
    pub submits: usize,
    pub resources_created: usize,
}

/// Replays one snapshot. A replayer runs once; its pool then holds
/// everything that was built.
pub struct Replayer<D: ReplayDevice> {
    /// Resources and pending command buffers
    pool: ResourcePool<D>,
    /// Frame being replayed
    frame_id: u64,
    /// Top-level commands, taken when the run starts
    commands: Vec<FrameCommand>,
    /// Sequence number of the item being replayed
    cursor: Option<u64>,
    submit_all_when_empty: bool,
    report: ReplayReport,
    finished: bool,
}

impl<D: ReplayDevice> Replayer<D> {
    pub fn new(
        device: D,
        snapshot: FrameSnapshot,
        config: ReplayConfig,
    ) -> Result<Self, ReplayFailure> {
        let frame_id = snapshot.frame_id;
        let submit_all_when_empty = config.submit_all_when_empty;
        let pool =
            ResourcePool::new(device, snapshot.resources, config).map_err(|source| ReplayFailure {
                frame_id,
                command_index: None,
                sequence: None,
                source,
            })?;

        Ok(Self {
            pool,
            frame_id,
            commands: snapshot.commands,
            cursor: None,
            submit_all_when_empty,
            report: ReplayReport {
                frame_id,
                ..ReplayReport::default()
            },
            finished: false,
        })
    }

    pub fn pool(&self) -> &ResourcePool<D> {
        &self.pool
    }

    pub fn into_pool(self) -> ResourcePool<D> {
        self.pool
    }

    pub fn report(&self) -> &ReplayReport {
        &self.report
    }

    /// Re-issues every command. Stops at the first failure.
    pub fn run(&mut self) -> Result<ReplayReport, ReplayFailure> {
        if self.finished {
            return Err(self.failure(
                None,
                ReplayError::ProtocolViolation("frame has already been replayed".into()),
            ));
        }
        self.finished = true;

        let commands = std::mem::take(&mut self.commands);
        for (index, command) in commands.iter().enumerate() {
            self.cursor = Some(command.start_sequence());
            let result = match command {
                FrameCommand::Base(base) => self.replay_base(base),
                FrameCommand::Encoder(encoder) => self.replay_encoder(encoder),
            };
            result.map_err(|source| self.failure(Some(index), source))?;
        }

        self.report.resources_created = self.pool.created_count();
        info!(
            frame = self.frame_id,
            commands = self.report.commands,
            resources = self.report.resources_created,
            "frame replayed"
        );
        Ok(self.report)
    }

    fn failure(&self, command_index: Option<usize>, source: ReplayError) -> ReplayFailure {
        ReplayFailure {
            frame_id: self.frame_id,
            command_index,
            sequence: self.cursor,
            source,
        }
    }

    // === Queue ===

    fn replay_base(&mut self, command: &BaseCommand) -> Result<(), ReplayError> {
        debug!(sequence = command.sequence, opcode = %command.opcode, "replaying queue command");
        self.report.commands += 1;

        match command.opcode {
            QueueOp::Submit => self.submit(&command.args),
            opcode => {
                let args = self.pool.resolve_all(&command.args)?;
                let call = decode_queue(opcode, &args)?;
                self.pool
                    .device_mut()
                    .queue_write(call)
                    .map_err(ReplayError::device(opcode))
            }
        }
    }

    /// Submitted command buffers are looked up by id, never resolved.
    fn submit(&mut self, args: &[Value]) -> Result<(), ReplayError> {
        let ids = match args.first() {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_ref_id().ok_or_else(|| {
                        ReplayError::invalid_argument(
                            QueueOp::Submit,
                            "command buffers must be references",
                        )
                    })
                })
                .collect::<Result<Vec<ResourceId>, _>>()?,
            Some(_) => {
                return Err(ReplayError::invalid_argument(
                    QueueOp::Submit,
                    "expected an array of command buffers",
                ));
            }
        };

        let buffers = if ids.is_empty() && self.submit_all_when_empty {
            self.pool.take_all_command_buffers()
        } else {
            self.pool.take_command_buffers(&ids)?
        };
        self.report.submits += 1;
        self.pool
            .device_mut()
            .submit(buffers)
            .map_err(ReplayError::device(QueueOp::Submit))
    }

    // === Encoders ===

    fn replay_encoder(&mut self, record: &EncoderRecord) -> Result<(), ReplayError> {
        debug!(encoder = %record.id, items = record.items.len(), "replaying encoder");
        let descriptor = self.pool.resolve(&record.descriptor)?;
        let mut encoder = Some(
            self.pool
                .device_mut()
                .begin_encoder(&descriptor)
                .map_err(ReplayError::device("createCommandEncoder"))?,
        );
        self.report.encoders += 1;

        for item in &record.items {
            let Some(active) = encoder.as_mut() else {
                return Err(ReplayError::ProtocolViolation(format!(
                    "encoder {} has items after `finish`",
                    record.id
                )));
            };

            match item {
                EncoderItem::Pass(pass) => self.replay_pass(active, pass)?,
                EncoderItem::Command(command) => {
                    self.cursor = Some(command.sequence);
                    self.report.commands += 1;
                    if command.opcode == EncoderOp::Finish {
                        if let Some(finishing) = encoder.take() {
                            self.finish(record, finishing, &command.args)?;
                        }
                    } else {
                        let args = self.pool.resolve_all(&command.args)?;
                        let call = decode_encoder(command.opcode, &args)?;
                        self.pool
                            .device_mut()
                            .encoder_command(active, call)
                            .map_err(ReplayError::device(command.opcode))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(
        &mut self,
        record: &EncoderRecord,
        encoder: D::Encoder,
        args: &[Value],
    ) -> Result<(), ReplayError> {
        let id = record.command_buffer.ok_or_else(|| {
            ReplayError::ProtocolViolation(format!(
                "encoder {} finished without a command buffer id",
                record.id
            ))
        })?;
        let descriptor = match args.first() {
            Some(value) => self.pool.resolve(value)?,
            None => Default::default(),
        };
        let command_buffer = self
            .pool
            .device_mut()
            .finish_encoder(encoder, &descriptor)
            .map_err(ReplayError::device(EncoderOp::Finish))?;
        self.pool.add_command_buffer(id, command_buffer);
        Ok(())
    }

    // === Passes ===

    fn replay_pass(&mut self, encoder: &mut D::Encoder, pass: &PassRecord) -> Result<(), ReplayError> {
        self.cursor = Some(pass.start_sequence);
        debug!(pass = %pass.id, kind = %pass.pass_kind, "replaying pass");
        if !pass.ended {
            return Err(ReplayError::ProtocolViolation(format!(
                "pass {} was never ended",
                pass.id
            )));
        }

        let descriptor = self.pool.resolve(&pass.descriptor)?;
        self.report.passes += 1;
        match pass.pass_kind {
            PassKind::Render => {
                let mut active = self
                    .pool
                    .device_mut()
                    .begin_render_pass(encoder, &descriptor)
                    .map_err(ReplayError::device("beginRenderPass"))?;
                let Some(end) = self.pass_items(pass, |replayer, opcode, args| {
                    let call = decode_render(opcode, args)?;
                    replayer
                        .pool
                        .device_mut()
                        .render_command(&mut active, call)
                        .map_err(ReplayError::device(opcode))
                })?
                else {
                    return Err(missing_end(pass));
                };
                self.cursor = Some(end);
                self.pool
                    .device_mut()
                    .end_render_pass(encoder, active)
                    .map_err(ReplayError::device(PassOp::End))
            }
            PassKind::Compute => {
                let mut active = self
                    .pool
                    .device_mut()
                    .begin_compute_pass(encoder, &descriptor)
                    .map_err(ReplayError::device("beginComputePass"))?;
                let Some(end) = self.pass_items(pass, |replayer, opcode, args| {
                    let call = decode_compute(opcode, args)?;
                    replayer
                        .pool
                        .device_mut()
                        .compute_command(&mut active, call)
                        .map_err(ReplayError::device(opcode))
                })?
                else {
                    return Err(missing_end(pass));
                };
                self.cursor = Some(end);
                self.pool
                    .device_mut()
                    .end_compute_pass(encoder, active)
                    .map_err(ReplayError::device(PassOp::End))
            }
        }
    }

    /// Feeds pass commands up to `end` to `issue`, returning the sequence of
    /// `end`. Anything recorded after `end` is a protocol violation.
    fn pass_items<F>(&mut self, pass: &PassRecord, mut issue: F) -> Result<Option<u64>, ReplayError>
    where
        F: FnMut(&mut Self, PassOp, &[Resolved<D::Resource>]) -> Result<(), ReplayError>,
    {
        let mut end = None;
        for command in &pass.items {
            self.cursor = Some(command.sequence);
            if end.is_some() {
                return Err(ReplayError::ProtocolViolation(format!(
                    "`{}` recorded after pass {} ended",
                    command.opcode, pass.id
                )));
            }
            if !command.opcode.allowed_in(pass.pass_kind) {
                return Err(ReplayError::invalid_argument(
                    command.opcode,
                    format!("not valid in a {} pass", pass.pass_kind),
                ));
            }

            self.report.commands += 1;
            if command.opcode == PassOp::End {
                end = Some(command.sequence);
                continue;
            }
            if command.opcode.is_draw() {
                self.report.draws += 1;
            }
            if command.opcode.is_dispatch() {
                self.report.dispatches += 1;
            }

            let args = self.pool.resolve_all(&command.args)?;
            issue(self, command.opcode, &args)?;
        }
        Ok(end)
    }
}

fn missing_end(pass: &PassRecord) -> ReplayError {
    ReplayError::ProtocolViolation(format!("pass {} has no `end` command", pass.id))
}

/// Replays `snapshot` on `device` and returns the report with the pool.
pub fn replay_frame<D: ReplayDevice>(
    device: D,
    snapshot: FrameSnapshot,
    config: ReplayConfig,
) -> Result<(ReplayReport, ResourcePool<D>), ReplayFailure> {
    let mut replayer = Replayer::new(device, snapshot, config)?;
    let report = replayer.run()?;
    Ok((report, replayer.into_pool()))
}
