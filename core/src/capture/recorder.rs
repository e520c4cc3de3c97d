//! Command recorder
//!
//! Records the queue / encoder / pass hierarchy for one frame. Encoders and
//! passes are addressed by the interception layer's handles; arguments are
//! substituted through the [`ResourceTracker`] before they are stored.

use framescope_shared::{
    BaseCommand, EncoderCommand, EncoderItem, EncoderOp, EncoderRecord, FrameCommand, PassCommand,
    PassKind, PassOp, PassRecord, QueueOp, ResourceId, ResourceKind, Value,
};
use hashbrown::HashMap;
use tracing::trace;

use super::arg::{Arg, Handle};
use super::error::CaptureError;
use super::ids::SequenceCounter;
use super::tracker::ResourceTracker;

/// Bookkeeping for an encoder that is still recording.
#[derive(Debug)]
struct OpenEncoder {
    /// Index into `CommandRecorder::commands`
    index: usize,
    id: ResourceId,
    /// Pass handle -> index into the encoder's items
    passes: HashMap<Handle, usize>,
    open_pass: Option<(Handle, ResourceId)>,
    sealed: bool,
}

#[derive(Debug, Default)]
pub struct CommandRecorder {
    sequence: SequenceCounter,
    commands: Vec<FrameCommand>,
    encoders: HashMap<Handle, OpenEncoder>,
    /// Handles registered by `seal_encoder`, in finish order
    command_buffers: Vec<Handle>,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a queue-level command and returns its sequence number.
    pub fn record_base(
        &mut self,
        tracker: &ResourceTracker,
        opcode: QueueOp,
        args: &[Arg],
    ) -> Result<u64, CaptureError> {
        let args = tracker.substitute_all(args)?;
        let sequence = self.sequence.advance();
        self.commands.push(FrameCommand::Base(BaseCommand {
            sequence,
            opcode,
            args,
        }));
        trace!(sequence, %opcode, "recorded queue command");
        Ok(sequence)
    }

    pub fn begin_encoder(
        &mut self,
        tracker: &mut ResourceTracker,
        encoder: Handle,
        descriptor: &Arg,
    ) -> Result<ResourceId, CaptureError> {
        if self.encoders.get(&encoder).is_some_and(|open| !open.sealed) {
            return Err(CaptureError::EncoderAlreadyOpen { handle: encoder });
        }
        let descriptor = tracker.substitute(descriptor)?;
        let id = tracker.allocate_id();
        let start_sequence = self.sequence.advance();

        self.encoders.insert(
            encoder,
            OpenEncoder {
                index: self.commands.len(),
                id,
                passes: HashMap::new(),
                open_pass: None,
                sealed: false,
            },
        );
        self.commands.push(FrameCommand::Encoder(EncoderRecord {
            id,
            descriptor,
            start_sequence,
            command_buffer: None,
            items: Vec::new(),
        }));
        trace!(%id, start_sequence, "encoder begun");
        Ok(id)
    }

    pub fn begin_pass(
        &mut self,
        tracker: &mut ResourceTracker,
        encoder: Handle,
        pass: Handle,
        pass_kind: PassKind,
        descriptor: &Arg,
    ) -> Result<ResourceId, CaptureError> {
        let open = self
            .encoders
            .get_mut(&encoder)
            .ok_or(CaptureError::UnknownEncoder { handle: encoder })?;
        if open.sealed {
            return Err(CaptureError::PassAfterFinish {
                encoder: open.id,
                pass_kind,
            });
        }
        if let Some((_, current)) = open.open_pass {
            return Err(CaptureError::PassStillOpen {
                encoder: open.id,
                pass: current,
            });
        }

        let descriptor = tracker.substitute(descriptor)?;
        let id = tracker.allocate_id();
        let start_sequence = self.sequence.advance();

        let record = encoder_record(&mut self.commands, open.index);
        open.passes.insert(pass, record.items.len());
        open.open_pass = Some((pass, id));
        record.items.push(EncoderItem::Pass(PassRecord {
            id,
            pass_kind,
            start_sequence,
            descriptor,
            ended: false,
            items: Vec::new(),
        }));
        trace!(%id, %pass_kind, start_sequence, "pass begun");
        Ok(id)
    }

    /// Records a command inside a pass. `end` seals the pass.
    pub fn record_pass(
        &mut self,
        tracker: &ResourceTracker,
        encoder: Handle,
        pass: Handle,
        opcode: PassOp,
        args: &[Arg],
    ) -> Result<u64, CaptureError> {
        let open = self
            .encoders
            .get_mut(&encoder)
            .ok_or(CaptureError::UnknownEncoder { handle: encoder })?;
        let item = *open
            .passes
            .get(&pass)
            .ok_or(CaptureError::UnknownPass { handle: pass })?;
        let record = pass_record(&mut self.commands, open.index, item)
            .ok_or(CaptureError::UnknownPass { handle: pass })?;

        if record.ended {
            return Err(CaptureError::PassEnded {
                pass: record.id,
                opcode,
            });
        }
        if !opcode.allowed_in(record.pass_kind) {
            return Err(CaptureError::InvalidPassOp {
                opcode,
                pass_kind: record.pass_kind,
            });
        }

        let args = tracker.substitute_all(args)?;
        let sequence = self.sequence.advance();
        record.items.push(PassCommand {
            sequence,
            opcode,
            args,
        });
        if opcode == PassOp::End {
            record.ended = true;
            open.open_pass = None;
            trace!(pass = %record.id, sequence, "pass ended");
        }
        Ok(sequence)
    }

    /// Records an encoder-level command outside any pass.
    pub fn record_encoder(
        &mut self,
        tracker: &ResourceTracker,
        encoder: Handle,
        opcode: EncoderOp,
        args: &[Arg],
    ) -> Result<u64, CaptureError> {
        if opcode == EncoderOp::Finish {
            return Err(CaptureError::FinishOutsideSeal);
        }
        let open = self.writable_encoder(encoder, opcode)?;
        let index = open.index;

        let args = tracker.substitute_all(args)?;
        let sequence = self.sequence.advance();
        encoder_record(&mut self.commands, index)
            .items
            .push(EncoderItem::Command(EncoderCommand {
                sequence,
                opcode,
                args,
            }));
        Ok(sequence)
    }

    /// Records `finish` and registers the produced command buffer.
    pub fn seal_encoder(
        &mut self,
        tracker: &mut ResourceTracker,
        encoder: Handle,
        command_buffer: Handle,
        args: &[Arg],
    ) -> Result<ResourceId, CaptureError> {
        let open = self.writable_encoder(encoder, EncoderOp::Finish)?;
        let (index, encoder_id) = (open.index, open.id);

        let args = tracker.substitute_all(args)?;
        let descriptor = Value::object([("encoder", Value::from(encoder_id.get()))]);
        let buffer_id = tracker.track_value(command_buffer, ResourceKind::CommandBuffer, descriptor);
        let sequence = self.sequence.advance();

        let record = encoder_record(&mut self.commands, index);
        record.items.push(EncoderItem::Command(EncoderCommand {
            sequence,
            opcode: EncoderOp::Finish,
            args,
        }));
        record.command_buffer = Some(buffer_id);
        self.command_buffers.push(command_buffer);
        if let Some(open) = self.encoders.get_mut(&encoder) {
            open.sealed = true;
        }
        trace!(encoder = %encoder_id, command_buffer = %buffer_id, sequence, "encoder sealed");
        Ok(buffer_id)
    }

    fn writable_encoder(
        &mut self,
        encoder: Handle,
        opcode: EncoderOp,
    ) -> Result<&mut OpenEncoder, CaptureError> {
        let open = self
            .encoders
            .get_mut(&encoder)
            .ok_or(CaptureError::UnknownEncoder { handle: encoder })?;
        if open.sealed {
            return Err(CaptureError::EncoderSealed {
                encoder: open.id,
                opcode,
            });
        }
        if let Some((_, pass)) = open.open_pass {
            return Err(CaptureError::PassStillOpen {
                encoder: open.id,
                pass,
            });
        }
        Ok(open)
    }

    /// Fails if any pass is still open.
    pub fn check_complete(&self) -> Result<(), CaptureError> {
        match self
            .encoders
            .values()
            .find_map(|open| open.open_pass.map(|(_, pass)| (open.id, pass)))
        {
            Some((encoder, pass)) => Err(CaptureError::IncompleteFrame {
                reason: format!("pass {pass} of encoder {encoder} was never ended"),
            }),
            None => Ok(()),
        }
    }

    /// Top-level commands recorded so far.
    pub fn commands(&self) -> &[FrameCommand] {
        &self.commands
    }

    /// Command buffer handles produced by this frame's encoders.
    pub fn command_buffers(&self) -> &[Handle] {
        &self.command_buffers
    }

    /// Next sequence number that will be issued.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.peek()
    }

    /// Hands over the recorded frame. Fails while a pass is open.
    pub fn into_commands(self) -> Result<Vec<FrameCommand>, CaptureError> {
        self.check_complete()?;
        Ok(self.commands)
    }
}

fn encoder_record(commands: &mut [FrameCommand], index: usize) -> &mut EncoderRecord {
    match &mut commands[index] {
        FrameCommand::Encoder(record) => record,
        FrameCommand::Base(_) => unreachable!("encoder index points at a queue command"),
    }
}

fn pass_record(
    commands: &mut [FrameCommand],
    index: usize,
    item: usize,
) -> Option<&mut PassRecord> {
    match encoder_record(commands, index).items.get_mut(item)? {
        EncoderItem::Pass(pass) => Some(pass),
        EncoderItem::Command(_) => None,
    }
}

#[cfg(test)]
mod tests;
