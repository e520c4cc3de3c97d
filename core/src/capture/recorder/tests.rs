//! Tests for the command recorder

use super::*;

const ENCODER: Handle = Handle::new(100);
const PASS: Handle = Handle::new(200);
const CMD_BUF: Handle = Handle::new(300);
const BUFFER: Handle = Handle::new(1);
const PIPELINE: Handle = Handle::new(2);

fn setup() -> (ResourceTracker, CommandRecorder) {
    let mut tracker = ResourceTracker::default();
    tracker
        .track(BUFFER, ResourceKind::Buffer, &Arg::object([("size", Arg::from(4u32))]))
        .unwrap();
    tracker
        .track(PIPELINE, ResourceKind::RenderPipeline, &Arg::Null)
        .unwrap();
    (tracker, CommandRecorder::new())
}

fn open_render_pass(tracker: &mut ResourceTracker, recorder: &mut CommandRecorder) {
    recorder.begin_encoder(tracker, ENCODER, &Arg::Null).unwrap();
    recorder
        .begin_pass(tracker, ENCODER, PASS, PassKind::Render, &Arg::Null)
        .unwrap();
}

#[test]
fn test_full_encoder_lifecycle() {
    let (mut tracker, mut recorder) = setup();
    open_render_pass(&mut tracker, &mut recorder);

    recorder
        .record_pass(&tracker, ENCODER, PASS, PassOp::SetPipeline, &[Arg::from(PIPELINE)])
        .unwrap();
    recorder
        .record_pass(
            &tracker,
            ENCODER,
            PASS,
            PassOp::SetVertexBuffer,
            &[Arg::from(0u32), Arg::from(BUFFER)],
        )
        .unwrap();
    recorder
        .record_pass(&tracker, ENCODER, PASS, PassOp::Draw, &[Arg::from(3u32)])
        .unwrap();
    recorder
        .record_pass(&tracker, ENCODER, PASS, PassOp::End, &[])
        .unwrap();
    let cb = recorder
        .seal_encoder(&mut tracker, ENCODER, CMD_BUF, &[])
        .unwrap();

    let commands = recorder.into_commands().unwrap();
    assert_eq!(commands.len(), 1);
    let FrameCommand::Encoder(encoder) = &commands[0] else {
        panic!("expected encoder");
    };
    assert_eq!(encoder.command_buffer, Some(cb));
    assert_eq!(encoder.items.len(), 2);

    let pass = encoder.passes().next().unwrap();
    assert!(pass.ended);
    let ops: Vec<_> = pass.items.iter().map(|c| c.opcode).collect();
    assert_eq!(
        ops,
        vec![PassOp::SetPipeline, PassOp::SetVertexBuffer, PassOp::Draw, PassOp::End]
    );
    assert_eq!(
        pass.items[1].args[1],
        Value::Ref(tracker.id_of(BUFFER).unwrap())
    );
    assert_eq!(
        tracker.record_of(CMD_BUF).unwrap().kind,
        ResourceKind::CommandBuffer
    );
}

#[test]
fn test_sequences_are_shared_and_increasing() {
    let (mut tracker, mut recorder) = setup();

    let s0 = recorder
        .record_base(&tracker, QueueOp::WriteBuffer, &[Arg::from(BUFFER)])
        .unwrap();
    open_render_pass(&mut tracker, &mut recorder);
    let s3 = recorder
        .record_pass(&tracker, ENCODER, PASS, PassOp::Draw, &[Arg::from(3u32)])
        .unwrap();
    let s4 = recorder
        .record_pass(&tracker, ENCODER, PASS, PassOp::End, &[])
        .unwrap();
    let s5 = recorder
        .record_encoder(&tracker, ENCODER, EncoderOp::InsertDebugMarker, &[Arg::from("m")])
        .unwrap();

    assert_eq!((s0, s3, s4, s5), (0, 3, 4, 5));
    assert_eq!(recorder.next_sequence(), 6);
}

#[test]
fn test_commands_after_end_are_rejected() {
    let (mut tracker, mut recorder) = setup();
    open_render_pass(&mut tracker, &mut recorder);
    recorder
        .record_pass(&tracker, ENCODER, PASS, PassOp::End, &[])
        .unwrap();

    let err = recorder
        .record_pass(&tracker, ENCODER, PASS, PassOp::Draw, &[Arg::from(3u32)])
        .unwrap_err();
    assert!(matches!(err, CaptureError::PassEnded { opcode: PassOp::Draw, .. }));
}

#[test]
fn test_dispatch_in_render_pass_is_rejected() {
    let (mut tracker, mut recorder) = setup();
    open_render_pass(&mut tracker, &mut recorder);

    let err = recorder
        .record_pass(&tracker, ENCODER, PASS, PassOp::DispatchWorkgroups, &[Arg::from(1u32)])
        .unwrap_err();
    assert_eq!(
        err,
        CaptureError::InvalidPassOp {
            opcode: PassOp::DispatchWorkgroups,
            pass_kind: PassKind::Render
        }
    );
}

#[test]
fn test_encoder_commands_need_closed_pass() {
    let (mut tracker, mut recorder) = setup();
    open_render_pass(&mut tracker, &mut recorder);

    assert!(matches!(
        recorder.record_encoder(&tracker, ENCODER, EncoderOp::PopDebugGroup, &[]),
        Err(CaptureError::PassStillOpen { .. })
    ));
    assert!(matches!(
        recorder.seal_encoder(&mut tracker, ENCODER, CMD_BUF, &[]),
        Err(CaptureError::PassStillOpen { .. })
    ));
    assert!(matches!(
        recorder.begin_pass(&mut tracker, ENCODER, Handle::new(201), PassKind::Compute, &Arg::Null),
        Err(CaptureError::PassStillOpen { .. })
    ));
}

#[test]
fn test_finish_only_through_seal() {
    let (mut tracker, mut recorder) = setup();
    recorder.begin_encoder(&mut tracker, ENCODER, &Arg::Null).unwrap();

    assert_eq!(
        recorder.record_encoder(&tracker, ENCODER, EncoderOp::Finish, &[]),
        Err(CaptureError::FinishOutsideSeal)
    );
}

#[test]
fn test_sealed_encoder_rejects_commands() {
    let (mut tracker, mut recorder) = setup();
    recorder.begin_encoder(&mut tracker, ENCODER, &Arg::Null).unwrap();
    recorder
        .seal_encoder(&mut tracker, ENCODER, CMD_BUF, &[])
        .unwrap();

    assert!(matches!(
        recorder.record_encoder(&tracker, ENCODER, EncoderOp::ClearBuffer, &[Arg::from(BUFFER)]),
        Err(CaptureError::EncoderSealed { .. })
    ));
    // the handle may be reused for a new encoder once sealed
    assert!(recorder.begin_encoder(&mut tracker, ENCODER, &Arg::Null).is_ok());
}

#[test]
fn test_pass_on_sealed_encoder_is_rejected() {
    let (mut tracker, mut recorder) = setup();
    let encoder = recorder.begin_encoder(&mut tracker, ENCODER, &Arg::Null).unwrap();
    recorder
        .seal_encoder(&mut tracker, ENCODER, CMD_BUF, &[])
        .unwrap();

    assert_eq!(
        recorder.begin_pass(&mut tracker, ENCODER, PASS, PassKind::Compute, &Arg::Null),
        Err(CaptureError::PassAfterFinish {
            encoder,
            pass_kind: PassKind::Compute,
        })
    );
    assert_eq!(recorder.command_buffers(), &[CMD_BUF]);
}

#[test]
fn test_unknown_encoder_and_pass() {
    let (mut tracker, mut recorder) = setup();
    assert_eq!(
        recorder.begin_pass(&mut tracker, ENCODER, PASS, PassKind::Render, &Arg::Null),
        Err(CaptureError::UnknownEncoder { handle: ENCODER })
    );
    recorder.begin_encoder(&mut tracker, ENCODER, &Arg::Null).unwrap();
    assert_eq!(
        recorder.record_pass(&tracker, ENCODER, PASS, PassOp::End, &[]),
        Err(CaptureError::UnknownPass { handle: PASS })
    );
}

#[test]
fn test_open_pass_blocks_snapshot() {
    let (mut tracker, mut recorder) = setup();
    open_render_pass(&mut tracker, &mut recorder);

    assert!(matches!(
        recorder.into_commands(),
        Err(CaptureError::IncompleteFrame { .. })
    ));
}

#[test]
fn test_untracked_argument_leaves_no_command() {
    let (tracker, mut recorder) = setup();
    let err = recorder
        .record_base(&tracker, QueueOp::Submit, &[Arg::array([Arg::from(Handle::new(999))])])
        .unwrap_err();

    assert!(matches!(err, CaptureError::UnknownReference { .. }));
    assert!(recorder.commands().is_empty());
    assert_eq!(recorder.next_sequence(), 0);
}
