//! Wire format tests against hand-written snapshot documents.

use super::*;

const TRIANGLE: &str = r#"{
    "frameId": 3,
    "timing": { "start": 10.0, "end": 26.5 },
    "surfaceSize": { "width": 640, "height": 480 },
    "surfaceConfig": { "format": "bgra8unorm" },
    "resources": [
        {
            "id": 1,
            "kind": "buffer",
            "descriptor": { "size": 4, "usage": 32, "mappedAtCreation": true },
            "data": [1, 2, 3, 4]
        },
        {
            "id": 2,
            "kind": "bindGroup",
            "descriptor": { "entries": [{ "binding": 0, "resource": { "buffer": { "$ref": 1 } } }] }
        }
    ],
    "commands": [
        {
            "kind": "encoder",
            "id": 3,
            "startSequence": 0,
            "commandBuffer": 5,
            "items": [
                {
                    "kind": "pass",
                    "id": 4,
                    "passKind": "render",
                    "startSequence": 1,
                    "ended": true,
                    "items": [
                        { "sequence": 2, "opcode": "setVertexBuffer", "args": [0, { "$ref": 1 }] },
                        { "sequence": 3, "opcode": "draw", "args": [3] },
                        { "sequence": 4, "opcode": "end" }
                    ]
                },
                { "kind": "command", "sequence": 5, "opcode": "finish" }
            ]
        },
        { "kind": "base", "sequence": 6, "opcode": "submit", "args": [[{ "$ref": 5 }]] }
    ]
}"#;

#[test]
fn test_parse_hand_written_snapshot() {
    let snapshot = FrameSnapshot::from_json(TRIANGLE).unwrap();

    assert_eq!(snapshot.frame_id, 3);
    assert_eq!(snapshot.surface_size, SurfaceSize { width: 640, height: 480 });
    assert_eq!(snapshot.adapter_options, Value::Null);
    assert_eq!(snapshot.resources[0].data.as_deref(), Some(&[1u8, 2, 3, 4][..]));
    assert_eq!(snapshot.resources[1].descriptor.refs(), vec![ResourceId::new(1)]);

    let FrameCommand::Encoder(encoder) = &snapshot.commands[0] else {
        panic!("expected an encoder first");
    };
    assert!(encoder.is_sealed());
    let pass = encoder.passes().next().unwrap();
    assert_eq!(pass.pass_kind, PassKind::Render);
    assert_eq!(pass.items[1].opcode, PassOp::Draw);
    assert!(pass.items[2].args.is_empty());
}

#[test]
fn test_summary_and_sequences() {
    let snapshot = FrameSnapshot::from_json(TRIANGLE).unwrap();
    let summary = snapshot.summary();

    assert_eq!(summary.resources[&ResourceKind::Buffer], 1);
    assert_eq!(summary.encoders, 1);
    assert_eq!(summary.passes, 1);
    assert_eq!(summary.draws, 1);
    assert_eq!(snapshot.command_count(), 5);
    assert_eq!(snapshot.iter_sequences().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5, 6]);
    assert_eq!(snapshot.max_sequence(), Some(6));
}

#[test]
fn test_reencoding_is_stable() {
    let snapshot = FrameSnapshot::from_json(TRIANGLE).unwrap();
    let again = FrameSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
    assert_eq!(again, snapshot);
}

#[test]
fn test_unknown_opcode_is_rejected() {
    let broken = TRIANGLE.replace("\"draw\"", "\"drawMeshTasks\"");
    assert!(FrameSnapshot::from_json(&broken).is_err());
}
