//! Tests for the resource pool

use super::*;
use crate::replay::trace::{TraceCommandBuffer, TraceDevice, TraceEvent};

fn id(n: u64) -> ResourceId {
    ResourceId::new(n)
}

fn record(n: u64, kind: ResourceKind, descriptor: Value) -> ResourceRecord {
    ResourceRecord {
        id: id(n),
        kind,
        descriptor,
        data: None,
    }
}

fn pool(records: Vec<ResourceRecord>) -> ResourcePool<TraceDevice> {
    ResourcePool::new(TraceDevice::new(), records, ReplayConfig::default()).unwrap()
}

fn bind_group_records() -> Vec<ResourceRecord> {
    vec![
        record(
            1,
            ResourceKind::Buffer,
            Value::object([("size", Value::from(16u64)), ("usage", Value::from(0x40u64))]),
        ),
        record(2, ResourceKind::BindGroupLayout, Value::object([("entries", Value::Array(vec![]))])),
        record(
            3,
            ResourceKind::BindGroup,
            Value::object([
                ("layout", Value::from(id(2))),
                (
                    "entries",
                    Value::Array(vec![Value::object([
                        ("binding", Value::from(0u64)),
                        ("resource", Value::object([("buffer", Value::from(id(1)))])),
                    ])]),
                ),
            ]),
        ),
    ]
}

fn created_kinds(device: &TraceDevice) -> Vec<ResourceKind> {
    device
        .events()
        .iter()
        .filter_map(|event| match event {
            TraceEvent::Create { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect()
}

fn finished(pool: &mut ResourcePool<TraceDevice>) -> TraceCommandBuffer {
    let device = pool.device_mut();
    let encoder = device.begin_encoder(&Resolved::Null).unwrap();
    device.finish_encoder(encoder, &Resolved::Null).unwrap()
}

// ============================================================================
// Lazy creation
// ============================================================================

#[test]
fn test_dependencies_created_first_and_once() {
    let mut pool = pool(bind_group_records());

    let first = pool.resolve(&Value::from(id(3))).unwrap();
    let second = pool.resolve(&Value::from(id(3))).unwrap();
    assert_eq!(first, second);

    assert_eq!(pool.created_count(), 3);
    assert_eq!(
        created_kinds(pool.device()),
        vec![
            ResourceKind::Buffer,
            ResourceKind::BindGroupLayout,
            ResourceKind::BindGroup
        ]
    );
}

#[test]
fn test_shared_dependency_is_reused() {
    let mut pool = pool(bind_group_records());
    let buffer = pool.get_or_create(id(1)).unwrap();
    pool.get_or_create(id(3)).unwrap();

    assert_eq!(pool.device().created(ResourceKind::Buffer), 1);
    assert_eq!(pool.get(id(1)), Some(&buffer));
}

#[test]
fn test_untouched_records_are_never_created() {
    let mut pool = pool(bind_group_records());
    pool.get_or_create(id(2)).unwrap();
    assert_eq!(pool.created_count(), 1);
    assert!(pool.get(id(1)).is_none());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_unknown_reference() {
    let mut pool = pool(vec![record(
        3,
        ResourceKind::BindGroup,
        Value::object([("layout", Value::from(id(99)))]),
    )]);
    assert_eq!(
        pool.get_or_create(id(3)),
        Err(ReplayError::UnknownReference { id: id(99) })
    );
    assert!(pool.get(id(3)).is_none());
    assert_eq!(pool.created_count(), 0);
}

#[test]
fn test_duplicate_ids_rejected() {
    let records = vec![
        record(1, ResourceKind::Sampler, Value::Null),
        record(1, ResourceKind::Sampler, Value::Null),
    ];
    let err = ResourcePool::new(TraceDevice::new(), records, ReplayConfig::default())
        .err()
        .unwrap();
    assert_eq!(err, ReplayError::DuplicateResource { id: id(1) });
}

#[test]
fn test_dependency_cycle_detected() {
    let mut pool = pool(vec![
        record(
            1,
            ResourceKind::BindGroup,
            Value::object([("layout", Value::from(id(2)))]),
        ),
        record(
            2,
            ResourceKind::BindGroupLayout,
            Value::object([("entries", Value::Array(vec![Value::from(id(1))]))]),
        ),
    ]);
    assert_eq!(
        pool.get_or_create(id(1)),
        Err(ReplayError::DependencyCycle { id: id(1) })
    );
}

#[test]
fn test_command_buffer_not_reconstructible() {
    let mut pool = pool(vec![record(
        5,
        ResourceKind::CommandBuffer,
        Value::object([("encoder", Value::from(4u64))]),
    )]);
    assert_eq!(
        pool.get_or_create(id(5)),
        Err(ReplayError::NotReconstructible {
            id: id(5),
            kind: ResourceKind::CommandBuffer
        })
    );
}

#[test]
fn test_device_failure_names_resource() {
    // Buffers without a size are rejected by the trace device.
    let mut pool = pool(vec![record(7, ResourceKind::Buffer, Value::object([("usage", Value::from(8u64))]))]);
    let err = pool.get_or_create(id(7)).unwrap_err();
    assert!(matches!(err, ReplayError::Creation { kind: ResourceKind::Buffer, .. }));
    assert_eq!(err.resource(), Some(id(7)));
}

#[test]
fn test_resolve_depth_limit() {
    let config = ReplayConfig {
        max_resolve_depth: 2,
        ..ReplayConfig::default()
    };
    let mut pool = ResourcePool::new(TraceDevice::new(), Vec::new(), config).unwrap();
    let deep = Value::Array(vec![Value::Array(vec![Value::Array(vec![Value::Array(vec![])])])]);
    assert_eq!(pool.resolve(&deep), Err(ReplayError::TooDeep { limit: 2 }));
}

// ============================================================================
// Kind-specific creation
// ============================================================================

#[test]
fn test_mapped_at_creation_uploads_contents() {
    let mut mapped = record(
        1,
        ResourceKind::Buffer,
        Value::object([("size", Value::from(4u64)), ("mappedAtCreation", Value::from(true))]),
    );
    mapped.data = Some(vec![1, 2, 3, 4]);
    let mut unmapped = record(2, ResourceKind::Buffer, Value::object([("size", Value::from(4u64))]));
    unmapped.data = Some(vec![9, 9, 9, 9]);

    let mut pool = pool(vec![mapped, unmapped]);
    let a = pool.get_or_create(id(1)).unwrap();
    let b = pool.get_or_create(id(2)).unwrap();

    assert_eq!(pool.device().buffer_contents(a), Some(&[1u8, 2, 3, 4][..]));
    assert_eq!(pool.device().buffer_contents(b), Some(&[0u8; 4][..]));
}

#[test]
fn test_oversized_buffer_fails_creation() {
    let huge = record(1, ResourceKind::Buffer, Value::object([("size", Value::from(1u64 << 62))]));
    let mut pool = pool(vec![huge]);

    assert!(matches!(
        pool.get_or_create(id(1)),
        Err(ReplayError::Creation { kind: ResourceKind::Buffer, .. })
    ));
    assert_eq!(pool.created_count(), 0);
    assert_eq!(pool.device().created(ResourceKind::Buffer), 0);
}

fn texture_records() -> Vec<ResourceRecord> {
    vec![
        record(
            1,
            ResourceKind::Texture,
            Value::object([
                ("size", Value::Array(vec![Value::from(8u64), Value::from(4u64), Value::from(1u64)])),
                ("format", Value::from("rgba8unorm")),
                ("usage", Value::from(0x10u64)),
            ]),
        ),
        record(
            2,
            ResourceKind::TextureView,
            Value::object([
                ("texture", Value::from(id(1))),
                ("descriptor", Value::object([("label", Value::from("color"))])),
            ]),
        ),
    ]
}

fn texture_usage(device: &TraceDevice) -> Option<u64> {
    device.events().iter().find_map(|event| match event {
        TraceEvent::Create {
            kind: ResourceKind::Texture,
            descriptor,
            ..
        } => descriptor.field("usage").and_then(Resolved::as_u64),
        _ => None,
    })
}

#[test]
fn test_texture_gets_copy_src() {
    let mut pool = pool(texture_records());
    pool.get_or_create(id(1)).unwrap();
    assert_eq!(texture_usage(pool.device()), Some(0x11));
}

#[test]
fn test_texture_usage_untouched_when_disabled() {
    let config = ReplayConfig {
        force_copy_src: false,
        ..ReplayConfig::default()
    };
    let mut pool = ResourcePool::new(TraceDevice::new(), texture_records(), config).unwrap();
    pool.get_or_create(id(1)).unwrap();
    assert_eq!(texture_usage(pool.device()), Some(0x10));
}

#[test]
fn test_texture_view_info_recorded() {
    let mut pool = pool(texture_records());
    let view = pool.get_or_create(id(2)).unwrap();

    let views = pool.texture_views();
    assert_eq!(views.len(), 1);
    let info = &views[0];
    assert_eq!(info.view_id, id(2));
    assert_eq!(info.texture_id, id(1));
    assert_eq!(info.view, view);
    assert_eq!((info.width, info.height), (8, 4));
    assert_eq!(info.format, "rgba8unorm");
    assert_eq!(info.label.as_deref(), Some("color"));
}

#[test]
fn test_pipeline_bind_group_layout() {
    let mut pool = pool(vec![
        record(
            1,
            ResourceKind::RenderPipeline,
            Value::object([("layout", Value::from("auto"))]),
        ),
        record(
            2,
            ResourceKind::PipelineBindGroupLayout,
            Value::object([("pipeline", Value::from(id(1))), ("index", Value::from(0u64))]),
        ),
    ]);
    pool.get_or_create(id(2)).unwrap();
    assert_eq!(
        created_kinds(pool.device()),
        vec![ResourceKind::RenderPipeline, ResourceKind::BindGroupLayout]
    );
}

#[test]
fn test_texture_extent_forms() {
    let array = Value::object([("size", Value::Array(vec![Value::from(16u64)]))]);
    let object = Value::object([(
        "size",
        Value::object([("width", Value::from(32u64)), ("height", Value::from(8u64))]),
    )]);
    assert_eq!(texture_extent(&array), (16, 1));
    assert_eq!(texture_extent(&object), (32, 8));
    assert_eq!(texture_extent(&Value::Null), (0, 0));
}

// ============================================================================
// Command buffers
// ============================================================================

#[test]
fn test_take_command_buffers_keeps_finish_order() {
    let mut pool = pool(Vec::new());
    for n in [10, 11, 12] {
        let cb = finished(&mut pool);
        pool.add_command_buffer(id(n), cb);
    }

    let taken = pool.take_command_buffers(&[id(12), id(10)]).unwrap();
    let serials: Vec<u32> = taken.iter().map(TraceCommandBuffer::serial).collect();
    assert_eq!(serials, vec![0, 2]);
    assert_eq!(pool.pending_command_buffers(), 1);

    let rest = pool.take_all_command_buffers();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].serial(), 1);
}

#[test]
fn test_take_missing_command_buffer() {
    let mut pool = pool(Vec::new());
    let cb = finished(&mut pool);
    pool.add_command_buffer(id(10), cb);

    let err = pool.take_command_buffers(&[id(10), id(11)]).unwrap_err();
    assert_eq!(err, ReplayError::UnknownReference { id: id(11) });
    assert_eq!(pool.pending_command_buffers(), 1);
}
