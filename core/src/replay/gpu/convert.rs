//! Descriptor documents to wgpu values.
//!
//! Snapshot descriptors use WebGPU's JavaScript spelling: camelCase keys,
//! kebab-case enum strings and numeric usage flags. Absent keys take the
//! WebGPU defaults.

use super::GpuResource;
use crate::replay::error::DeviceError;
use crate::replay::resolved::Resolved;

pub(super) type Desc = Resolved<GpuResource>;

fn unknown(what: &str, value: &str) -> DeviceError {
    DeviceError::new(format!("unknown {what} `{value}`"))
}

// === Field access ===

pub(super) fn label(desc: &Desc) -> Option<&str> {
    desc.field("label").and_then(Resolved::as_str)
}

pub(super) fn string<'a>(desc: &'a Desc, key: &str) -> Option<&'a str> {
    desc.field(key).and_then(Resolved::as_str)
}

pub(super) fn u32_or(desc: &Desc, key: &str, default: u32) -> Result<u32, DeviceError> {
    match desc.field(key) {
        None => Ok(default),
        Some(value) => value
            .as_u32()
            .ok_or_else(|| DeviceError::new(format!("`{key}` must be a u32"))),
    }
}

pub(super) fn u64_or(desc: &Desc, key: &str, default: u64) -> Result<u64, DeviceError> {
    match desc.field(key) {
        None => Ok(default),
        Some(value) => value
            .as_u64()
            .ok_or_else(|| DeviceError::new(format!("`{key}` must be an unsigned integer"))),
    }
}

pub(super) fn opt_u64(desc: &Desc, key: &str) -> Option<u64> {
    desc.field(key).and_then(Resolved::as_u64)
}

pub(super) fn f32_or(desc: &Desc, key: &str, default: f32) -> f32 {
    desc.field(key)
        .and_then(Resolved::as_f64)
        .map_or(default, |f| f as f32)
}

pub(super) fn bool_or(desc: &Desc, key: &str, default: bool) -> bool {
    desc.field(key).and_then(Resolved::as_bool).unwrap_or(default)
}

pub(super) fn array<'a>(desc: &'a Desc, key: &str) -> &'a [Desc] {
    desc.field(key).and_then(Resolved::as_array).unwrap_or_default()
}

pub(super) fn resource<'a>(desc: &'a Desc, key: &str) -> Result<&'a GpuResource, DeviceError> {
    desc.field(key)
        .and_then(Resolved::as_resource)
        .ok_or_else(|| DeviceError::new(format!("`{key}` must reference a resource")))
}

// === Geometry ===

/// `[w, h, d]` or `{ width, height, depthOrArrayLayers }`.
pub(super) fn extent(value: &Desc) -> Result<wgpu::Extent3d, DeviceError> {
    let dim = |index: usize, key: &str, default: u32| -> Result<u32, DeviceError> {
        match value {
            Resolved::Array(items) => match items.get(index) {
                Some(item) => item
                    .as_u32()
                    .ok_or_else(|| DeviceError::new("extent entries must be u32")),
                None => Ok(default),
            },
            _ => u32_or(value, key, default),
        }
    };
    Ok(wgpu::Extent3d {
        width: dim(0, "width", 1)?,
        height: dim(1, "height", 1)?,
        depth_or_array_layers: dim(2, "depthOrArrayLayers", 1)?,
    })
}

/// `[x, y, z]` or `{ x, y, z }`.
pub(super) fn origin(value: Option<&Desc>) -> Result<wgpu::Origin3d, DeviceError> {
    let Some(value) = value else {
        return Ok(wgpu::Origin3d::ZERO);
    };
    let coord = |index: usize, key: &str| -> Result<u32, DeviceError> {
        match value {
            Resolved::Array(items) => Ok(items.get(index).and_then(Resolved::as_u32).unwrap_or(0)),
            _ => u32_or(value, key, 0),
        }
    };
    Ok(wgpu::Origin3d {
        x: coord(0, "x")?,
        y: coord(1, "y")?,
        z: coord(2, "z")?,
    })
}

/// `[r, g, b, a]` or `{ r, g, b, a }`.
pub(super) fn color(value: &Desc) -> wgpu::Color {
    let channel = |index: usize, key: &str| -> f64 {
        match value {
            Resolved::Array(items) => items.get(index).and_then(Resolved::as_f64),
            _ => value.field(key).and_then(Resolved::as_f64),
        }
        .unwrap_or(0.0)
    };
    wgpu::Color {
        r: channel(0, "r"),
        g: channel(1, "g"),
        b: channel(2, "b"),
        a: channel(3, "a"),
    }
}

// === Enums ===

pub(super) fn texture_format(name: &str) -> Result<wgpu::TextureFormat, DeviceError> {
    use wgpu::TextureFormat as F;
    Ok(match name {
        "r8unorm" => F::R8Unorm,
        "r8snorm" => F::R8Snorm,
        "r8uint" => F::R8Uint,
        "r8sint" => F::R8Sint,
        "r16uint" => F::R16Uint,
        "r16sint" => F::R16Sint,
        "r16float" => F::R16Float,
        "rg8unorm" => F::Rg8Unorm,
        "rg8snorm" => F::Rg8Snorm,
        "rg8uint" => F::Rg8Uint,
        "rg8sint" => F::Rg8Sint,
        "r32uint" => F::R32Uint,
        "r32sint" => F::R32Sint,
        "r32float" => F::R32Float,
        "rg16uint" => F::Rg16Uint,
        "rg16sint" => F::Rg16Sint,
        "rg16float" => F::Rg16Float,
        "rgba8unorm" => F::Rgba8Unorm,
        "rgba8unorm-srgb" => F::Rgba8UnormSrgb,
        "rgba8snorm" => F::Rgba8Snorm,
        "rgba8uint" => F::Rgba8Uint,
        "rgba8sint" => F::Rgba8Sint,
        "bgra8unorm" => F::Bgra8Unorm,
        "bgra8unorm-srgb" => F::Bgra8UnormSrgb,
        "rgb10a2unorm" => F::Rgb10a2Unorm,
        "rg11b10ufloat" => F::Rg11b10Ufloat,
        "rg32uint" => F::Rg32Uint,
        "rg32sint" => F::Rg32Sint,
        "rg32float" => F::Rg32Float,
        "rgba16uint" => F::Rgba16Uint,
        "rgba16sint" => F::Rgba16Sint,
        "rgba16float" => F::Rgba16Float,
        "rgba32uint" => F::Rgba32Uint,
        "rgba32sint" => F::Rgba32Sint,
        "rgba32float" => F::Rgba32Float,
        "stencil8" => F::Stencil8,
        "depth16unorm" => F::Depth16Unorm,
        "depth24plus" => F::Depth24Plus,
        "depth24plus-stencil8" => F::Depth24PlusStencil8,
        "depth32float" => F::Depth32Float,
        other => return Err(unknown("texture format", other)),
    })
}

pub(super) fn opt_texture_format(
    desc: &Desc,
    key: &str,
) -> Result<Option<wgpu::TextureFormat>, DeviceError> {
    string(desc, key).map(texture_format).transpose()
}

pub(super) fn texture_dimension(name: Option<&str>) -> Result<wgpu::TextureDimension, DeviceError> {
    Ok(match name {
        None | Some("2d") => wgpu::TextureDimension::D2,
        Some("1d") => wgpu::TextureDimension::D1,
        Some("3d") => wgpu::TextureDimension::D3,
        Some(other) => return Err(unknown("texture dimension", other)),
    })
}

pub(super) fn view_dimension(name: &str) -> Result<wgpu::TextureViewDimension, DeviceError> {
    use wgpu::TextureViewDimension as D;
    Ok(match name {
        "1d" => D::D1,
        "2d" => D::D2,
        "2d-array" => D::D2Array,
        "cube" => D::Cube,
        "cube-array" => D::CubeArray,
        "3d" => D::D3,
        other => return Err(unknown("view dimension", other)),
    })
}

pub(super) fn aspect(name: Option<&str>) -> Result<wgpu::TextureAspect, DeviceError> {
    Ok(match name {
        None | Some("all") => wgpu::TextureAspect::All,
        Some("depth-only") => wgpu::TextureAspect::DepthOnly,
        Some("stencil-only") => wgpu::TextureAspect::StencilOnly,
        Some(other) => return Err(unknown("texture aspect", other)),
    })
}

pub(super) fn address_mode(name: Option<&str>) -> Result<wgpu::AddressMode, DeviceError> {
    Ok(match name {
        None | Some("clamp-to-edge") => wgpu::AddressMode::ClampToEdge,
        Some("repeat") => wgpu::AddressMode::Repeat,
        Some("mirror-repeat") => wgpu::AddressMode::MirrorRepeat,
        Some(other) => return Err(unknown("address mode", other)),
    })
}

pub(super) fn filter_mode(name: Option<&str>) -> Result<wgpu::FilterMode, DeviceError> {
    Ok(match name {
        None | Some("nearest") => wgpu::FilterMode::Nearest,
        Some("linear") => wgpu::FilterMode::Linear,
        Some(other) => return Err(unknown("filter mode", other)),
    })
}

pub(super) fn compare_function(name: &str) -> Result<wgpu::CompareFunction, DeviceError> {
    use wgpu::CompareFunction as C;
    Ok(match name {
        "never" => C::Never,
        "less" => C::Less,
        "equal" => C::Equal,
        "less-equal" => C::LessEqual,
        "greater" => C::Greater,
        "not-equal" => C::NotEqual,
        "greater-equal" => C::GreaterEqual,
        "always" => C::Always,
        other => return Err(unknown("compare function", other)),
    })
}

pub(super) fn vertex_format(name: &str) -> Result<wgpu::VertexFormat, DeviceError> {
    use wgpu::VertexFormat as V;
    Ok(match name {
        "uint8x2" => V::Uint8x2,
        "uint8x4" => V::Uint8x4,
        "sint8x2" => V::Sint8x2,
        "sint8x4" => V::Sint8x4,
        "unorm8x2" => V::Unorm8x2,
        "unorm8x4" => V::Unorm8x4,
        "snorm8x2" => V::Snorm8x2,
        "snorm8x4" => V::Snorm8x4,
        "uint16x2" => V::Uint16x2,
        "uint16x4" => V::Uint16x4,
        "sint16x2" => V::Sint16x2,
        "sint16x4" => V::Sint16x4,
        "unorm16x2" => V::Unorm16x2,
        "unorm16x4" => V::Unorm16x4,
        "snorm16x2" => V::Snorm16x2,
        "snorm16x4" => V::Snorm16x4,
        "float16x2" => V::Float16x2,
        "float16x4" => V::Float16x4,
        "float32" => V::Float32,
        "float32x2" => V::Float32x2,
        "float32x3" => V::Float32x3,
        "float32x4" => V::Float32x4,
        "uint32" => V::Uint32,
        "uint32x2" => V::Uint32x2,
        "uint32x3" => V::Uint32x3,
        "uint32x4" => V::Uint32x4,
        "sint32" => V::Sint32,
        "sint32x2" => V::Sint32x2,
        "sint32x3" => V::Sint32x3,
        "sint32x4" => V::Sint32x4,
        other => return Err(unknown("vertex format", other)),
    })
}

pub(super) fn step_mode(name: Option<&str>) -> Result<wgpu::VertexStepMode, DeviceError> {
    Ok(match name {
        None | Some("vertex") => wgpu::VertexStepMode::Vertex,
        Some("instance") => wgpu::VertexStepMode::Instance,
        Some(other) => return Err(unknown("step mode", other)),
    })
}

pub(super) fn index_format(name: &str) -> Result<wgpu::IndexFormat, DeviceError> {
    Ok(match name {
        "uint16" => wgpu::IndexFormat::Uint16,
        "uint32" => wgpu::IndexFormat::Uint32,
        other => return Err(unknown("index format", other)),
    })
}

pub(super) fn primitive(desc: Option<&Desc>) -> Result<wgpu::PrimitiveState, DeviceError> {
    let Some(desc) = desc else {
        return Ok(wgpu::PrimitiveState::default());
    };
    let topology = match string(desc, "topology") {
        None | Some("triangle-list") => wgpu::PrimitiveTopology::TriangleList,
        Some("point-list") => wgpu::PrimitiveTopology::PointList,
        Some("line-list") => wgpu::PrimitiveTopology::LineList,
        Some("line-strip") => wgpu::PrimitiveTopology::LineStrip,
        Some("triangle-strip") => wgpu::PrimitiveTopology::TriangleStrip,
        Some(other) => return Err(unknown("topology", other)),
    };
    let front_face = match string(desc, "frontFace") {
        None | Some("ccw") => wgpu::FrontFace::Ccw,
        Some("cw") => wgpu::FrontFace::Cw,
        Some(other) => return Err(unknown("front face", other)),
    };
    let cull_mode = match string(desc, "cullMode") {
        None | Some("none") => None,
        Some("front") => Some(wgpu::Face::Front),
        Some("back") => Some(wgpu::Face::Back),
        Some(other) => return Err(unknown("cull mode", other)),
    };
    Ok(wgpu::PrimitiveState {
        topology,
        strip_index_format: string(desc, "stripIndexFormat")
            .map(index_format)
            .transpose()?,
        front_face,
        cull_mode,
        unclipped_depth: bool_or(desc, "unclippedDepth", false),
        ..Default::default()
    })
}

fn blend_factor(name: Option<&str>, default: wgpu::BlendFactor) -> Result<wgpu::BlendFactor, DeviceError> {
    use wgpu::BlendFactor as B;
    Ok(match name {
        None => default,
        Some("zero") => B::Zero,
        Some("one") => B::One,
        Some("src") => B::Src,
        Some("one-minus-src") => B::OneMinusSrc,
        Some("src-alpha") => B::SrcAlpha,
        Some("one-minus-src-alpha") => B::OneMinusSrcAlpha,
        Some("dst") => B::Dst,
        Some("one-minus-dst") => B::OneMinusDst,
        Some("dst-alpha") => B::DstAlpha,
        Some("one-minus-dst-alpha") => B::OneMinusDstAlpha,
        Some("src-alpha-saturated") => B::SrcAlphaSaturated,
        Some("constant") => B::Constant,
        Some("one-minus-constant") => B::OneMinusConstant,
        Some(other) => return Err(unknown("blend factor", other)),
    })
}

fn blend_component(desc: Option<&Desc>) -> Result<wgpu::BlendComponent, DeviceError> {
    let Some(desc) = desc else {
        return Ok(wgpu::BlendComponent::REPLACE);
    };
    let operation = match string(desc, "operation") {
        None | Some("add") => wgpu::BlendOperation::Add,
        Some("subtract") => wgpu::BlendOperation::Subtract,
        Some("reverse-subtract") => wgpu::BlendOperation::ReverseSubtract,
        Some("min") => wgpu::BlendOperation::Min,
        Some("max") => wgpu::BlendOperation::Max,
        Some(other) => return Err(unknown("blend operation", other)),
    };
    Ok(wgpu::BlendComponent {
        src_factor: blend_factor(string(desc, "srcFactor"), wgpu::BlendFactor::One)?,
        dst_factor: blend_factor(string(desc, "dstFactor"), wgpu::BlendFactor::Zero)?,
        operation,
    })
}

pub(super) fn color_target(desc: &Desc) -> Result<wgpu::ColorTargetState, DeviceError> {
    let format = string(desc, "format")
        .ok_or_else(|| DeviceError::new("color target needs a `format`"))?;
    let blend = match desc.field("blend") {
        Some(blend) => Some(wgpu::BlendState {
            color: blend_component(blend.field("color"))?,
            alpha: blend_component(blend.field("alpha"))?,
        }),
        None => None,
    };
    let write_mask = u32_or(desc, "writeMask", wgpu::ColorWrites::ALL.bits())?;
    Ok(wgpu::ColorTargetState {
        format: texture_format(format)?,
        blend,
        write_mask: wgpu::ColorWrites::from_bits_truncate(write_mask),
    })
}

fn stencil_operation(name: Option<&str>) -> Result<wgpu::StencilOperation, DeviceError> {
    use wgpu::StencilOperation as S;
    Ok(match name {
        None | Some("keep") => S::Keep,
        Some("zero") => S::Zero,
        Some("replace") => S::Replace,
        Some("invert") => S::Invert,
        Some("increment-clamp") => S::IncrementClamp,
        Some("decrement-clamp") => S::DecrementClamp,
        Some("increment-wrap") => S::IncrementWrap,
        Some("decrement-wrap") => S::DecrementWrap,
        Some(other) => return Err(unknown("stencil operation", other)),
    })
}

fn stencil_face(desc: Option<&Desc>) -> Result<wgpu::StencilFaceState, DeviceError> {
    let Some(desc) = desc else {
        return Ok(wgpu::StencilFaceState::IGNORE);
    };
    Ok(wgpu::StencilFaceState {
        compare: string(desc, "compare")
            .map(compare_function)
            .transpose()?
            .unwrap_or(wgpu::CompareFunction::Always),
        fail_op: stencil_operation(string(desc, "failOp"))?,
        depth_fail_op: stencil_operation(string(desc, "depthFailOp"))?,
        pass_op: stencil_operation(string(desc, "passOp"))?,
    })
}

pub(super) fn depth_stencil(desc: &Desc) -> Result<wgpu::DepthStencilState, DeviceError> {
    let format = string(desc, "format")
        .ok_or_else(|| DeviceError::new("depthStencil needs a `format`"))?;
    Ok(wgpu::DepthStencilState {
        format: texture_format(format)?,
        depth_write_enabled: bool_or(desc, "depthWriteEnabled", false),
        depth_compare: string(desc, "depthCompare")
            .map(compare_function)
            .transpose()?
            .unwrap_or(wgpu::CompareFunction::Always),
        stencil: wgpu::StencilState {
            front: stencil_face(desc.field("stencilFront"))?,
            back: stencil_face(desc.field("stencilBack"))?,
            read_mask: u32_or(desc, "stencilReadMask", 0xFFFF_FFFF)?,
            write_mask: u32_or(desc, "stencilWriteMask", 0xFFFF_FFFF)?,
        },
        bias: wgpu::DepthBiasState {
            constant: desc
                .field("depthBias")
                .and_then(Resolved::as_i64)
                .and_then(|bias| i32::try_from(bias).ok())
                .unwrap_or(0),
            slope_scale: f32_or(desc, "depthBiasSlopeScale", 0.0),
            clamp: f32_or(desc, "depthBiasClamp", 0.0),
        },
    })
}

pub(super) fn multisample(desc: Option<&Desc>) -> Result<wgpu::MultisampleState, DeviceError> {
    let Some(desc) = desc else {
        return Ok(wgpu::MultisampleState::default());
    };
    Ok(wgpu::MultisampleState {
        count: u32_or(desc, "count", 1)?,
        mask: u64_or(desc, "mask", 0xFFFF_FFFF)?,
        alpha_to_coverage_enabled: bool_or(desc, "alphaToCoverageEnabled", false),
    })
}

pub(super) fn binding_type(entry: &Desc) -> Result<wgpu::BindingType, DeviceError> {
    if let Some(buffer) = entry.field("buffer") {
        let ty = match string(buffer, "type") {
            None | Some("uniform") => wgpu::BufferBindingType::Uniform,
            Some("storage") => wgpu::BufferBindingType::Storage { read_only: false },
            Some("read-only-storage") => wgpu::BufferBindingType::Storage { read_only: true },
            Some(other) => return Err(unknown("buffer binding type", other)),
        };
        return Ok(wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: bool_or(buffer, "hasDynamicOffset", false),
            min_binding_size: opt_u64(buffer, "minBindingSize").and_then(wgpu::BufferSize::new),
        });
    }
    if let Some(sampler) = entry.field("sampler") {
        let ty = match string(sampler, "type") {
            None | Some("filtering") => wgpu::SamplerBindingType::Filtering,
            Some("non-filtering") => wgpu::SamplerBindingType::NonFiltering,
            Some("comparison") => wgpu::SamplerBindingType::Comparison,
            Some(other) => return Err(unknown("sampler binding type", other)),
        };
        return Ok(wgpu::BindingType::Sampler(ty));
    }
    if let Some(texture) = entry.field("texture") {
        let sample_type = match string(texture, "sampleType") {
            None | Some("float") => wgpu::TextureSampleType::Float { filterable: true },
            Some("unfilterable-float") => wgpu::TextureSampleType::Float { filterable: false },
            Some("depth") => wgpu::TextureSampleType::Depth,
            Some("sint") => wgpu::TextureSampleType::Sint,
            Some("uint") => wgpu::TextureSampleType::Uint,
            Some(other) => return Err(unknown("texture sample type", other)),
        };
        return Ok(wgpu::BindingType::Texture {
            sample_type,
            view_dimension: view_dimension(string(texture, "viewDimension").unwrap_or("2d"))?,
            multisampled: bool_or(texture, "multisampled", false),
        });
    }
    if let Some(storage) = entry.field("storageTexture") {
        let access = match string(storage, "access") {
            None | Some("write-only") => wgpu::StorageTextureAccess::WriteOnly,
            Some("read-only") => wgpu::StorageTextureAccess::ReadOnly,
            Some("read-write") => wgpu::StorageTextureAccess::ReadWrite,
            Some(other) => return Err(unknown("storage access", other)),
        };
        let format = string(storage, "format")
            .ok_or_else(|| DeviceError::new("storageTexture needs a `format`"))?;
        return Ok(wgpu::BindingType::StorageTexture {
            access,
            format: texture_format(format)?,
            view_dimension: view_dimension(string(storage, "viewDimension").unwrap_or("2d"))?,
        });
    }
    Err(DeviceError::new(
        "bind group layout entry has no buffer, sampler, texture or storageTexture",
    ))
}

pub(super) fn load_op<V>(name: Option<&str>, clear: V) -> Result<wgpu::LoadOp<V>, DeviceError> {
    Ok(match name {
        Some("clear") => wgpu::LoadOp::Clear(clear),
        None | Some("load") => wgpu::LoadOp::Load,
        Some(other) => return Err(unknown("load op", other)),
    })
}

pub(super) fn store_op(name: Option<&str>) -> Result<wgpu::StoreOp, DeviceError> {
    Ok(match name {
        None | Some("store") => wgpu::StoreOp::Store,
        Some("discard") => wgpu::StoreOp::Discard,
        Some(other) => return Err(unknown("store op", other)),
    })
}

pub(super) fn query_type(name: Option<&str>) -> Result<wgpu::QueryType, DeviceError> {
    Ok(match name {
        None | Some("occlusion") => wgpu::QueryType::Occlusion,
        Some("timestamp") => wgpu::QueryType::Timestamp,
        Some(other) => return Err(unknown("query type", other)),
    })
}
