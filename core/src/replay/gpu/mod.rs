//! wgpu replay backend
//!
//! Replays snapshots on a headless wgpu device. Validation errors raised by
//! wgpu are caught with error scopes and surface as [`DeviceError`]s on the
//! call that caused them.

mod convert;
mod readback;

use std::borrow::Cow;

use framescope_shared::Value;
use tracing::info;
use wgpu::util::DeviceExt;

use self::convert::{
    Desc, array, bool_or, color, extent, label, opt_texture_format, opt_u64, origin, resource,
    string, u32_or, u64_or,
};
use super::calls::{ComputeCall, EncoderCall, IndexFormat, QueueCall, RenderCall};
use super::device::{Descriptor, ReplayDevice, buffer_storage};
use super::error::DeviceError;
use super::resolved::Resolved;

pub use readback::ReadbackError;

/// A live wgpu object created during replay.
#[derive(Debug, Clone)]
pub enum GpuResource {
    Buffer(wgpu::Buffer),
    Texture(wgpu::Texture),
    TextureView(wgpu::TextureView),
    Sampler(wgpu::Sampler),
    ShaderModule(wgpu::ShaderModule),
    BindGroupLayout(wgpu::BindGroupLayout),
    PipelineLayout(wgpu::PipelineLayout),
    RenderPipeline(wgpu::RenderPipeline),
    ComputePipeline(wgpu::ComputePipeline),
    BindGroup(wgpu::BindGroup),
    QuerySet(wgpu::QuerySet),
}

macro_rules! accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> Result<&$ty, DeviceError> {
            match self {
                GpuResource::$variant(inner) => Ok(inner),
                other => Err(DeviceError::new(format!(
                    concat!("expected a ", stringify!($variant), ", found {}"),
                    other.kind_name()
                ))),
            }
        }
    };
}

impl GpuResource {
    pub fn kind_name(&self) -> &'static str {
        match self {
            GpuResource::Buffer(_) => "Buffer",
            GpuResource::Texture(_) => "Texture",
            GpuResource::TextureView(_) => "TextureView",
            GpuResource::Sampler(_) => "Sampler",
            GpuResource::ShaderModule(_) => "ShaderModule",
            GpuResource::BindGroupLayout(_) => "BindGroupLayout",
            GpuResource::PipelineLayout(_) => "PipelineLayout",
            GpuResource::RenderPipeline(_) => "RenderPipeline",
            GpuResource::ComputePipeline(_) => "ComputePipeline",
            GpuResource::BindGroup(_) => "BindGroup",
            GpuResource::QuerySet(_) => "QuerySet",
        }
    }

    accessor!(buffer, Buffer, wgpu::Buffer);
    accessor!(texture, Texture, wgpu::Texture);
    accessor!(texture_view, TextureView, wgpu::TextureView);
    accessor!(sampler, Sampler, wgpu::Sampler);
    accessor!(shader_module, ShaderModule, wgpu::ShaderModule);
    accessor!(bind_group_layout, BindGroupLayout, wgpu::BindGroupLayout);
    accessor!(pipeline_layout, PipelineLayout, wgpu::PipelineLayout);
    accessor!(render_pipeline, RenderPipeline, wgpu::RenderPipeline);
    accessor!(compute_pipeline, ComputePipeline, wgpu::ComputePipeline);
    accessor!(bind_group, BindGroup, wgpu::BindGroup);
    accessor!(query_set, QuerySet, wgpu::QuerySet);
}

/// Headless wgpu device that snapshots replay onto.
pub struct WgpuDevice {
    /// GPU device
    device: wgpu::Device,
    /// Command queue
    queue: wgpu::Queue,
    /// Adapter the device was requested from
    adapter_info: wgpu::AdapterInfo,
}

impl WgpuDevice {
    /// Opens an adapter matching the captured `requestAdapter` options.
    pub fn new(adapter_options: &Value) -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let power_preference = match adapter_options
            .get("powerPreference")
            .and_then(Value::as_str)
        {
            Some("high-performance") => wgpu::PowerPreference::HighPerformance,
            Some("low-power") => wgpu::PowerPreference::LowPower,
            _ => wgpu::PowerPreference::default(),
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            force_fallback_adapter: adapter_options
                .get("forceFallbackAdapter")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            compatible_surface: None,
        }))
        .map_err(|e| DeviceError::new(format!("no suitable adapter: {e}")))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("framescope replay"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
            experimental_features: Default::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| DeviceError::new(format!("device request failed: {e}")))?;

        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "replay device ready"
        );

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Runs `f` inside a validation error scope.
    fn scoped<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&wgpu::Device, &wgpu::Queue) -> Result<T, DeviceError>,
    ) -> Result<T, DeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = f(&self.device, &self.queue);
        let error = pollster::block_on(self.device.pop_error_scope());
        match (result, error) {
            (Err(e), _) => Err(e),
            (Ok(_), Some(error)) => Err(DeviceError::new(format!("{operation}: {error}"))),
            (Ok(value), None) => Ok(value),
        }
    }
}

// === Descriptor helpers ===

fn texel_copy_texture(desc: &Desc) -> Result<wgpu::TexelCopyTextureInfo<'_>, DeviceError> {
    Ok(wgpu::TexelCopyTextureInfo {
        texture: resource(desc, "texture")?.texture()?,
        mip_level: u32_or(desc, "mipLevel", 0)?,
        origin: origin(desc.field("origin"))?,
        aspect: convert::aspect(string(desc, "aspect"))?,
    })
}

fn texel_layout(desc: &Desc) -> Result<wgpu::TexelCopyBufferLayout, DeviceError> {
    Ok(wgpu::TexelCopyBufferLayout {
        offset: u64_or(desc, "offset", 0)?,
        bytes_per_row: desc.field("bytesPerRow").and_then(Resolved::as_u32),
        rows_per_image: desc.field("rowsPerImage").and_then(Resolved::as_u32),
    })
}

fn texel_copy_buffer(desc: &Desc) -> Result<wgpu::TexelCopyBufferInfo<'_>, DeviceError> {
    Ok(wgpu::TexelCopyBufferInfo {
        buffer: resource(desc, "buffer")?.buffer()?,
        layout: texel_layout(desc)?,
    })
}

fn buffer_slice(buffer: &wgpu::Buffer, offset: u64, size: Option<u64>) -> wgpu::BufferSlice<'_> {
    match size {
        Some(size) => buffer.slice(offset..offset + size),
        None => buffer.slice(offset..),
    }
}

fn index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
        IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
    }
}

fn pipeline_layout(desc: &Desc) -> Result<Option<&wgpu::PipelineLayout>, DeviceError> {
    match desc.field("layout") {
        None => Ok(None),
        Some(Resolved::String(auto)) if auto == "auto" => Ok(None),
        Some(Resolved::Resource(layout)) => Ok(Some(layout.pipeline_layout()?)),
        Some(_) => Err(DeviceError::new("`layout` must be \"auto\" or a pipeline layout")),
    }
}

/// Vertex buffer layouts with their attribute lists owned alongside.
struct VertexBuffers {
    layouts: Vec<(u64, wgpu::VertexStepMode)>,
    attributes: Vec<Vec<wgpu::VertexAttribute>>,
}

impl VertexBuffers {
    fn parse(stage: &Desc) -> Result<Self, DeviceError> {
        let mut layouts = Vec::new();
        let mut attributes = Vec::new();
        for buffer in array(stage, "buffers") {
            if buffer.is_null() {
                layouts.push((0, wgpu::VertexStepMode::Vertex));
                attributes.push(Vec::new());
                continue;
            }
            layouts.push((
                u64_or(buffer, "arrayStride", 0)?,
                convert::step_mode(string(buffer, "stepMode"))?,
            ));
            attributes.push(
                array(buffer, "attributes")
                    .iter()
                    .map(|attribute| {
                        let format = string(attribute, "format")
                            .ok_or_else(|| DeviceError::new("vertex attribute needs a `format`"))?;
                        Ok(wgpu::VertexAttribute {
                            format: convert::vertex_format(format)?,
                            offset: u64_or(attribute, "offset", 0)?,
                            shader_location: u32_or(attribute, "shaderLocation", 0)?,
                        })
                    })
                    .collect::<Result<Vec<_>, DeviceError>>()?,
            );
        }
        Ok(Self {
            layouts,
            attributes,
        })
    }

    fn layouts(&self) -> Vec<wgpu::VertexBufferLayout<'_>> {
        self.layouts
            .iter()
            .zip(&self.attributes)
            .map(|((stride, step_mode), attributes)| wgpu::VertexBufferLayout {
                array_stride: *stride,
                step_mode: *step_mode,
                attributes,
            })
            .collect()
    }
}

impl ReplayDevice for WgpuDevice {
    type Resource = GpuResource;
    type Encoder = wgpu::CommandEncoder;
    type RenderPass = wgpu::RenderPass<'static>;
    type ComputePass = wgpu::ComputePass<'static>;
    type CommandBuffer = wgpu::CommandBuffer;

    fn create_buffer(
        &mut self,
        desc: &Descriptor<GpuResource>,
        contents: Option<&[u8]>,
    ) -> Result<GpuResource, DeviceError> {
        let size = opt_u64(desc, "size").ok_or_else(|| DeviceError::new("buffer needs a `size`"))?;
        let usage = wgpu::BufferUsages::from_bits_truncate(u32_or(desc, "usage", 0)?);
        let limit = self.device.limits().max_buffer_size;
        if size > limit {
            return Err(DeviceError::new(format!(
                "buffer size {size} exceeds the device limit of {limit}"
            )));
        }
        self.scoped("createBuffer", |device, _| {
            let buffer = match contents {
                Some(bytes) => {
                    let initial = buffer_storage(size, limit, bytes)?;
                    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: label(desc),
                        contents: &initial,
                        usage,
                    })
                }
                None => device.create_buffer(&wgpu::BufferDescriptor {
                    label: label(desc),
                    size,
                    usage,
                    mapped_at_creation: false,
                }),
            };
            Ok(GpuResource::Buffer(buffer))
        })
    }

    fn create_texture(&mut self, desc: &Descriptor<GpuResource>) -> Result<GpuResource, DeviceError> {
        let size = extent(
            desc.field("size")
                .ok_or_else(|| DeviceError::new("texture needs a `size`"))?,
        )?;
        let format = opt_texture_format(desc, "format")?
            .ok_or_else(|| DeviceError::new("texture needs a `format`"))?;
        let view_formats = array(desc, "viewFormats")
            .iter()
            .filter_map(Resolved::as_str)
            .map(convert::texture_format)
            .collect::<Result<Vec<_>, _>>()?;
        let descriptor = wgpu::TextureDescriptor {
            label: label(desc),
            size,
            mip_level_count: u32_or(desc, "mipLevelCount", 1)?,
            sample_count: u32_or(desc, "sampleCount", 1)?,
            dimension: convert::texture_dimension(string(desc, "dimension"))?,
            format,
            usage: wgpu::TextureUsages::from_bits_truncate(u32_or(desc, "usage", 0)?),
            view_formats: &view_formats,
        };
        self.scoped("createTexture", |device, _| {
            Ok(GpuResource::Texture(device.create_texture(&descriptor)))
        })
    }

    fn create_texture_view(
        &mut self,
        texture: &GpuResource,
        desc: &Descriptor<GpuResource>,
    ) -> Result<GpuResource, DeviceError> {
        let texture = texture.texture()?;
        let descriptor = wgpu::TextureViewDescriptor {
            label: label(desc),
            format: opt_texture_format(desc, "format")?,
            dimension: string(desc, "dimension")
                .map(convert::view_dimension)
                .transpose()?,
            aspect: convert::aspect(string(desc, "aspect"))?,
            base_mip_level: u32_or(desc, "baseMipLevel", 0)?,
            mip_level_count: desc.field("mipLevelCount").and_then(Resolved::as_u32),
            base_array_layer: u32_or(desc, "baseArrayLayer", 0)?,
            array_layer_count: desc.field("arrayLayerCount").and_then(Resolved::as_u32),
            ..Default::default()
        };
        self.scoped("createView", |_, _| {
            Ok(GpuResource::TextureView(texture.create_view(&descriptor)))
        })
    }

    fn create_sampler(&mut self, desc: &Descriptor<GpuResource>) -> Result<GpuResource, DeviceError> {
        let descriptor = wgpu::SamplerDescriptor {
            label: label(desc),
            address_mode_u: convert::address_mode(string(desc, "addressModeU"))?,
            address_mode_v: convert::address_mode(string(desc, "addressModeV"))?,
            address_mode_w: convert::address_mode(string(desc, "addressModeW"))?,
            mag_filter: convert::filter_mode(string(desc, "magFilter"))?,
            min_filter: convert::filter_mode(string(desc, "minFilter"))?,
            mipmap_filter: convert::filter_mode(string(desc, "mipmapFilter"))?,
            lod_min_clamp: convert::f32_or(desc, "lodMinClamp", 0.0),
            lod_max_clamp: convert::f32_or(desc, "lodMaxClamp", 32.0),
            compare: string(desc, "compare")
                .map(convert::compare_function)
                .transpose()?,
            anisotropy_clamp: u16::try_from(u32_or(desc, "maxAnisotropy", 1)?).unwrap_or(u16::MAX),
            ..Default::default()
        };
        self.scoped("createSampler", |device, _| {
            Ok(GpuResource::Sampler(device.create_sampler(&descriptor)))
        })
    }

    fn create_shader_module(
        &mut self,
        desc: &Descriptor<GpuResource>,
    ) -> Result<GpuResource, DeviceError> {
        let code = string(desc, "code")
            .ok_or_else(|| DeviceError::new("shader module needs WGSL `code`"))?;
        self.scoped("createShaderModule", |device, _| {
            Ok(GpuResource::ShaderModule(device.create_shader_module(
                wgpu::ShaderModuleDescriptor {
                    label: label(desc),
                    source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(code)),
                },
            )))
        })
    }

    fn create_bind_group_layout(
        &mut self,
        desc: &Descriptor<GpuResource>,
    ) -> Result<GpuResource, DeviceError> {
        let entries = array(desc, "entries")
            .iter()
            .map(|entry| {
                Ok(wgpu::BindGroupLayoutEntry {
                    binding: u32_or(entry, "binding", 0)?,
                    visibility: wgpu::ShaderStages::from_bits_truncate(u32_or(
                        entry,
                        "visibility",
                        0,
                    )?),
                    ty: convert::binding_type(entry)?,
                    count: None,
                })
            })
            .collect::<Result<Vec<_>, DeviceError>>()?;
        self.scoped("createBindGroupLayout", |device, _| {
            Ok(GpuResource::BindGroupLayout(device.create_bind_group_layout(
                &wgpu::BindGroupLayoutDescriptor {
                    label: label(desc),
                    entries: &entries,
                },
            )))
        })
    }

    fn pipeline_bind_group_layout(
        &mut self,
        pipeline: &GpuResource,
        index: u32,
    ) -> Result<GpuResource, DeviceError> {
        self.scoped("getBindGroupLayout", |_, _| {
            let layout = match pipeline {
                GpuResource::RenderPipeline(p) => p.get_bind_group_layout(index),
                GpuResource::ComputePipeline(p) => p.get_bind_group_layout(index),
                other => {
                    return Err(DeviceError::new(format!(
                        "getBindGroupLayout on a {}",
                        other.kind_name()
                    )));
                }
            };
            Ok(GpuResource::BindGroupLayout(layout))
        })
    }

    fn create_pipeline_layout(
        &mut self,
        desc: &Descriptor<GpuResource>,
    ) -> Result<GpuResource, DeviceError> {
        let layouts = array(desc, "bindGroupLayouts")
            .iter()
            .map(|layout| {
                layout
                    .as_resource()
                    .ok_or_else(|| DeviceError::new("bind group layouts must be references"))?
                    .bind_group_layout()
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.scoped("createPipelineLayout", |device, _| {
            Ok(GpuResource::PipelineLayout(device.create_pipeline_layout(
                &wgpu::PipelineLayoutDescriptor {
                    label: label(desc),
                    bind_group_layouts: &layouts,
                    push_constant_ranges: &[],
                },
            )))
        })
    }

    fn create_render_pipeline(
        &mut self,
        desc: &Descriptor<GpuResource>,
    ) -> Result<GpuResource, DeviceError> {
        let vertex = desc
            .field("vertex")
            .ok_or_else(|| DeviceError::new("render pipeline needs a `vertex` stage"))?;
        let vertex_buffers = VertexBuffers::parse(vertex)?;
        let buffers = vertex_buffers.layouts();

        let fragment = desc.field("fragment");
        let targets = match fragment {
            Some(fragment) => array(fragment, "targets")
                .iter()
                .map(|target| {
                    if target.is_null() {
                        Ok(None)
                    } else {
                        convert::color_target(target).map(Some)
                    }
                })
                .collect::<Result<Vec<_>, DeviceError>>()?,
            None => Vec::new(),
        };
        let fragment_state = match fragment {
            Some(fragment) => Some(wgpu::FragmentState {
                module: resource(fragment, "module")?.shader_module()?,
                entry_point: string(fragment, "entryPoint"),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            None => None,
        };

        let descriptor = wgpu::RenderPipelineDescriptor {
            label: label(desc),
            layout: pipeline_layout(desc)?,
            vertex: wgpu::VertexState {
                module: resource(vertex, "module")?.shader_module()?,
                entry_point: string(vertex, "entryPoint"),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            primitive: convert::primitive(desc.field("primitive"))?,
            depth_stencil: desc
                .field("depthStencil")
                .map(convert::depth_stencil)
                .transpose()?,
            multisample: convert::multisample(desc.field("multisample"))?,
            fragment: fragment_state,
            multiview: None,
            cache: None,
        };
        self.scoped("createRenderPipeline", |device, _| {
            Ok(GpuResource::RenderPipeline(
                device.create_render_pipeline(&descriptor),
            ))
        })
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &Descriptor<GpuResource>,
    ) -> Result<GpuResource, DeviceError> {
        let compute = desc
            .field("compute")
            .ok_or_else(|| DeviceError::new("compute pipeline needs a `compute` stage"))?;
        let descriptor = wgpu::ComputePipelineDescriptor {
            label: label(desc),
            layout: pipeline_layout(desc)?,
            module: resource(compute, "module")?.shader_module()?,
            entry_point: string(compute, "entryPoint"),
            compilation_options: Default::default(),
            cache: None,
        };
        self.scoped("createComputePipeline", |device, _| {
            Ok(GpuResource::ComputePipeline(
                device.create_compute_pipeline(&descriptor),
            ))
        })
    }

    fn create_bind_group(
        &mut self,
        desc: &Descriptor<GpuResource>,
    ) -> Result<GpuResource, DeviceError> {
        let layout = resource(desc, "layout")?.bind_group_layout()?;
        let entries = array(desc, "entries")
            .iter()
            .map(|entry| {
                let binding = u32_or(entry, "binding", 0)?;
                let bound = entry
                    .field("resource")
                    .ok_or_else(|| DeviceError::new("bind group entry needs a `resource`"))?;
                let resource = match bound {
                    Resolved::Resource(GpuResource::Sampler(sampler)) => {
                        wgpu::BindingResource::Sampler(sampler)
                    }
                    Resolved::Resource(GpuResource::TextureView(view)) => {
                        wgpu::BindingResource::TextureView(view)
                    }
                    Resolved::Resource(GpuResource::Buffer(buffer)) => {
                        wgpu::BindingResource::Buffer(buffer.as_entire_buffer_binding())
                    }
                    Resolved::Object(_) => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: resource(bound, "buffer")?.buffer()?,
                        offset: u64_or(bound, "offset", 0)?,
                        size: opt_u64(bound, "size").and_then(wgpu::BufferSize::new),
                    }),
                    _ => {
                        return Err(DeviceError::new(format!(
                            "binding {binding} has an unsupported resource"
                        )));
                    }
                };
                Ok(wgpu::BindGroupEntry { binding, resource })
            })
            .collect::<Result<Vec<_>, DeviceError>>()?;
        self.scoped("createBindGroup", |device, _| {
            Ok(GpuResource::BindGroup(device.create_bind_group(
                &wgpu::BindGroupDescriptor {
                    label: label(desc),
                    layout,
                    entries: &entries,
                },
            )))
        })
    }

    fn create_query_set(
        &mut self,
        desc: &Descriptor<GpuResource>,
    ) -> Result<GpuResource, DeviceError> {
        let descriptor = wgpu::QuerySetDescriptor {
            label: label(desc),
            ty: convert::query_type(string(desc, "type"))?,
            count: u32_or(desc, "count", 0)?,
        };
        self.scoped("createQuerySet", |device, _| {
            Ok(GpuResource::QuerySet(device.create_query_set(&descriptor)))
        })
    }

    fn begin_encoder(
        &mut self,
        desc: &Descriptor<GpuResource>,
    ) -> Result<wgpu::CommandEncoder, DeviceError> {
        Ok(self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: label(desc) }))
    }

    fn begin_render_pass(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        desc: &Descriptor<GpuResource>,
    ) -> Result<wgpu::RenderPass<'static>, DeviceError> {
        let color_attachments = array(desc, "colorAttachments")
            .iter()
            .map(|attachment| {
                if attachment.is_null() {
                    return Ok(None);
                }
                let clear = attachment
                    .field("clearValue")
                    .map(color)
                    .unwrap_or(wgpu::Color::TRANSPARENT);
                Ok(Some(wgpu::RenderPassColorAttachment {
                    view: resource(attachment, "view")?.texture_view()?,
                    depth_slice: attachment.field("depthSlice").and_then(Resolved::as_u32),
                    resolve_target: match attachment.field("resolveTarget") {
                        Some(target) => Some(
                            target
                                .as_resource()
                                .ok_or_else(|| DeviceError::new("`resolveTarget` must be a view"))?
                                .texture_view()?,
                        ),
                        None => None,
                    },
                    ops: wgpu::Operations {
                        load: convert::load_op(string(attachment, "loadOp"), clear)?,
                        store: convert::store_op(string(attachment, "storeOp"))?,
                    },
                }))
            })
            .collect::<Result<Vec<_>, DeviceError>>()?;

        let depth_stencil_attachment = match desc.field("depthStencilAttachment") {
            Some(attachment) => {
                let depth_ops = match string(attachment, "depthLoadOp") {
                    _ if bool_or(attachment, "depthReadOnly", false) => None,
                    None if string(attachment, "depthStoreOp").is_none() => None,
                    load => Some(wgpu::Operations {
                        load: convert::load_op(
                            load,
                            convert::f32_or(attachment, "depthClearValue", 0.0),
                        )?,
                        store: convert::store_op(string(attachment, "depthStoreOp"))?,
                    }),
                };
                let stencil_ops = match string(attachment, "stencilLoadOp") {
                    _ if bool_or(attachment, "stencilReadOnly", false) => None,
                    None if string(attachment, "stencilStoreOp").is_none() => None,
                    load => Some(wgpu::Operations {
                        load: convert::load_op(load, u32_or(attachment, "stencilClearValue", 0)?)?,
                        store: convert::store_op(string(attachment, "stencilStoreOp"))?,
                    }),
                };
                Some(wgpu::RenderPassDepthStencilAttachment {
                    view: resource(attachment, "view")?.texture_view()?,
                    depth_ops,
                    stencil_ops,
                })
            }
            None => None,
        };

        let occlusion_query_set = match desc.field("occlusionQuerySet") {
            Some(set) => Some(
                set.as_resource()
                    .ok_or_else(|| DeviceError::new("`occlusionQuerySet` must be a query set"))?
                    .query_set()?,
            ),
            None => None,
        };

        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: label(desc),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set,
        });
        Ok(pass.forget_lifetime())
    }

    fn begin_compute_pass(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        desc: &Descriptor<GpuResource>,
    ) -> Result<wgpu::ComputePass<'static>, DeviceError> {
        let pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: label(desc),
            timestamp_writes: None,
        });
        Ok(pass.forget_lifetime())
    }

    fn render_command(
        &mut self,
        pass: &mut wgpu::RenderPass<'static>,
        call: RenderCall<GpuResource>,
    ) -> Result<(), DeviceError> {
        match call {
            RenderCall::SetPipeline(pipeline) => pass.set_pipeline(pipeline.render_pipeline()?),
            RenderCall::SetBindGroup {
                index,
                bind_group,
                offsets,
            } => {
                let group = bind_group.as_ref().map(GpuResource::bind_group).transpose()?;
                pass.set_bind_group(index, group, &offsets);
            }
            RenderCall::SetVertexBuffer {
                slot,
                buffer,
                offset,
                size,
            } => {
                // wgpu has no way to unbind a slot
                if let Some(buffer) = buffer {
                    pass.set_vertex_buffer(slot, buffer_slice(buffer.buffer()?, offset, size));
                }
            }
            RenderCall::SetIndexBuffer {
                buffer,
                format,
                offset,
                size,
            } => pass.set_index_buffer(
                buffer_slice(buffer.buffer()?, offset, size),
                index_format(format),
            ),
            RenderCall::Draw {
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            } => pass.draw(
                first_vertex..first_vertex + vertex_count,
                first_instance..first_instance + instance_count,
            ),
            RenderCall::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                base_vertex,
                first_instance,
            } => pass.draw_indexed(
                first_index..first_index + index_count,
                base_vertex,
                first_instance..first_instance + instance_count,
            ),
            RenderCall::DrawIndirect { buffer, offset } => {
                pass.draw_indirect(buffer.buffer()?, offset)
            }
            RenderCall::DrawIndexedIndirect { buffer, offset } => {
                pass.draw_indexed_indirect(buffer.buffer()?, offset)
            }
            RenderCall::SetViewport {
                x,
                y,
                width,
                height,
                min_depth,
                max_depth,
            } => pass.set_viewport(x, y, width, height, min_depth, max_depth),
            RenderCall::SetScissorRect {
                x,
                y,
                width,
                height,
            } => pass.set_scissor_rect(x, y, width, height),
            RenderCall::SetBlendConstant([r, g, b, a]) => {
                pass.set_blend_constant(wgpu::Color { r, g, b, a })
            }
            RenderCall::SetStencilReference(reference) => pass.set_stencil_reference(reference),
            RenderCall::PushDebugGroup(group) => pass.push_debug_group(&group),
            RenderCall::PopDebugGroup => pass.pop_debug_group(),
            RenderCall::InsertDebugMarker(marker) => pass.insert_debug_marker(&marker),
        }
        Ok(())
    }

    fn compute_command(
        &mut self,
        pass: &mut wgpu::ComputePass<'static>,
        call: ComputeCall<GpuResource>,
    ) -> Result<(), DeviceError> {
        match call {
            ComputeCall::SetPipeline(pipeline) => pass.set_pipeline(pipeline.compute_pipeline()?),
            ComputeCall::SetBindGroup {
                index,
                bind_group,
                offsets,
            } => {
                let group = bind_group.as_ref().map(GpuResource::bind_group).transpose()?;
                pass.set_bind_group(index, group, &offsets);
            }
            ComputeCall::Dispatch { x, y, z } => pass.dispatch_workgroups(x, y, z),
            ComputeCall::DispatchIndirect { buffer, offset } => {
                pass.dispatch_workgroups_indirect(buffer.buffer()?, offset)
            }
            ComputeCall::PushDebugGroup(group) => pass.push_debug_group(&group),
            ComputeCall::PopDebugGroup => pass.pop_debug_group(),
            ComputeCall::InsertDebugMarker(marker) => pass.insert_debug_marker(&marker),
        }
        Ok(())
    }

    fn end_render_pass(
        &mut self,
        _encoder: &mut wgpu::CommandEncoder,
        pass: wgpu::RenderPass<'static>,
    ) -> Result<(), DeviceError> {
        drop(pass);
        Ok(())
    }

    fn end_compute_pass(
        &mut self,
        _encoder: &mut wgpu::CommandEncoder,
        pass: wgpu::ComputePass<'static>,
    ) -> Result<(), DeviceError> {
        drop(pass);
        Ok(())
    }

    fn encoder_command(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        call: EncoderCall<GpuResource>,
    ) -> Result<(), DeviceError> {
        match call {
            EncoderCall::CopyBufferToBuffer {
                source,
                source_offset,
                destination,
                destination_offset,
                size,
            } => encoder.copy_buffer_to_buffer(
                source.buffer()?,
                source_offset,
                destination.buffer()?,
                destination_offset,
                size,
            ),
            EncoderCall::CopyBufferToTexture {
                source,
                destination,
                size,
            } => encoder.copy_buffer_to_texture(
                texel_copy_buffer(&source)?,
                texel_copy_texture(&destination)?,
                extent(&size)?,
            ),
            EncoderCall::CopyTextureToBuffer {
                source,
                destination,
                size,
            } => encoder.copy_texture_to_buffer(
                texel_copy_texture(&source)?,
                texel_copy_buffer(&destination)?,
                extent(&size)?,
            ),
            EncoderCall::CopyTextureToTexture {
                source,
                destination,
                size,
            } => encoder.copy_texture_to_texture(
                texel_copy_texture(&source)?,
                texel_copy_texture(&destination)?,
                extent(&size)?,
            ),
            EncoderCall::ClearBuffer {
                buffer,
                offset,
                size,
            } => encoder.clear_buffer(buffer.buffer()?, offset, size),
            EncoderCall::ResolveQuerySet {
                query_set,
                first_query,
                query_count,
                destination,
                destination_offset,
            } => encoder.resolve_query_set(
                query_set.query_set()?,
                first_query..first_query + query_count,
                destination.buffer()?,
                destination_offset,
            ),
            EncoderCall::PushDebugGroup(group) => encoder.push_debug_group(&group),
            EncoderCall::PopDebugGroup => encoder.pop_debug_group(),
            EncoderCall::InsertDebugMarker(marker) => encoder.insert_debug_marker(&marker),
        }
        Ok(())
    }

    fn finish_encoder(
        &mut self,
        encoder: wgpu::CommandEncoder,
        _desc: &Descriptor<GpuResource>,
    ) -> Result<wgpu::CommandBuffer, DeviceError> {
        self.scoped("finish", |_, _| Ok(encoder.finish()))
    }

    fn queue_write(&mut self, call: QueueCall<GpuResource>) -> Result<(), DeviceError> {
        self.scoped("queue write", |_, queue| {
            match call {
                QueueCall::WriteBuffer {
                    buffer,
                    offset,
                    data,
                } => queue.write_buffer(buffer.buffer()?, offset, &data),
                QueueCall::WriteTexture {
                    destination,
                    data,
                    layout,
                    size,
                } => queue.write_texture(
                    texel_copy_texture(&destination)?,
                    &data,
                    texel_layout(&layout)?,
                    extent(&size)?,
                ),
            }
            Ok(())
        })
    }

    fn submit(&mut self, command_buffers: Vec<wgpu::CommandBuffer>) -> Result<(), DeviceError> {
        self.scoped("submit", |_, queue| {
            queue.submit(command_buffers);
            Ok(())
        })
    }
}
