//! Recording device for tests and offline validation.
//!
//! [`TraceDevice`] creates numbered stand-in objects and logs every call it
//! receives. It checks what a real device would reject cheaply: object kinds
//! at each argument position, buffer bounds on writes, and pass lifetimes.

use framescope_shared::ResourceKind;
use hashbrown::{HashMap, HashSet};

use super::calls::{ComputeCall, EncoderCall, QueueCall, RenderCall};
use super::device::{Descriptor, MAX_BUFFER_SIZE, ReplayDevice, buffer_storage};
use super::error::DeviceError;

/// Stand-in for a created resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceObject(pub u32);

#[derive(Debug)]
pub struct TraceEncoder(u32);

#[derive(Debug)]
pub struct TracePass(u32);

#[derive(Debug)]
pub struct TraceCommandBuffer(u32);

impl TraceCommandBuffer {
    /// Finish-order serial, as listed in [`TraceEvent::Submit`].
    pub fn serial(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Create {
        object: TraceObject,
        kind: ResourceKind,
        descriptor: Descriptor<TraceObject>,
    },
    Upload {
        object: TraceObject,
        bytes: Vec<u8>,
    },
    BeginEncoder {
        encoder: u32,
    },
    BeginRenderPass {
        encoder: u32,
        pass: u32,
    },
    BeginComputePass {
        encoder: u32,
        pass: u32,
    },
    Render {
        pass: u32,
        call: RenderCall<TraceObject>,
    },
    Compute {
        pass: u32,
        call: ComputeCall<TraceObject>,
    },
    EndPass {
        pass: u32,
    },
    Encoder {
        encoder: u32,
        call: EncoderCall<TraceObject>,
    },
    Finish {
        encoder: u32,
        command_buffer: u32,
    },
    Queue(QueueCall<TraceObject>),
    Submit {
        command_buffers: Vec<u32>,
    },
}

#[derive(Debug, Default)]
pub struct TraceDevice {
    events: Vec<TraceEvent>,
    kinds: Vec<ResourceKind>,
    buffers: HashMap<TraceObject, Vec<u8>>,
    open_passes: HashSet<u32>,
    next_encoder: u32,
    next_pass: u32,
    next_command_buffer: u32,
}

impl TraceDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn kind_of(&self, object: TraceObject) -> Option<ResourceKind> {
        self.kinds.get(object.0 as usize).copied()
    }

    /// Number of objects created of `kind`.
    pub fn created(&self, kind: ResourceKind) -> usize {
        self.kinds.iter().filter(|k| **k == kind).count()
    }

    /// Current contents of a buffer, after uploads and queue writes.
    pub fn buffer_contents(&self, buffer: TraceObject) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn render_calls(&self) -> impl Iterator<Item = &RenderCall<TraceObject>> {
        self.events.iter().filter_map(|event| match event {
            TraceEvent::Render { call, .. } => Some(call),
            _ => None,
        })
    }

    /// Command buffer serials of every submit, in order.
    pub fn submissions(&self) -> Vec<&[u32]> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Submit { command_buffers } => Some(command_buffers.as_slice()),
                _ => None,
            })
            .collect()
    }

    fn create(
        &mut self,
        kind: ResourceKind,
        descriptor: &Descriptor<TraceObject>,
    ) -> Result<TraceObject, DeviceError> {
        let object = TraceObject(self.kinds.len() as u32);
        self.kinds.push(kind);
        self.events.push(TraceEvent::Create {
            object,
            kind,
            descriptor: descriptor.clone(),
        });
        Ok(object)
    }

    fn expect_kind(
        &self,
        object: &TraceObject,
        accepted: &[ResourceKind],
        role: &str,
    ) -> Result<(), DeviceError> {
        match self.kind_of(*object) {
            Some(kind) if accepted.contains(&kind) => Ok(()),
            Some(kind) => Err(DeviceError::new(format!(
                "{role} expects {accepted:?}, got {kind} object {}",
                object.0
            ))),
            None => Err(DeviceError::new(format!("{role}: unknown object {}", object.0))),
        }
    }

    fn expect_buffer(&self, object: &TraceObject, role: &str) -> Result<(), DeviceError> {
        self.expect_kind(object, &[ResourceKind::Buffer], role)
    }

    fn expect_open(&self, pass: &TracePass) -> Result<(), DeviceError> {
        if self.open_passes.contains(&pass.0) {
            Ok(())
        } else {
            Err(DeviceError::new(format!("pass {} is not open", pass.0)))
        }
    }

    fn expect_bind_group(&self, bind_group: &Option<TraceObject>) -> Result<(), DeviceError> {
        match bind_group {
            Some(group) => self.expect_kind(group, &[ResourceKind::BindGroup], "setBindGroup"),
            None => Ok(()),
        }
    }
}

impl ReplayDevice for TraceDevice {
    type Resource = TraceObject;
    type Encoder = TraceEncoder;
    type RenderPass = TracePass;
    type ComputePass = TracePass;
    type CommandBuffer = TraceCommandBuffer;

    fn create_buffer(
        &mut self,
        descriptor: &Descriptor<TraceObject>,
        contents: Option<&[u8]>,
    ) -> Result<TraceObject, DeviceError> {
        let size = descriptor
            .field("size")
            .and_then(|size| size.as_u64())
            .ok_or_else(|| DeviceError::new("buffer descriptor needs a numeric `size`"))?;
        let memory = buffer_storage(size, MAX_BUFFER_SIZE, contents.unwrap_or_default())?;
        let object = self.create(ResourceKind::Buffer, descriptor)?;

        if let Some(bytes) = contents {
            self.events.push(TraceEvent::Upload {
                object,
                bytes: bytes.to_vec(),
            });
        }
        self.buffers.insert(object, memory);
        Ok(object)
    }

    fn create_texture(
        &mut self,
        descriptor: &Descriptor<TraceObject>,
    ) -> Result<TraceObject, DeviceError> {
        self.create(ResourceKind::Texture, descriptor)
    }

    fn create_texture_view(
        &mut self,
        texture: &TraceObject,
        descriptor: &Descriptor<TraceObject>,
    ) -> Result<TraceObject, DeviceError> {
        self.expect_kind(texture, &[ResourceKind::Texture], "createView")?;
        self.create(ResourceKind::TextureView, descriptor)
    }

    fn create_sampler(
        &mut self,
        descriptor: &Descriptor<TraceObject>,
    ) -> Result<TraceObject, DeviceError> {
        self.create(ResourceKind::Sampler, descriptor)
    }

    fn create_shader_module(
        &mut self,
        descriptor: &Descriptor<TraceObject>,
    ) -> Result<TraceObject, DeviceError> {
        if descriptor.field("code").and_then(|code| code.as_str()).is_none() {
            return Err(DeviceError::new("shader module needs `code`"));
        }
        self.create(ResourceKind::ShaderModule, descriptor)
    }

    fn create_bind_group_layout(
        &mut self,
        descriptor: &Descriptor<TraceObject>,
    ) -> Result<TraceObject, DeviceError> {
        self.create(ResourceKind::BindGroupLayout, descriptor)
    }

    fn pipeline_bind_group_layout(
        &mut self,
        pipeline: &TraceObject,
        index: u32,
    ) -> Result<TraceObject, DeviceError> {
        self.expect_kind(
            pipeline,
            &[ResourceKind::RenderPipeline, ResourceKind::ComputePipeline],
            "getBindGroupLayout",
        )?;
        let descriptor = Descriptor::Object(
            [
                ("pipeline".to_owned(), Descriptor::Resource(*pipeline)),
                ("index".to_owned(), Descriptor::from(u64::from(index))),
            ]
            .into_iter()
            .collect(),
        );
        self.create(ResourceKind::BindGroupLayout, &descriptor)
    }

    fn create_pipeline_layout(
        &mut self,
        descriptor: &Descriptor<TraceObject>,
    ) -> Result<TraceObject, DeviceError> {
        self.create(ResourceKind::PipelineLayout, descriptor)
    }

    fn create_render_pipeline(
        &mut self,
        descriptor: &Descriptor<TraceObject>,
    ) -> Result<TraceObject, DeviceError> {
        self.create(ResourceKind::RenderPipeline, descriptor)
    }

    fn create_compute_pipeline(
        &mut self,
        descriptor: &Descriptor<TraceObject>,
    ) -> Result<TraceObject, DeviceError> {
        self.create(ResourceKind::ComputePipeline, descriptor)
    }

    fn create_bind_group(
        &mut self,
        descriptor: &Descriptor<TraceObject>,
    ) -> Result<TraceObject, DeviceError> {
        if let Some(layout) = descriptor.field("layout").and_then(|l| l.as_resource()) {
            self.expect_kind(layout, &[ResourceKind::BindGroupLayout], "bind group layout")?;
        }
        self.create(ResourceKind::BindGroup, descriptor)
    }

    fn create_query_set(
        &mut self,
        descriptor: &Descriptor<TraceObject>,
    ) -> Result<TraceObject, DeviceError> {
        self.create(ResourceKind::QuerySet, descriptor)
    }

    fn begin_encoder(
        &mut self,
        _descriptor: &Descriptor<TraceObject>,
    ) -> Result<TraceEncoder, DeviceError> {
        let encoder = self.next_encoder;
        self.next_encoder += 1;
        self.events.push(TraceEvent::BeginEncoder { encoder });
        Ok(TraceEncoder(encoder))
    }

    fn begin_render_pass(
        &mut self,
        encoder: &mut TraceEncoder,
        descriptor: &Descriptor<TraceObject>,
    ) -> Result<TracePass, DeviceError> {
        let attachments = descriptor
            .field("colorAttachments")
            .and_then(|a| a.as_array())
            .unwrap_or_default();
        for attachment in attachments {
            if let Some(view) = attachment.field("view").and_then(|v| v.as_resource()) {
                self.expect_kind(view, &[ResourceKind::TextureView], "color attachment")?;
            }
        }

        let pass = self.next_pass;
        self.next_pass += 1;
        self.open_passes.insert(pass);
        self.events.push(TraceEvent::BeginRenderPass {
            encoder: encoder.0,
            pass,
        });
        Ok(TracePass(pass))
    }

    fn begin_compute_pass(
        &mut self,
        encoder: &mut TraceEncoder,
        _descriptor: &Descriptor<TraceObject>,
    ) -> Result<TracePass, DeviceError> {
        let pass = self.next_pass;
        self.next_pass += 1;
        self.open_passes.insert(pass);
        self.events.push(TraceEvent::BeginComputePass {
            encoder: encoder.0,
            pass,
        });
        Ok(TracePass(pass))
    }

    fn render_command(
        &mut self,
        pass: &mut TracePass,
        call: RenderCall<TraceObject>,
    ) -> Result<(), DeviceError> {
        self.expect_open(pass)?;
        match &call {
            RenderCall::SetPipeline(pipeline) => {
                self.expect_kind(pipeline, &[ResourceKind::RenderPipeline], "setPipeline")?
            }
            RenderCall::SetBindGroup { bind_group, .. } => self.expect_bind_group(bind_group)?,
            RenderCall::SetVertexBuffer {
                buffer: Some(buffer),
                ..
            } => self.expect_buffer(buffer, "setVertexBuffer")?,
            RenderCall::SetIndexBuffer { buffer, .. } => {
                self.expect_buffer(buffer, "setIndexBuffer")?
            }
            RenderCall::DrawIndirect { buffer, .. }
            | RenderCall::DrawIndexedIndirect { buffer, .. } => {
                self.expect_buffer(buffer, "indirect draw")?
            }
            _ => {}
        }
        self.events.push(TraceEvent::Render { pass: pass.0, call });
        Ok(())
    }

    fn compute_command(
        &mut self,
        pass: &mut TracePass,
        call: ComputeCall<TraceObject>,
    ) -> Result<(), DeviceError> {
        self.expect_open(pass)?;
        match &call {
            ComputeCall::SetPipeline(pipeline) => {
                self.expect_kind(pipeline, &[ResourceKind::ComputePipeline], "setPipeline")?
            }
            ComputeCall::SetBindGroup { bind_group, .. } => self.expect_bind_group(bind_group)?,
            ComputeCall::DispatchIndirect { buffer, .. } => {
                self.expect_buffer(buffer, "indirect dispatch")?
            }
            _ => {}
        }
        self.events.push(TraceEvent::Compute { pass: pass.0, call });
        Ok(())
    }

    fn end_render_pass(
        &mut self,
        _encoder: &mut TraceEncoder,
        pass: TracePass,
    ) -> Result<(), DeviceError> {
        self.expect_open(&pass)?;
        self.open_passes.remove(&pass.0);
        self.events.push(TraceEvent::EndPass { pass: pass.0 });
        Ok(())
    }

    fn end_compute_pass(
        &mut self,
        encoder: &mut TraceEncoder,
        pass: TracePass,
    ) -> Result<(), DeviceError> {
        self.end_render_pass(encoder, pass)
    }

    fn encoder_command(
        &mut self,
        encoder: &mut TraceEncoder,
        call: EncoderCall<TraceObject>,
    ) -> Result<(), DeviceError> {
        match &call {
            EncoderCall::CopyBufferToBuffer {
                source,
                destination,
                ..
            } => {
                self.expect_buffer(source, "copy source")?;
                self.expect_buffer(destination, "copy destination")?;
            }
            EncoderCall::ClearBuffer { buffer, .. } => self.expect_buffer(buffer, "clearBuffer")?,
            EncoderCall::ResolveQuerySet {
                query_set,
                destination,
                ..
            } => {
                self.expect_kind(query_set, &[ResourceKind::QuerySet], "resolveQuerySet")?;
                self.expect_buffer(destination, "resolve destination")?;
            }
            _ => {}
        }
        self.events.push(TraceEvent::Encoder {
            encoder: encoder.0,
            call,
        });
        Ok(())
    }

    fn finish_encoder(
        &mut self,
        encoder: TraceEncoder,
        _descriptor: &Descriptor<TraceObject>,
    ) -> Result<TraceCommandBuffer, DeviceError> {
        let command_buffer = self.next_command_buffer;
        self.next_command_buffer += 1;
        self.events.push(TraceEvent::Finish {
            encoder: encoder.0,
            command_buffer,
        });
        Ok(TraceCommandBuffer(command_buffer))
    }

    fn queue_write(&mut self, call: QueueCall<TraceObject>) -> Result<(), DeviceError> {
        if let QueueCall::WriteBuffer {
            buffer,
            offset,
            data,
        } = &call
        {
            self.expect_buffer(buffer, "writeBuffer")?;
            let memory = self
                .buffers
                .get_mut(buffer)
                .ok_or_else(|| DeviceError::new("writeBuffer target has no storage"))?;
            let start = *offset as usize;
            let target = memory
                .get_mut(start..start + data.len())
                .ok_or_else(|| DeviceError::new("writeBuffer out of bounds"))?;
            target.copy_from_slice(data);
        }
        self.events.push(TraceEvent::Queue(call));
        Ok(())
    }

    fn submit(&mut self, command_buffers: Vec<TraceCommandBuffer>) -> Result<(), DeviceError> {
        self.events.push(TraceEvent::Submit {
            command_buffers: command_buffers.iter().map(|cb| cb.0).collect(),
        });
        Ok(())
    }
}
