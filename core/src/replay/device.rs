//! Replay target interface.
//!
//! The replay engine never talks to a graphics API directly. It drives an
//! implementation of [`ReplayDevice`]; descriptors arrive with references
//! already resolved to the device's own handles.

use super::calls::{ComputeCall, EncoderCall, QueueCall, RenderCall};
use super::error::DeviceError;
use super::resolved::Resolved;

/// Descriptor document as seen by a device.
pub type Descriptor<R> = Resolved<R>;

/// Default WebGPU `maxBufferSize`, the cap for devices without their own limit.
pub const MAX_BUFFER_SIZE: u64 = 1 << 28;

/// Zeroed storage of `size` bytes with `contents` copied to the front.
///
/// Sizes above `limit`, or too large to allocate, fail with a [`DeviceError`].
pub fn buffer_storage(size: u64, limit: u64, contents: &[u8]) -> Result<Vec<u8>, DeviceError> {
    if size > limit {
        return Err(DeviceError::new(format!(
            "buffer size {size} exceeds the device limit of {limit}"
        )));
    }
    let len = usize::try_from(size)
        .map_err(|_| DeviceError::new(format!("buffer size {size} does not fit in memory")))?;
    let mut memory = Vec::new();
    memory
        .try_reserve_exact(len)
        .map_err(|e| DeviceError::new(format!("cannot allocate {size} bytes: {e}")))?;
    memory.resize(len, 0);
    let copied = contents.len().min(len);
    memory[..copied].copy_from_slice(&contents[..copied]);
    Ok(memory)
}

/// A fresh device that snapshots are replayed against.
///
/// Every creation call returns only once the object is usable, including
/// any initial upload; the pool memoizes the result right after.
pub trait ReplayDevice {
    /// Handle to a created object. Cloned whenever a dependent needs it.
    type Resource: Clone;
    type Encoder;
    type RenderPass;
    type ComputePass;
    type CommandBuffer;

    // === Resource creation ===

    /// `contents` is set for buffers captured with `mappedAtCreation`.
    fn create_buffer(
        &mut self,
        descriptor: &Descriptor<Self::Resource>,
        contents: Option<&[u8]>,
    ) -> Result<Self::Resource, DeviceError>;

    fn create_texture(
        &mut self,
        descriptor: &Descriptor<Self::Resource>,
    ) -> Result<Self::Resource, DeviceError>;

    fn create_texture_view(
        &mut self,
        texture: &Self::Resource,
        descriptor: &Descriptor<Self::Resource>,
    ) -> Result<Self::Resource, DeviceError>;

    fn create_sampler(
        &mut self,
        descriptor: &Descriptor<Self::Resource>,
    ) -> Result<Self::Resource, DeviceError>;

    fn create_shader_module(
        &mut self,
        descriptor: &Descriptor<Self::Resource>,
    ) -> Result<Self::Resource, DeviceError>;

    fn create_bind_group_layout(
        &mut self,
        descriptor: &Descriptor<Self::Resource>,
    ) -> Result<Self::Resource, DeviceError>;

    /// Layout of a pipeline created with `layout: "auto"`.
    fn pipeline_bind_group_layout(
        &mut self,
        pipeline: &Self::Resource,
        index: u32,
    ) -> Result<Self::Resource, DeviceError>;

    fn create_pipeline_layout(
        &mut self,
        descriptor: &Descriptor<Self::Resource>,
    ) -> Result<Self::Resource, DeviceError>;

    fn create_render_pipeline(
        &mut self,
        descriptor: &Descriptor<Self::Resource>,
    ) -> Result<Self::Resource, DeviceError>;

    fn create_compute_pipeline(
        &mut self,
        descriptor: &Descriptor<Self::Resource>,
    ) -> Result<Self::Resource, DeviceError>;

    fn create_bind_group(
        &mut self,
        descriptor: &Descriptor<Self::Resource>,
    ) -> Result<Self::Resource, DeviceError>;

    fn create_query_set(
        &mut self,
        descriptor: &Descriptor<Self::Resource>,
    ) -> Result<Self::Resource, DeviceError>;

    // === Encoding ===

    fn begin_encoder(
        &mut self,
        descriptor: &Descriptor<Self::Resource>,
    ) -> Result<Self::Encoder, DeviceError>;

    fn begin_render_pass(
        &mut self,
        encoder: &mut Self::Encoder,
        descriptor: &Descriptor<Self::Resource>,
    ) -> Result<Self::RenderPass, DeviceError>;

    fn begin_compute_pass(
        &mut self,
        encoder: &mut Self::Encoder,
        descriptor: &Descriptor<Self::Resource>,
    ) -> Result<Self::ComputePass, DeviceError>;

    fn render_command(
        &mut self,
        pass: &mut Self::RenderPass,
        call: RenderCall<Self::Resource>,
    ) -> Result<(), DeviceError>;

    fn compute_command(
        &mut self,
        pass: &mut Self::ComputePass,
        call: ComputeCall<Self::Resource>,
    ) -> Result<(), DeviceError>;

    /// Ends the pass; the encoder it came from is usable again afterwards.
    fn end_render_pass(
        &mut self,
        encoder: &mut Self::Encoder,
        pass: Self::RenderPass,
    ) -> Result<(), DeviceError>;

    fn end_compute_pass(
        &mut self,
        encoder: &mut Self::Encoder,
        pass: Self::ComputePass,
    ) -> Result<(), DeviceError>;

    fn encoder_command(
        &mut self,
        encoder: &mut Self::Encoder,
        call: EncoderCall<Self::Resource>,
    ) -> Result<(), DeviceError>;

    fn finish_encoder(
        &mut self,
        encoder: Self::Encoder,
        descriptor: &Descriptor<Self::Resource>,
    ) -> Result<Self::CommandBuffer, DeviceError>;

    // === Queue ===

    fn queue_write(&mut self, call: QueueCall<Self::Resource>) -> Result<(), DeviceError>;

    fn submit(&mut self, command_buffers: Vec<Self::CommandBuffer>) -> Result<(), DeviceError>;
}
