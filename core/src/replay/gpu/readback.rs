//! Texture read-back for replayed frames.

use std::str::FromStr;

use tracing::debug;

use super::{GpuResource, WgpuDevice};
use crate::inspect::pixels::{PixelError, TextureFormat, decode_readback, padded_bytes_per_row};
use crate::replay::error::DeviceError;
use crate::replay::pool::TextureViewInfo;

#[derive(Debug, thiserror::Error)]
pub enum ReadbackError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Pixels(#[from] PixelError),
    #[error("buffer map failed: {0}")]
    Map(String),
}

impl WgpuDevice {
    /// Copies mip 0 of the texture behind `view` to the CPU and converts it
    /// to RGBA8.
    pub fn read_texture_rgba(
        &self,
        view: &TextureViewInfo<GpuResource>,
    ) -> Result<Vec<u8>, ReadbackError> {
        let format = TextureFormat::from_str(&view.format)?;
        let texture = view.texture.texture()?;
        let (width, height) = (view.width, view.height);
        let bytes_per_pixel = format.bytes_per_pixel();
        let padded_bytes_per_row = padded_bytes_per_row(width, bytes_per_pixel);
        let aspect = if format.is_depth() {
            wgpu::TextureAspect::DepthOnly
        } else {
            wgpu::TextureAspect::All
        };

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("framescope readback"),
            size: u64::from(padded_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("framescope readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.scoped("readback copy", |_, queue| {
            queue.submit(std::iter::once(encoder.finish()));
            Ok(())
        })?;

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| ReadbackError::Map(e.to_string()))?;
        rx.recv()
            .map_err(|e| ReadbackError::Map(e.to_string()))?
            .map_err(|e| ReadbackError::Map(e.to_string()))?;

        let pixels = {
            let data = slice.get_mapped_range();
            decode_readback(format, &data, width, height)?
        };
        staging.unmap();

        debug!(view = %view.view_id, width, height, format = %format, "texture read back");
        Ok(pixels)
    }
}
