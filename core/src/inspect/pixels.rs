//! Texture read-back decoding.
//!
//! GPU copies pad every row to [`ROW_ALIGNMENT`] bytes. The helpers here strip
//! that padding, convert the supported formats to RGBA8 and write PNGs.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use half::f16;

/// Row pitch alignment required for texture-to-buffer copies.
pub const ROW_ALIGNMENT: u32 = 256;

#[derive(Debug, thiserror::Error)]
pub enum PixelError {
    #[error("unsupported texture format `{0}`")]
    UnsupportedFormat(String),
    #[error("expected {expected} bytes of pixel data, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),
    #[error("failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

/// Formats the viewer can turn into RGBA8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Depth32Float,
    Depth24Plus,
    Depth24PlusStencil8,
}

impl TextureFormat {
    pub const ALL: [TextureFormat; 8] = [
        TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Bgra8Unorm,
        TextureFormat::Bgra8UnormSrgb,
        TextureFormat::Rgba16Float,
        TextureFormat::Depth32Float,
        TextureFormat::Depth24Plus,
        TextureFormat::Depth24PlusStencil8,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TextureFormat::Rgba8Unorm => "rgba8unorm",
            TextureFormat::Rgba8UnormSrgb => "rgba8unorm-srgb",
            TextureFormat::Bgra8Unorm => "bgra8unorm",
            TextureFormat::Bgra8UnormSrgb => "bgra8unorm-srgb",
            TextureFormat::Rgba16Float => "rgba16float",
            TextureFormat::Depth32Float => "depth32float",
            TextureFormat::Depth24Plus => "depth24plus",
            TextureFormat::Depth24PlusStencil8 => "depth24plus-stencil8",
        }
    }

    /// Bytes per texel in a read-back buffer. Packed depth-stencil formats
    /// are read as their 4-byte depth aspect.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgba16Float => 8,
            _ => 4,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float
                | TextureFormat::Depth24Plus
                | TextureFormat::Depth24PlusStencil8
        )
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextureFormat {
    type Err = PixelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TextureFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| PixelError::UnsupportedFormat(s.to_owned()))
    }
}

/// Row pitch of a read-back buffer, rounded up to [`ROW_ALIGNMENT`].
pub fn padded_bytes_per_row(width: u32, bytes_per_pixel: u32) -> u32 {
    let unpadded = width * bytes_per_pixel;
    unpadded.div_ceil(ROW_ALIGNMENT) * ROW_ALIGNMENT
}

/// Copies the visible part of each padded row into a tight buffer.
pub fn remove_row_padding(
    data: &[u8],
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
) -> Result<Vec<u8>, PixelError> {
    let padded = padded_bytes_per_row(width, bytes_per_pixel) as usize;
    let row = (width * bytes_per_pixel) as usize;
    let height = height as usize;

    // The last row does not need its padding.
    let expected = match height {
        0 => 0,
        h => padded * (h - 1) + row,
    };
    if data.len() < expected {
        return Err(PixelError::SizeMismatch {
            expected,
            actual: data.len(),
        });
    }

    let mut pixels = Vec::with_capacity(row * height);
    for y in 0..height {
        let start = y * padded;
        pixels.extend_from_slice(&data[start..start + row]);
    }
    Ok(pixels)
}

/// Converts tightly packed texels to RGBA8.
pub fn to_rgba8(
    format: TextureFormat,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, PixelError> {
    let texels = width as usize * height as usize;
    let expected = texels * format.bytes_per_pixel() as usize;
    if data.len() != expected {
        return Err(PixelError::SizeMismatch {
            expected,
            actual: data.len(),
        });
    }

    let pixels = match format {
        TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => data.to_vec(),
        TextureFormat::Bgra8Unorm | TextureFormat::Bgra8UnormSrgb => data
            .chunks_exact(4)
            .flat_map(|bgra| [bgra[2], bgra[1], bgra[0], bgra[3]])
            .collect(),
        TextureFormat::Rgba16Float => bytemuck::pod_collect_to_vec::<u8, f16>(data)
            .into_iter()
            .map(|channel| unorm_to_u8(channel.to_f32()))
            .collect(),
        TextureFormat::Depth32Float => bytemuck::pod_collect_to_vec::<u8, f32>(data)
            .into_iter()
            .flat_map(|depth| gray(unorm_to_u8(depth)))
            .collect(),
        TextureFormat::Depth24Plus | TextureFormat::Depth24PlusStencil8 => data
            .chunks_exact(4)
            .flat_map(|texel| {
                let raw = u32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]]) >> 8;
                gray(depth24_intensity(raw))
            })
            .collect(),
    };
    Ok(pixels)
}

/// Decodes a padded read-back buffer straight to RGBA8.
pub fn decode_readback(
    format: TextureFormat,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, PixelError> {
    let tight = remove_row_padding(data, width, height, format.bytes_per_pixel())?;
    to_rgba8(format, &tight, width, height)
}

fn unorm_to_u8(value: f32) -> u8 {
    // NaN saturates to 0
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// 24-bit depth is spread non-linearly so near geometry stays visible.
fn depth24_intensity(raw: u32) -> u8 {
    let normalized = f64::from(raw) / f64::from(0x00FF_FFFFu32);
    (255.0 * (1.0 - 1.0 / (1.0 + 10.0 * normalized))).round() as u8
}

fn gray(value: u8) -> [u8; 4] {
    [value, value, value, 255]
}

/// Encodes RGBA8 pixels as PNG.
pub fn encode_png<W: Write>(
    writer: W,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> Result<(), PixelError> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(PixelError::SizeMismatch {
            expected,
            actual: rgba.len(),
        });
    }

    let mut encoder = png::Encoder::new(writer, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(rgba)?;
    png_writer.finish()?;
    Ok(())
}

pub fn write_png(path: &Path, width: u32, height: u32, rgba: &[u8]) -> Result<(), PixelError> {
    let file = File::create(path)?;
    encode_png(BufWriter::new(file), width, height, rgba)?;
    tracing::debug!(path = %path.display(), width, height, "wrote PNG");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table() {
        assert_eq!(TextureFormat::Rgba16Float.bytes_per_pixel(), 8);
        assert_eq!(TextureFormat::Depth24PlusStencil8.bytes_per_pixel(), 4);
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(!TextureFormat::Bgra8Unorm.is_depth());
        assert_eq!(
            "bgra8unorm-srgb".parse::<TextureFormat>().unwrap(),
            TextureFormat::Bgra8UnormSrgb
        );
        assert!(matches!(
            "r32float".parse::<TextureFormat>(),
            Err(PixelError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(1, 4), 256);
        assert_eq!(padded_bytes_per_row(64, 4), 256);
        assert_eq!(padded_bytes_per_row(65, 4), 512);
        assert_eq!(padded_bytes_per_row(40, 8), 512);
    }

    #[test]
    fn test_remove_row_padding() {
        // 2x2 rgba8: rows of 8 visible bytes in 256-byte pitch
        let mut data = vec![0u8; 256 + 8];
        data[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data[256..].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);
        let tight = remove_row_padding(&data, 2, 2, 4).unwrap();
        assert_eq!(tight, (1..=16).collect::<Vec<u8>>());
    }

    #[test]
    fn test_remove_row_padding_short_buffer() {
        assert!(matches!(
            remove_row_padding(&[0; 100], 2, 2, 4),
            Err(PixelError::SizeMismatch { expected: 264, actual: 100 })
        ));
    }

    #[test]
    fn test_bgra_swizzle() {
        let rgba = to_rgba8(TextureFormat::Bgra8Unorm, &[10, 20, 30, 40], 1, 1).unwrap();
        assert_eq!(rgba, vec![30, 20, 10, 40]);
    }

    #[test]
    fn test_rgba16float_clamps() {
        let texel: Vec<u8> = [1.0f32, 0.5, -2.0, 4.0]
            .into_iter()
            .flat_map(|v| f16::from_f32(v).to_le_bytes())
            .collect();
        let rgba = to_rgba8(TextureFormat::Rgba16Float, &texel, 1, 1).unwrap();
        assert_eq!(rgba, vec![255, 128, 0, 255]);
    }

    #[test]
    fn test_depth32float_is_gray() {
        let data: Vec<u8> = [0.0f32, 1.0].iter().flat_map(|d| d.to_le_bytes()).collect();
        let rgba = to_rgba8(TextureFormat::Depth32Float, &data, 2, 1).unwrap();
        assert_eq!(rgba, vec![0, 0, 0, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn test_depth24plus_curve() {
        let far = (0x00FF_FFFFu32 << 8).to_le_bytes();
        let near = 0u32.to_le_bytes();
        let data: Vec<u8> = near.iter().chain(far.iter()).copied().collect();
        let rgba = to_rgba8(TextureFormat::Depth24Plus, &data, 2, 1).unwrap();
        // 255 * (1 - 1/11) = 231.8
        assert_eq!(&rgba[..4], &[0, 0, 0, 255]);
        assert_eq!(&rgba[4..], &[232, 232, 232, 255]);
    }

    #[test]
    fn test_size_mismatch() {
        assert!(matches!(
            to_rgba8(TextureFormat::Rgba8Unorm, &[0; 3], 1, 1),
            Err(PixelError::SizeMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_decode_readback() {
        let mut data = vec![0u8; 256 + 4];
        data[..4].copy_from_slice(&[1, 2, 3, 4]);
        data[256..].copy_from_slice(&[5, 6, 7, 8]);
        let rgba = decode_readback(TextureFormat::Bgra8Unorm, &data, 1, 2).unwrap();
        assert_eq!(rgba, vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn test_write_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.png");
        write_png(&path, 2, 1, &[255, 0, 0, 255, 0, 255, 0, 255]).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_encode_png_rejects_wrong_length() {
        let mut out = Vec::new();
        assert!(encode_png(&mut out, 2, 2, &[0; 4]).is_err());
    }
}
