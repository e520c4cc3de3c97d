//! Typed device calls decoded from recorded arguments.
//!
//! Recorded commands carry positional argument lists exactly as the API
//! received them. Decoding applies the API defaults for trailing optional
//! arguments so devices only ever see complete calls.

use framescope_shared::{EncoderOp, PassOp, QueueOp};

use super::error::ReplayError;
use super::resolved::Resolved;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

/// Render pass commands, `end` excluded.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall<R> {
    SetPipeline(R),
    SetBindGroup {
        index: u32,
        bind_group: Option<R>,
        offsets: Vec<u32>,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: Option<R>,
        offset: u64,
        size: Option<u64>,
    },
    SetIndexBuffer {
        buffer: R,
        format: IndexFormat,
        offset: u64,
        size: Option<u64>,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    },
    DrawIndirect {
        buffer: R,
        offset: u64,
    },
    DrawIndexedIndirect {
        buffer: R,
        offset: u64,
    },
    SetViewport {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    },
    SetScissorRect {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    SetBlendConstant([f64; 4]),
    SetStencilReference(u32),
    PushDebugGroup(String),
    PopDebugGroup,
    InsertDebugMarker(String),
}

/// Compute pass commands, `end` excluded.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputeCall<R> {
    SetPipeline(R),
    SetBindGroup {
        index: u32,
        bind_group: Option<R>,
        offsets: Vec<u32>,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    DispatchIndirect {
        buffer: R,
        offset: u64,
    },
    PushDebugGroup(String),
    PopDebugGroup,
    InsertDebugMarker(String),
}

/// Encoder commands outside passes, `finish` excluded.
///
/// Texture copies keep their copy-info documents since their shape is
/// backend specific.
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderCall<R> {
    CopyBufferToBuffer {
        source: R,
        source_offset: u64,
        destination: R,
        destination_offset: u64,
        size: Option<u64>,
    },
    CopyBufferToTexture {
        source: Resolved<R>,
        destination: Resolved<R>,
        size: Resolved<R>,
    },
    CopyTextureToBuffer {
        source: Resolved<R>,
        destination: Resolved<R>,
        size: Resolved<R>,
    },
    CopyTextureToTexture {
        source: Resolved<R>,
        destination: Resolved<R>,
        size: Resolved<R>,
    },
    ClearBuffer {
        buffer: R,
        offset: u64,
        size: Option<u64>,
    },
    ResolveQuerySet {
        query_set: R,
        first_query: u32,
        query_count: u32,
        destination: R,
        destination_offset: u64,
    },
    PushDebugGroup(String),
    PopDebugGroup,
    InsertDebugMarker(String),
}

/// Queue writes. `submit` is handled by the replayer itself.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueCall<R> {
    WriteBuffer {
        buffer: R,
        offset: u64,
        data: Vec<u8>,
    },
    WriteTexture {
        destination: Resolved<R>,
        data: Vec<u8>,
        layout: Resolved<R>,
        size: Resolved<R>,
    },
}

/// Positional argument reader for one command.
struct Args<'a, R> {
    opcode: &'static str,
    values: &'a [Resolved<R>],
}

impl<'a, R: Clone> Args<'a, R> {
    fn new(opcode: &'static str, values: &'a [Resolved<R>]) -> Self {
        Self { opcode, values }
    }

    fn error(&self, reason: impl Into<String>) -> ReplayError {
        ReplayError::invalid_argument(self.opcode, reason)
    }

    /// Missing trailing arguments and explicit nulls both count as absent.
    fn present(&self, index: usize) -> Option<&'a Resolved<R>> {
        self.values.get(index).filter(|value| !value.is_null())
    }

    fn value(&self, index: usize) -> Resolved<R> {
        self.present(index).cloned().unwrap_or(Resolved::Null)
    }

    fn opt_u64(&self, index: usize, name: &str) -> Result<Option<u64>, ReplayError> {
        self.present(index)
            .map(|value| {
                value
                    .as_u64()
                    .ok_or_else(|| self.error(format!("`{name}` must be an unsigned integer")))
            })
            .transpose()
    }

    fn u64_or(&self, index: usize, name: &str, default: u64) -> Result<u64, ReplayError> {
        Ok(self.opt_u64(index, name)?.unwrap_or(default))
    }

    fn u64(&self, index: usize, name: &str) -> Result<u64, ReplayError> {
        self.opt_u64(index, name)?
            .ok_or_else(|| self.error(format!("missing `{name}`")))
    }

    fn u32_or(&self, index: usize, name: &str, default: u32) -> Result<u32, ReplayError> {
        match self.opt_u64(index, name)? {
            Some(n) => u32::try_from(n).map_err(|_| self.error(format!("`{name}` exceeds u32"))),
            None => Ok(default),
        }
    }

    fn u32(&self, index: usize, name: &str) -> Result<u32, ReplayError> {
        let n = self.u64(index, name)?;
        u32::try_from(n).map_err(|_| self.error(format!("`{name}` exceeds u32")))
    }

    fn i32_or(&self, index: usize, name: &str, default: i32) -> Result<i32, ReplayError> {
        match self.present(index) {
            Some(value) => value
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| self.error(format!("`{name}` must be a 32-bit integer"))),
            None => Ok(default),
        }
    }

    fn f32(&self, index: usize, name: &str) -> Result<f32, ReplayError> {
        self.present(index)
            .and_then(Resolved::as_f64)
            .map(|f| f as f32)
            .ok_or_else(|| self.error(format!("`{name}` must be a number")))
    }

    fn resource(&self, index: usize, name: &str) -> Result<R, ReplayError> {
        self.opt_resource(index, name)?
            .ok_or_else(|| self.error(format!("missing `{name}`")))
    }

    fn opt_resource(&self, index: usize, name: &str) -> Result<Option<R>, ReplayError> {
        self.present(index)
            .map(|value| {
                value
                    .as_resource()
                    .cloned()
                    .ok_or_else(|| self.error(format!("`{name}` must be a resource reference")))
            })
            .transpose()
    }

    fn string(&self, index: usize, name: &str) -> Result<String, ReplayError> {
        self.present(index)
            .and_then(Resolved::as_str)
            .map(str::to_owned)
            .ok_or_else(|| self.error(format!("`{name}` must be a string")))
    }

    fn bytes(&self, index: usize, name: &str) -> Result<&'a [u8], ReplayError> {
        self.present(index)
            .and_then(Resolved::as_bytes)
            .ok_or_else(|| self.error(format!("`{name}` must be a byte payload")))
    }

    /// Dynamic offsets: either a plain array, or `(data, start, length)`
    /// with `data` as little-endian u32 bytes.
    fn offsets(&self, index: usize) -> Result<Vec<u32>, ReplayError> {
        match self.present(index) {
            None => Ok(Vec::new()),
            Some(Resolved::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_u32()
                        .ok_or_else(|| self.error("dynamic offsets must be u32"))
                })
                .collect(),
            Some(Resolved::Bytes(bytes)) => {
                let words: Vec<u32> = bytes
                    .chunks_exact(4)
                    .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .collect();
                let start = self.u64_or(index + 1, "dynamicOffsetsDataStart", 0)? as usize;
                let length =
                    self.u64_or(index + 2, "dynamicOffsetsDataLength", words.len() as u64)? as usize;
                words
                    .get(start..start.saturating_add(length))
                    .map(<[u32]>::to_vec)
                    .ok_or_else(|| self.error("dynamic offset range out of bounds"))
            }
            Some(_) => Err(self.error("dynamic offsets must be an array")),
        }
    }
}

fn index_format<R: Clone>(args: &Args<'_, R>, index: usize) -> Result<IndexFormat, ReplayError> {
    match args.present(index).and_then(Resolved::as_str) {
        Some("uint16") => Ok(IndexFormat::Uint16),
        Some("uint32") => Ok(IndexFormat::Uint32),
        other => Err(args.error(format!("unknown index format {other:?}"))),
    }
}

/// `GPUColor` is either `[r, g, b, a]` or `{ r, g, b, a }`.
fn color<R: Clone>(args: &Args<'_, R>, index: usize) -> Result<[f64; 4], ReplayError> {
    let value = args
        .present(index)
        .ok_or_else(|| args.error("missing `color`"))?;
    let channel = |i: usize, key: &str| -> Option<f64> {
        match value {
            Resolved::Array(items) => items.get(i).and_then(Resolved::as_f64),
            Resolved::Object(_) => value.get(key).and_then(Resolved::as_f64),
            _ => None,
        }
    };
    match (channel(0, "r"), channel(1, "g"), channel(2, "b"), channel(3, "a")) {
        (Some(r), Some(g), Some(b), Some(a)) => Ok([r, g, b, a]),
        _ => Err(args.error("`color` needs four numeric channels")),
    }
}

pub fn decode_render<R: Clone>(
    opcode: PassOp,
    values: &[Resolved<R>],
) -> Result<RenderCall<R>, ReplayError> {
    let args = Args::new(opcode.as_str(), values);
    Ok(match opcode {
        PassOp::SetPipeline => RenderCall::SetPipeline(args.resource(0, "pipeline")?),
        PassOp::SetBindGroup => RenderCall::SetBindGroup {
            index: args.u32(0, "index")?,
            bind_group: args.opt_resource(1, "bindGroup")?,
            offsets: args.offsets(2)?,
        },
        PassOp::SetVertexBuffer => RenderCall::SetVertexBuffer {
            slot: args.u32(0, "slot")?,
            buffer: args.opt_resource(1, "buffer")?,
            offset: args.u64_or(2, "offset", 0)?,
            size: args.opt_u64(3, "size")?,
        },
        PassOp::SetIndexBuffer => RenderCall::SetIndexBuffer {
            buffer: args.resource(0, "buffer")?,
            format: index_format(&args, 1)?,
            offset: args.u64_or(2, "offset", 0)?,
            size: args.opt_u64(3, "size")?,
        },
        PassOp::Draw => RenderCall::Draw {
            vertex_count: args.u32(0, "vertexCount")?,
            instance_count: args.u32_or(1, "instanceCount", 1)?,
            first_vertex: args.u32_or(2, "firstVertex", 0)?,
            first_instance: args.u32_or(3, "firstInstance", 0)?,
        },
        PassOp::DrawIndexed => RenderCall::DrawIndexed {
            index_count: args.u32(0, "indexCount")?,
            instance_count: args.u32_or(1, "instanceCount", 1)?,
            first_index: args.u32_or(2, "firstIndex", 0)?,
            base_vertex: args.i32_or(3, "baseVertex", 0)?,
            first_instance: args.u32_or(4, "firstInstance", 0)?,
        },
        PassOp::DrawIndirect => RenderCall::DrawIndirect {
            buffer: args.resource(0, "indirectBuffer")?,
            offset: args.u64(1, "indirectOffset")?,
        },
        PassOp::DrawIndexedIndirect => RenderCall::DrawIndexedIndirect {
            buffer: args.resource(0, "indirectBuffer")?,
            offset: args.u64(1, "indirectOffset")?,
        },
        PassOp::SetViewport => RenderCall::SetViewport {
            x: args.f32(0, "x")?,
            y: args.f32(1, "y")?,
            width: args.f32(2, "width")?,
            height: args.f32(3, "height")?,
            min_depth: args.f32(4, "minDepth")?,
            max_depth: args.f32(5, "maxDepth")?,
        },
        PassOp::SetScissorRect => RenderCall::SetScissorRect {
            x: args.u32(0, "x")?,
            y: args.u32(1, "y")?,
            width: args.u32(2, "width")?,
            height: args.u32(3, "height")?,
        },
        PassOp::SetBlendConstant => RenderCall::SetBlendConstant(color(&args, 0)?),
        PassOp::SetStencilReference => {
            RenderCall::SetStencilReference(args.u32(0, "reference")?)
        }
        PassOp::PushDebugGroup => RenderCall::PushDebugGroup(args.string(0, "groupLabel")?),
        PassOp::PopDebugGroup => RenderCall::PopDebugGroup,
        PassOp::InsertDebugMarker => RenderCall::InsertDebugMarker(args.string(0, "markerLabel")?),
        PassOp::DispatchWorkgroups | PassOp::DispatchWorkgroupsIndirect | PassOp::End => {
            return Err(args.error("not a render pass command"));
        }
    })
}

pub fn decode_compute<R: Clone>(
    opcode: PassOp,
    values: &[Resolved<R>],
) -> Result<ComputeCall<R>, ReplayError> {
    let args = Args::new(opcode.as_str(), values);
    Ok(match opcode {
        PassOp::SetPipeline => ComputeCall::SetPipeline(args.resource(0, "pipeline")?),
        PassOp::SetBindGroup => ComputeCall::SetBindGroup {
            index: args.u32(0, "index")?,
            bind_group: args.opt_resource(1, "bindGroup")?,
            offsets: args.offsets(2)?,
        },
        PassOp::DispatchWorkgroups => ComputeCall::Dispatch {
            x: args.u32(0, "workgroupCountX")?,
            y: args.u32_or(1, "workgroupCountY", 1)?,
            z: args.u32_or(2, "workgroupCountZ", 1)?,
        },
        PassOp::DispatchWorkgroupsIndirect => ComputeCall::DispatchIndirect {
            buffer: args.resource(0, "indirectBuffer")?,
            offset: args.u64(1, "indirectOffset")?,
        },
        PassOp::PushDebugGroup => ComputeCall::PushDebugGroup(args.string(0, "groupLabel")?),
        PassOp::PopDebugGroup => ComputeCall::PopDebugGroup,
        PassOp::InsertDebugMarker => {
            ComputeCall::InsertDebugMarker(args.string(0, "markerLabel")?)
        }
        _ => return Err(args.error("not a compute pass command")),
    })
}

pub fn decode_encoder<R: Clone>(
    opcode: EncoderOp,
    values: &[Resolved<R>],
) -> Result<EncoderCall<R>, ReplayError> {
    let args = Args::new(opcode.as_str(), values);
    Ok(match opcode {
        // (source, sourceOffset, destination, destinationOffset, size) or
        // the short form (source, destination, size?)
        EncoderOp::CopyBufferToBuffer => {
            if args.present(1).is_some_and(|v| v.as_resource().is_some()) {
                EncoderCall::CopyBufferToBuffer {
                    source: args.resource(0, "source")?,
                    source_offset: 0,
                    destination: args.resource(1, "destination")?,
                    destination_offset: 0,
                    size: args.opt_u64(2, "size")?,
                }
            } else {
                EncoderCall::CopyBufferToBuffer {
                    source: args.resource(0, "source")?,
                    source_offset: args.u64(1, "sourceOffset")?,
                    destination: args.resource(2, "destination")?,
                    destination_offset: args.u64(3, "destinationOffset")?,
                    size: args.opt_u64(4, "size")?,
                }
            }
        }
        EncoderOp::CopyBufferToTexture => EncoderCall::CopyBufferToTexture {
            source: args.value(0),
            destination: args.value(1),
            size: args.value(2),
        },
        EncoderOp::CopyTextureToBuffer => EncoderCall::CopyTextureToBuffer {
            source: args.value(0),
            destination: args.value(1),
            size: args.value(2),
        },
        EncoderOp::CopyTextureToTexture => EncoderCall::CopyTextureToTexture {
            source: args.value(0),
            destination: args.value(1),
            size: args.value(2),
        },
        EncoderOp::ClearBuffer => EncoderCall::ClearBuffer {
            buffer: args.resource(0, "buffer")?,
            offset: args.u64_or(1, "offset", 0)?,
            size: args.opt_u64(2, "size")?,
        },
        EncoderOp::ResolveQuerySet => EncoderCall::ResolveQuerySet {
            query_set: args.resource(0, "querySet")?,
            first_query: args.u32(1, "firstQuery")?,
            query_count: args.u32(2, "queryCount")?,
            destination: args.resource(3, "destination")?,
            destination_offset: args.u64(4, "destinationOffset")?,
        },
        EncoderOp::PushDebugGroup => EncoderCall::PushDebugGroup(args.string(0, "groupLabel")?),
        EncoderOp::PopDebugGroup => EncoderCall::PopDebugGroup,
        EncoderOp::InsertDebugMarker => {
            EncoderCall::InsertDebugMarker(args.string(0, "markerLabel")?)
        }
        EncoderOp::Finish => return Err(args.error("finish is not a plain encoder command")),
    })
}

pub fn decode_queue<R: Clone>(
    opcode: QueueOp,
    values: &[Resolved<R>],
) -> Result<QueueCall<R>, ReplayError> {
    let args = Args::new(opcode.as_str(), values);
    Ok(match opcode {
        // (buffer, bufferOffset, data, dataOffset = 0, size = rest), in bytes
        QueueOp::WriteBuffer => {
            let data = args.bytes(2, "data")?;
            let start = args.u64_or(3, "dataOffset", 0)? as usize;
            let available = data
                .len()
                .checked_sub(start)
                .ok_or_else(|| args.error("`dataOffset` is past the end of `data`"))?;
            let size = args.u64_or(4, "size", available as u64)? as usize;
            let slice = data
                .get(start..start.saturating_add(size))
                .ok_or_else(|| args.error("`size` runs past the end of `data`"))?;
            QueueCall::WriteBuffer {
                buffer: args.resource(0, "buffer")?,
                offset: args.u64_or(1, "bufferOffset", 0)?,
                data: slice.to_vec(),
            }
        }
        QueueOp::WriteTexture => QueueCall::WriteTexture {
            destination: args.value(0),
            data: args.bytes(1, "data")?.to_vec(),
            layout: args.value(2),
            size: args.value(3),
        },
        QueueOp::Submit => return Err(args.error("submit is not a queue write")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: u64) -> Resolved<u32> {
        Resolved::Number(v.into())
    }

    #[test]
    fn test_draw_defaults() {
        let call = decode_render(PassOp::Draw, &[n(3)]).unwrap();
        assert_eq!(
            call,
            RenderCall::Draw {
                vertex_count: 3,
                instance_count: 1,
                first_vertex: 0,
                first_instance: 0
            }
        );
    }

    #[test]
    fn test_draw_requires_vertex_count() {
        let err = decode_render::<u32>(PassOp::Draw, &[]).unwrap_err();
        assert!(matches!(err, ReplayError::InvalidArgument { ref opcode, .. } if opcode == "draw"));
    }

    #[test]
    fn test_set_vertex_buffer() {
        let call =
            decode_render(PassOp::SetVertexBuffer, &[n(0), Resolved::Resource(7), n(16)]).unwrap();
        assert_eq!(
            call,
            RenderCall::SetVertexBuffer {
                slot: 0,
                buffer: Some(7),
                offset: 16,
                size: None
            }
        );
    }

    #[test]
    fn test_dispatch_in_render_decoder_is_rejected() {
        assert!(decode_render::<u32>(PassOp::DispatchWorkgroups, &[n(1)]).is_err());
        assert_eq!(
            decode_compute::<u32>(PassOp::DispatchWorkgroups, &[n(4)]).unwrap(),
            ComputeCall::Dispatch { x: 4, y: 1, z: 1 }
        );
    }

    #[test]
    fn test_blend_constant_accepts_both_color_forms() {
        let array = Resolved::Array(vec![n(1), n(0), n(0), n(1)]);
        let object = Resolved::Object(
            [("r", 1), ("g", 0), ("b", 0), ("a", 1)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), n(v)))
                .collect(),
        );
        let expected = RenderCall::SetBlendConstant([1.0, 0.0, 0.0, 1.0]);
        assert_eq!(decode_render(PassOp::SetBlendConstant, &[array]).unwrap(), expected);
        assert_eq!(decode_render(PassOp::SetBlendConstant, &[object]).unwrap(), expected);
    }

    #[test]
    fn test_dynamic_offsets_from_bytes() {
        let data = Resolved::Bytes([256u32, 512, 768].iter().flat_map(|w| w.to_le_bytes()).collect());
        let call = decode_render(
            PassOp::SetBindGroup,
            &[n(1), Resolved::Resource(3), data, n(1), n(2)],
        )
        .unwrap();
        assert_eq!(
            call,
            RenderCall::SetBindGroup {
                index: 1,
                bind_group: Some(3),
                offsets: vec![512, 768]
            }
        );
    }

    #[test]
    fn test_write_buffer_honours_data_offset_and_size() {
        let args = [
            Resolved::Resource(1u32),
            n(8),
            Resolved::Bytes(vec![0, 1, 2, 3, 4, 5]),
            n(2),
            n(3),
        ];
        assert_eq!(
            decode_queue(QueueOp::WriteBuffer, &args).unwrap(),
            QueueCall::WriteBuffer {
                buffer: 1,
                offset: 8,
                data: vec![2, 3, 4]
            }
        );
    }

    #[test]
    fn test_write_buffer_out_of_range() {
        let args = [Resolved::Resource(1u32), n(0), Resolved::Bytes(vec![0; 4]), n(2), n(8)];
        assert!(decode_queue(QueueOp::WriteBuffer, &args).is_err());
    }

    #[test]
    fn test_copy_buffer_to_buffer_short_form() {
        let args = [Resolved::Resource(1u32), Resolved::Resource(2), n(64)];
        assert_eq!(
            decode_encoder(EncoderOp::CopyBufferToBuffer, &args).unwrap(),
            EncoderCall::CopyBufferToBuffer {
                source: 1,
                source_offset: 0,
                destination: 2,
                destination_offset: 0,
                size: Some(64)
            }
        );
    }
}
