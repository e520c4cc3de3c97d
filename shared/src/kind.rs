//! Resource kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a captured resource. Decides how replay rebuilds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Buffer,
    Texture,
    /// Texture handed out by the presentation surface; replayed offscreen.
    SurfaceTexture,
    /// Descriptor is `{ "texture": Ref, "descriptor": ... }`.
    TextureView,
    Sampler,
    ShaderModule,
    BindGroupLayout,
    /// Layout fetched from a pipeline built with `layout: "auto"`.
    /// Descriptor is `{ "pipeline": Ref, "index": n }`.
    PipelineBindGroupLayout,
    PipelineLayout,
    RenderPipeline,
    ComputePipeline,
    BindGroup,
    QuerySet,
    /// Produced by `finish`; never rebuilt from a descriptor.
    CommandBuffer,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 14] = [
        ResourceKind::Buffer,
        ResourceKind::Texture,
        ResourceKind::SurfaceTexture,
        ResourceKind::TextureView,
        ResourceKind::Sampler,
        ResourceKind::ShaderModule,
        ResourceKind::BindGroupLayout,
        ResourceKind::PipelineBindGroupLayout,
        ResourceKind::PipelineLayout,
        ResourceKind::RenderPipeline,
        ResourceKind::ComputePipeline,
        ResourceKind::BindGroup,
        ResourceKind::QuerySet,
        ResourceKind::CommandBuffer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Buffer => "buffer",
            ResourceKind::Texture => "texture",
            ResourceKind::SurfaceTexture => "surfaceTexture",
            ResourceKind::TextureView => "textureView",
            ResourceKind::Sampler => "sampler",
            ResourceKind::ShaderModule => "shaderModule",
            ResourceKind::BindGroupLayout => "bindGroupLayout",
            ResourceKind::PipelineBindGroupLayout => "pipelineBindGroupLayout",
            ResourceKind::PipelineLayout => "pipelineLayout",
            ResourceKind::RenderPipeline => "renderPipeline",
            ResourceKind::ComputePipeline => "computePipeline",
            ResourceKind::BindGroup => "bindGroup",
            ResourceKind::QuerySet => "querySet",
            ResourceKind::CommandBuffer => "commandBuffer",
        }
    }

    /// Whether the replay side can rebuild this kind from its record alone.
    pub fn is_reconstructible(self) -> bool {
        self != ResourceKind::CommandBuffer
    }

    pub fn is_texture(self) -> bool {
        matches!(self, ResourceKind::Texture | ResourceKind::SurfaceTexture)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_match_display() {
        for kind in ResourceKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            let back: ResourceKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(serde_json::from_str::<ResourceKind>("\"swapChain\"").is_err());
    }

    #[test]
    fn test_only_command_buffers_are_not_reconstructible() {
        let rejected: Vec<_> = ResourceKind::ALL
            .into_iter()
            .filter(|kind| !kind.is_reconstructible())
            .collect();
        assert_eq!(rejected, vec![ResourceKind::CommandBuffer]);
    }
}
