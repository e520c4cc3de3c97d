//! Offline inspection of snapshots and replayed textures
//!
//! - [`graph`] - resource dependency graph, creation order, DOT output
//! - [`pixels`] - read-back padding removal, format conversion, PNG output

pub mod graph;
pub mod pixels;

pub use graph::{CommandUse, CreationOrder, DependencyGraph};
pub use pixels::{PixelError, TextureFormat, decode_readback, to_rgba8, write_png};
