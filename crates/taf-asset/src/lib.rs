//! TAF chunked asset container.
//!
//! TAF files package heterogeneous game subsystems (geometry, materials,
//! embedded SPIR-V shaders, audio node graphs, SDF fonts) as tagged,
//! CRC-verified chunks behind a fixed header and directory.
//!
//! # File format
//!
//! - 360-byte header: magic `TAF!`, semantic version, asset type, 64-bit
//!   feature flags, chunk count, total size, quantized world bounds,
//!   creator and description strings
//! - 76-byte directory entries: FourCC tag, offset, size, CRC32, name
//! - payloads at monotonically increasing offsets, one per tag
//!
//! All multi-byte integers are little-endian; structures are packed with
//! no implicit padding.
//!
//! # Example
//!
//! ```no_run
//! use taf_asset::{Asset, ChunkType, FeatureFlags};
//!
//! let mut asset = Asset::new();
//! asset.set_creator("example");
//! asset.set_feature_flags(FeatureFlags::HASH_BASED_NAMES);
//! asset.add_chunk(ChunkType::Geometry, vec![0u8; 128], "geometry");
//! asset.save_to_file("example.taf")?;
//!
//! let loaded = taf_asset::Asset::load_from_file_safe("example.taf")?;
//! assert!(loaded.has_chunk(ChunkType::Geometry));
//! # Ok::<(), taf_asset::Error>(())
//! ```

mod asset;
mod directory;
mod error;
mod header;

pub mod chunks;

pub use asset::Asset;
pub use directory::{ChunkDirectoryEntry, DIRECTORY_ENTRY_SIZE};
pub use error::{Error, Result};
pub use header::{
    AssetHeader, ChunkType, FeatureFlags, Vec3Q, HEADER_SIZE, SPIRV_MAGIC, TAF_MAGIC,
};

// Re-export the schema modules' primary types at the crate root.
pub use chunks::audio::{
    AudioChunk, AudioConnection, AudioHeader, AudioNode, AudioParameter, NodeType, StreamFormat,
    StreamingAudio, WaveTable,
};
pub use chunks::font::{FontChunk, FontGlyph, FontHeader, KerningPair};
pub use chunks::geometry::{
    GeometryChunk, GeometryHeader, PrimitiveType, RenderMode, VertexFormat, GEOMETRY_HEADER_SIZE,
};
pub use chunks::material::{Material, MaterialFlags};
pub use chunks::shader::{ShaderDescriptor, ShaderEntry, ShaderStage};
