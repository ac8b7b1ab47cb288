//! TAF - a chunked binary container for self-contained interactive
//! game assets.
//!
//! This crate provides a unified interface to the TAF library ecosystem.
//!
//! # Crates
//!
//! - [`taf_common`] - FNV-1a hashing, name registry, CRC32, binary I/O
//! - [`taf_asset`] - the chunk container and payload schemas
//! - [`taf_overlay`] - TAFO overlays: non-destructive asset mutation
//! - [`taf_audio`] - audio node-graph builder
//! - [`taf_stream`] - streaming loader, shared handles, chunked writer
//!
//! # Example
//!
//! ```no_run
//! use taf::prelude::*;
//!
//! let mut asset = Asset::load_from_file_safe("assets/cube.taf")?;
//! let overlay = Overlay::load_from_file("mods/recolor.tafo")?;
//! if overlay.targets_asset(&asset) {
//!     overlay.apply_to_asset(&mut asset)?;
//!     asset.save_to_file("assets/cube_modified.taf")?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use taf_asset as asset;
pub use taf_audio as audio;
pub use taf_common as common;
pub use taf_overlay as overlay;
pub use taf_stream as stream;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use taf_asset::{Asset, ChunkType, FeatureFlags, Vec3Q};
    pub use taf_audio::{AudioGraphBuilder, NodeType};
    pub use taf_common::{crc, fnv1a_hash, BinaryReader, BinaryWriter, NameHash};
    pub use taf_overlay::{Overlay, VertexRange};
    pub use taf_stream::{ChunkedWriter, StreamingHandle, StreamingLoader};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
