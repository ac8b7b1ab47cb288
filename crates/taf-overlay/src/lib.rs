//! TAFO overlays: non-destructive modification of TAF assets.
//!
//! An overlay file records target assets, a list of typed operations and
//! a shared data blob. Applying an overlay mutates a loaded
//! [`taf_asset::Asset`] in memory: shader replacement by name hash,
//! vertex attribute edits, 4x4 geometry transforms and wholesale chunk
//! replacement. Directory checksums are re-synchronized as chunks are
//! rewritten, so the result is ready for resave.
//!
//! # Example
//!
//! ```no_run
//! use taf_overlay::{Overlay, VertexRange};
//!
//! let mut overlay = Overlay::new();
//! overlay.add_target_asset("assets/cube.taf", "^1.0.0");
//! overlay.add_vertex_color_change(1, 1.0, 0.0, 0.0, 1.0);
//! overlay.add_scale_operation(2.0, 2.0, 2.0, VertexRange::ALL);
//! overlay.save_to_file("recolor.tafo")?;
//!
//! let mut asset = taf_asset::Asset::load_from_file_safe("assets/cube.taf")?;
//! let overlay = Overlay::load_from_file("recolor.tafo")?;
//! overlay.apply_to_asset(&mut asset)?;
//! asset.save_to_file("assets/cube_modified.taf")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod apply;
mod error;
mod overlay;

pub mod format;

pub use apply::ENGINE_MAJOR_VERSION;
pub use error::{Error, Result};
pub use format::{
    AttributeModification, AttributeOp, OperationType, OverlayHeader, OverlayOperation,
    SubsetModification, TargetAsset, TransformationData, ALL_VERTICES, TAFO_MAGIC,
};
pub use overlay::{Overlay, VertexRange};
