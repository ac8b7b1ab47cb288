//! Streaming access to TAF files.
//!
//! This crate serves large assets without loading them whole:
//!
//! - [`StreamingLoader`] - keeps the file open, validates the header and
//!   directory once, and reads individual chunks on demand through an
//!   access-counted cache bounded at 50 MiB
//! - [`StreamingHandle`] - reference-counted sharing with a process-wide
//!   weak-reference registry for diagnostics
//! - [`ChunkedWriter`] - two-pass writer that buffers payloads and lays
//!   out the file at finalize
//!
//! # Example
//!
//! ```no_run
//! use taf_stream::StreamingHandle;
//!
//! let handle = StreamingHandle::create("music.taf")?;
//! let metadata = handle.load_metadata()?;
//! let first = handle.load_audio_chunk(0)?;
//! println!("cache: {:?}", handle.cache_stats());
//! # Ok::<(), taf_stream::Error>(())
//! ```

mod error;
mod handle;
mod loader;
mod writer;

pub use error::{Error, Result};
pub use handle::{active_handle_count, active_loaders, StreamingHandle};
pub use loader::{CacheStats, StreamingLoader, CACHE_LIMIT_BYTES};
pub use writer::ChunkedWriter;
