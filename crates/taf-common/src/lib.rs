//! Common utilities for the TAF asset toolkit.
//!
//! This crate provides foundational types used across all TAF crates:
//!
//! - [`BinaryReader`] / [`BinaryWriter`] - Little-endian binary I/O over byte buffers
//! - [`NameHash`] and [`fnv1a_hash`] - 64-bit FNV-1a name hashing
//! - [`registry`] - Optional hash-to-string registry for diagnostics
//! - [`crc`] - CRC32 (ISO-HDLC) checksum utilities

mod error;
mod reader;
mod writer;

pub mod crc;
pub mod hash;
pub mod registry;

pub use error::{Error, Result};
pub use hash::{fnv1a_hash, NameHash};
pub use reader::BinaryReader;
pub use writer::BinaryWriter;
