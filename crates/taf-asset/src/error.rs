//! Error types for TAF container operations.

use thiserror::Error;

/// Errors that can occur when building, saving or loading TAF assets.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] taf_common::Error),

    /// Header or directory failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Directory, payload map and chunk count disagree at save time.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// CRC32 mismatch between stored and recomputed checksum.
    #[error("checksum mismatch for chunk {name:?}: expected {expected:#010x}, got {actual:#010x}")]
    Checksum {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// Short read or seek failure while loading.
    #[error("read error: {0}")]
    Read(String),

    /// Write failure or offset drift while saving.
    #[error("write error: {0}")]
    Write(String),

    /// No chunk with the requested tag or name exists.
    #[error("chunk not found: {0}")]
    NotFound(String),
}

/// Result type for TAF container operations.
pub type Result<T> = std::result::Result<T, Error>;
