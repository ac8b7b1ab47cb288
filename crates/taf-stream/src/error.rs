//! Error types for streaming access to TAF files.

use thiserror::Error;

/// Errors that can occur in the streaming loader and chunked writer.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Container error while parsing the header or directory.
    #[error("{0}")]
    Asset(#[from] taf_asset::Error),

    /// Header or directory failed validation at open time.
    #[error("validation error: {0}")]
    Validation(String),

    /// Short read, seek failure, or an operation on a closed file.
    #[error("read error: {0}")]
    Read(String),

    /// Write failure or offset drift during finalize.
    #[error("write error: {0}")]
    Write(String),

    /// No chunk with the requested index or name exists.
    #[error("chunk not found: {0}")]
    NotFound(String),
}

/// Result type for streaming operations.
pub type Result<T> = std::result::Result<T, Error>;
