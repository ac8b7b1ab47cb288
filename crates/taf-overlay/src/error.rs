//! Error types for overlay parsing and application.

use thiserror::Error;

/// Errors that can occur when working with TAFO overlays.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] taf_common::Error),

    /// Container error while reading or rewriting target chunks.
    #[error("{0}")]
    Asset(#[from] taf_asset::Error),

    /// Overlay header or layout failed validation, or the target asset
    /// lacks required feature flags.
    #[error("validation error: {0}")]
    Validation(String),

    /// An operation targets a nonexistent index, has insufficient data,
    /// or would overrun a payload.
    #[error("operation error: {0}")]
    Operation(String),

    /// Write failure while saving.
    #[error("write error: {0}")]
    Write(String),
}

/// Result type for overlay operations.
pub type Result<T> = std::result::Result<T, Error>;
