//! Error types for audio graph construction.

use thiserror::Error;

/// Errors that can occur while assembling an audio graph.
#[derive(Debug, Error)]
pub enum Error {
    /// A connection or parameter references a node id that does not exist.
    #[error("unknown node id {0}")]
    UnknownNode(u32),

    /// A connection names a port index outside the node's port count.
    #[error("node {node} has no {kind} port {port} (count {count})")]
    InvalidPort {
        node: u32,
        kind: &'static str,
        port: u32,
        count: u32,
    },

    /// Wavetable or streaming data is inconsistent with its declaration.
    #[error("invalid audio data: {0}")]
    InvalidData(String),
}

/// Result type for audio graph construction.
pub type Result<T> = std::result::Result<T, Error>;
