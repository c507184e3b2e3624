//! Error types for logtally
//!
//! Every error is fatal to the distributed run: nothing here is retried or
//! recovered locally. The binary wraps these in `anyhow` for context.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type
#[derive(Error, Debug)]
pub enum TallyError {
    /// Worker count was zero (or otherwise unusable)
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// Encoded partial result is malformed, has a duplicate key,
    /// or carries a value that is not a non-negative integer
    #[error("Corrupt payload: {0}")]
    CorruptPayload(String),

    /// Peer disconnected, short read/write, oversized frame or
    /// a message arriving out of protocol order
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// A log file could not be listed or read
    #[error("Failed to read '{}': {source}", path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for TallyError {
    /// Socket errors surface as transport failures; file errors are
    /// built explicitly with their path.
    fn from(err: std::io::Error) -> Self {
        TallyError::TransportFailure(err.to_string())
    }
}

impl TallyError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TallyError::IoFailure {
            path: path.into(),
            source,
        }
    }
}

/// Result type used throughout logtally
pub type Result<T> = std::result::Result<T, TallyError>;
