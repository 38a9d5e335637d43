//! Error types for the DRC engine

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum DrcError {
    /// Rejected at configuration time, the stream must not start
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Channel mismatch: expected {expected}, got {got}")]
    ChannelMismatch { expected: usize, got: usize },

    #[error("Ragged block: channel {channel} has {got} samples, expected {expected}")]
    RaggedBlock {
        channel: usize,
        expected: usize,
        got: usize,
    },

    #[error("Stream already flushed")]
    StreamFinished,

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type DrcResult<T> = Result<T, DrcError>;

impl DrcError {
    /// Shorthand for configuration errors
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
