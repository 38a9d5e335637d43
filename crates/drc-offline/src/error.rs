//! Error types for offline rendering

use drc_core::DrcError;
use thiserror::Error;

/// Offline rendering errors
#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Failed to read audio file: {0}")]
    ReadError(String),

    #[error("Failed to write output file: {0}")]
    WriteError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("DSP error: {0}")]
    Dsp(#[from] DrcError),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for offline operations
pub type OfflineResult<T> = Result<T, OfflineError>;
