//! Error types for Breath Flux

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Insufficient signal length: need at least {required} samples, got {actual}")]
    InsufficientSignalLength { required: usize, actual: usize },

    #[error("Degenerate signal: {0}")]
    DegenerateSignal(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Length mismatch: expected {expected} samples, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl ComputeError {
    /// Shorthand for a length check failure
    pub(crate) fn too_short(required: usize, actual: usize) -> Self {
        ComputeError::InsufficientSignalLength { required, actual }
    }

    /// Stable machine-readable code for reports and the CLI
    pub fn code(&self) -> &'static str {
        match self {
            ComputeError::MalformedRecord(_) => "MALFORMED_RECORD",
            ComputeError::JsonError(_) => "JSON_ERROR",
            ComputeError::InsufficientSignalLength { .. } => "INSUFFICIENT_SIGNAL_LENGTH",
            ComputeError::DegenerateSignal(_) => "DEGENERATE_SIGNAL",
            ComputeError::EmptyInput(_) => "EMPTY_INPUT",
            ComputeError::InvalidParameter(_) => "INVALID_PARAMETER",
            ComputeError::LengthMismatch { .. } => "LENGTH_MISMATCH",
            ComputeError::EncodingError(_) => "ENCODING_ERROR",
        }
    }
}
