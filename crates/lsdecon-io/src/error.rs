//! Error types for I/O operations.

use std::io;
use thiserror::Error;

/// I/O operation error.
#[derive(Debug, Error)]
pub enum IoError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Decoding error.
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Encoding error.
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Pages of a stack disagree in size, or a table has the wrong shape.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected size.
        expected: String,
        /// Actual size.
        actual: String,
    },

    /// Unsupported sample type.
    #[error("unsupported sample type: {0}")]
    UnsupportedSampleType(String),

    /// Parse error (file name patterns, paths).
    #[error("parse error: {0}")]
    Parse(String),

    /// Error from the volume buffer layer.
    #[error(transparent)]
    Core(#[from] lsdecon_core::Error),
}

/// Result type for I/O operations.
pub type IoResult<T> = Result<T, IoError>;
