//! Error types for restoration operations.

use thiserror::Error;

/// Error type for restoration operations.
#[derive(Error, Debug)]
pub enum OpsError {
    /// Invalid dimensions specified.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Buffers have incompatible sizes.
    #[error("size mismatch: {0}")]
    SizeMismatch(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A transform plan could not be built for the requested extents.
    #[error("transform plan creation failed: {0}")]
    PlanCreation(String),

    /// A transform failed while executing.
    #[error("transform failed: {0}")]
    Transform(String),

    /// Error from the volume buffer layer.
    #[error(transparent)]
    Core(#[from] lsdecon_core::Error),
}

/// Result type for restoration operations.
pub type OpsResult<T> = Result<T, OpsError>;
