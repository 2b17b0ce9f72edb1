//! Error types for lsdecon-core operations.
//!
//! The [`Error`] enum covers failures of volume buffer handling:
//! - Construction from raw sample buffers
//! - Extent validation
//! - Extent agreement between volumes of one batch
//!
//! # Usage
//!
//! ```rust
//! use lsdecon_core::{Error, Extents, Result};
//!
//! fn check(expected: Extents, actual: Extents) -> Result<()> {
//!     if expected != actual {
//!         return Err(Error::extent_mismatch(expected, actual));
//!     }
//!     Ok(())
//! }
//! ```

use crate::Extents;
use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or manipulating volumes.
#[derive(Debug, Error)]
pub enum Error {
    /// Extents are zero along some axis or overflow `usize`.
    #[error("invalid extents {extents}: {reason}")]
    InvalidExtents {
        /// Offending extents
        extents: Extents,
        /// Reason why they are invalid
        reason: String,
    },

    /// Sample buffer length does not match the requested extents.
    #[error("buffer holds {actual} samples, extents {extents} need {expected}")]
    BufferSize {
        /// Extents the buffer was meant for
        extents: Extents,
        /// Required sample count
        expected: usize,
        /// Provided sample count
        actual: usize,
    },

    /// Two volumes that must agree in size do not.
    ///
    /// Returned when a later file of a batch differs from the first one.
    #[error("extent mismatch: expected {expected}, got {actual}")]
    ExtentMismatch {
        /// Extents the operation was set up for
        expected: Extents,
        /// Extents that were supplied
        actual: Extents,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates an [`Error::InvalidExtents`] error.
    #[inline]
    pub fn invalid_extents(extents: Extents, reason: impl Into<String>) -> Self {
        Self::InvalidExtents {
            extents,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::ExtentMismatch`] error.
    #[inline]
    pub fn extent_mismatch(expected: Extents, actual: Extents) -> Self {
        Self::ExtentMismatch { expected, actual }
    }

    /// Creates an [`Error::Other`] error.
    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns `true` if this error reports disagreeing extents.
    #[inline]
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::ExtentMismatch { .. })
    }
}
