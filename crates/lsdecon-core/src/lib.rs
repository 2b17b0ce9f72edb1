//! # lsdecon-core
//!
//! Core types for light-sheet volume deconvolution.
//!
//! This crate provides the foundational types used throughout the lsdecon workspace:
//!
//! - [`Volume`] - Owned 3-D `f32` sample grid (X fastest, then Y, then Z)
//! - [`Extents`] - X/Y/Z sizes of a volume or spectrum
//! - [`Error`] - Error type shared by buffer operations
//!
//! ## Crate Structure
//!
//! This crate has no internal dependencies. All other lsdecon crates depend on it:
//!
//! ```text
//! lsdecon-core (this crate)
//!    ^
//!    |
//!    +-- lsdecon-io (TIFF volumes, OTF tables, file discovery)
//!    +-- lsdecon-ops (FFT, OTF interpolation, Wiener filter, geometry)
//!    +-- lsdecon-compute (restoration backends, batch orchestration)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod volume;

// Re-exports for convenience
pub use error::*;
pub use volume::*;

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use lsdecon_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::volume::{Extents, Volume, VolumeStats};
}
