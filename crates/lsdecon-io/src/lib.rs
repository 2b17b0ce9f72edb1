//! # lsdecon-io
//!
//! Volume I/O for light-sheet deconvolution.
//!
//! - [`tiff`] - Multi-page grayscale TIFF stacks to and from [`Volume`]s,
//!   plus single-plane tables such as the rotationally averaged OTF
//! - [`discover`] - Batch input selection by file name pattern
//! - [`paths`] - Output paths derived from input paths
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lsdecon_io::{discover, paths, tiff};
//!
//! for input in discover::matching_files("/data/cell1", "ch0")? {
//!     let volume = tiff::read(&input)?;
//!     tiff::write(paths::output_path(&input, paths::DECON_SUBDIR, "_decon")?, &volume)?;
//! }
//! ```
//!
//! Sample values are kept in raw detector units; nothing is normalized on
//! read or write.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
pub mod discover;
pub mod paths;
pub mod tiff;

pub use error::{IoError, IoResult};

use lsdecon_core::Volume;
use std::path::Path;

/// Reads a volume from a TIFF stack.
///
/// Shorthand for [`tiff::read`].
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<Volume> {
    tiff::read(path)
}

/// Writes a volume as a 32-bit float TIFF stack.
///
/// Shorthand for [`tiff::write`].
pub fn write<P: AsRef<Path>>(path: P, volume: &Volume) -> IoResult<()> {
    tiff::write(path, volume)
}
