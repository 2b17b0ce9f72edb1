//! CLI command implementations

pub mod backends;
pub mod decon;
pub mod info;

use anyhow::{Context, Result};
use lsdecon_core::Volume;
use std::path::Path;

/// Load a TIFF stack from path
pub fn load_volume(path: &Path) -> Result<Volume> {
    lsdecon_io::read(path).with_context(|| format!("Failed to load: {}", path.display()))
}
