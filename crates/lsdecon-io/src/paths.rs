//! Output paths derived from input paths.
//!
//! Results land in a subdirectory next to the input, with a suffix inserted
//! before the extension:
//!
//! ```text
//! /data/cell1/ch0_stack0001.tif
//!   -> /data/cell1/Decon/ch0_stack0001_decon.tif
//!   -> /data/cell1/Deskewed/ch0_stack0001_deskewed.tif
//! ```

use crate::{IoError, IoResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Subdirectory for restored volumes.
pub const DECON_SUBDIR: &str = "Decon";
/// Suffix for restored volumes.
pub const DECON_SUFFIX: &str = "_decon";
/// Subdirectory for deskewed raw volumes.
pub const DESKEWED_SUBDIR: &str = "Deskewed";
/// Suffix for deskewed raw volumes.
pub const DESKEWED_SUFFIX: &str = "_deskewed";

/// Builds `<input dir>/<subdir>/<input stem><suffix>.tif`.
///
/// # Errors
///
/// Returns [`IoError::Parse`] if `input` has no file name.
pub fn output_path(input: &Path, subdir: &str, suffix: &str) -> IoResult<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| IoError::Parse(format!("no file name in {}", input.display())))?;
    let ext = input
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or(crate::discover::STACK_EXTENSION);

    let parent = input.parent().unwrap_or_else(|| Path::new(""));
    Ok(parent.join(subdir).join(format!("{}{}.{}", stem, suffix, ext)))
}

/// Creates the parent directory of `path` if it does not exist yet.
pub fn ensure_parent(path: &Path) -> IoResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path() {
        let input = Path::new("/data/cell1/ch0_stack0001.tif");
        assert_eq!(
            output_path(input, DECON_SUBDIR, DECON_SUFFIX).unwrap(),
            PathBuf::from("/data/cell1/Decon/ch0_stack0001_decon.tif")
        );
        assert_eq!(
            output_path(input, DESKEWED_SUBDIR, DESKEWED_SUFFIX).unwrap(),
            PathBuf::from("/data/cell1/Deskewed/ch0_stack0001_deskewed.tif")
        );
    }

    #[test]
    fn test_output_path_relative() {
        let out = output_path(Path::new("stack.tif"), DECON_SUBDIR, DECON_SUFFIX).unwrap();
        assert_eq!(out, PathBuf::from("Decon/stack_decon.tif"));
    }

    #[test]
    fn test_ensure_parent() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("Decon").join("a_decon.tif");
        ensure_parent(&out).unwrap();
        assert!(dir.path().join("Decon").is_dir());
    }
}
