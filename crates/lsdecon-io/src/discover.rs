//! Batch input discovery.
//!
//! A batch is every `.tif` file directly inside one directory whose name
//! contains a user-supplied fragment, processed in sorted path order.

use crate::{IoError, IoResult};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Extension accepted for input stacks.
pub const STACK_EXTENSION: &str = "tif";

/// Lists the files in `dir` whose names contain `pattern` and end in `.tif`.
///
/// The fragment is matched literally; glob metacharacters in it are escaped.
/// Results are sorted so batches run in a stable order.
///
/// # Example
///
/// ```rust,ignore
/// use lsdecon_io::discover::matching_files;
///
/// let files = matching_files("/data/cell1", "ch0_")?;
/// ```
pub fn matching_files<P: AsRef<Path>>(dir: P, pattern: &str) -> IoResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    trace!(dir = %dir.display(), pattern, "discover::matching_files");

    if !dir.is_dir() {
        return Err(IoError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input directory not found: {}", dir.display()),
        )));
    }

    let dir_str = dir
        .to_str()
        .ok_or_else(|| IoError::Parse(format!("non UTF-8 path: {}", dir.display())))?;
    let glob_pattern = format!(
        "{}/*{}*.{}",
        glob::Pattern::escape(dir_str.trim_end_matches(['/', '\\'])),
        glob::Pattern::escape(pattern),
        STACK_EXTENSION
    );

    let mut files: Vec<PathBuf> = glob::glob(&glob_pattern)
        .map_err(|e| IoError::Parse(e.to_string()))?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    debug!(count = files.len(), pattern = %glob_pattern, "matched input stacks");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_matching_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "cell_ch1_stack0001.tif",
            "cell_ch0_stack0002.tif",
            "cell_ch0_stack0001.tif",
            "cell_ch0_stack0003.tiff",
            "notes_ch0.txt",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("ch0_dir.tif")).unwrap();

        let files = matching_files(dir.path(), "ch0").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();

        assert_eq!(names, vec!["cell_ch0_stack0001.tif", "cell_ch0_stack0002.tif"]);
    }

    #[test]
    fn test_pattern_is_literal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a[1].tif"), b"").unwrap();
        fs::write(dir.path().join("a1.tif"), b"").unwrap();

        let files = matching_files(dir.path(), "[1]").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a[1].tif"));
    }

    #[test]
    fn test_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matching_files(dir.path().join("nope"), "x").is_err());
    }
}
