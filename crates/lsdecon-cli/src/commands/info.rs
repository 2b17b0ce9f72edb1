//! Stack info command.
//!
//! Shows extents, the FFT-friendly extents a batch would pad to, and
//! intensity statistics.

use crate::InfoArgs;
use anyhow::Result;
use lsdecon_compute::backend::memory::format_bytes;
use lsdecon_core::{Extents, Volume};
use lsdecon_ops::dims::optimal_dimension;
use std::fs;
use std::path::Path;
use tracing::trace;

/// Runs the info command.
pub fn run(args: InfoArgs, verbose: u8) -> Result<()> {
    for path in &args.input {
        trace!(path = %path.display(), "info::run");
        let file_size = fs::metadata(path)?.len();
        let volume = super::load_volume(path)?;
        print_text(path, &volume, file_size, !args.no_stats, verbose);

        if args.input.len() > 1 {
            println!();
        }
    }
    Ok(())
}

/// Extents each axis would be padded to before transforming.
pub fn fft_extents(extents: Extents) -> Extents {
    Extents::new(
        optimal_dimension(extents.nx),
        optimal_dimension(extents.ny),
        optimal_dimension(extents.nz),
    )
}

fn print_text(path: &Path, volume: &Volume, file_size: u64, stats: bool, verbose: u8) {
    let extents = volume.extents();
    let fft = fft_extents(extents);

    println!("{}", path.display());
    println!("  Extents:    {} (x, y, z)", extents);
    println!("  Voxels:     {}", extents.len());
    println!("  File size:  {}", format_bytes(file_size));
    if fft != extents {
        println!("  FFT size:   {} (padded)", fft);
    } else {
        println!("  FFT size:   {}", fft);
    }

    if stats {
        if let Some(s) = volume.stats() {
            println!("  Min value:  {:.3}", s.min);
            println!("  Max value:  {:.3}", s.max);
            println!("  Avg value:  {:.3}", s.mean);
        }
    }

    if verbose > 0 {
        println!("  In memory:  {}", format_bytes(extents.len() as u64 * 4));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fft_extents() {
        assert_eq!(fft_extents(Extents::new(250, 256, 101)), Extents::new(252, 256, 105));
    }
}
