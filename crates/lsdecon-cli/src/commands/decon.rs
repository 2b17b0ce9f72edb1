//! Batch deconvolution command.

use crate::DeconArgs;
use anyhow::{Context, Result};
use lsdecon_compute::{Backend, DeconConfig, run_batch};
use tracing::{info, trace};

/// Folds parsed flags into a batch configuration.
pub fn config_from(args: &DeconArgs) -> DeconConfig {
    DeconConfig {
        pixel_size: args.drdata,
        z_step: args.dzdata,
        psf_pixel_size: args.drpsf,
        psf_z_step: args.dzpsf,
        wavelength: args.wavelength,
        na: args.na,
        wiener: args.wiener,
        background: args.background,
        iterations: args.iterations,
        backend: if args.cpu { Backend::Cpu } else { Backend::Gpu },
        deskew_angle: args.deskew,
        output_width: (args.width > 0).then_some(args.width),
        extra_shift: args.shift,
        rotation_angle: args.rotate,
        save_deskewed_raw: args.save_deskewed_raw,
        apodize: args.apodize,
    }
}

pub fn run(args: DeconArgs, verbose: u8) -> Result<()> {
    trace!(dir = %args.input_dir.display(), pattern = %args.filename_pattern, "decon::run");

    let config = config_from(&args);
    let summary = run_batch(&config, &args.input_dir, &args.filename_pattern, &args.otf_file)
        .with_context(|| {
            format!(
                "Deconvolution of '{}' in {} failed",
                args.filename_pattern,
                args.input_dir.display()
            )
        })?;

    if summary.processed == 0 {
        println!(
            "No files in {} match '{}'",
            args.input_dir.display(),
            args.filename_pattern
        );
        return Ok(());
    }

    if verbose > 0 {
        for out in &summary.outputs {
            println!("  {}", out.display());
        }
    }
    info!(processed = summary.processed, "decon done");
    println!("Restored {} stack(s)", summary.processed);
    Ok(())
}
