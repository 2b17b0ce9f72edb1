//! lsdecon - Light-sheet deconvolution CLI
//!
//! Restores batches of TIFF stacks with a Wiener filter or Richardson-Lucy,
//! optionally deskewing and rotating them.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "lsdecon")]
#[command(author, version, about = "Light-sheet deconvolution")]
#[command(long_about = "
Frequency-domain deconvolution of light-sheet microscopy stacks.

Every TIFF in INPUT_DIR whose name contains FILENAME_PATTERN is restored with
the rotationally averaged OTF in OTF_FILE. Results are written to
INPUT_DIR/Decon/<name>_decon.tif.

Examples:
  lsdecon decon /data/cell1 ch0_ otf_ch0.tif              # 15 RL iterations
  lsdecon decon /data/cell1 ch0_ otf_ch0.tif -i 0         # one-shot Wiener
  lsdecon decon /data/cell1 ch0_ otf_ch0.tif -D 32.8 -R 32.8 -S
  lsdecon info /data/cell1/ch0_stack0000.tif
  lsdecon backends
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Deconvolve every matching stack in a directory
    #[command(visible_alias = "d")]
    Decon(DeconArgs),

    /// Display stack extents and intensity statistics
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// List restoration backends
    Backends,
}

#[derive(Args, Debug)]
struct DeconArgs {
    /// Input folder
    input_dir: PathBuf,

    /// Pattern contained in input file names
    filename_pattern: String,

    /// OTF file (rotationally averaged, packed complex)
    otf_file: PathBuf,

    /// Image x-y pixel size (um)
    #[arg(long, default_value = "0.104")]
    drdata: f32,

    /// Image z step (um)
    #[arg(short = 'z', long, default_value = "0.25")]
    dzdata: f32,

    /// PSF x-y pixel size (um)
    #[arg(long, default_value = "0.104")]
    drpsf: f32,

    /// PSF z step (um)
    #[arg(short = 'Z', long, default_value = "0.1")]
    dzpsf: f32,

    /// Emission wavelength (um)
    #[arg(short = 'l', long, default_value = "0.525")]
    wavelength: f32,

    /// Wiener constant (regularization factor)
    #[arg(short = 'W', long, default_value = "0.01")]
    wiener: f32,

    /// Camera background subtracted from every voxel
    #[arg(short = 'b', long, default_value = "90")]
    background: f32,

    /// Numerical aperture
    #[arg(short = 'n', long = "na", default_value = "1.2")]
    na: f32,

    /// Richardson-Lucy iterations (0 = one-shot Wiener filter)
    #[arg(short = 'i', long = "rl", default_value = "15")]
    iterations: u32,

    /// Run Richardson-Lucy on the host backend
    #[arg(short = 'C', long)]
    cpu: bool,

    /// Deskew angle in degrees (0 = no deskew)
    #[arg(short = 'D', long, default_value = "0", allow_negative_numbers = true)]
    deskew: f32,

    /// Deskewed output width (0 = derive)
    #[arg(short = 'w', long, default_value = "0")]
    width: usize,

    /// Extra X shift of the deskewed output (positive moves left)
    #[arg(short = 'x', long, default_value = "0", allow_negative_numbers = true)]
    shift: i32,

    /// Rotation about Y after deconvolution, in degrees (0 = none)
    #[arg(short = 'R', long, default_value = "0", allow_negative_numbers = true)]
    rotate: f32,

    /// Also save the deskewed raw stacks under Deskewed/
    #[arg(short = 'S', long)]
    save_deskewed_raw: bool,

    /// Edge apodization depth in pixels (0 = off)
    #[arg(long, default_value = "0")]
    apodize: usize,
}

#[derive(Args)]
struct InfoArgs {
    /// Input stack(s)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Skip intensity statistics
    #[arg(long)]
    no_stats: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = logging::init_logging(cli.verbose, cli.log_file.as_deref())?;

    // Configure thread pool
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Decon(args) => commands::decon::run(args, cli.verbose),
        Commands::Info(args) => commands::info::run(args, cli.verbose),
        Commands::Backends => commands::backends::run(cli.verbose),
    }
}
