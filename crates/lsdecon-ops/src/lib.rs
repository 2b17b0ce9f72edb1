//! # lsdecon-ops
//!
//! Frequency-domain restoration operations for light-sheet volumes.
//!
//! # Modules
//!
//! - [`dims`] - FFT-friendly extent selection
//! - [`fft`] - 3-D real FFT plans and half spectra
//! - [`otf`] - Rotationally averaged OTF tables, interpolation, resampling
//! - [`wiener`] - Regularized inverse filter
//! - [`apodize`] - Border tapering against spectral leakage
//! - [`geometry`] - Deskew/rotation parameters and kernels
//!
//! # Example
//!
//! ```rust,ignore
//! use lsdecon_ops::fft::{FftPlan3d, HalfSpectrum};
//! use lsdecon_ops::wiener::{wiener_filter, WienerParams};
//!
//! let plan = FftPlan3d::new(volume.extents())?;
//! let mut spectrum = HalfSpectrum::new(volume.extents());
//! plan.forward(&volume, &mut spectrum)?;
//! wiener_filter(&mut spectrum, &otf, &params)?;
//! plan.inverse(&mut spectrum, &mut volume)?;
//! volume.scale(plan.normalization());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
pub mod apodize;
pub mod dims;
pub mod fft;
pub mod geometry;
pub mod otf;
pub mod wiener;

pub use error::{OpsError, OpsResult};
pub use fft::{FftPlan3d, HalfSpectrum};
pub use otf::{FrequencySteps, OtfSteps, OtfTable, ResampledOtf};

/// Complex sample type used by every spectrum in the workspace.
pub use rustfft::num_complex::Complex32;
