//! Iterative restoration backends.
//!
//! Provides the host Richardson-Lucy backend and the fused
//! deskew/Richardson-Lucy/rotate backend behind one capability trait.
//!
//! # Architecture
//!
//! ```text
//! RestorationBackend
//!     +-- CpuIterative  (geometry applied by the caller)
//!     +-- GpuIterative  (geometry fused into the restore call, persistent workspace)
//! ```

mod cpu_backend;
mod detect;
pub mod memory;
mod richardson_lucy;

#[cfg(feature = "gpu")]
mod gpu_backend;

pub use cpu_backend::CpuIterative;
pub use detect::{BackendInfo, describe_backends, detect_backends, select_best_backend};
pub use richardson_lucy::{RlWorkspace, richardson_lucy};

#[cfg(feature = "gpu")]
pub use gpu_backend::GpuIterative;

use crate::{ComputeError, ComputeResult};
use lsdecon_core::Volume;
use lsdecon_ops::geometry::{DeskewParams, RotationMatrix};
use lsdecon_ops::{FftPlan3d, ResampledOtf};
use std::fmt;
use std::str::FromStr;

/// Available restoration backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Auto-select best available (fused > host).
    #[default]
    Auto,
    /// Host Richardson-Lucy with separate geometry passes.
    Cpu,
    /// Fused deskew + Richardson-Lucy + rotate. Host-emulated: the fused
    /// kernels run on the rayon pool, no device is used.
    Gpu,
}

impl Backend {
    /// Check if this backend is available in this build.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Auto => true,
            Self::Cpu => true,
            Self::Gpu => cfg!(feature = "gpu"),
        }
    }

    /// Get human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            other => Err(ComputeError::BackendNotAvailable(format!(
                "unknown backend '{}' (expected auto, cpu or gpu)",
                other
            ))),
        }
    }
}

/// Per-volume inputs of an iterative restoration.
///
/// `deskew` and `rotation` are only set for backends that fuse geometry
/// (see [`RestorationBackend::fuses_geometry`]).
#[derive(Debug, Clone, Copy)]
pub struct RestoreParams<'a> {
    /// Richardson-Lucy iteration count.
    pub iterations: u32,
    /// OTF on the working half-spectrum grid, unit DC.
    pub otf: &'a ResampledOtf,
    /// Plans bound to the working extents.
    pub plan: &'a FftPlan3d,
    /// Shear to remove before iterating.
    pub deskew: Option<DeskewParams>,
    /// Rotation to apply after iterating.
    pub rotation: Option<RotationMatrix>,
    /// Input as acquired (background included, no apodization or clamp);
    /// sheared alongside `deskew` and returned as [`Restored::deskewed_raw`].
    pub raw: Option<&'a Volume>,
}

/// Output of one restoration.
#[derive(Debug, Clone, PartialEq)]
pub struct Restored {
    /// Restored volume.
    pub volume: Volume,
    /// Deskewed raw input, when requested and deskewing ran.
    pub deskewed_raw: Option<Volume>,
}

/// Capability of restoring a background-subtracted, non-negative volume.
pub trait RestorationBackend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &'static str;

    /// Whether deskew and rotation run inside [`restore`](Self::restore).
    fn fuses_geometry(&self) -> bool;

    /// Restores `volume`.
    ///
    /// Without fused geometry the volume must already match the plan
    /// extents; with it, the deskewed volume must.
    fn restore(&self, volume: Volume, params: &RestoreParams<'_>) -> ComputeResult<Restored>;
}

/// Create a restoration backend.
///
/// `Backend::Auto` picks the highest-priority available backend.
pub fn create_backend(backend: Backend) -> ComputeResult<Box<dyn RestorationBackend>> {
    match backend {
        Backend::Auto => {
            let best = select_best_backend();
            create_backend(best)
        }
        Backend::Cpu => Ok(Box::new(CpuIterative::new())),
        Backend::Gpu => {
            #[cfg(feature = "gpu")]
            {
                Ok(Box::new(GpuIterative::new()))
            }
            #[cfg(not(feature = "gpu"))]
            {
                Err(ComputeError::BackendNotAvailable(
                    "gpu feature not enabled".to_string(),
                ))
            }
        }
    }
}
