//! Restoration backends and batch orchestration.
//!
//! A batch is set up once from its first volume ([`ProcessingContext::new`])
//! and then every volume runs through the same plans, OTF and geometry
//! ([`ProcessingContext::process`]).
//!
//! # Architecture
//!
//! ```text
//! ProcessingContext (one per batch)
//!     +-- one-shot: background -> deskew -> FFT -> Wiener -> IFFT -> rotate
//!     +-- iterative: background -> RestorationBackend
//!             +-- CpuIterative (host deskew/rotate around Richardson-Lucy)
//!             +-- GpuIterative (fused deskew + Richardson-Lucy + rotate)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use lsdecon_compute::{DeconConfig, ProcessingContext};
//!
//! let ctx = ProcessingContext::new(DeconConfig::default(), first.extents(), otf)?;
//! let restored = ctx.process(first)?;
//! ```

pub mod backend;
pub mod pipeline;

pub use backend::{
    Backend, RestorationBackend, RestoreParams, Restored, create_backend, describe_backends,
    detect_backends, select_best_backend,
};
pub use pipeline::{DeconConfig, ProcessingContext};
#[cfg(feature = "io")]
pub use pipeline::{BatchSummary, run_batch};

use lsdecon_core::Extents;
use thiserror::Error;

/// Restoration errors.
#[derive(Error, Debug)]
pub enum ComputeError {
    /// The requested backend is not compiled in or not usable.
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    /// FFT plans could not be acquired; the batch cannot run.
    #[error("Failed to create transform plans: {0}")]
    PlanCreation(String),

    /// A volume differs in size from the one the batch was set up for.
    #[error("Volume is {actual}, batch was set up for {expected}")]
    ExtentMismatch { expected: Extents, actual: Extents },

    /// Configuration values that cannot describe an acquisition.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Ops(#[from] lsdecon_ops::OpsError),

    #[cfg(feature = "io")]
    #[error(transparent)]
    Io(#[from] lsdecon_io::IoError),

    #[error(transparent)]
    Core(#[from] lsdecon_core::Error),
}

pub type ComputeResult<T> = Result<T, ComputeError>;
