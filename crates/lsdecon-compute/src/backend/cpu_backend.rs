//! Host Richardson-Lucy backend.

use super::richardson_lucy::{RlWorkspace, richardson_lucy};
use super::{RestorationBackend, RestoreParams, Restored};
use crate::ComputeResult;
use lsdecon_core::Volume;
use tracing::trace;

/// Richardson-Lucy on host threads.
///
/// Does not fuse geometry: the caller deskews before and rotates after
/// [`restore`](RestorationBackend::restore). Buffers are allocated per call.
#[derive(Debug, Default)]
pub struct CpuIterative;

impl CpuIterative {
    pub fn new() -> Self {
        Self
    }
}

impl RestorationBackend for CpuIterative {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn fuses_geometry(&self) -> bool {
        false
    }

    fn restore(&self, volume: Volume, params: &RestoreParams<'_>) -> ComputeResult<Restored> {
        trace!(extents = %volume.extents(), iterations = params.iterations, "CpuIterative::restore");
        let mut workspace = RlWorkspace::new(params.plan.extents());
        let restored = richardson_lucy(&volume, params.otf, params.plan, params.iterations, &mut workspace)?;
        Ok(Restored {
            volume: restored,
            deskewed_raw: None,
        })
    }
}
