//! Richardson-Lucy iteration shared by both backends.
//!
//! ```text
//! blurred    = IFFT(FFT(estimate) * H) / N
//! correction = IFFT(FFT(observed / max(blurred, eps)) * conj(H)) / N
//! estimate   = max(estimate * correction, 0)
//! ```

use crate::{ComputeError, ComputeResult};
use lsdecon_core::{Extents, Volume};
use lsdecon_ops::{Complex32, FftPlan3d, HalfSpectrum, ResampledOtf};
use rayon::prelude::*;
use tracing::{debug, trace};

/// Floor for the blurred estimate in the ratio step.
const EPSILON: f32 = f32::EPSILON;

/// Buffers for one Richardson-Lucy run.
///
/// Reusable across volumes of the same extents.
#[derive(Debug, Clone)]
pub struct RlWorkspace {
    spectrum: HalfSpectrum,
    scratch: Volume,
}

impl RlWorkspace {
    /// Allocates buffers for volumes of `extents`.
    pub fn new(extents: Extents) -> Self {
        Self {
            spectrum: HalfSpectrum::new(extents),
            scratch: Volume::new(extents),
        }
    }

    /// Extents the buffers are sized for.
    pub fn extents(&self) -> Extents {
        self.scratch.extents()
    }
}

fn multiply(spectrum: &mut HalfSpectrum, otf: &[Complex32], conjugate: bool) {
    spectrum
        .data_mut()
        .par_iter_mut()
        .zip(otf.par_iter())
        .for_each(|(g, h)| {
            let h = if conjugate { h.conj() } else { *h };
            *g *= h;
        });
}

/// Convolves `volume` with the OTF in place: `IFFT(FFT(volume) * H) / N`.
fn convolve(
    volume: &mut Volume,
    spectrum: &mut HalfSpectrum,
    otf: &ResampledOtf,
    plan: &FftPlan3d,
    conjugate: bool,
) -> ComputeResult<()> {
    plan.forward(volume, spectrum)?;
    multiply(spectrum, otf.data(), conjugate);
    plan.inverse(spectrum, volume)?;
    volume.scale(plan.normalization());
    Ok(())
}

/// Runs `iterations` Richardson-Lucy updates starting from `observed`.
///
/// `observed` must be non-negative and match the plan extents; `otf` is
/// expected to have a unit DC term so intensities are preserved.
pub fn richardson_lucy(
    observed: &Volume,
    otf: &ResampledOtf,
    plan: &FftPlan3d,
    iterations: u32,
    workspace: &mut RlWorkspace,
) -> ComputeResult<Volume> {
    let extents = plan.extents();
    if observed.extents() != extents {
        return Err(ComputeError::ExtentMismatch {
            expected: extents,
            actual: observed.extents(),
        });
    }
    if otf.real_extents() != extents {
        return Err(ComputeError::ExtentMismatch {
            expected: extents,
            actual: otf.real_extents(),
        });
    }
    if workspace.extents() != extents {
        *workspace = RlWorkspace::new(extents);
    }
    trace!(%extents, iterations, "richardson_lucy");

    let mut estimate = observed.clone();
    let RlWorkspace { spectrum, scratch } = workspace;

    for it in 0..iterations {
        scratch.data_mut().copy_from_slice(estimate.data());
        convolve(scratch, spectrum, otf, plan, false)?;

        scratch
            .data_mut()
            .par_iter_mut()
            .zip(observed.data().par_iter())
            .for_each(|(b, &o)| *b = o / b.max(EPSILON));

        convolve(scratch, spectrum, otf, plan, true)?;

        estimate
            .data_mut()
            .par_iter_mut()
            .zip(scratch.data().par_iter())
            .for_each(|(e, &c)| *e = (*e * c).max(0.0));

        debug!(iteration = it + 1, "richardson-lucy update");
    }
    Ok(estimate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use lsdecon_ops::OtfTable;

    fn flat_otf(extents: Extents) -> ResampledOtf {
        let table = OtfTable::new(64, 32, vec![Complex32::new(1.0, 0.0); 64 * 32]).unwrap();
        ResampledOtf::resample(&table, extents, [0.1, 0.1, 0.1]).normalized()
    }

    fn blob(extents: Extents) -> Volume {
        let mut v = Volume::filled(extents, 1.0);
        v.set(4, 4, 2, 50.0);
        v.set(5, 4, 2, 30.0);
        v
    }

    #[test]
    fn test_identity_otf_is_fixed_point() {
        let extents = Extents::new(8, 8, 4);
        let plan = FftPlan3d::new(extents).unwrap();
        let otf = flat_otf(extents);
        let observed = blob(extents);
        let mut ws = RlWorkspace::new(extents);

        let restored = richardson_lucy(&observed, &otf, &plan, 3, &mut ws).unwrap();
        for (a, b) in restored.data().iter().zip(observed.data()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-2);
        }
    }

    #[test]
    fn test_zero_iterations_returns_input() {
        let extents = Extents::new(8, 8, 4);
        let plan = FftPlan3d::new(extents).unwrap();
        let observed = blob(extents);
        // Undersized workspace is regrown on demand.
        let mut ws = RlWorkspace::new(Extents::new(2, 2, 2));
        let restored = richardson_lucy(&observed, &flat_otf(extents), &plan, 0, &mut ws).unwrap();
        assert_eq!(restored, observed);
        assert_eq!(ws.extents(), extents);
    }

    #[test]
    fn test_mismatched_volume_rejected() {
        let plan = FftPlan3d::new(Extents::new(8, 8, 4)).unwrap();
        let otf = flat_otf(Extents::new(8, 8, 4));
        let observed = Volume::new(Extents::new(8, 8, 2));
        let mut ws = RlWorkspace::new(Extents::new(8, 8, 4));
        assert!(matches!(
            richardson_lucy(&observed, &otf, &plan, 1, &mut ws),
            Err(ComputeError::ExtentMismatch { .. })
        ));
    }

    #[test]
    fn test_output_non_negative() {
        let extents = Extents::new(8, 8, 4);
        let plan = FftPlan3d::new(extents).unwrap();
        // A tapered OTF blurs, so the update actually moves the estimate.
        let data = (0..16)
            .flat_map(|ir| (0..8).map(move |_| Complex32::new(1.0 - ir as f32 / 16.0, 0.0)))
            .collect();
        let table = OtfTable::new(16, 8, data).unwrap();
        let otf = ResampledOtf::resample(&table, extents, [1.0, 1.0, 1.0]).normalized();
        let mut ws = RlWorkspace::new(extents);

        let restored = richardson_lucy(&blob(extents), &otf, &plan, 5, &mut ws).unwrap();
        assert!(restored.data().iter().all(|&v| v >= 0.0));
    }
}
