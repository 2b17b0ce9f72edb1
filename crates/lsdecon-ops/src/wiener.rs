//! Regularized inverse (Wiener) filter.
//!
//! Each half-spectrum bin is independent, so the filter runs over Z-planes
//! in parallel with the OTF table shared read-only.
//!
//! ```text
//! kr = sqrt((kx dkx)^2 + (ky dky)^2)
//!
//! kr >  cutoff:  G = 0
//! kr <= cutoff:  G = conj(H) G / (|H|^2 + w^2) * (1 - kr / cutoff)
//! ```

use crate::fft::{signed_frequency, HalfSpectrum};
use crate::otf::{FrequencySteps, OtfSteps, OtfTable};
use crate::{OpsError, OpsResult};
use rayon::prelude::*;
use rustfft::num_complex::Complex32;
use tracing::trace;

/// Maximum lateral spatial frequency passed by an objective.
///
/// `2 * na / wavelength`, in cycles per unit of `wavelength`.
#[inline]
pub fn radial_cutoff(na: f32, wavelength: f32) -> f32 {
    2.0 * na / wavelength
}

/// Parameters of one Wiener filter application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WienerParams {
    /// Frequency spacing of the spectrum being filtered.
    pub steps: FrequencySteps,
    /// Frequency spacing of the OTF table.
    pub otf_steps: OtfSteps,
    /// Lateral band limit, see [`radial_cutoff`].
    pub radial_cutoff: f32,
    /// Regularization constant; its square is added to `|H|^2`.
    pub wiener: f32,
}

/// Applies the Wiener filter to `spectrum` in place.
///
/// # Errors
///
/// Returns [`OpsError::InvalidParameter`] for a non-positive cutoff.
pub fn wiener_filter(
    spectrum: &mut HalfSpectrum,
    otf: &OtfTable,
    params: &WienerParams,
) -> OpsResult<()> {
    if !(params.radial_cutoff > 0.0) {
        return Err(OpsError::InvalidParameter(format!(
            "radial cutoff must be > 0, got {}",
            params.radial_cutoff
        )));
    }
    trace!(?params, "wiener_filter");

    let real = spectrum.real_extents();
    let half = spectrum.extents();
    let scale = params.steps.to_otf_units(params.otf_steps);
    let w2 = params.wiener * params.wiener;
    let cutoff = params.radial_cutoff;
    let (dkx, dky) = (params.steps.dkx, params.steps.dky);

    spectrum
        .data_mut()
        .par_chunks_mut(half.slice_len())
        .enumerate()
        .for_each(|(z, plane)| {
            let kz = signed_frequency(z, real.nz);
            for y in 0..half.ny {
                let ky = signed_frequency(y, real.ny);
                let row = &mut plane[y * half.nx..(y + 1) * half.nx];
                for (x, value) in row.iter_mut().enumerate() {
                    let kx = x as f32;
                    let kr = ((kx * dkx).powi(2) + (ky * dky).powi(2)).sqrt();
                    if kr > cutoff {
                        *value = Complex32::new(0.0, 0.0);
                        continue;
                    }
                    let h = otf.interpolate(kx * scale[0], ky * scale[1], kz * scale[2]);
                    let a_star_g = h.conj() * *value;
                    *value = a_star_g / (h.norm_sqr() + w2) * (1.0 - kr / cutoff);
                }
            }
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::FftPlan3d;
    use lsdecon_core::{Extents, Volume};

    fn uniform_otf() -> OtfTable {
        OtfTable::new(256, 128, vec![Complex32::new(1.0, 0.0); 256 * 128]).unwrap()
    }

    fn params(extents: Extents) -> WienerParams {
        WienerParams {
            steps: FrequencySteps::for_grid(extents, 0.104, 0.25),
            otf_steps: OtfSteps { dkr: 0.05, dkz: 0.1 },
            radial_cutoff: radial_cutoff(1.2, 0.525),
            wiener: 0.01,
        }
    }

    #[test]
    fn test_radial_cutoff() {
        assert!((radial_cutoff(1.2, 0.525) - 4.571_428_5).abs() < 1e-5);
    }

    #[test]
    fn test_outside_cutoff_is_zero() {
        let extents = Extents::new(64, 32, 8);
        let mut spectrum = HalfSpectrum::new(extents);
        spectrum
            .data_mut()
            .iter_mut()
            .for_each(|v| *v = Complex32::new(3.0, -1.0));
        let p = params(extents);
        wiener_filter(&mut spectrum, &uniform_otf(), &p).unwrap();

        let half = spectrum.extents();
        let mut zeroed = 0;
        for z in 0..half.nz {
            for y in 0..half.ny {
                for x in 0..half.nx {
                    let ky = signed_frequency(y, extents.ny);
                    let kr = ((x as f32 * p.steps.dkx).powi(2) + (ky * p.steps.dky).powi(2)).sqrt();
                    if kr > p.radial_cutoff {
                        assert_eq!(spectrum.get(x, y, z), Complex32::new(0.0, 0.0));
                        zeroed += 1;
                    }
                }
            }
        }
        assert!(zeroed > 0);
    }

    #[test]
    fn test_rejects_bad_cutoff() {
        let extents = Extents::new(8, 8, 8);
        let mut spectrum = HalfSpectrum::new(extents);
        let mut p = params(extents);
        p.radial_cutoff = 0.0;
        assert!(wiener_filter(&mut spectrum, &uniform_otf(), &p).is_err());
    }

    #[test]
    fn test_uniform_otf_scales_by_taper() {
        // 256 x 256 x 64 volume, background 90, unit OTF everywhere in range.
        let extents = Extents::new(256, 256, 64);
        let mut volume = Volume::new(extents);
        for z in 0..extents.nz {
            for y in 0..extents.ny {
                for x in 0..extents.nx {
                    let v = 100.0 + ((x * 7 + y * 3 + z * 11) % 17) as f32;
                    volume.set(x, y, z, v);
                }
            }
        }
        volume.subtract(90.0);

        let plan = FftPlan3d::new(extents).unwrap();
        let mut observed = HalfSpectrum::new(extents);
        plan.forward(&volume, &mut observed).unwrap();

        let mut filtered = observed.clone();
        let p = params(extents);
        wiener_filter(&mut filtered, &uniform_otf(), &p).unwrap();

        let half = filtered.extents();
        let gain = 1.0 / (1.0 + 1e-4);
        for z in (0..half.nz).step_by(5) {
            for y in (0..half.ny).step_by(3) {
                for x in (0..half.nx).step_by(2) {
                    let ky = signed_frequency(y, extents.ny);
                    let kr = ((x as f32 * p.steps.dkx).powi(2) + (ky * p.steps.dky).powi(2)).sqrt();
                    let got = filtered.get(x, y, z);
                    if kr > p.radial_cutoff {
                        assert_eq!(got, Complex32::new(0.0, 0.0));
                    } else {
                        let want = observed.get(x, y, z) * (gain * (1.0 - kr / p.radial_cutoff));
                        let tol = 1e-4 * (1.0 + want.norm());
                        assert!((got - want).norm() <= tol, "bin ({x},{y},{z}): {got} vs {want}");
                    }
                }
            }
        }
    }
}
