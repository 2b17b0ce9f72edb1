//! 3-D real FFT plans and half spectra.
//!
//! A [`FftPlan3d`] is built once per batch for fixed extents and reused for
//! every volume of that batch. Forward transforms go real to complex along X
//! (realfft) and then complex along Y and Z (rustfft); the inverse runs the
//! same passes in reverse order.
//!
//! # Conventions
//!
//! - Neither direction normalizes. A forward/inverse round trip scales by
//!   the sample count; multiply by [`FftPlan3d::normalization`] to undo it.
//! - The half spectrum keeps `nx / 2 + 1` complex values per row. Each
//!   value is a `(re, im)` pair, so the row is `2 * (nx / 2 + 1)` floats
//!   wide in memory.
//!
//! # Example
//!
//! ```rust
//! use lsdecon_core::{Extents, Volume};
//! use lsdecon_ops::fft::{FftPlan3d, HalfSpectrum};
//!
//! let extents = Extents::new(8, 6, 4);
//! let plan = FftPlan3d::new(extents).unwrap();
//! let volume = Volume::filled(extents, 1.0);
//! let mut spectrum = HalfSpectrum::new(extents);
//! plan.forward(&volume, &mut spectrum).unwrap();
//! assert!((spectrum.get(0, 0, 0).re - 192.0).abs() < 1e-3);
//! ```

use crate::{OpsError, OpsResult};
use lsdecon_core::{Extents, Volume};
use rayon::prelude::*;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// Signed frequency index of bin `i` on an axis of length `n`.
///
/// Bins above the Nyquist midpoint map to negative frequencies.
#[inline(always)]
pub fn signed_frequency(i: usize, n: usize) -> f32 {
    if i > n / 2 {
        i as f32 - n as f32
    } else {
        i as f32
    }
}

/// Non-redundant half of a real volume's 3-D spectrum.
#[derive(Clone, PartialEq)]
pub struct HalfSpectrum {
    real: Extents,
    data: Vec<Complex32>,
}

impl HalfSpectrum {
    /// Allocates a zeroed half spectrum for a real volume of `real` extents.
    pub fn new(real: Extents) -> Self {
        Self {
            real,
            data: vec![Complex32::new(0.0, 0.0); real.half_spectrum().len()],
        }
    }

    /// Extents of the real volume this spectrum belongs to.
    #[inline]
    pub fn real_extents(&self) -> Extents {
        self.real
    }

    /// Extents of the stored complex grid (`nx / 2 + 1` along X).
    #[inline]
    pub fn extents(&self) -> Extents {
        self.real.half_spectrum()
    }

    /// Complex samples, X fastest.
    #[inline]
    pub fn data(&self) -> &[Complex32] {
        &self.data
    }

    /// Complex samples, mutable.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [Complex32] {
        &mut self.data
    }

    /// Value at frequency bin `(x, y, z)`.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Complex32 {
        let half = self.extents();
        self.data[x + half.nx * (y + half.ny * z)]
    }

    /// Sets frequency bin `(x, y, z)`.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: Complex32) {
        let half = self.extents();
        self.data[x + half.nx * (y + half.ny * z)] = value;
    }
}

impl fmt::Debug for HalfSpectrum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HalfSpectrum")
            .field("real", &self.real)
            .field("half", &self.extents())
            .finish()
    }
}

/// Forward and inverse 3-D real FFT plans bound to fixed extents.
///
/// Plans are immutable after construction and can be shared across threads.
pub struct FftPlan3d {
    extents: Extents,
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    fft_y: Arc<dyn Fft<f32>>,
    ifft_y: Arc<dyn Fft<f32>>,
    fft_z: Arc<dyn Fft<f32>>,
    ifft_z: Arc<dyn Fft<f32>>,
}

impl FftPlan3d {
    /// Builds plans for volumes of exactly `extents`.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::PlanCreation`] for empty or overflowing extents.
    pub fn new(extents: Extents) -> OpsResult<Self> {
        extents
            .validate()
            .map_err(|e| OpsError::PlanCreation(e.to_string()))?;

        let mut real_planner = RealFftPlanner::<f32>::new();
        let mut planner = FftPlanner::<f32>::new();

        Ok(Self {
            extents,
            r2c: real_planner.plan_fft_forward(extents.nx),
            c2r: real_planner.plan_fft_inverse(extents.nx),
            fft_y: planner.plan_fft_forward(extents.ny),
            ifft_y: planner.plan_fft_inverse(extents.ny),
            fft_z: planner.plan_fft_forward(extents.nz),
            ifft_z: planner.plan_fft_inverse(extents.nz),
        })
    }

    /// Extents the plans are bound to.
    #[inline]
    pub fn extents(&self) -> Extents {
        self.extents
    }

    /// Factor that undoes the round-trip scaling (`1 / sample count`).
    #[inline]
    pub fn normalization(&self) -> f32 {
        1.0 / self.extents.len() as f32
    }

    fn check(&self, volume: Extents, spectrum: &HalfSpectrum) -> OpsResult<()> {
        if volume != self.extents || spectrum.real_extents() != self.extents {
            return Err(OpsError::SizeMismatch(format!(
                "plan is bound to {}, got volume {} and spectrum for {}",
                self.extents,
                volume,
                spectrum.real_extents()
            )));
        }
        Ok(())
    }

    /// Real to complex transform of `volume` into `spectrum`.
    pub fn forward(&self, volume: &Volume, spectrum: &mut HalfSpectrum) -> OpsResult<()> {
        self.check(volume.extents(), spectrum)?;
        let nx = self.extents.nx;
        let nxh = nx / 2 + 1;
        let r2c = &self.r2c;

        volume
            .data()
            .par_chunks(nx)
            .zip(spectrum.data.par_chunks_mut(nxh))
            .try_for_each_init(
                || (r2c.make_input_vec(), r2c.make_scratch_vec()),
                |(input, scratch), (src, dst)| {
                    input.copy_from_slice(src);
                    r2c.process_with_scratch(input, dst, scratch)
                        .map_err(|e| OpsError::Transform(e.to_string()))
                },
            )?;

        self.pass_y(&mut spectrum.data, &self.fft_y);
        self.pass_z(&mut spectrum.data, &self.fft_z);
        Ok(())
    }

    /// Complex to real transform of `spectrum` into `volume`.
    ///
    /// The spectrum is used as scratch space and holds garbage afterwards.
    /// The imaginary parts of the DC and Nyquist columns are discarded.
    pub fn inverse(&self, spectrum: &mut HalfSpectrum, volume: &mut Volume) -> OpsResult<()> {
        self.check(volume.extents(), spectrum)?;
        let nx = self.extents.nx;
        let nxh = nx / 2 + 1;
        let c2r = &self.c2r;

        self.pass_z(&mut spectrum.data, &self.ifft_z);
        self.pass_y(&mut spectrum.data, &self.ifft_y);

        spectrum
            .data
            .par_chunks_mut(nxh)
            .zip(volume.data_mut().par_chunks_mut(nx))
            .try_for_each_init(
                || c2r.make_scratch_vec(),
                |scratch, (src, dst)| {
                    src[0].im = 0.0;
                    if nx % 2 == 0 {
                        src[nxh - 1].im = 0.0;
                    }
                    c2r.process_with_scratch(src, dst, scratch)
                        .map_err(|e| OpsError::Transform(e.to_string()))
                },
            )
    }

    /// Complex FFT along Y, one Z-plane per task.
    fn pass_y(&self, data: &mut [Complex32], fft: &Arc<dyn Fft<f32>>) {
        let nxh = self.extents.nx / 2 + 1;
        let ny = self.extents.ny;
        if ny == 1 {
            return;
        }

        data.par_chunks_mut(nxh * ny).for_each_init(
            || {
                (
                    vec![Complex32::new(0.0, 0.0); ny],
                    vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()],
                )
            },
            |(line, scratch), plane| {
                for x in 0..nxh {
                    for (y, v) in line.iter_mut().enumerate() {
                        *v = plane[y * nxh + x];
                    }
                    fft.process_with_scratch(line, scratch);
                    for (y, v) in line.iter().enumerate() {
                        plane[y * nxh + x] = *v;
                    }
                }
            },
        );
    }

    /// Complex FFT along Z through a transposed copy.
    fn pass_z(&self, data: &mut [Complex32], fft: &Arc<dyn Fft<f32>>) {
        let nz = self.extents.nz;
        if nz == 1 {
            return;
        }
        let plane = (self.extents.nx / 2 + 1) * self.extents.ny;

        let mut lines = vec![Complex32::new(0.0, 0.0); data.len()];
        {
            let src: &[Complex32] = data;
            lines.par_chunks_mut(nz).enumerate().for_each_init(
                || vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()],
                |scratch, (l, line)| {
                    for (z, v) in line.iter_mut().enumerate() {
                        *v = src[z * plane + l];
                    }
                    fft.process_with_scratch(line, scratch);
                },
            );
        }

        data.par_chunks_mut(plane)
            .enumerate()
            .for_each(|(z, dst)| {
                for (l, v) in dst.iter_mut().enumerate() {
                    *v = lines[l * nz + z];
                }
            });
    }
}

impl fmt::Debug for FftPlan3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftPlan3d")
            .field("extents", &self.extents)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn pseudo_random(extents: Extents) -> Volume {
        let mut state = 0x2545_f491_u32;
        let data = (0..extents.len())
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state % 1000) as f32 / 10.0
            })
            .collect();
        Volume::from_vec(extents, data).unwrap()
    }

    #[test]
    fn test_roundtrip_restores_volume() {
        for extents in [Extents::new(16, 12, 10), Extents::new(15, 7, 6), Extents::new(8, 8, 1)] {
            let plan = FftPlan3d::new(extents).unwrap();
            let original = pseudo_random(extents);
            let mut spectrum = HalfSpectrum::new(extents);
            let mut restored = Volume::new(extents);

            plan.forward(&original, &mut spectrum).unwrap();
            plan.inverse(&mut spectrum, &mut restored).unwrap();
            restored.scale(plan.normalization());

            for (a, b) in restored.data().iter().zip(original.data()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-2);
            }
        }
    }

    #[test]
    fn test_single_frequency_bin() {
        // cos(2*pi*x/8) puts half the energy into bin kx = 1 of the half spectrum.
        let extents = Extents::new(8, 4, 2);
        let mut volume = Volume::new(extents);
        for z in 0..2 {
            for y in 0..4 {
                for x in 0..8 {
                    let v = (2.0 * std::f32::consts::PI * x as f32 / 8.0).cos();
                    volume.set(x, y, z, v);
                }
            }
        }
        let plan = FftPlan3d::new(extents).unwrap();
        let mut spectrum = HalfSpectrum::new(extents);
        plan.forward(&volume, &mut spectrum).unwrap();

        assert_abs_diff_eq!(spectrum.get(1, 0, 0).re, 32.0, epsilon = 1e-3);
        assert_abs_diff_eq!(spectrum.get(0, 0, 0).re, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(spectrum.get(1, 1, 0).norm(), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_extent_mismatch_rejected() {
        let plan = FftPlan3d::new(Extents::new(8, 8, 8)).unwrap();
        let volume = Volume::new(Extents::new(8, 8, 4));
        let mut spectrum = HalfSpectrum::new(Extents::new(8, 8, 8));
        assert!(matches!(
            plan.forward(&volume, &mut spectrum),
            Err(OpsError::SizeMismatch(_))
        ));
    }

    #[test]
    fn test_plan_creation_fails_on_empty_extents() {
        assert!(matches!(
            FftPlan3d::new(Extents::new(0, 8, 8)),
            Err(OpsError::PlanCreation(_))
        ));
    }

    #[test]
    fn test_signed_frequency() {
        assert_eq!(signed_frequency(0, 8), 0.0);
        assert_eq!(signed_frequency(4, 8), 4.0);
        assert_eq!(signed_frequency(5, 8), -3.0);
        assert_eq!(signed_frequency(3, 7), 3.0);
        assert_eq!(signed_frequency(4, 7), -3.0);
    }
}
