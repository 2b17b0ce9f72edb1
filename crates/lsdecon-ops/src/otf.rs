//! Rotationally averaged OTF tables.
//!
//! A light-sheet OTF is symmetric about the optical axis, so it is stored
//! as a 2-D complex table indexed by radial frequency `ir` and axial
//! frequency `iz`:
//!
//! ```text
//! index = ir * nz + iz
//!
//! ir in [0, nr)   radial, not periodic, zero beyond nr - 1
//! iz in [0, nz)   axial, periodic (negative kz wraps to kz + nz)
//! ```
//!
//! On disk the table is a single-page float image `2 * nz` wide and `nr`
//! high, with `(re, im)` pairs packed along each row.
//!
//! - [`OtfTable`] - the table and its bilinear interpolator
//! - [`OtfSteps`] / [`FrequencySteps`] - frequency spacing of table and working grid
//! - [`ResampledOtf`] - the table evaluated on a working half-spectrum grid

use crate::fft::signed_frequency;
use crate::{OpsError, OpsResult};
use lsdecon_core::{Extents, Volume};
use rayon::prelude::*;
use rustfft::num_complex::Complex32;
use tracing::debug;

const ZERO: Complex32 = Complex32::new(0.0, 0.0);

/// Complex OTF table over (radial, axial) frequency indices.
///
/// Read-only after construction; share it across workers by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct OtfTable {
    nr: usize,
    nz: usize,
    data: Vec<Complex32>,
}

impl OtfTable {
    /// Wraps `nr * nz` complex samples (axial index fastest).
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::InvalidDimensions`] if `nr < 2`, `nz == 0`, or
    /// the buffer length is not `nr * nz`.
    pub fn new(nr: usize, nz: usize, data: Vec<Complex32>) -> OpsResult<Self> {
        if nr < 2 || nz == 0 {
            return Err(OpsError::InvalidDimensions(format!(
                "OTF table needs at least 2 radial and 1 axial sample, got {}x{}",
                nr, nz
            )));
        }
        if data.len() != nr * nz {
            return Err(OpsError::InvalidDimensions(format!(
                "OTF table {}x{} needs {} samples, got {}",
                nr,
                nz,
                nr * nz,
                data.len()
            )));
        }
        Ok(Self { nr, nz, data })
    }

    /// Unpacks a table stored as a single plane of interleaved `(re, im)`
    /// floats: width `2 * nz`, height `nr`.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::InvalidDimensions`] for multi-slice input or an
    /// odd plane width.
    pub fn from_packed(plane: &Volume) -> OpsResult<Self> {
        if plane.nz() != 1 {
            return Err(OpsError::InvalidDimensions(format!(
                "OTF must be a single plane, got {} slices",
                plane.nz()
            )));
        }
        if plane.nx() % 2 != 0 {
            return Err(OpsError::InvalidDimensions(format!(
                "OTF plane width {} is not a whole number of complex pairs",
                plane.nx()
            )));
        }

        let data = plane
            .data()
            .chunks_exact(2)
            .map(|pair| Complex32::new(pair[0], pair[1]))
            .collect();
        Self::new(plane.ny(), plane.nx() / 2, data)
    }

    /// Radial sample count.
    #[inline]
    pub fn nr(&self) -> usize {
        self.nr
    }

    /// Axial sample count.
    #[inline]
    pub fn nz(&self) -> usize {
        self.nz
    }

    /// Raw samples, axial index fastest.
    #[inline]
    pub fn data(&self) -> &[Complex32] {
        &self.data
    }

    /// Sample at radial index `ir`, axial index `iz`.
    #[inline(always)]
    pub fn get(&self, ir: usize, iz: usize) -> Complex32 {
        self.data[ir * self.nz + iz]
    }

    /// Frequency spacing of the table for PSF voxel sizes `dr_psf`, `dz_psf`.
    pub fn steps(&self, dr_psf: f32, dz_psf: f32) -> OtfSteps {
        OtfSteps {
            dkr: 1.0 / ((self.nr - 1) as f32 * 2.0 * dr_psf),
            dkz: 1.0 / (self.nz as f32 * dz_psf),
        }
    }

    /// Bilinear lookup at fractional table coordinates.
    ///
    /// `kx`, `ky` combine into the radial index; `kz` is the signed axial
    /// index. Frequencies at or beyond the last radial sample, or outside
    /// the axial period, yield `0 + 0i`.
    pub fn interpolate(&self, kx: f32, ky: f32, kz: f32) -> Complex32 {
        let kr = (kx * kx + ky * ky).sqrt();
        let kz = if kz < 0.0 { kz + self.nz as f32 } else { kz };

        // NaN fails every comparison and lands here too.
        if !(kr < (self.nr - 1) as f32 && kz >= 0.0 && kz < self.nz as f32) {
            return ZERO;
        }

        let ir_a = kr as usize;
        let ir_b = ir_a + 1;
        let iz_a = kz as usize;
        let iz_b = if iz_a == self.nz - 1 { 0 } else { iz_a + 1 };

        let ar = kr - ir_a as f32;
        let az = kz - iz_a as f32;

        let lower = self.get(ir_a, iz_a) * (1.0 - az) + self.get(ir_a, iz_b) * az;
        let upper = self.get(ir_b, iz_a) * (1.0 - az) + self.get(ir_b, iz_b) * az;
        lower * (1.0 - ar) + upper * ar
    }
}

/// Frequency spacing of an OTF table (cycles per micron per index).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OtfSteps {
    /// Radial step.
    pub dkr: f32,
    /// Axial step.
    pub dkz: f32,
}

/// Frequency spacing of a working grid (cycles per micron per bin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencySteps {
    /// Step along X.
    pub dkx: f32,
    /// Step along Y.
    pub dky: f32,
    /// Step along Z.
    pub dkz: f32,
}

impl FrequencySteps {
    /// Steps of the DFT grid of a real volume with lateral pixel size `dr`
    /// and axial step `dz`.
    pub fn for_grid(extents: Extents, dr: f32, dz: f32) -> Self {
        Self {
            dkx: 1.0 / (dr * extents.nx as f32),
            dky: 1.0 / (dr * extents.ny as f32),
            dkz: 1.0 / (dz * extents.nz as f32),
        }
    }

    /// Per-axis factors converting grid bin indices into OTF table indices.
    pub fn to_otf_units(&self, otf: OtfSteps) -> [f32; 3] {
        [self.dkx / otf.dkr, self.dky / otf.dkr, self.dkz / otf.dkz]
    }
}

/// OTF evaluated on every bin of a working half spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledOtf {
    real: Extents,
    data: Vec<Complex32>,
}

impl ResampledOtf {
    /// Samples `otf` on the half-spectrum grid of a real volume of `real`
    /// extents, with `scale` from [`FrequencySteps::to_otf_units`].
    pub fn resample(otf: &OtfTable, real: Extents, scale: [f32; 3]) -> Self {
        let half = real.half_spectrum();
        let mut data = vec![ZERO; half.len()];

        data.par_chunks_mut(half.slice_len().max(1))
            .enumerate()
            .for_each(|(z, plane)| {
                let kz = signed_frequency(z, real.nz) * scale[2];
                for y in 0..half.ny {
                    let ky = signed_frequency(y, real.ny) * scale[1];
                    let row = &mut plane[y * half.nx..(y + 1) * half.nx];
                    for (x, v) in row.iter_mut().enumerate() {
                        *v = otf.interpolate(x as f32 * scale[0], ky, kz);
                    }
                }
            });

        debug!(%real, %half, "resampled OTF onto working grid");
        Self { real, data }
    }

    /// Returns a copy scaled to a unit-magnitude DC term.
    ///
    /// A zero DC term leaves the samples unchanged.
    pub fn normalized(&self) -> Self {
        let dc = self.data.first().map(|v| v.norm()).unwrap_or(0.0);
        if dc <= 0.0 {
            return self.clone();
        }
        let inv = 1.0 / dc;
        Self {
            real: self.real,
            data: self.data.par_iter().map(|&v| v * inv).collect(),
        }
    }

    /// Extents of the real volume the grid belongs to.
    #[inline]
    pub fn real_extents(&self) -> Extents {
        self.real
    }

    /// Samples in half-spectrum layout, X fastest.
    #[inline]
    pub fn data(&self) -> &[Complex32] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Table whose value is `ir + i * iz`, easy to interpolate by hand.
    fn ramp_table(nr: usize, nz: usize) -> OtfTable {
        let data = (0..nr)
            .flat_map(|ir| (0..nz).map(move |iz| Complex32::new(ir as f32, iz as f32)))
            .collect();
        OtfTable::new(nr, nz, data).unwrap()
    }

    #[test]
    fn test_out_of_table_is_zero() {
        let otf = ramp_table(8, 6);
        assert_eq!(otf.interpolate(7.0, 0.0, 0.0), ZERO);
        assert_eq!(otf.interpolate(5.0, 5.0, 1.0), ZERO);
        assert_eq!(otf.interpolate(1.0, 0.0, 6.0), ZERO);
        assert_eq!(otf.interpolate(1.0, 0.0, -7.0), ZERO);
        assert_eq!(otf.interpolate(f32::NAN, 0.0, 0.0), ZERO);
    }

    #[test]
    fn test_bilinear_inside() {
        let otf = ramp_table(8, 6);
        let v = otf.interpolate(2.5, 0.0, 1.25);
        assert_abs_diff_eq!(v.re, 2.5, epsilon = 1e-5);
        assert_abs_diff_eq!(v.im, 1.25, epsilon = 1e-5);

        let v = otf.interpolate(3.0, 4.0, 0.0);
        assert_abs_diff_eq!(v.re, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_axial_wrap() {
        let otf = ramp_table(4, 6);
        // Halfway between iz = 5 and the wrapped neighbour iz = 0.
        let v = otf.interpolate(0.0, 0.0, 5.5);
        assert_abs_diff_eq!(v.im, 2.5, epsilon = 1e-5);
        // Negative axial frequency folds by the table period.
        let v = otf.interpolate(0.0, 0.0, -1.0);
        assert_abs_diff_eq!(v.im, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_from_packed() {
        let plane = Volume::from_vec(
            Extents::new(4, 2, 1),
            vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0, 4.0, -4.0],
        )
        .unwrap();
        let otf = OtfTable::from_packed(&plane).unwrap();
        assert_eq!((otf.nr(), otf.nz()), (2, 2));
        assert_eq!(otf.get(1, 0), Complex32::new(3.0, -3.0));

        let odd = Volume::new(Extents::new(3, 2, 1));
        assert!(OtfTable::from_packed(&odd).is_err());
        assert!(OtfTable::new(1, 4, vec![ZERO; 4]).is_err());
    }

    #[test]
    fn test_steps() {
        let otf = ramp_table(65, 64);
        let steps = otf.steps(0.104, 0.1);
        assert_abs_diff_eq!(steps.dkr, 1.0 / (64.0 * 2.0 * 0.104), epsilon = 1e-6);
        assert_abs_diff_eq!(steps.dkz, 1.0 / 6.4, epsilon = 1e-6);

        let grid = FrequencySteps::for_grid(Extents::new(256, 128, 64), 0.104, 0.25);
        let scale = grid.to_otf_units(steps);
        assert_abs_diff_eq!(scale[0], 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(scale[1], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(scale[2], 0.4, epsilon = 1e-5);
    }

    #[test]
    fn test_resample_and_normalize() {
        let otf = OtfTable::new(16, 8, vec![Complex32::new(2.0, 0.0); 128]).unwrap();
        let real = Extents::new(8, 4, 4);
        let resampled = ResampledOtf::resample(&otf, real, [1.0, 1.0, 1.0]);
        assert_eq!(resampled.data().len(), real.half_spectrum().len());
        assert_eq!(resampled.data()[0], Complex32::new(2.0, 0.0));

        let unit = resampled.normalized();
        assert!(unit.data().iter().all(|v| (v.re - 1.0).abs() < 1e-6));
    }
}
