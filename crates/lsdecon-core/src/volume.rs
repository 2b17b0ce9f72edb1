//! Volume buffer types.
//!
//! - [`Extents`] - X/Y/Z sizes
//! - [`Volume`] - Owned real-valued 3-D sample grid
//!
//! # Memory Layout
//!
//! Samples are stored X fastest, then Y, then Z:
//!
//! ```text
//! index = x + y * nx + z * nx * ny
//!
//! Memory: [row y=0 of slice z=0][row y=1 of slice z=0] ... [row y=0 of slice z=1] ...
//! ```
//!
//! A Z-slice is therefore one contiguous `nx * ny` chunk, which is what the
//! per-slice operations (apodization, deskew) and the parallel FFT passes
//! rely on.

use crate::{Error, Result};
use rayon::prelude::*;
use std::fmt;

/// Sizes of a 3-D grid along X, Y and Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extents {
    /// Samples along X (fastest axis).
    pub nx: usize,
    /// Samples along Y.
    pub ny: usize,
    /// Samples along Z (slowest axis).
    pub nz: usize,
}

impl Extents {
    /// Creates new extents.
    #[inline]
    pub const fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    /// Total number of samples.
    #[inline]
    pub const fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Returns `true` if any axis is zero.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.nx == 0 || self.ny == 0 || self.nz == 0
    }

    /// Samples in one Z-slice.
    #[inline]
    pub const fn slice_len(&self) -> usize {
        self.nx * self.ny
    }

    /// Extents of the non-redundant half spectrum (`nx / 2 + 1` along X).
    #[inline]
    pub const fn half_spectrum(&self) -> Self {
        Self::new(self.nx / 2 + 1, self.ny, self.nz)
    }

    /// Checks that no axis is zero and the sample count fits in `usize`.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::invalid_extents(*self, "every axis must be > 0"));
        }
        self.nx
            .checked_mul(self.ny)
            .and_then(|v| v.checked_mul(self.nz))
            .ok_or_else(|| Error::invalid_extents(*self, "sample count overflows"))?;
        Ok(())
    }
}

impl fmt::Display for Extents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.nx, self.ny, self.nz)
    }
}

/// Intensity statistics of a volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeStats {
    /// Smallest sample.
    pub min: f32,
    /// Largest sample.
    pub max: f32,
    /// Arithmetic mean.
    pub mean: f64,
}

/// Owned real-valued 3-D sample grid.
///
/// # Example
///
/// ```rust
/// use lsdecon_core::{Extents, Volume};
///
/// let mut vol = Volume::new(Extents::new(4, 3, 2));
/// vol.set(1, 2, 1, 5.0);
/// assert_eq!(vol.get(1, 2, 1), 5.0);
/// assert_eq!(vol.len(), 24);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    extents: Extents,
    data: Vec<f32>,
}

impl Volume {
    /// Creates a zero-filled volume.
    pub fn new(extents: Extents) -> Self {
        Self::filled(extents, 0.0)
    }

    /// Creates a volume with every sample set to `value`.
    pub fn filled(extents: Extents, value: f32) -> Self {
        Self {
            extents,
            data: vec![value; extents.len()],
        }
    }

    /// Wraps an existing sample buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferSize`] if `data.len()` differs from `extents.len()`.
    pub fn from_vec(extents: Extents, data: Vec<f32>) -> Result<Self> {
        let expected = extents.len();
        if data.len() != expected {
            return Err(Error::BufferSize {
                extents,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { extents, data })
    }

    /// Grid extents.
    #[inline]
    pub fn extents(&self) -> Extents {
        self.extents
    }

    /// Samples along X.
    #[inline]
    pub fn nx(&self) -> usize {
        self.extents.nx
    }

    /// Samples along Y.
    #[inline]
    pub fn ny(&self) -> usize {
        self.extents.ny
    }

    /// Samples along Z.
    #[inline]
    pub fn nz(&self) -> usize {
        self.extents.nz
    }

    /// Total sample count.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the volume holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw samples.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Raw samples, mutable.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consumes the volume and returns its sample buffer.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Linear index of `(x, y, z)`.
    #[inline(always)]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.extents.nx * (y + self.extents.ny * z)
    }

    /// Sample at `(x, y, z)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[self.index(x, y, z)]
    }

    /// Sets the sample at `(x, y, z)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is out of bounds.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: f32) {
        let i = self.index(x, y, z);
        self.data[i] = value;
    }

    /// Z-slice `z` as a contiguous `nx * ny` slice.
    pub fn slice(&self, z: usize) -> &[f32] {
        let n = self.extents.slice_len();
        &self.data[z * n..(z + 1) * n]
    }

    /// Z-slice `z`, mutable.
    pub fn slice_mut(&mut self, z: usize) -> &mut [f32] {
        let n = self.extents.slice_len();
        &mut self.data[z * n..(z + 1) * n]
    }

    /// Parallel iterator over mutable Z-slices.
    pub fn par_slices_mut(&mut self) -> rayon::slice::ChunksMut<'_, f32> {
        let n = self.extents.slice_len().max(1);
        self.data.par_chunks_mut(n)
    }

    /// Returns a copy resized to `extents`, anchored at the origin.
    ///
    /// Samples outside the source are set to `fill`; samples outside the
    /// target are dropped. This covers both cropping and padding.
    pub fn resized(&self, extents: Extents, fill: f32) -> Volume {
        let mut out = Volume::filled(extents, fill);
        let cx = self.nx().min(extents.nx);
        let cy = self.ny().min(extents.ny);
        let cz = self.nz().min(extents.nz);
        if cx == 0 {
            return out;
        }

        out.par_slices_mut()
            .enumerate()
            .take(cz)
            .for_each(|(z, dst)| {
                for y in 0..cy {
                    let src_start = self.index(0, y, z);
                    let dst_start = y * extents.nx;
                    dst[dst_start..dst_start + cx]
                        .copy_from_slice(&self.data[src_start..src_start + cx]);
                }
            });
        out
    }

    /// Subtracts `value` from every sample.
    pub fn subtract(&mut self, value: f32) {
        self.data.par_iter_mut().for_each(|v| *v -= value);
    }

    /// Adds `value` to every sample.
    pub fn add(&mut self, value: f32) {
        self.data.par_iter_mut().for_each(|v| *v += value);
    }

    /// Multiplies every sample by `factor`.
    pub fn scale(&mut self, factor: f32) {
        self.data.par_iter_mut().for_each(|v| *v *= factor);
    }

    /// Raises every sample below `min` to `min`.
    pub fn clamp_min(&mut self, min: f32) {
        self.data.par_iter_mut().for_each(|v| *v = v.max(min));
    }

    /// Min, max and mean intensity.
    ///
    /// Returns `None` for an empty volume.
    pub fn stats(&self) -> Option<VolumeStats> {
        if self.data.is_empty() {
            return None;
        }
        let (min, max, sum) = self
            .data
            .par_iter()
            .fold(
                || (f32::INFINITY, f32::NEG_INFINITY, 0.0f64),
                |(lo, hi, s), &v| (lo.min(v), hi.max(v), s + v as f64),
            )
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY, 0.0f64),
                |a, b| (a.0.min(b.0), a.1.max(b.1), a.2 + b.2),
            );
        Some(VolumeStats {
            min,
            max,
            mean: sum / self.data.len() as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(extents: Extents) -> Volume {
        let data = (0..extents.len()).map(|i| i as f32).collect();
        Volume::from_vec(extents, data).unwrap()
    }

    #[test]
    fn test_index_layout() {
        let vol = ramp(Extents::new(4, 3, 2));
        assert_eq!(vol.get(1, 0, 0), 1.0);
        assert_eq!(vol.get(0, 1, 0), 4.0);
        assert_eq!(vol.get(0, 0, 1), 12.0);
        assert_eq!(vol.slice(1)[0], 12.0);
    }

    #[test]
    fn test_from_vec_size_mismatch() {
        let err = Volume::from_vec(Extents::new(2, 2, 2), vec![0.0; 7]).unwrap_err();
        assert!(matches!(err, Error::BufferSize { expected: 8, actual: 7, .. }));
    }

    #[test]
    fn test_validate() {
        assert!(Extents::new(1, 1, 1).validate().is_ok());
        assert!(Extents::new(0, 4, 4).validate().is_err());
        assert!(Extents::new(usize::MAX, 2, 2).validate().is_err());
    }

    #[test]
    fn test_half_spectrum() {
        assert_eq!(Extents::new(256, 8, 4).half_spectrum(), Extents::new(129, 8, 4));
        assert_eq!(Extents::new(5, 8, 4).half_spectrum(), Extents::new(3, 8, 4));
    }

    #[test]
    fn test_resized_crop_and_pad() {
        let vol = ramp(Extents::new(4, 3, 2));

        let cropped = vol.resized(Extents::new(2, 2, 1), -1.0);
        assert_eq!(cropped.data(), &[0.0, 1.0, 4.0, 5.0]);

        let padded = vol.resized(Extents::new(5, 3, 3), -1.0);
        assert_eq!(padded.get(3, 2, 1), vol.get(3, 2, 1));
        assert_eq!(padded.get(4, 0, 0), -1.0);
        assert_eq!(padded.get(0, 0, 2), -1.0);
    }

    #[test]
    fn test_scalar_ops() {
        let mut vol = Volume::filled(Extents::new(3, 3, 3), 10.0);
        vol.subtract(12.0);
        assert_eq!(vol.get(1, 1, 1), -2.0);
        vol.clamp_min(0.0);
        assert_eq!(vol.get(2, 2, 2), 0.0);
        vol.add(3.0);
        vol.scale(0.5);
        assert_relative_eq!(vol.get(0, 0, 0), 1.5);
    }

    #[test]
    fn test_stats() {
        let vol = ramp(Extents::new(2, 2, 2));
        let stats = vol.stats().unwrap();
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 7.0);
        assert_relative_eq!(stats.mean, 3.5);
        assert!(Volume::new(Extents::new(0, 1, 1)).stats().is_none());
    }
}
