//! Edge apodization.
//!
//! The DFT treats a slice as periodic, so any jump between its first and
//! last row (or column) leaks into the spectrum as a bright cross. The
//! apodizer pulls both borders toward their common midpoint with a
//! half-cosine taper `napodize` samples deep.

use lsdecon_core::Volume;
use rayon::prelude::*;
use std::f32::consts::FRAC_PI_2;

/// Taper weight for the `l`-th sample inward from a border.
#[inline]
fn taper(l: usize, napodize: usize) -> f32 {
    1.0 - ((l as f32 + 0.5) / napodize as f32 * FRAC_PI_2).sin()
}

/// Apodizes every Z-slice of `volume` in place.
///
/// Rows are tapered first, then columns. A slice exactly two samples wider
/// than it is tall carries two padding columns, which are left out. The
/// taper depth is clamped to half the slice so the two borders never
/// overlap; `napodize == 0` is a no-op.
pub fn apodize(napodize: usize, volume: &mut Volume) {
    let mut nx = volume.nx();
    let ny = volume.ny();
    let stride = volume.nx();
    if nx == ny + 2 {
        nx -= 2;
    }

    let rows = napodize.min(ny / 2);
    let cols = napodize.min(nx / 2);
    if rows == 0 && cols == 0 {
        return;
    }

    volume.par_slices_mut().for_each_init(
        || Vec::with_capacity(nx),
        |diffs, slice| {
            diffs.clear();
            diffs.extend((0..nx).map(|k| (slice[(ny - 1) * stride + k] - slice[k]) * 0.5));
            for l in 0..rows {
                let fact = taper(l, napodize);
                for (k, diff) in diffs.iter().enumerate() {
                    slice[l * stride + k] += diff * fact;
                    slice[(ny - 1 - l) * stride + k] -= diff * fact;
                }
            }

            for l in 0..ny {
                let row = &mut slice[l * stride..l * stride + nx];
                let diff = (row[nx - 1] - row[0]) * 0.5;
                for k in 0..cols {
                    let fact = taper(k, napodize);
                    row[k] += diff * fact;
                    row[nx - 1 - k] -= diff * fact;
                }
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsdecon_core::Extents;

    fn gradient_y(extents: Extents) -> Volume {
        let mut v = Volume::new(extents);
        for z in 0..extents.nz {
            for y in 0..extents.ny {
                for x in 0..extents.nx {
                    v.set(x, y, z, y as f32 * 2.0 + z as f32);
                }
            }
        }
        v
    }

    #[test]
    fn test_row_discontinuity_decreases() {
        let extents = Extents::new(16, 12, 3);
        let mut v = gradient_y(extents);
        let before = (v.get(5, 11, 1) - v.get(5, 0, 1)).abs();
        apodize(4, &mut v);
        let after = (v.get(5, 11, 1) - v.get(5, 0, 1)).abs();
        assert!(after < before, "{after} !< {before}");
        // Interior rows are untouched.
        assert_eq!(v.get(5, 6, 1), 6.0 * 2.0 + 1.0);
    }

    #[test]
    fn test_column_discontinuity_decreases() {
        let extents = Extents::new(10, 10, 2);
        let mut v = Volume::new(extents);
        for z in 0..2 {
            for y in 0..10 {
                for x in 0..10 {
                    v.set(x, y, z, x as f32);
                }
            }
        }
        apodize(1, &mut v);
        for y in 0..10 {
            assert!((v.get(9, y, 0) - v.get(0, y, 0)).abs() < 9.0);
        }
    }

    #[test]
    fn test_padding_columns_ignored() {
        // 10 x 8: the last two columns are padding and must not change.
        let extents = Extents::new(10, 8, 1);
        let mut v = Volume::new(extents);
        for y in 0..8 {
            for x in 0..10 {
                v.set(x, y, 0, (x * 3 + y) as f32);
            }
        }
        let before = v.clone();
        apodize(3, &mut v);
        for y in 0..8 {
            assert_eq!(v.get(8, y, 0), before.get(8, y, 0));
            assert_eq!(v.get(9, y, 0), before.get(9, y, 0));
        }
        assert_ne!(v.get(0, 0, 0), before.get(0, 0, 0));
    }

    #[test]
    fn test_zero_width_is_noop() {
        let mut v = gradient_y(Extents::new(8, 8, 2));
        let before = v.clone();
        apodize(0, &mut v);
        assert_eq!(v, before);
    }
}
