//! Acquisition geometry: deskew and rotation.
//!
//! Stage-scanned light-sheet stacks are sheared: each Z-slice is offset
//! along X by `factor * z` pixels. [`Geometry::derive`] turns the scan angle
//! and voxel sizes into a shear factor, a widened output X extent and the
//! true axial step; [`deskew`] undoes the shear and [`rotate`] turns the
//! restored volume about Y into the coverslip frame.
//!
//! ```text
//! factor  = cos(angle) * dz / dr
//! dz'     = dz * sin(angle)
//! rotation = [ cos(t) * s   sin(t) * s ]     s = dr / dz'
//!            [ -sin(t)      cos(t)     ]
//! ```

use crate::dims::{is_fast_size, optimal_dimension};
use crate::{OpsError, OpsResult};
use lsdecon_core::{Extents, Volume};
use rayon::prelude::*;
use tracing::debug;

/// Acquisition metadata supplied by the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionParams {
    /// Lateral pixel size (microns).
    pub pixel_size: f32,
    /// Stage step between slices (microns).
    pub z_step: f32,
    /// Scan angle in degrees; `0` disables deskewing.
    pub deskew_angle: f32,
    /// Rotation about Y in degrees; `0` disables rotation.
    pub rotation_angle: f32,
    /// Fixed deskewed X extent instead of the derived one. Used as given:
    /// a width that is not a fast FFT length slows every transform.
    pub output_width: Option<usize>,
    /// Extra X shift of the deskewed output in pixels (positive moves left).
    pub extra_shift: i32,
}

impl Default for AcquisitionParams {
    fn default() -> Self {
        Self {
            pixel_size: 0.104,
            z_step: 0.25,
            deskew_angle: 0.0,
            rotation_angle: 0.0,
            output_width: None,
            extra_shift: 0,
        }
    }
}

/// Shear correction parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeskewParams {
    /// X offset in pixels per Z-slice.
    pub factor: f64,
    /// X extent of the deskewed volume.
    pub output_nx: usize,
    /// Extra X shift in pixels.
    pub extra_shift: i32,
}

/// Row-major 2x2 matrix mapping centred input `(x, z)` to output `(x, z)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix(pub [f32; 4]);

impl RotationMatrix {
    /// Rotation by `angle_deg` about Y with the X row stretched by `stretch`.
    pub fn new(angle_deg: f32, stretch: f32) -> Self {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        Self([cos * stretch, sin * stretch, -sin, cos])
    }

    /// Inverse matrix, or `None` if singular.
    pub fn inverse(&self) -> Option<Self> {
        let [a, b, c, d] = self.0;
        let det = a * d - b * c;
        if det.abs() <= f32::EPSILON {
            return None;
        }
        Some(Self([d / det, -b / det, -c / det, a / det]))
    }

    /// Applies the matrix to `(x, z)`.
    #[inline(always)]
    pub fn apply(&self, x: f32, z: f32) -> (f32, f32) {
        let [a, b, c, d] = self.0;
        (a * x + b * z, c * x + d * z)
    }
}

/// Per-batch geometry derived from [`AcquisitionParams`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Shear correction, `None` when the deskew angle is zero.
    pub deskew: Option<DeskewParams>,
    /// X extent after deskewing (equal to the input X extent otherwise).
    pub output_nx: usize,
    /// Axial step of the working volume.
    pub z_step: f32,
    /// Post-restoration rotation, `None` when the rotation angle is zero.
    pub rotation: Option<RotationMatrix>,
}

impl Geometry {
    /// Derives the batch geometry for a working volume `nx` wide and `nz` deep.
    ///
    /// Negative deskew angles are folded by adding 180 degrees. Without an
    /// explicit output width the deskewed extent grows by a quarter of the
    /// total shear and is rounded up to a fast FFT length.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::InvalidParameter`] for non-positive voxel sizes or
    /// a deskew angle parallel to the stage (zero axial step).
    pub fn derive(params: &AcquisitionParams, nx: usize, nz: usize) -> OpsResult<Self> {
        if !(params.pixel_size > 0.0 && params.z_step > 0.0) {
            return Err(OpsError::InvalidParameter(format!(
                "voxel sizes must be > 0, got dr={} dz={}",
                params.pixel_size, params.z_step
            )));
        }

        let mut output_nx = nx;
        let mut z_step = params.z_step;
        let mut deskew = None;

        if params.deskew_angle != 0.0 {
            let angle = if params.deskew_angle < 0.0 {
                params.deskew_angle as f64 + 180.0
            } else {
                params.deskew_angle as f64
            };
            let (sin, cos) = angle.to_radians().sin_cos();
            let dr = params.pixel_size as f64;
            let dz = params.z_step as f64;

            if sin.abs() < 1e-6 {
                return Err(OpsError::InvalidParameter(format!(
                    "deskew angle {} leaves no axial step",
                    params.deskew_angle
                )));
            }

            let factor = cos * dz / dr;
            output_nx = match params.output_width {
                Some(width) if width > 0 => {
                    if !is_fast_size(width) {
                        debug!(width, fast = optimal_dimension(width), "output width is not a fast FFT length");
                    }
                    width
                }
                _ => {
                    // Widened by a quarter of the full shear, as the reference pipeline does.
                    let shear = (nz as f64 * dz * cos.abs() / dr).floor();
                    optimal_dimension(nx + (shear / 4.0).floor() as usize)
                }
            };
            z_step = (dz * sin) as f32;
            deskew = Some(DeskewParams {
                factor,
                output_nx,
                extra_shift: params.extra_shift,
            });
            debug!(factor, output_nx, z_step, "deskew geometry");
        }

        let rotation = (params.rotation_angle != 0.0).then(|| {
            let matrix = RotationMatrix::new(params.rotation_angle, params.pixel_size / z_step);
            debug!(matrix = ?matrix.0, "rotation matrix");
            matrix
        });

        Ok(Self {
            deskew,
            output_nx,
            z_step,
            rotation,
        })
    }

    /// Extents of the working volume after deskewing a `input` volume.
    pub fn working_extents(&self, input: Extents) -> Extents {
        Extents::new(self.output_nx, input.ny, input.nz)
    }
}

/// Removes the stage-scan shear from `volume`.
///
/// Output voxel `(x, y, z)` samples the input row at
/// `x - nx_out/2 + shift - factor * (z - nz/2) + nx_in/2` with linear
/// interpolation; positions without two valid neighbours read as zero.
pub fn deskew(volume: &Volume, params: &DeskewParams) -> Volume {
    let input = volume.extents();
    let out_extents = Extents::new(params.output_nx, input.ny, input.nz);
    let mut out = Volume::new(out_extents);
    if input.nx < 2 {
        return out;
    }

    let nx_in = input.nx;
    let nx_out = params.output_nx;
    let half_in = nx_in as f64 / 2.0;
    let half_out = nx_out as f64 / 2.0;
    let half_z = input.nz as f64 / 2.0;
    let shift = params.extra_shift as f64;

    out.par_slices_mut().enumerate().for_each(|(z, dst)| {
        let offset = half_in - half_out + shift - params.factor * (z as f64 - half_z);
        let src = volume.slice(z);
        for y in 0..input.ny {
            let row_in = &src[y * nx_in..(y + 1) * nx_in];
            let row_out = &mut dst[y * nx_out..(y + 1) * nx_out];
            for (x, v) in row_out.iter_mut().enumerate() {
                let xin = x as f64 + offset;
                if xin >= 0.0 && xin < (nx_in - 1) as f64 {
                    let i = xin as usize;
                    let f = (xin - i as f64) as f32;
                    *v = row_in[i] * (1.0 - f) + row_in[i + 1] * f;
                }
            }
        }
    });
    out
}

/// Rotates `volume` about the Y axis.
///
/// Each output voxel maps through the inverse of `matrix` to centred input
/// `(x, z)` and is sampled bilinearly; outside the input reads as zero.
///
/// # Errors
///
/// Returns [`OpsError::InvalidParameter`] for a singular matrix.
pub fn rotate(volume: &Volume, matrix: &RotationMatrix) -> OpsResult<Volume> {
    let inverse = matrix
        .inverse()
        .ok_or_else(|| OpsError::InvalidParameter(format!("singular rotation {:?}", matrix.0)))?;

    let extents = volume.extents();
    let (nx, ny, nz) = (extents.nx, extents.ny, extents.nz);
    let cx = nx as f32 / 2.0;
    let cz = nz as f32 / 2.0;
    let mut out = Volume::new(extents);

    out.par_slices_mut().enumerate().for_each(|(z, dst)| {
        for x in 0..nx {
            let (xi, zi) = inverse.apply(x as f32 - cx, z as f32 - cz);
            let (xi, zi) = (xi + cx, zi + cz);
            if !(xi >= 0.0 && zi >= 0.0 && xi <= (nx - 1) as f32 && zi <= (nz - 1) as f32) {
                continue;
            }
            let x0 = xi as usize;
            let z0 = zi as usize;
            let x1 = (x0 + 1).min(nx - 1);
            let z1 = (z0 + 1).min(nz - 1);
            let fx = xi - x0 as f32;
            let fz = zi - z0 as f32;

            for y in 0..ny {
                let v00 = volume.get(x0, y, z0);
                let v10 = volume.get(x1, y, z0);
                let v01 = volume.get(x0, y, z1);
                let v11 = volume.get(x1, y, z1);
                let lower = v00 * (1.0 - fx) + v10 * fx;
                let upper = v01 * (1.0 - fx) + v11 * fx;
                dst[y * nx + x] = lower * (1.0 - fz) + upper * fz;
            }
        }
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_thirty_degree_scan() {
        let params = AcquisitionParams {
            deskew_angle: 30.0,
            ..Default::default()
        };
        let geometry = Geometry::derive(&params, 256, 64).unwrap();
        let deskew = geometry.deskew.unwrap();

        assert_abs_diff_eq!(deskew.factor, 2.0818, epsilon = 1e-3);
        assert_abs_diff_eq!(geometry.z_step, 0.125, epsilon = 1e-6);
        // 256 + floor(133 / 4) = 289, next fast length 315.
        assert_eq!(geometry.output_nx, 315);
        assert!(geometry.rotation.is_none());
    }

    #[test]
    fn test_negative_angle_folds() {
        let params = AcquisitionParams {
            deskew_angle: -150.0,
            ..Default::default()
        };
        let geometry = Geometry::derive(&params, 256, 64).unwrap();
        assert_abs_diff_eq!(geometry.deskew.unwrap().factor, 2.0818, epsilon = 1e-3);
        assert_abs_diff_eq!(geometry.z_step, 0.125, epsilon = 1e-6);
    }

    #[test]
    fn test_user_width_and_no_deskew() {
        let params = AcquisitionParams {
            deskew_angle: 31.5,
            output_width: Some(500),
            ..Default::default()
        };
        assert_eq!(Geometry::derive(&params, 256, 64).unwrap().output_nx, 500);

        // Not rounded up even when the width is a slow FFT length.
        assert!(!is_fast_size(301));
        let slow = AcquisitionParams {
            output_width: Some(301),
            ..params
        };
        let geometry = Geometry::derive(&slow, 256, 64).unwrap();
        assert_eq!(geometry.output_nx, 301);
        assert_eq!(geometry.deskew.unwrap().output_nx, 301);

        let flat = Geometry::derive(&AcquisitionParams::default(), 256, 64).unwrap();
        assert!(flat.deskew.is_none());
        assert_eq!(flat.output_nx, 256);
        assert_eq!(flat.z_step, 0.25);
    }

    #[test]
    fn test_rotation_matrix_uses_adjusted_step() {
        let params = AcquisitionParams {
            deskew_angle: 30.0,
            rotation_angle: 30.0,
            ..Default::default()
        };
        let geometry = Geometry::derive(&params, 128, 32).unwrap();
        let m = geometry.rotation.unwrap().0;
        let s = 0.104 / 0.125;
        assert_abs_diff_eq!(m[0], 30f32.to_radians().cos() * s, epsilon = 1e-5);
        assert_abs_diff_eq!(m[1], 0.5 * s, epsilon = 1e-5);
        assert_abs_diff_eq!(m[2], -0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(m[3], 30f32.to_radians().cos(), epsilon = 1e-5);
    }

    #[test]
    fn test_rejects_flat_angle() {
        let params = AcquisitionParams {
            deskew_angle: 180.0,
            ..Default::default()
        };
        assert!(Geometry::derive(&params, 64, 16).is_err());
    }

    #[test]
    fn test_deskew_shifts_slices() {
        // A vertical line at x = 8 in every slice; with factor 1 slice z
        // must land at x = 8 + (z - nz/2) + nx_out/2 - nx_in/2.
        let extents = Extents::new(16, 2, 4);
        let mut volume = Volume::new(extents);
        for z in 0..4 {
            for y in 0..2 {
                volume.set(8, y, z, 1.0);
            }
        }
        let params = DeskewParams {
            factor: 1.0,
            output_nx: 20,
            extra_shift: 0,
        };
        let out = deskew(&volume, &params);
        assert_eq!(out.extents(), Extents::new(20, 2, 4));
        for z in 0..4 {
            let expected = 8 + z + 2 - 2;
            assert_abs_diff_eq!(out.get(expected, 1, z), 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(out.get(expected + 1, 1, z), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_identity_rotation() {
        let extents = Extents::new(6, 3, 5);
        let data = (0..extents.len()).map(|i| i as f32).collect();
        let volume = Volume::from_vec(extents, data).unwrap();
        let out = rotate(&volume, &RotationMatrix::new(0.0, 1.0)).unwrap();
        assert_eq!(out, volume);
        assert!(rotate(&volume, &RotationMatrix([0.0; 4])).is_err());
    }

    #[test]
    fn test_quarter_turn() {
        let extents = Extents::new(5, 1, 5);
        let mut volume = Volume::new(extents);
        volume.set(4, 0, 2, 1.0);
        let out = rotate(&volume, &RotationMatrix::new(90.0, 1.0)).unwrap();
        let total: f32 = out.data().iter().sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(out.get(2, 0, 4), 0.0, epsilon = 1e-4);
    }
}
