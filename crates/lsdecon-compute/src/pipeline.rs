//! Per-volume restoration pipeline.
//!
//! A batch moves through three stages:
//!
//! ```text
//! first volume ──► ProcessingContext::new ──► process(v) for every volume ──► drop
//!                  (extents, geometry, plans,
//!                   OTF resampling, backend)
//! ```
//!
//! Everything derived from the first volume is fixed for the rest of the
//! batch; a later volume of different extents is rejected with
//! [`ComputeError::ExtentMismatch`].
//!
//! # Modes
//!
//! | iterations | path |
//! |------------|------|
//! | 0          | background, deskew, FFT, Wiener filter, IFFT, rotate |
//! | > 0        | background, clamp, [`RestorationBackend`] |

use std::sync::Arc;

use lsdecon_core::{Extents, Volume};
use lsdecon_ops::apodize::apodize;
use lsdecon_ops::dims::optimal_dimension;
use lsdecon_ops::geometry::{AcquisitionParams, Geometry, deskew, rotate};
use lsdecon_ops::wiener::{WienerParams, radial_cutoff, wiener_filter};
use lsdecon_ops::{FftPlan3d, FrequencySteps, HalfSpectrum, OtfTable, ResampledOtf};
use tracing::{debug, info, trace, warn};

use crate::backend::memory;
use crate::{
    Backend, ComputeError, ComputeResult, RestorationBackend, RestoreParams, Restored,
    create_backend,
};

#[cfg(feature = "io")]
use lsdecon_io::{discover, paths, tiff};
#[cfg(feature = "io")]
use std::path::{Path, PathBuf};

// ============================================================================
// Configuration
// ============================================================================

/// Restoration settings, fixed for a whole batch.
///
/// Lengths are in microns, angles in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct DeconConfig {
    /// Lateral pixel size of the data.
    pub pixel_size: f32,
    /// Stage step of the data.
    pub z_step: f32,
    /// Lateral pixel size of the PSF the OTF was computed from.
    pub psf_pixel_size: f32,
    /// Axial step of the PSF.
    pub psf_z_step: f32,
    /// Emission wavelength.
    pub wavelength: f32,
    /// Numerical aperture of the detection objective.
    pub na: f32,
    /// Wiener regularization constant.
    pub wiener: f32,
    /// Constant camera background.
    pub background: f32,
    /// Richardson-Lucy iterations; 0 selects the one-shot Wiener filter.
    pub iterations: u32,
    /// Backend for the iterative path.
    pub backend: Backend,
    /// Scan angle; 0 disables deskewing.
    pub deskew_angle: f32,
    /// Fixed deskewed width instead of the derived one.
    pub output_width: Option<usize>,
    /// Extra X shift of the deskewed output.
    pub extra_shift: i32,
    /// Rotation about Y after restoration; 0 disables it.
    pub rotation_angle: f32,
    /// Also write the deskewed raw volume.
    pub save_deskewed_raw: bool,
    /// Apodization depth in pixels; 0 disables it.
    pub apodize: usize,
}

impl Default for DeconConfig {
    fn default() -> Self {
        Self {
            pixel_size: 0.104,
            z_step: 0.25,
            psf_pixel_size: 0.104,
            psf_z_step: 0.1,
            wavelength: 0.525,
            na: 1.2,
            wiener: 1e-2,
            background: 90.0,
            iterations: 15,
            backend: Backend::Gpu,
            deskew_angle: 0.0,
            output_width: None,
            extra_shift: 0,
            rotation_angle: 0.0,
            save_deskewed_raw: false,
            apodize: 0,
        }
    }
}

impl DeconConfig {
    /// Acquisition geometry inputs.
    pub fn acquisition(&self) -> AcquisitionParams {
        AcquisitionParams {
            pixel_size: self.pixel_size,
            z_step: self.z_step,
            deskew_angle: self.deskew_angle,
            rotation_angle: self.rotation_angle,
            output_width: self.output_width,
            extra_shift: self.extra_shift,
        }
    }

    /// Whether the iterative path runs.
    pub fn is_iterative(&self) -> bool {
        self.iterations > 0
    }

    /// Rejects values that cannot describe an acquisition.
    pub fn validate(&self) -> ComputeResult<()> {
        let positive = [
            ("drdata", self.pixel_size),
            ("dzdata", self.z_step),
            ("drpsf", self.psf_pixel_size),
            ("dzpsf", self.psf_z_step),
            ("wavelength", self.wavelength),
            ("NA", self.na),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ComputeError::InvalidConfig(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if !(self.wiener >= 0.0) {
            return Err(ComputeError::InvalidConfig(format!(
                "wiener constant must be >= 0, got {}",
                self.wiener
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Processing Context
// ============================================================================

struct IterativeState {
    backend: Box<dyn RestorationBackend>,
    otf: Arc<ResampledOtf>,
}

/// Batch-scoped restoration state, built from the first volume.
///
/// Holds the FFT plans, the OTF (raw and resampled), the geometry and the
/// backend. Read-only once built.
pub struct ProcessingContext {
    config: DeconConfig,
    input: Extents,
    cropped: Extents,
    crop: bool,
    geometry: Geometry,
    working: Extents,
    plan: Arc<FftPlan3d>,
    otf: Arc<OtfTable>,
    wiener: WienerParams,
    iterative: Option<IterativeState>,
}

impl ProcessingContext {
    /// Sets up a batch whose volumes all have `first` extents.
    ///
    /// Y and Z (and X, unless deskewing) are padded to fast FFT lengths.
    ///
    /// # Errors
    ///
    /// - [`ComputeError::InvalidConfig`] for unusable settings
    /// - [`ComputeError::PlanCreation`] if FFT plans cannot be built; the
    ///   batch cannot run without them
    /// - [`ComputeError::BackendNotAvailable`] for an unavailable backend
    pub fn new(config: DeconConfig, first: Extents, otf: OtfTable) -> ComputeResult<Self> {
        trace!(%first, ?config, "ProcessingContext::new");
        config.validate()?;
        first.validate()?;

        let deskewing = config.deskew_angle != 0.0;
        let nx = if deskewing { first.nx } else { optimal_dimension(first.nx) };
        let cropped = Extents::new(nx, optimal_dimension(first.ny), optimal_dimension(first.nz));
        let crop = cropped != first;
        if crop {
            warn!(from = %first, to = %cropped, "padding volumes to FFT-friendly extents");
        }

        let geometry = Geometry::derive(&config.acquisition(), cropped.nx, cropped.nz)?;
        let working = geometry.working_extents(cropped);

        let plan = FftPlan3d::new(working).map_err(|e| ComputeError::PlanCreation(e.to_string()))?;

        let otf_steps = otf.steps(config.psf_pixel_size, config.psf_z_step);
        let steps = FrequencySteps::for_grid(working, config.pixel_size, geometry.z_step);
        let wiener = WienerParams {
            steps,
            otf_steps,
            radial_cutoff: radial_cutoff(config.na, config.wavelength),
            wiener: config.wiener,
        };
        debug!(?steps, ?otf_steps, cutoff = wiener.radial_cutoff, "frequency grid");

        let iterative = if config.is_iterative() {
            let choice = match memory::backend_override() {
                Some(name) => name.parse()?,
                None => config.backend,
            };
            let backend = create_backend(choice)?;
            let resampled =
                ResampledOtf::resample(&otf, working, steps.to_otf_units(otf_steps)).normalized();
            Some(IterativeState {
                backend,
                otf: Arc::new(resampled),
            })
        } else {
            None
        };

        let needed = memory::working_set(working, iterative.is_some());
        let budget = memory::available_memory();
        if needed > budget {
            warn!(
                needed = %memory::format_bytes(needed),
                budget = %memory::format_bytes(budget),
                "working set exceeds memory budget"
            );
        }

        info!(
            input = %first,
            working = %working,
            mode = if iterative.is_some() { "richardson-lucy" } else { "wiener" },
            backend = iterative.as_ref().map(|s| s.backend.name()).unwrap_or("-"),
            deskew = geometry.deskew.is_some(),
            rotate = geometry.rotation.is_some(),
            "batch initialized"
        );

        Ok(Self {
            config,
            input: first,
            cropped,
            crop,
            geometry,
            working,
            plan: Arc::new(plan),
            otf: Arc::new(otf),
            wiener,
            iterative,
        })
    }

    /// Batch configuration.
    pub fn config(&self) -> &DeconConfig {
        &self.config
    }

    /// Extents every input volume must have.
    pub fn input_extents(&self) -> Extents {
        self.input
    }

    /// Extents after padding to fast FFT lengths.
    pub fn cropped_extents(&self) -> Extents {
        self.cropped
    }

    /// Whether inputs are resized before processing.
    pub fn crops(&self) -> bool {
        self.crop
    }

    /// Extents the FFT plans are bound to (after deskewing).
    pub fn working_extents(&self) -> Extents {
        self.working
    }

    /// Derived geometry.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Name of the iterative backend, `None` in one-shot mode.
    pub fn backend_name(&self) -> Option<&'static str> {
        self.iterative.as_ref().map(|s| s.backend.name())
    }

    /// Restores one volume.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::ExtentMismatch`] if `volume` differs in size
    /// from the batch's first volume.
    pub fn process(&self, volume: Volume) -> ComputeResult<Restored> {
        if volume.extents() != self.input {
            return Err(ComputeError::ExtentMismatch {
                expected: self.input,
                actual: volume.extents(),
            });
        }

        let background = self.config.background;
        let mut volume = if self.crop {
            volume.resized(self.cropped, background)
        } else {
            volume
        };

        // Sheared copy of the input as acquired, before any correction.
        let raw = (self.config.save_deskewed_raw && self.geometry.deskew.is_some())
            .then(|| volume.clone());

        volume.subtract(background);
        apodize(self.config.apodize, &mut volume);

        match self.iterative {
            Some(ref state) => self.restore_iterative(state, volume, raw),
            None => self.restore_one_shot(volume, raw),
        }
    }

    fn restore_iterative(
        &self,
        state: &IterativeState,
        mut volume: Volume,
        raw: Option<Volume>,
    ) -> ComputeResult<Restored> {
        // Negative intensities would corrupt the multiplicative updates.
        volume.clamp_min(0.0);

        let fused = state.backend.fuses_geometry();
        let (observed, host_raw) = if fused {
            (volume, None)
        } else {
            self.host_deskew(volume, raw.as_ref())
        };

        let params = RestoreParams {
            iterations: self.config.iterations,
            otf: &state.otf,
            plan: &self.plan,
            deskew: if fused { self.geometry.deskew } else { None },
            rotation: if fused { self.geometry.rotation } else { None },
            raw: if fused { raw.as_ref() } else { None },
        };
        let mut restored = state.backend.restore(observed, &params)?;

        if !fused {
            if let Some(ref matrix) = self.geometry.rotation {
                restored.volume = rotate(&restored.volume, matrix)?;
            }
            restored.deskewed_raw = host_raw;
        }
        Ok(restored)
    }

    fn restore_one_shot(&self, volume: Volume, raw: Option<Volume>) -> ComputeResult<Restored> {
        let (mut volume, deskewed_raw) = self.host_deskew(volume, raw.as_ref());

        let mut spectrum = HalfSpectrum::new(self.working);
        self.plan.forward(&volume, &mut spectrum)?;
        wiener_filter(&mut spectrum, &self.otf, &self.wiener)?;
        self.plan.inverse(&mut spectrum, &mut volume)?;
        volume.scale(self.plan.normalization());

        if let Some(ref matrix) = self.geometry.rotation {
            volume = rotate(&volume, matrix)?;
        }
        Ok(Restored {
            volume,
            deskewed_raw,
        })
    }

    /// Deskews on the host, along with the untouched input when given.
    fn host_deskew(&self, volume: Volume, raw: Option<&Volume>) -> (Volume, Option<Volume>) {
        let Some(ref shear) = self.geometry.deskew else {
            return (volume, None);
        };
        let sheared = deskew(&volume, shear);
        (sheared, raw.map(|r| deskew(r, shear)))
    }
}

// ============================================================================
// Batch Runner
// ============================================================================

/// Result of a batch run.
#[cfg(feature = "io")]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    /// Number of volumes restored.
    pub processed: usize,
    /// Every file written, in order.
    pub outputs: Vec<PathBuf>,
}

/// Restores every `.tif` in `input_dir` whose name contains `pattern`.
///
/// Restored volumes go to `<input_dir>/Decon/<stem>_decon.tif`, deskewed raw
/// volumes (if requested) to `<input_dir>/Deskewed/<stem>_deskewed.tif`.
/// An empty match set is not an error.
#[cfg(feature = "io")]
pub fn run_batch(
    config: &DeconConfig,
    input_dir: &Path,
    pattern: &str,
    otf_path: &Path,
) -> ComputeResult<BatchSummary> {
    trace!(dir = %input_dir.display(), pattern, otf = %otf_path.display(), "run_batch");

    let files = discover::matching_files(input_dir, pattern)?;
    let Some((first, rest)) = files.split_first() else {
        warn!(dir = %input_dir.display(), pattern, "no matching input files");
        return Ok(BatchSummary::default());
    };

    let otf = OtfTable::from_packed(&tiff::read_plane(otf_path)?)?;
    info!(nr = otf.nr(), nz = otf.nz(), path = %otf_path.display(), "loaded OTF");

    let mut summary = BatchSummary::default();
    let volume = tiff::read(first)?;
    let context = ProcessingContext::new(config.clone(), volume.extents(), otf)?;
    process_file(&context, first, volume, &mut summary)?;

    for path in rest {
        let volume = tiff::read(path)?;
        process_file(&context, path, volume, &mut summary)?;
    }

    info!(processed = summary.processed, "batch finished");
    Ok(summary)
}

#[cfg(feature = "io")]
fn process_file(
    context: &ProcessingContext,
    path: &Path,
    volume: Volume,
    summary: &mut BatchSummary,
) -> ComputeResult<()> {
    info!(path = %path.display(), extents = %volume.extents(), "restoring");
    let restored = context.process(volume)?;

    let out = paths::output_path(path, paths::DECON_SUBDIR, paths::DECON_SUFFIX)?;
    paths::ensure_parent(&out)?;
    tiff::write(&out, &restored.volume)?;
    summary.outputs.push(out);

    if let Some(raw) = restored.deskewed_raw {
        let out = paths::output_path(path, paths::DESKEWED_SUBDIR, paths::DESKEWED_SUFFIX)?;
        paths::ensure_parent(&out)?;
        tiff::write(&out, &raw)?;
        summary.outputs.push(out);
    }

    summary.processed += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_otf() -> OtfTable {
        OtfTable::new(129, 64, vec![lsdecon_ops::Complex32::new(1.0, 0.0); 129 * 64]).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = DeconConfig::default();
        assert_eq!(config.iterations, 15);
        assert_eq!(config.background, 90.0);
        assert_eq!(config.backend, Backend::Gpu);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_pixel_size() {
        let config = DeconConfig {
            pixel_size: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ComputeError::InvalidConfig(_))));
    }

    #[test]
    fn test_odd_y_raises_crop() {
        let config = DeconConfig {
            iterations: 0,
            ..Default::default()
        };
        let ctx = ProcessingContext::new(config, Extents::new(64, 250, 16), unit_otf()).unwrap();
        assert!(ctx.crops());
        assert_eq!(ctx.cropped_extents(), Extents::new(64, 252, 16));
        assert!(ctx.backend_name().is_none());
    }

    #[test]
    fn test_deskew_keeps_input_width() {
        let config = DeconConfig {
            iterations: 0,
            deskew_angle: 30.0,
            ..Default::default()
        };
        let ctx = ProcessingContext::new(config, Extents::new(250, 64, 32), unit_otf()).unwrap();
        assert_eq!(ctx.cropped_extents().nx, 250);
        assert!(ctx.working_extents().nx > 250);
        assert!(ctx.geometry().deskew.is_some());
    }
}
