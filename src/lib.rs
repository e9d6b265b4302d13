//! # Chart Calibration
//!
//! A Rust crate for color-correcting batches of photographs from one shot
//! of a reference color chart.
//!
//! This library builds a reusable correction by:
//! - Aligning a chart's patch grid to a region of interest in the chart image
//! - Sampling each patch with a robust per-channel statistic
//! - Fitting a regression from observed to reference colors in a working space
//! - Applying the fitted correction to every image of a batch
//!
//! ## Example
//!
//! ```rust,no_run
//! use chart_calibration::{apply_recipe, build_recipe, ColorCharts, ColorSpace, MappingMethod, Roi};
//! use chart_calibration::image_loader::load_image;
//! use std::path::Path;
//!
//! let chart_image = load_image(Path::new("chart.tif"))?;
//! let roi = Roi::from_rect(120.0, 80.0, 600.0, 400.0);
//! let recipe = build_recipe(
//!     &chart_image,
//!     &roi,
//!     &ColorCharts::color_checker_24(),
//!     ColorSpace::LinearRgb,
//!     MappingMethod::LinearCrossBand,
//! )?;
//! let corrected = apply_recipe(&recipe, &load_image(Path::new("shot.tif"))?)?;
//! # Ok::<(), chart_calibration::CalibrationError>(())
//! ```

use image::DynamicImage;
use tracing::{info, warn};

pub mod batch;
pub mod calibration;
pub mod chart;
pub mod color;
pub mod config;
pub mod constants;
pub mod error;
pub mod image_loader;

pub use batch::{BatchApplicator, BatchFailure, BatchReport, BatchStage};
pub use calibration::{
    CalibrationQualityWarning, ColorCalibrator, CorrectionRecipe, Corrector, FitDiagnostics, ImagePixelType,
    MappingMethod, PatchSampler, QualityThresholds, SampledColor,
};
pub use chart::{AlignedChart, ChartCatalog, ColorCharts, GridChart, Roi, TransformKind};
pub use color::{ChannelStatistic, ColorConverter, ColorSpace, ReferenceWhite};
pub use config::CalibrationConfig;
pub use error::{CalibrationError, Result};

/// Tunables for [`calibrate`] beyond space and method
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CalibrationOptions {
    /// Chart alignment model; `None` uses perspective for 4 ROI points
    /// and affine otherwise
    pub transform: Option<TransformKind>,
    pub sampler: PatchSampler,
    pub thresholds: QualityThresholds,
}

impl CalibrationOptions {
    fn transform_for(&self, roi: &Roi) -> TransformKind {
        self.transform.unwrap_or(if roi.len() == 4 {
            TransformKind::Perspective
        } else {
            TransformKind::Affine
        })
    }
}

/// Recipe together with how well it reproduces the chart
#[derive(Debug, Clone)]
pub struct CalibrationOutcome {
    pub recipe: CorrectionRecipe,
    pub diagnostics: FitDiagnostics,
    /// Set when the fit exceeds the quality thresholds; the recipe is still usable
    pub warning: Option<CalibrationQualityWarning>,
}

/// Build a correction recipe from one chart image
///
/// Uses default sampling, automatic alignment model and ignores fit quality.
/// See [`calibrate`] for diagnostics.
///
/// # Errors
///
/// Returns `CalibrationError` if:
/// - The ROI cannot define the chart transform
/// - A patch lies outside the image
/// - The image is not RGB
/// - The chart has fewer enabled patches than the method needs
pub fn build_recipe(
    chart_image: &DynamicImage,
    roi: &Roi,
    chart_template: &GridChart,
    reference_space: ColorSpace,
    method: MappingMethod,
) -> Result<CorrectionRecipe> {
    calibrate(
        chart_image,
        roi,
        chart_template,
        reference_space,
        method,
        &CalibrationOptions::default(),
    )
    .map(|outcome| outcome.recipe)
}

/// Build a correction recipe and report the fit quality
pub fn calibrate(
    chart_image: &DynamicImage,
    roi: &Roi,
    chart_template: &GridChart,
    reference_space: ColorSpace,
    method: MappingMethod,
    options: &CalibrationOptions,
) -> Result<CalibrationOutcome> {
    let image_pixel_type = ImagePixelType::of(chart_image)?;
    let aligned = chart_template.align_to(roi, options.transform_for(roi))?;
    let calibrator = ColorCalibrator::new(aligned, reference_space, method).with_sampler(options.sampler);
    let fit = calibrator.compute_calibration_mapping(chart_image)?;

    let recipe = CorrectionRecipe::new(
        fit.corrector,
        chart_template.color_converter(),
        reference_space,
        image_pixel_type,
    )?;

    let warning = fit.diagnostics.check(&options.thresholds);
    match &warning {
        Some(w) => warn!("{}", w),
        None => info!(
            chart = chart_template.name(),
            method = %method,
            space = %reference_space,
            pixel_type = %image_pixel_type,
            "correction recipe built"
        ),
    }

    Ok(CalibrationOutcome {
        recipe,
        diagnostics: fit.diagnostics,
        warning,
    })
}

/// Correct one image with a recipe, writing sRGB in the recipe's pixel layout
pub fn apply_recipe(recipe: &CorrectionRecipe, image: &DynamicImage) -> Result<DynamicImage> {
    BatchApplicator::new(recipe.clone()).correct(image)
}
