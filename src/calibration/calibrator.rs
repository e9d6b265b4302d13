//! Chart calibration session
//!
//! Binds an aligned chart to a working space and mapping method, then turns
//! one chart image into a fitted corrector.

use image::DynamicImage;
use tracing::{debug, info};

use super::mapping::{Corrector, FitDiagnostics, MappingFitter, MappingMethod};
use super::sampler::{PatchSampler, SampledColor};
use crate::chart::AlignedChart;
use crate::color::ColorSpace;
use crate::Result;

/// Everything produced by fitting one chart image
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationFit {
    pub corrector: Corrector,
    pub diagnostics: FitDiagnostics,
    /// Device RGB patch samples the fit was computed from
    pub samples: Vec<SampledColor>,
}

/// Computes color mappings for a chart placed in an image
#[derive(Debug, Clone)]
pub struct ColorCalibrator {
    aligned: AlignedChart,
    reference_space: ColorSpace,
    method: MappingMethod,
    sampler: PatchSampler,
}

impl ColorCalibrator {
    pub fn new(aligned: AlignedChart, reference_space: ColorSpace, method: MappingMethod) -> Self {
        Self {
            aligned,
            reference_space,
            method,
            sampler: PatchSampler::default(),
        }
    }

    /// Use a different patch sampler (e.g. trimmed mean statistic)
    pub fn with_sampler(mut self, sampler: PatchSampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn aligned_chart(&self) -> &AlignedChart {
        &self.aligned
    }

    pub fn reference_space(&self) -> ColorSpace {
        self.reference_space
    }

    pub fn method(&self) -> MappingMethod {
        self.method
    }

    /// Sample the chart in `image` and fit the mapping
    ///
    /// # Errors
    ///
    /// Propagates sampler and fitter errors: `UnsupportedPixelType`,
    /// `EmptyPatchSample`, `UnderdeterminedFit`, `NumericalFailure`
    pub fn compute_calibration_mapping(&self, image: &DynamicImage) -> Result<CalibrationFit> {
        debug!(
            chart = self.aligned.chart().name(),
            width = image.width(),
            height = image.height(),
            "computing calibration mapping"
        );
        let samples = self.sampler.sample(&self.aligned, image)?;
        let fitter = MappingFitter::new(self.method, self.reference_space);
        let (corrector, diagnostics) = fitter.fit(&samples, &self.aligned)?;

        info!(
            method = %self.method,
            space = %self.reference_space,
            patches = samples.len(),
            mean_delta_e = format!("{:.2}", diagnostics.mean_delta_e),
            max_delta_e = format!("{:.2}", diagnostics.max_delta_e),
            "calibration mapping computed"
        );
        Ok(CalibrationFit {
            corrector,
            diagnostics,
            samples,
        })
    }
}
