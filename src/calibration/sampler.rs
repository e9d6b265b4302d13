//! Patch color sampling from an aligned chart
//!
//! For every enabled patch the sampler collects the pixels whose centers
//! fall inside the patch sampling quad and reduces them to one device RGB
//! color with a robust per-channel statistic.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::pixel::RgbView;
use crate::chart::{AlignedChart, AlignedPatch};
use crate::color::{summarize, ChannelStatistic};
use crate::{CalibrationError, Result};

/// Representative color of one chart patch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampledColor {
    /// 1-based chart patch id
    pub patch_id: usize,
    /// Normalized device RGB
    pub value: [f64; 3],
    /// Number of pixels inside the sampling region
    pub pixel_count: usize,
    /// Per-channel standard deviation of the sampled pixels
    pub std_dev: [f64; 3],
}

/// Samples patch colors from chart images
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchSampler {
    statistic: ChannelStatistic,
}

impl PatchSampler {
    pub fn new(statistic: ChannelStatistic) -> Result<Self> {
        statistic.validate()?;
        Ok(Self { statistic })
    }

    pub fn statistic(&self) -> ChannelStatistic {
        self.statistic
    }

    /// Sample every enabled patch, in chart order
    ///
    /// # Errors
    ///
    /// - `UnsupportedPixelType` if the image is not RGB
    /// - `EmptyPatchSample` if a sampling region covers no pixel center
    pub fn sample(&self, aligned: &AlignedChart, image: &image::DynamicImage) -> Result<Vec<SampledColor>> {
        let view = RgbView::new(image)?;
        let patches: Vec<&AlignedPatch> = aligned.enabled_patches().collect();

        let samples = patches
            .par_iter()
            .map(|patch| self.sample_patch(patch, &view))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            chart = aligned.chart().name(),
            patches = samples.len(),
            statistic = %self.statistic,
            "sampled chart patches"
        );
        Ok(samples)
    }

    fn sample_patch(&self, patch: &AlignedPatch, view: &RgbView<'_>) -> Result<SampledColor> {
        let pixels = collect_pixels(patch, view);
        let summary = summarize(&pixels, self.statistic).ok_or_else(|| CalibrationError::EmptyPatchSample {
            patch_id: patch.id,
            patch_name: patch.name.clone(),
        })?;

        Ok(SampledColor {
            patch_id: patch.id,
            value: summary.value,
            pixel_count: summary.pixel_count,
            std_dev: summary.std_dev,
        })
    }
}

/// Pixels whose center `(x + 0.5, y + 0.5)` lies inside the sampling quad
fn collect_pixels(patch: &AlignedPatch, view: &RgbView<'_>) -> Vec<[f64; 3]> {
    let (width, height) = view.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let (min_x, min_y, max_x, max_y) = patch.sampling_bounds();

    // Pixel index range whose centers can fall inside the bounds
    let x0 = (min_x - 0.5).ceil().max(0.0);
    let y0 = (min_y - 0.5).ceil().max(0.0);
    let x1 = (max_x - 0.5).floor().min(width as f64 - 1.0);
    let y1 = (max_y - 0.5).floor().min(height as f64 - 1.0);
    if x0 > x1 || y0 > y1 {
        return Vec::new();
    }

    let mut pixels = Vec::new();
    for y in (y0 as u32)..=(y1 as u32) {
        for x in (x0 as u32)..=(x1 as u32) {
            if patch.samples(x as f64 + 0.5, y as f64 + 0.5) {
                pixels.push(view.get(x, y));
            }
        }
    }
    pixels
}
