//! Configuration structures for the chart_calibration batch pipeline.
//!
//! This module defines everything a batch run needs: which chart was shot,
//! where it sits in the chart image, how to fit the correction and which
//! images to correct.
//!
//! # Configuration Loading
//!
//! Configuration can be loaded from JSON files or constructed programmatically:
//!
//! ```no_run
//! use chart_calibration::CalibrationConfig;
//! use std::path::Path;
//!
//! // Load from file
//! let config = CalibrationConfig::from_json_file(Path::new("config.json"))?;
//!
//! // Or use defaults
//! let config = CalibrationConfig::default_color_checker();
//! # Ok::<(), chart_calibration::CalibrationError>(())
//! ```
//!
//! # Configuration Sections
//!
//! - [`ChartConfig`]: Built-in or custom chart, patch mask, chip margin
//! - [`CalibrationSettings`]: Chart image, ROI, working space, mapping method
//! - [`SamplingConfig`]: Patch statistic
//! - [`QualityThresholds`]: Fit quality limits
//! - [`BatchConfig`]: Input selection, output space, recipe reuse

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::calibration::{MappingMethod, PatchSampler, QualityThresholds};
use crate::chart::{ChartCatalog, GridChart, Roi, TransformKind, COLOR_CHECKER_24};
use crate::color::{ChannelStatistic, ColorSpace};
use crate::{CalibrationError, CalibrationOptions, Result};

/// Complete configuration for one calibrate-then-correct run.
///
/// Can be serialized to/from JSON for reproducible batch runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Input directory or single image to correct
    pub input_path: PathBuf,

    /// Output directory for corrected images
    pub output_path: PathBuf,

    /// Reference chart
    pub chart: ChartConfig,

    /// Chart image and fitting parameters
    pub calibration: CalibrationSettings,

    /// Patch sampling parameters
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Fit quality limits
    #[serde(default)]
    pub quality: QualityThresholds,

    /// Batch correction parameters
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Where the chart template comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ChartSource {
    /// Chart registered in the built-in catalog, looked up by name
    Builtin { name: String },
    /// Chart defined inline
    Custom { chart: GridChart },
}

/// Reference chart selection.
///
/// The mask and margin override the template's own settings when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(flatten)]
    pub source: ChartSource,

    /// Per-patch switch in chart order; omitted means all patches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_patches: Option<Vec<bool>>,

    /// Fraction of the chip removed on every side before sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chip_margin: Option<f64>,
}

impl ChartConfig {
    /// Resolve the chart template, applying mask and margin overrides
    pub fn resolve(&self, catalog: &ChartCatalog) -> Result<GridChart> {
        let mut chart = match &self.source {
            ChartSource::Builtin { name } => catalog.get(name)?.clone(),
            ChartSource::Custom { chart } => {
                chart.validate()?;
                chart.clone()
            }
        };
        if let Some(mask) = &self.enabled_patches {
            chart = chart.with_enabled_patches(mask)?;
        }
        if let Some(margin) = self.chip_margin {
            chart = chart.with_chip_margin(margin)?;
        }
        Ok(chart)
    }
}

/// Chart image and fitting parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSettings {
    /// Image containing the chart
    pub chart_image: PathBuf,

    /// Chart outline corners in the chart image (TL, TR, BR, BL)
    pub roi: Roi,

    /// Working space the mapping is fitted in: "sRGB", "Linear RGB", "XYZ", "L*a*b*", "LCh"
    pub reference_space: ColorSpace,

    /// Mapping method: "Linear", "Linear Cross-band", "Quadratic Cross-band", "Cubic Cross-band"
    pub method: MappingMethod,

    /// Alignment model; omitted picks perspective for 4 corners, affine otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformKind>,
}

/// Patch sampling parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Per-channel statistic
    pub statistic: ChannelStatistic,
}

/// Batch correction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// File extensions (without dot, case-insensitive) selected from the input directory
    pub extensions: Vec<String>,

    /// Space written to the output images: "sRGB" or "Linear RGB"
    pub output_space: ColorSpace,

    /// Recipe file; saved after calibration, or loaded instead when `reuse_recipe` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_path: Option<PathBuf>,

    /// Load the recipe from `recipe_path` rather than calibrating again
    #[serde(default)]
    pub reuse_recipe: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg".to_string(), "png".to_string(), "tif".to_string(), "tiff".to_string()],
            output_space: ColorSpace::DeviceRgb,
            recipe_path: None,
            reuse_recipe: false,
        }
    }
}

impl CalibrationConfig {
    /// Create default configuration (ColorChecker 24, linear cross-band in sRGB)
    pub fn default_color_checker() -> Self {
        Self {
            input_path: PathBuf::from("batch_correction/src"),
            output_path: PathBuf::from("batch_correction/dst"),
            chart: ChartConfig {
                source: ChartSource::Builtin {
                    name: COLOR_CHECKER_24.to_string(),
                },
                enabled_patches: None,
                chip_margin: None,
            },
            calibration: CalibrationSettings {
                chart_image: PathBuf::from("batch_correction/src/im_1.jpg"),
                roi: Roi::from_rect(0.0, 0.0, 600.0, 400.0),
                reference_space: ColorSpace::DeviceRgb,
                method: MappingMethod::LinearCrossBand,
                transform: None,
            },
            sampling: SamplingConfig::default(),
            quality: QualityThresholds::default(),
            batch: BatchConfig::default(),
        }
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<()> {
        self.batch.output_space.require_rgb()?;
        self.calibration.reference_space.require_fitting_space()?;
        self.sampling.statistic.validate()?;
        if self.batch.reuse_recipe && self.batch.recipe_path.is_none() {
            return Err(CalibrationError::InvalidParameter {
                parameter: "batch.reuse_recipe".to_string(),
                value: "set without batch.recipe_path".to_string(),
            });
        }
        Ok(())
    }

    /// Options for [`calibrate`](crate::calibrate) derived from this configuration
    pub fn calibration_options(&self) -> Result<CalibrationOptions> {
        Ok(CalibrationOptions {
            transform: self.calibration.transform,
            sampler: PatchSampler::new(self.sampling.statistic)?,
            thresholds: self.quality,
        })
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CalibrationError::config(format!("cannot read {}", path.display()), e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| CalibrationError::config(format!("invalid configuration {}", path.display()), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CalibrationError::config("cannot serialize configuration", e))?;
        std::fs::write(path, json)
            .map_err(|e| CalibrationError::config(format!("cannot write {}", path.display()), e))?;
        Ok(())
    }
}
