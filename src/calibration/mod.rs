//! Chart sampling and color mapping module
//!
//! This module samples patch colors from a chart image, fits the
//! correction mapping and packages it into a reusable recipe.

pub mod calibrator;
pub mod mapping;
pub mod pixel;
pub mod recipe;
pub mod sampler;

pub use calibrator::{CalibrationFit, ColorCalibrator};
pub use mapping::{
    fit_vectors, CalibrationQualityWarning, Corrector, FitDiagnostics, MappingFitter, MappingMethod,
    PatchResidual, QualityThresholds,
};
pub use pixel::ImagePixelType;
pub use recipe::CorrectionRecipe;
pub use sampler::{PatchSampler, SampledColor};
