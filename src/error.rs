//! Error types for the chart_calibration library

use thiserror::Error;

use crate::calibration::MappingMethod;
use crate::chart::TransformKind;

/// Result type alias for chart_calibration operations
pub type Result<T> = std::result::Result<T, CalibrationError>;

/// Error kinds raised while building or applying a correction recipe
#[derive(Error, Debug)]
pub enum CalibrationError {
    /// Color space name is unknown or the space cannot be used at this stage
    #[error("Unsupported color space: {name} ({reason})")]
    UnsupportedSpace { name: String, reason: String },

    /// ROI does not carry enough usable control points for the transform
    #[error("Insufficient geometry for {kind} alignment: need {needed} points, got {got} ({reason})")]
    InsufficientGeometry {
        kind: TransformKind,
        needed: usize,
        got: usize,
        reason: String,
    },

    /// A patch sampling region contains no image pixels
    #[error("Patch {patch_id} ({patch_name}) has no pixels inside the image")]
    EmptyPatchSample { patch_id: usize, patch_name: String },

    /// Fewer patches than free coefficients per band
    #[error("Underdetermined {method} fit: need at least {required} patches, got {available}")]
    UnderdeterminedFit {
        method: MappingMethod,
        required: usize,
        available: usize,
    },

    /// Linear algebra failed to produce a usable solution
    #[error("Numerical failure during {stage}: {message}")]
    NumericalFailure { stage: String, message: String },

    /// Image pixel layout is not an RGB layout the engine understands
    #[error("Unsupported pixel type: {description}")]
    UnsupportedPixelType { description: String },

    /// Image file could not be loaded or decoded
    #[error("Failed to load image: {message}")]
    ImageLoadError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Image file could not be encoded or written
    #[error("Failed to save image: {message}")]
    ImageSaveError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration or recipe file could not be read or written
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// Work item skipped because the caller requested cancellation
    #[error("Cancelled before processing started")]
    Cancelled,
}

impl CalibrationError {
    /// Create an image load error with context
    pub fn image_load<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ImageLoadError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an image save error with context
    pub fn image_save<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ImageSaveError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error with context
    pub fn config<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ConfigError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn numerical(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NumericalFailure {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Check if this error only affects a single batch item
    ///
    /// Recipe construction errors are fatal to the calibration session;
    /// per-image errors leave the rest of a batch untouched.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CalibrationError::ImageLoadError { .. }
                | CalibrationError::ImageSaveError { .. }
                | CalibrationError::UnsupportedPixelType { .. }
                | CalibrationError::Cancelled
        )
    }

    /// Get user-friendly error description for application display
    pub fn user_message(&self) -> String {
        match self {
            CalibrationError::InsufficientGeometry { needed, got, .. } => {
                format!(
                    "The chart ROI needs {} usable corner points but {} were given. Please outline the chart corners.",
                    needed, got
                )
            }
            CalibrationError::EmptyPatchSample { patch_id, patch_name } => {
                format!(
                    "Chart patch {} ({}) lies outside the image. Please check the chart ROI.",
                    patch_id, patch_name
                )
            }
            CalibrationError::UnderdeterminedFit { method, required, available } => {
                format!(
                    "The {} mapping needs at least {} chart patches but only {} are enabled. Choose a simpler mapping method.",
                    method, required, available
                )
            }
            CalibrationError::UnsupportedPixelType { .. } => {
                "The image is not an RGB image. Only 8-bit, 16-bit and floating point RGB images can be corrected.".to_string()
            }
            CalibrationError::ImageLoadError { .. } => {
                "Could not load the image. Please check the file format and try again.".to_string()
            }
            _ => "Color calibration failed. Please check the chart image and settings.".to_string(),
        }
    }
}
