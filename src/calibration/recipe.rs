//! Reusable correction recipe
//!
//! A recipe captures everything needed to correct further images shot under
//! the same conditions as the chart image: the fitted corrector, the color
//! converter it was fitted with, the working space and the pixel layout of
//! the chart image.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::mapping::Corrector;
use super::pixel::ImagePixelType;
use crate::color::{ColorConverter, ColorSpace};
use crate::{CalibrationError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRecipe {
    corrector: Corrector,
    color_converter: ColorConverter,
    reference_space: ColorSpace,
    image_pixel_type: ImagePixelType,
}

impl CorrectionRecipe {
    /// # Errors
    ///
    /// Returns `UnsupportedSpace` if `reference_space` is not a fitting
    /// space, or an error if the corrector coefficients are malformed
    pub fn new(
        corrector: Corrector,
        color_converter: ColorConverter,
        reference_space: ColorSpace,
        image_pixel_type: ImagePixelType,
    ) -> Result<Self> {
        reference_space.require_fitting_space()?;
        corrector.validate()?;
        Ok(Self {
            corrector,
            color_converter,
            reference_space,
            image_pixel_type,
        })
    }

    pub fn corrector(&self) -> &Corrector {
        &self.corrector
    }

    pub fn color_converter(&self) -> &ColorConverter {
        &self.color_converter
    }

    /// Working space the corrector operates in
    pub fn reference_space(&self) -> ColorSpace {
        self.reference_space
    }

    /// Pixel layout corrected images are written in
    pub fn image_pixel_type(&self) -> ImagePixelType {
        self.image_pixel_type
    }

    /// Correct one device RGB color, returning it in `output_space`
    pub fn correct_color(&self, device_rgb: [f64; 3], output_space: ColorSpace) -> [f64; 3] {
        let working = self
            .color_converter
            .convert(device_rgb, ColorSpace::DeviceRgb, self.reference_space);
        let corrected = self.corrector.apply(working);
        self.color_converter
            .convert(corrected, self.reference_space, output_space)
    }

    /// Load a recipe saved with [`to_json_file`](Self::to_json_file)
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CalibrationError::config(format!("cannot read recipe {}", path.display()), e))?;
        let recipe: Self = serde_json::from_str(&content)
            .map_err(|e| CalibrationError::config(format!("invalid recipe {}", path.display()), e))?;
        recipe.reference_space.require_fitting_space()?;
        recipe.corrector.validate()?;
        debug!(path = %path.display(), method = %recipe.corrector.method(), "loaded recipe");
        Ok(recipe)
    }

    /// Save the recipe as pretty-printed JSON
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CalibrationError::config("cannot serialize recipe", e))?;
        fs::write(path, content)
            .map_err(|e| CalibrationError::config(format!("cannot write recipe {}", path.display()), e))?;
        debug!(path = %path.display(), "saved recipe");
        Ok(())
    }
}
