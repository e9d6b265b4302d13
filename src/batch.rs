//! Batch application of a correction recipe
//!
//! Each pixel goes device RGB → working space → corrector → output space
//! and is written back in the recipe's pixel layout. Rows of an image are
//! corrected in parallel; a batch fans out over a file list with every
//! file reporting its own outcome.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::DynamicImage;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::calibration::{CorrectionRecipe, ImagePixelType};
use crate::color::ColorSpace;
use crate::{CalibrationError, Result};

/// Step of the per-file pipeline where a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    Load,
    Correct,
    Save,
    Cancelled,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchStage::Load => "load",
            BatchStage::Correct => "correct",
            BatchStage::Save => "save",
            BatchStage::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// One file that could not be corrected
#[derive(Debug)]
pub struct BatchFailure {
    pub source: PathBuf,
    pub stage: BatchStage,
    pub error: CalibrationError,
}

/// Outcome of a batch run, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<PathBuf>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies a recipe to images
#[derive(Debug, Clone)]
pub struct BatchApplicator {
    recipe: Arc<CorrectionRecipe>,
    output_space: ColorSpace,
    cancel: Option<Arc<AtomicBool>>,
}

impl BatchApplicator {
    /// Applicator writing device RGB (sRGB) output
    pub fn new(recipe: impl Into<Arc<CorrectionRecipe>>) -> Self {
        Self {
            recipe: recipe.into(),
            output_space: ColorSpace::DeviceRgb,
            cancel: None,
        }
    }

    /// Write output in another RGB space
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedSpace` if `space` cannot be stored in RGB bands
    pub fn with_output_space(mut self, space: ColorSpace) -> Result<Self> {
        space.require_rgb()?;
        self.output_space = space;
        Ok(self)
    }

    /// Skip files not yet started once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn recipe(&self) -> &CorrectionRecipe {
        &self.recipe
    }

    pub fn output_space(&self) -> ColorSpace {
        self.output_space
    }

    /// Correct one image
    ///
    /// Any supported RGB depth is accepted; the result uses the recipe's
    /// pixel layout, clamped to its representable range.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedPixelType` if the image is not RGB
    pub fn correct(&self, image: &DynamicImage) -> Result<DynamicImage> {
        ImagePixelType::of(image)?;
        let (width, height) = (image.width(), image.height());
        let mut data = image.to_rgb32f().into_raw();

        let recipe = &*self.recipe;
        let output_space = self.output_space;
        let row_len = (width as usize * 3).max(3);
        data.par_chunks_mut(row_len).for_each(|row| {
            for pixel in row.chunks_exact_mut(3) {
                let device = [pixel[0] as f64, pixel[1] as f64, pixel[2] as f64];
                let out = recipe.correct_color(device, output_space);
                pixel[0] = out[0] as f32;
                pixel[1] = out[1] as f32;
                pixel[2] = out[2] as f32;
            }
        });

        recipe.image_pixel_type().encode(width, height, data)
    }

    /// Correct every file, loading and saving through the given functions
    ///
    /// Failures never stop other files. When the cancel flag is set, files
    /// not yet started are reported with stage `Cancelled`.
    pub fn run<L, S>(&self, files: &[PathBuf], load: L, save: S) -> BatchReport
    where
        L: Fn(&Path) -> Result<DynamicImage> + Sync,
        S: Fn(&Path, &DynamicImage) -> Result<()> + Sync,
    {
        info!(files = files.len(), output_space = %self.output_space, "starting batch correction");

        let outcomes: Vec<std::result::Result<PathBuf, BatchFailure>> = files
            .par_iter()
            .map(|path| self.process_file(path, &load, &save))
            .collect();

        let mut report = BatchReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(path) => report.succeeded.push(path),
                Err(failure) => {
                    warn!(
                        file = %failure.source.display(),
                        stage = %failure.stage,
                        error = %failure.error,
                        "batch item failed"
                    );
                    report.failures.push(failure);
                }
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failures.len(),
            "batch correction finished"
        );
        report
    }

    fn process_file<L, S>(&self, path: &Path, load: &L, save: &S) -> std::result::Result<PathBuf, BatchFailure>
    where
        L: Fn(&Path) -> Result<DynamicImage>,
        S: Fn(&Path, &DynamicImage) -> Result<()>,
    {
        let fail = |stage, error| BatchFailure {
            source: path.to_path_buf(),
            stage,
            error,
        };

        if self.is_cancelled() {
            return Err(fail(BatchStage::Cancelled, CalibrationError::Cancelled));
        }
        let image = load(path).map_err(|e| fail(BatchStage::Load, e))?;
        let corrected = self.correct(&image).map_err(|e| fail(BatchStage::Correct, e))?;
        save(path, &corrected).map_err(|e| fail(BatchStage::Save, e))?;

        debug!(file = %path.display(), "corrected");
        Ok(path.to_path_buf())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Corrector;
    use crate::color::{ColorConverter, ReferenceWhite};
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;

    fn gain_recipe(pixel_type: ImagePixelType) -> CorrectionRecipe {
        CorrectionRecipe::new(
            Corrector::Linear {
                gain: [2.0, 1.0, 0.5],
                offset: [0.0; 3],
            },
            ColorConverter::new(ReferenceWhite::D65),
            ColorSpace::LinearRgb,
            pixel_type,
        )
        .unwrap()
    }

    #[test]
    fn test_correct_applies_in_working_space_and_clamps() {
        let applicator = BatchApplicator::new(gain_recipe(ImagePixelType::Rgb8));
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([200, 128, 255])));
        let out = applicator.correct(&img).unwrap();
        let px = out.as_rgb8().unwrap().get_pixel(2, 1).0;

        // Red doubles in linear light and saturates, blue halves
        assert_eq!(px[0], 255);
        assert!((px[1] as i32 - 128).abs() <= 1);
        let expected_blue = ColorConverter::default().convert([0.0, 0.0, 0.5], ColorSpace::LinearRgb, ColorSpace::DeviceRgb)[2];
        assert!((px[2] as f64 - expected_blue * 255.0).abs() <= 1.0);
    }

    #[test]
    fn test_output_uses_recipe_pixel_type() {
        let applicator = BatchApplicator::new(gain_recipe(ImagePixelType::Rgb16));
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        assert!(applicator.correct(&img).unwrap().as_rgb16().is_some());
    }

    #[test]
    fn test_linear_output_space() {
        let applicator = BatchApplicator::new(gain_recipe(ImagePixelType::Rgb32F))
            .with_output_space(ColorSpace::LinearRgb)
            .unwrap();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 255, 255])));
        let px = applicator.correct(&img).unwrap().as_rgb32f().unwrap().get_pixel(0, 0).0;
        assert!((px[1] - 1.0).abs() < 1e-5);
        assert!((px[2] - 0.5).abs() < 1e-5);

        assert!(BatchApplicator::new(gain_recipe(ImagePixelType::Rgb8))
            .with_output_space(ColorSpace::Lab)
            .is_err());
    }

    #[test]
    fn test_float_output_is_clamped() {
        let applicator = BatchApplicator::new(gain_recipe(ImagePixelType::Rgb32F));
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([200, 128, 128])));
        let px = applicator.correct(&img).unwrap().as_rgb32f().unwrap().get_pixel(1, 1).0;

        // Doubled red leaves the sRGB range and saturates like the integer layouts
        assert_eq!(px[0], 1.0);
        assert!((px[1] - 128.0 / 255.0).abs() < 1e-4);
        assert!(px.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_empty_image() {
        let applicator = BatchApplicator::new(gain_recipe(ImagePixelType::Rgb8));
        let out = applicator.correct(&DynamicImage::ImageRgb8(RgbImage::new(0, 0))).unwrap();
        assert_eq!(out.width(), 0);
    }

    #[test]
    fn test_run_isolates_failures() {
        let applicator = BatchApplicator::new(gain_recipe(ImagePixelType::Rgb8));
        let files: Vec<PathBuf> = (0..5).map(|i| PathBuf::from(format!("img{}.png", i))).collect();
        let saved = Mutex::new(Vec::new());

        let report = applicator.run(
            &files,
            |path| {
                if path == Path::new("img1.png") {
                    Err(CalibrationError::ImageLoadError {
                        message: "truncated".to_string(),
                        source: None,
                    })
                } else if path == Path::new("img3.png") {
                    Ok(DynamicImage::ImageLuma8(image::GrayImage::new(2, 2)))
                } else {
                    Ok(DynamicImage::ImageRgb8(RgbImage::new(2, 2)))
                }
            },
            |path, _| {
                saved.lock().unwrap().push(path.to_path_buf());
                Ok(())
            },
        );

        assert_eq!(report.total(), 5);
        assert_eq!(report.succeeded.len(), 3);
        assert_eq!(report.failures[0].stage, BatchStage::Load);
        assert_eq!(report.failures[1].stage, BatchStage::Correct);
        assert_eq!(report.failures[1].source, PathBuf::from("img3.png"));
        assert_eq!(saved.lock().unwrap().len(), 3);
        assert!(!report.is_success());
    }

    #[test]
    fn test_cancelled_batch() {
        let flag = Arc::new(AtomicBool::new(true));
        let applicator = BatchApplicator::new(gain_recipe(ImagePixelType::Rgb8)).with_cancel_flag(flag);
        let files = vec![PathBuf::from("a.png"), PathBuf::from("b.png")];
        let report = applicator.run(
            &files,
            |_| Ok(DynamicImage::ImageRgb8(RgbImage::new(1, 1))),
            |_, _| Ok(()),
        );
        assert!(report.succeeded.is_empty());
        assert!(report
            .failures
            .iter()
            .all(|f| f.stage == BatchStage::Cancelled && matches!(f.error, CalibrationError::Cancelled)));
    }
}
