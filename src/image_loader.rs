//! Image file loading and saving
//!
//! Thin adapter over the `image` crate so the batch pipeline can read and
//! write files. The calibration core itself only sees `DynamicImage` values.
//!
//! ## Supported Formats
//!
//! Whatever the `image` crate decodes: JPEG, PNG, TIFF, WebP, BMP, TGA,
//! OpenEXR, PNM, QOI, HDR and more.
//!
//! ## Design
//!
//! Loaded images are normalized to an RGB layout of matching depth
//! (8-bit, 16-bit or 32-bit float); alpha is dropped and grayscale is
//! expanded. Saved images are reduced to a depth the target format can hold.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, ImageReader};
use tracing::debug;

use crate::error::{CalibrationError, Result};

/// Load an image from disk as RGB
///
/// # Errors
///
/// Returns `CalibrationError::ImageLoadError` if:
/// - File cannot be opened
/// - Format is not supported
/// - Decoding fails
///
/// # Example
///
/// ```rust,no_run
/// use chart_calibration::image_loader::load_image;
/// use std::path::Path;
///
/// let img = load_image(Path::new("photo.jpg"))?;
/// println!("Loaded image: {}x{}", img.width(), img.height());
/// # Ok::<(), chart_calibration::CalibrationError>(())
/// ```
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let reader = ImageReader::open(path)
        .map_err(|e| CalibrationError::image_load(format!("Failed to open image file: {}", path.display()), e))?
        .with_guessed_format()
        .map_err(|e| CalibrationError::image_load(format!("Failed to read image header: {}", path.display()), e))?;

    let img = reader
        .decode()
        .map_err(|e| CalibrationError::image_load(format!("Failed to decode image: {}", path.display()), e))?;

    debug!(path = %path.display(), width = img.width(), height = img.height(), color = ?img.color(), "loaded image");
    Ok(to_rgb_layout(img))
}

/// Convert any decoded layout to the RGB layout of the same depth
pub fn to_rgb_layout(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgb32F(_) => img,
        DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) | DynamicImage::ImageRgba16(_) => {
            DynamicImage::ImageRgb16(img.to_rgb16())
        }
        DynamicImage::ImageRgba32F(_) => DynamicImage::ImageRgb32F(img.to_rgb32f()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Save an image, creating parent directories as needed
///
/// The format follows the file extension.
///
/// # Errors
///
/// Returns `CalibrationError::ImageSaveError` if the extension is unknown,
/// the directory cannot be created or encoding fails
pub fn save_image(image: &DynamicImage, path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(path)
        .map_err(|e| CalibrationError::image_save(format!("Unknown image format for file: {}", path.display()), e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| CalibrationError::image_save(format!("Failed to create directory: {}", parent.display()), e))?;
    }

    encodable(image, format)
        .save_with_format(path, format)
        .map_err(|e| CalibrationError::image_save(format!("Failed to encode image: {}", path.display()), e))?;
    debug!(path = %path.display(), ?format, "saved image");
    Ok(())
}

/// Reduce the pixel layout to one the encoder accepts
fn encodable(image: &DynamicImage, format: ImageFormat) -> Cow<'_, DynamicImage> {
    let is_float = matches!(image, DynamicImage::ImageRgb32F(_));
    let is_wide = !matches!(image, DynamicImage::ImageRgb8(_));
    match format {
        ImageFormat::OpenExr | ImageFormat::Hdr if !is_float => {
            Cow::Owned(DynamicImage::ImageRgb32F(image.to_rgb32f()))
        }
        ImageFormat::Png | ImageFormat::Tiff | ImageFormat::Pnm if is_float => {
            Cow::Owned(DynamicImage::ImageRgb16(image.to_rgb16()))
        }
        ImageFormat::OpenExr | ImageFormat::Hdr | ImageFormat::Png | ImageFormat::Tiff | ImageFormat::Pnm => {
            Cow::Borrowed(image)
        }
        _ if is_wide => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
        _ => Cow::Borrowed(image),
    }
}

/// Destination of a corrected image: same file name inside `output_dir`
pub fn output_path_for(source: &Path, output_dir: &Path) -> PathBuf {
    match source.file_name() {
        Some(name) => output_dir.join(name),
        None => output_dir.join("corrected.png"),
    }
}

/// List the images to process
///
/// A file path is returned as is. A directory is scanned (not recursively)
/// for files whose extension matches `extensions` case-insensitively;
/// the result is sorted by path.
pub fn find_image_files(input: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let entries = fs::read_dir(input)
        .map_err(|e| CalibrationError::image_load(format!("Failed to list directory: {}", input.display()), e))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_extension(path, extensions))
        .collect();
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Get list of all supported file extensions
pub fn supported_extensions() -> &'static [&'static str] {
    &[
        "jpg", "jpeg", "png", "gif", "webp", "tiff", "tif", "bmp", "ico", "tga", "exr", "pbm", "pgm", "ppm", "pnm",
        "qoi", "dds", "hdr",
    ]
}

/// Check if a file extension is supported
pub fn is_supported_extension(ext: &str) -> bool {
    let ext_lower = ext.to_lowercase();
    supported_extensions().contains(&ext_lower.as_str())
}
