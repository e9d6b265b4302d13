//! RGB pixel layouts understood by the engine
//!
//! Input images may be 8-bit, 16-bit or 32-bit float RGB. Values are read
//! as normalized device RGB (0..1 for integer layouts) and written back
//! with clamping to the representable range.

use std::fmt;

use image::{DynamicImage, ImageBuffer, Rgb, Rgb32FImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::{CalibrationError, Result};

/// 16-bit RGB buffer
pub type Rgb16Image = ImageBuffer<Rgb<u16>, Vec<u16>>;

/// Supported RGB pixel layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImagePixelType {
    #[serde(rename = "RGB8")]
    Rgb8,
    #[serde(rename = "RGB16")]
    Rgb16,
    #[serde(rename = "RGB32F")]
    Rgb32F,
}

impl ImagePixelType {
    /// Pixel layout of an image
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedPixelType` for grayscale, alpha or other layouts
    pub fn of(image: &DynamicImage) -> Result<Self> {
        match image {
            DynamicImage::ImageRgb8(_) => Ok(ImagePixelType::Rgb8),
            DynamicImage::ImageRgb16(_) => Ok(ImagePixelType::Rgb16),
            DynamicImage::ImageRgb32F(_) => Ok(ImagePixelType::Rgb32F),
            other => Err(CalibrationError::UnsupportedPixelType {
                description: format!("{:?}", other.color()),
            }),
        }
    }

    /// Largest integer code, `None` for float layouts
    pub fn max_code(&self) -> Option<f64> {
        match self {
            ImagePixelType::Rgb8 => Some(u8::MAX as f64),
            ImagePixelType::Rgb16 => Some(u16::MAX as f64),
            ImagePixelType::Rgb32F => None,
        }
    }

    /// Build an image of this layout from normalized RGB values
    ///
    /// Every layout clamps to 0..1; integer layouts then round to codes.
    /// `data` holds `width * height * 3` interleaved values.
    pub(crate) fn encode(&self, width: u32, height: u32, data: Vec<f32>) -> Result<DynamicImage> {
        let len = data.len();
        let size_error = || {
            CalibrationError::numerical(
                "pixel encoding",
                format!("buffer of {} values does not fit {}x{} RGB", len, width, height),
            )
        };
        let image = match self {
            ImagePixelType::Rgb8 => {
                let codes = data.iter().map(|v| to_code(*v, u8::MAX as f32) as u8).collect();
                DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, codes).ok_or_else(size_error)?)
            }
            ImagePixelType::Rgb16 => {
                let codes = data.iter().map(|v| to_code(*v, u16::MAX as f32) as u16).collect();
                DynamicImage::ImageRgb16(Rgb16Image::from_raw(width, height, codes).ok_or_else(size_error)?)
            }
            ImagePixelType::Rgb32F => {
                if len != (width as usize) * (height as usize) * 3 {
                    return Err(size_error());
                }
                let values = data.into_iter().map(|v| v.clamp(0.0, 1.0)).collect();
                DynamicImage::ImageRgb32F(Rgb32FImage::from_raw(width, height, values).ok_or_else(size_error)?)
            }
        };
        Ok(image)
    }
}

fn to_code(value: f32, max: f32) -> f32 {
    (value.clamp(0.0, 1.0) * max).round()
}

impl fmt::Display for ImagePixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImagePixelType::Rgb8 => f.write_str("RGB 8-bit"),
            ImagePixelType::Rgb16 => f.write_str("RGB 16-bit"),
            ImagePixelType::Rgb32F => f.write_str("RGB 32-bit float"),
        }
    }
}

/// Borrowed read access to an RGB image as normalized device RGB
pub(crate) enum RgbView<'a> {
    Rgb8(&'a RgbImage),
    Rgb16(&'a Rgb16Image),
    Rgb32F(&'a Rgb32FImage),
}

impl<'a> RgbView<'a> {
    pub(crate) fn new(image: &'a DynamicImage) -> Result<Self> {
        match image {
            DynamicImage::ImageRgb8(buf) => Ok(RgbView::Rgb8(buf)),
            DynamicImage::ImageRgb16(buf) => Ok(RgbView::Rgb16(buf)),
            DynamicImage::ImageRgb32F(buf) => Ok(RgbView::Rgb32F(buf)),
            other => Err(CalibrationError::UnsupportedPixelType {
                description: format!("{:?}", other.color()),
            }),
        }
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        match self {
            RgbView::Rgb8(buf) => buf.dimensions(),
            RgbView::Rgb16(buf) => buf.dimensions(),
            RgbView::Rgb32F(buf) => buf.dimensions(),
        }
    }

    /// Normalized RGB at pixel `(x, y)`; caller keeps coordinates in bounds
    pub(crate) fn get(&self, x: u32, y: u32) -> [f64; 3] {
        match self {
            RgbView::Rgb8(buf) => {
                let p = buf.get_pixel(x, y).0;
                [p[0] as f64 / 255.0, p[1] as f64 / 255.0, p[2] as f64 / 255.0]
            }
            RgbView::Rgb16(buf) => {
                let p = buf.get_pixel(x, y).0;
                let max = u16::MAX as f64;
                [p[0] as f64 / max, p[1] as f64 / max, p[2] as f64 / max]
            }
            RgbView::Rgb32F(buf) => {
                let p = buf.get_pixel(x, y).0;
                [p[0] as f64, p[1] as f64, p[2] as f64]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_type_detection() {
        let rgb8 = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
        assert_eq!(ImagePixelType::of(&rgb8).unwrap(), ImagePixelType::Rgb8);
        let f32img = DynamicImage::ImageRgb32F(Rgb32FImage::new(2, 2));
        assert_eq!(ImagePixelType::of(&f32img).unwrap(), ImagePixelType::Rgb32F);

        let gray = DynamicImage::ImageLuma8(image::GrayImage::new(2, 2));
        assert!(matches!(
            ImagePixelType::of(&gray),
            Err(CalibrationError::UnsupportedPixelType { .. })
        ));
        assert!(RgbView::new(&gray).is_err());
    }

    #[test]
    fn test_encode_clamps_integer_layouts() {
        let data = vec![-0.5, 0.5, 1.5];
        let img = ImagePixelType::Rgb8.encode(1, 1, data.clone()).unwrap();
        assert_eq!(img.to_rgb8().get_pixel(0, 0).0, [0, 128, 255]);

        let img = ImagePixelType::Rgb16.encode(1, 1, data).unwrap();
        assert_eq!(img.as_rgb16().unwrap().get_pixel(0, 0).0, [0, 32768, 65535]);
    }

    #[test]
    fn test_encode_clamps_float_layout() {
        let data = vec![1.353256, 0.5, -0.25, 0.0, 1.0, 0.75];
        let img = ImagePixelType::Rgb32F.encode(2, 1, data).unwrap();
        let buf = img.as_rgb32f().unwrap();
        assert_eq!(buf.get_pixel(0, 0).0, [1.0, 0.5, 0.0]);
        assert_eq!(buf.get_pixel(1, 0).0, [0.0, 1.0, 0.75]);
    }

    #[test]
    fn test_encode_rejects_wrong_length() {
        assert!(ImagePixelType::Rgb8.encode(2, 2, vec![0.0; 3]).is_err());
        assert!(ImagePixelType::Rgb32F.encode(2, 2, vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_view_normalizes() {
        let mut buf = Rgb16Image::new(1, 1);
        buf.put_pixel(0, 0, Rgb([0, 65535, 32768]));
        let img = DynamicImage::ImageRgb16(buf);
        let view = RgbView::new(&img).unwrap();
        let p = view.get(0, 0);
        assert_eq!(p[0], 0.0);
        assert_eq!(p[1], 1.0);
        assert!((p[2] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&ImagePixelType::Rgb16).unwrap(), "\"RGB16\"");
    }
}
