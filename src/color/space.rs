//! Color space identifiers
//!
//! Closed set of spaces the engine converts between. Names are parsed
//! leniently so configuration files can use the usual spellings
//! ("sRGB", "L*a*b*", "XYZ", ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CalibrationError, Result};

/// Color spaces supported by [`ColorConverter`](super::ColorConverter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorSpace {
    /// Device RGB with sRGB primaries and the sRGB companding law, 0..1
    #[serde(rename = "sRGB")]
    DeviceRgb,
    /// Linear-light sRGB, the generic linear working space
    #[serde(rename = "Linear RGB")]
    LinearRgb,
    /// CIE XYZ relative to the converter's reference white, Y of white = 1
    #[serde(rename = "XYZ")]
    Xyz,
    /// CIE L*a*b* relative to the converter's reference white
    #[serde(rename = "L*a*b*")]
    Lab,
    /// CIE LCh(ab), hue in degrees 0..360
    #[serde(rename = "LCh")]
    Lch,
}

impl ColorSpace {
    /// All supported spaces, in conversion-hub order
    pub const ALL: [ColorSpace; 5] = [
        ColorSpace::DeviceRgb,
        ColorSpace::LinearRgb,
        ColorSpace::Xyz,
        ColorSpace::Lab,
        ColorSpace::Lch,
    ];

    /// Canonical display name
    pub fn name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceRgb => "sRGB",
            ColorSpace::LinearRgb => "Linear RGB",
            ColorSpace::Xyz => "XYZ",
            ColorSpace::Lab => "L*a*b*",
            ColorSpace::Lch => "LCh",
        }
    }

    /// Whether values in this space can be stored as RGB image bands
    pub fn is_rgb(&self) -> bool {
        matches!(self, ColorSpace::DeviceRgb | ColorSpace::LinearRgb)
    }

    /// Whether a mapping can be fitted on components of this space
    ///
    /// LCh hue is an angle that wraps at 360 degrees and is undefined for
    /// neutrals, so least-squares fits across it are meaningless.
    pub fn is_fitting_space(&self) -> bool {
        !matches!(self, ColorSpace::Lch)
    }

    /// Ensure a corrector can be fitted and applied in this space
    pub fn require_fitting_space(&self) -> Result<()> {
        if self.is_fitting_space() {
            Ok(())
        } else {
            Err(CalibrationError::UnsupportedSpace {
                name: self.name().to_string(),
                reason: "not a fitting space, hue is circular".to_string(),
            })
        }
    }

    /// Ensure this space can be written into an RGB output image
    pub fn require_rgb(&self) -> Result<()> {
        if self.is_rgb() {
            Ok(())
        } else {
            Err(CalibrationError::UnsupportedSpace {
                name: self.name().to_string(),
                reason: "output images can only hold RGB bands".to_string(),
            })
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorSpace {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match key.as_str() {
            "srgb" | "rgb" | "devicergb" => Ok(ColorSpace::DeviceRgb),
            "linearrgb" | "linearsrgb" | "linrgb" | "linsrgb" => Ok(ColorSpace::LinearRgb),
            "xyz" | "ciexyz" => Ok(ColorSpace::Xyz),
            "lab" | "cielab" => Ok(ColorSpace::Lab),
            "lch" | "lchab" | "cielch" => Ok(ColorSpace::Lch),
            _ => Err(CalibrationError::UnsupportedSpace {
                name: s.to_string(),
                reason: "unknown color space name".to_string(),
            }),
        }
    }
}
