//! Color space conversion utilities
//!
//! Provides conversions between device RGB, linear RGB, CIE XYZ, CIE Lab
//! and CIE LCh with chromatic adaptation:
//! - sRGB companding and primaries (D65 native)
//! - Bradford adaptation to the converter's reference white
//! - XYZ as the conversion hub, double precision throughout
//! - No clamping: out-of-gamut values survive a round trip
//!
//! Algorithm tag: `algo-xyz-hub-conversion`

use nalgebra::{Matrix3, Vector3};
use palette::convert::FromColorUnclamped;
use palette::white_point::{D50, D65};
use palette::{Lab, LabHue, Lch, LinSrgb, Srgb, Xyz};
use serde::{Deserialize, Serialize};

use super::illuminant::{bradford_matrix, ReferenceWhite};
use super::ColorSpace;
use crate::Result;

/// Serialized form of a [`ColorConverter`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ConverterSettings {
    reference_white: ReferenceWhite,
}

/// Color converter bound to a reference white
///
/// RGB values are sRGB-primaried and D65-native. XYZ, Lab and LCh values are
/// expressed relative to `reference_white`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConverterSettings", into = "ConverterSettings")]
pub struct ColorConverter {
    reference_white: ReferenceWhite,
    /// XYZ(D65) → XYZ(reference white)
    to_reference: Matrix3<f64>,
    /// XYZ(reference white) → XYZ(D65)
    from_reference: Matrix3<f64>,
}

impl Default for ColorConverter {
    fn default() -> Self {
        Self::new(ReferenceWhite::D65)
    }
}

impl From<ConverterSettings> for ColorConverter {
    fn from(settings: ConverterSettings) -> Self {
        Self::new(settings.reference_white)
    }
}

impl From<ColorConverter> for ConverterSettings {
    fn from(converter: ColorConverter) -> Self {
        Self {
            reference_white: converter.reference_white,
        }
    }
}

impl ColorConverter {
    /// Create a converter whose XYZ/Lab values are relative to `reference_white`
    pub fn new(reference_white: ReferenceWhite) -> Self {
        let to_reference = bradford_matrix(ReferenceWhite::D65, reference_white);
        let from_reference = to_reference
            .try_inverse()
            .unwrap_or_else(|| bradford_matrix(reference_white, ReferenceWhite::D65));
        Self {
            reference_white,
            to_reference,
            from_reference,
        }
    }

    /// Reference white of XYZ, Lab and LCh values
    pub fn reference_white(&self) -> ReferenceWhite {
        self.reference_white
    }

    /// Convert a color vector between two spaces
    ///
    /// Pure and deterministic; values outside the nominal range of either
    /// space are carried through unclamped.
    pub fn convert(&self, value: [f64; 3], from: ColorSpace, to: ColorSpace) -> [f64; 3] {
        if from == to {
            return value;
        }
        // Stay in RGB when both ends are RGB, saves two matrix products
        match (from, to) {
            (ColorSpace::DeviceRgb, ColorSpace::LinearRgb) => return srgb_decode(value),
            (ColorSpace::LinearRgb, ColorSpace::DeviceRgb) => return srgb_encode(value),
            (ColorSpace::Lab, ColorSpace::Lch) => return self.lab_to_lch(value),
            (ColorSpace::Lch, ColorSpace::Lab) => return self.lch_to_lab(value),
            _ => {}
        }
        let xyz = self.to_xyz(value, from);
        self.from_xyz(xyz, to)
    }

    /// Convert a color vector between two spaces given by name
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedSpace` if either name is unknown
    pub fn convert_named(&self, value: [f64; 3], from: &str, to: &str) -> Result<[f64; 3]> {
        let from: ColorSpace = from.parse()?;
        let to: ColorSpace = to.parse()?;
        Ok(self.convert(value, from, to))
    }

    /// Convert a slice of color vectors between two spaces
    pub fn convert_all(&self, values: &[[f64; 3]], from: ColorSpace, to: ColorSpace) -> Vec<[f64; 3]> {
        values.iter().map(|v| self.convert(*v, from, to)).collect()
    }

    /// Convert any supported space to XYZ relative to the reference white
    pub fn to_xyz(&self, value: [f64; 3], from: ColorSpace) -> [f64; 3] {
        match from {
            ColorSpace::DeviceRgb => self.linear_rgb_to_xyz(srgb_decode(value)),
            ColorSpace::LinearRgb => self.linear_rgb_to_xyz(value),
            ColorSpace::Xyz => value,
            ColorSpace::Lab => self.lab_to_xyz(value),
            ColorSpace::Lch => self.lab_to_xyz(self.lch_to_lab(value)),
        }
    }

    /// Convert XYZ relative to the reference white into any supported space
    pub fn from_xyz(&self, xyz: [f64; 3], to: ColorSpace) -> [f64; 3] {
        match to {
            ColorSpace::DeviceRgb => srgb_encode(self.xyz_to_linear_rgb(xyz)),
            ColorSpace::LinearRgb => self.xyz_to_linear_rgb(xyz),
            ColorSpace::Xyz => xyz,
            ColorSpace::Lab => self.xyz_to_lab(xyz),
            ColorSpace::Lch => self.lab_to_lch(self.xyz_to_lab(xyz)),
        }
    }

    /// Compute Delta E (color difference) between two Lab colors
    ///
    /// Uses Euclidean distance (ΔE76)
    pub fn delta_e(&self, lab1: [f64; 3], lab2: [f64; 3]) -> f64 {
        let dl = lab1[0] - lab2[0];
        let da = lab1[1] - lab2[1];
        let db = lab1[2] - lab2[2];
        (dl * dl + da * da + db * db).sqrt()
    }

    /// Convert a Lab color to a hexadecimal sRGB string, clamped to gamut
    pub fn lab_to_hex(&self, lab: [f64; 3]) -> String {
        let rgb = self.convert(lab, ColorSpace::Lab, ColorSpace::DeviceRgb);
        let r = (rgb[0].clamp(0.0, 1.0) * 255.0).round() as u8;
        let g = (rgb[1].clamp(0.0, 1.0) * 255.0).round() as u8;
        let b = (rgb[2].clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02X}{:02X}{:02X}", r, g, b)
    }

    /// Check if a Lab color is within the sRGB gamut
    pub fn is_in_srgb_gamut(&self, lab: [f64; 3]) -> bool {
        self.convert(lab, ColorSpace::Lab, ColorSpace::LinearRgb)
            .iter()
            .all(|c| (-1e-9..=1.0 + 1e-9).contains(c))
    }

    fn linear_rgb_to_xyz(&self, rgb: [f64; 3]) -> [f64; 3] {
        let xyz: Xyz<D65, f64> = Xyz::from_color_unclamped(LinSrgb::new(rgb[0], rgb[1], rgb[2]));
        let adapted = self.to_reference * Vector3::new(xyz.x, xyz.y, xyz.z);
        [adapted[0], adapted[1], adapted[2]]
    }

    fn xyz_to_linear_rgb(&self, xyz: [f64; 3]) -> [f64; 3] {
        let d65 = self.from_reference * Vector3::new(xyz[0], xyz[1], xyz[2]);
        let rgb: LinSrgb<f64> = LinSrgb::from_color_unclamped(Xyz::<D65, f64>::new(d65[0], d65[1], d65[2]));
        [rgb.red, rgb.green, rgb.blue]
    }

    fn xyz_to_lab(&self, xyz: [f64; 3]) -> [f64; 3] {
        match self.reference_white {
            ReferenceWhite::D50 => xyz_to_lab::<D50>(xyz),
            ReferenceWhite::D65 => xyz_to_lab::<D65>(xyz),
        }
    }

    fn lab_to_xyz(&self, lab: [f64; 3]) -> [f64; 3] {
        match self.reference_white {
            ReferenceWhite::D50 => lab_to_xyz::<D50>(lab),
            ReferenceWhite::D65 => lab_to_xyz::<D65>(lab),
        }
    }

    fn lab_to_lch(&self, lab: [f64; 3]) -> [f64; 3] {
        match self.reference_white {
            ReferenceWhite::D50 => lab_to_lch::<D50>(lab),
            ReferenceWhite::D65 => lab_to_lch::<D65>(lab),
        }
    }

    fn lch_to_lab(&self, lch: [f64; 3]) -> [f64; 3] {
        match self.reference_white {
            ReferenceWhite::D50 => lch_to_lab::<D50>(lch),
            ReferenceWhite::D65 => lch_to_lab::<D65>(lch),
        }
    }
}

/// Apply the sRGB decoding (companded → linear) law
fn srgb_decode(rgb: [f64; 3]) -> [f64; 3] {
    let lin: LinSrgb<f64> = Srgb::new(rgb[0], rgb[1], rgb[2]).into_linear();
    [lin.red, lin.green, lin.blue]
}

/// Apply the sRGB encoding (linear → companded) law
fn srgb_encode(rgb: [f64; 3]) -> [f64; 3] {
    let srgb: Srgb<f64> = Srgb::from_linear(LinSrgb::new(rgb[0], rgb[1], rgb[2]));
    [srgb.red, srgb.green, srgb.blue]
}

fn xyz_to_lab<Wp>(xyz: [f64; 3]) -> [f64; 3]
where
    Lab<Wp, f64>: FromColorUnclamped<Xyz<Wp, f64>>,
{
    let lab = Lab::<Wp, f64>::from_color_unclamped(Xyz::<Wp, f64>::new(xyz[0], xyz[1], xyz[2]));
    [lab.l, lab.a, lab.b]
}

fn lab_to_xyz<Wp>(lab: [f64; 3]) -> [f64; 3]
where
    Xyz<Wp, f64>: FromColorUnclamped<Lab<Wp, f64>>,
{
    let xyz = Xyz::<Wp, f64>::from_color_unclamped(Lab::<Wp, f64>::new(lab[0], lab[1], lab[2]));
    [xyz.x, xyz.y, xyz.z]
}

fn lab_to_lch<Wp>(lab: [f64; 3]) -> [f64; 3]
where
    Lch<Wp, f64>: FromColorUnclamped<Lab<Wp, f64>>,
{
    let lch = Lch::<Wp, f64>::from_color_unclamped(Lab::<Wp, f64>::new(lab[0], lab[1], lab[2]));
    [lch.l, lch.chroma, lch.hue.into_positive_degrees()]
}

fn lch_to_lab<Wp>(lch: [f64; 3]) -> [f64; 3]
where
    Lab<Wp, f64>: FromColorUnclamped<Lch<Wp, f64>>,
{
    let lch = Lch::<Wp, f64>::new(lch[0], lch[1], LabHue::from_degrees(lch[2]));
    let lab = Lab::<Wp, f64>::from_color_unclamped(lch);
    [lab.l, lab.a, lab.b]
}
