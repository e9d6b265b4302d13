//! Calibration constants and reference values
//!
//! Compile-time constants for reference illuminants, patch sampling,
//! fitting tolerances and calibration quality thresholds.

/// D65 Standard Illuminant Reference
///
/// CIE Standard Illuminant D65 represents average daylight with a correlated
/// color temperature of 6504K. sRGB data is defined relative to D65.
pub mod d65 {
    /// D65 white point in CIE XYZ color space (Y normalized to 1)
    /// Source: CIE 15:2004 Colorimetry, 3rd edition
    pub const WHITE_POINT_XYZ: [f64; 3] = [0.95047, 1.00000, 1.08883];
}

/// D50 Standard Illuminant Reference
///
/// Horizon light, the ICC profile connection space white. Published chart
/// reference values are usually measured relative to D50.
pub mod d50 {
    /// D50 white point in CIE XYZ color space (Y normalized to 1)
    pub const WHITE_POINT_XYZ: [f64; 3] = [0.96422, 1.00000, 0.82521];
}

/// Patch sampling parameters
pub mod sampling {
    /// Fraction of the chip size removed from each side before sampling
    pub const DEFAULT_CHIP_MARGIN: f64 = 0.2;

    /// Largest chip margin that still leaves a non-empty sampling region
    pub const MAX_CHIP_MARGIN: f64 = 0.49;

    /// Fraction trimmed from each tail by the trimmed mean statistic
    pub const DEFAULT_TRIM_FRACTION: f64 = 0.1;
}

/// Least-squares solver tolerances
pub mod fitting {
    /// Singular values below this are treated as zero by the SVD solver
    pub const SVD_EPSILON: f64 = 1e-12;

    /// Relative singular value below which control points count as collinear
    pub const COLLINEARITY_TOLERANCE: f64 = 1e-9;

    /// Homogeneous coordinate magnitude treated as a point at infinity
    pub const PROJECTIVE_EPSILON: f64 = 1e-15;
}

/// Calibration quality thresholds
pub mod thresholds {
    /// Mean ΔE above which a calibration is flagged as suspicious
    pub const MAX_MEAN_DELTA_E: f64 = 3.0;

    /// Single patch ΔE above which a calibration is flagged as suspicious
    pub const MAX_PATCH_DELTA_E: f64 = 10.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_point_constants() {
        // Verify white points match CIE standards
        assert!((d65::WHITE_POINT_XYZ[0] - 0.95047).abs() < 1e-9);
        assert!((d65::WHITE_POINT_XYZ[1] - 1.0).abs() < 1e-9);
        assert!((d50::WHITE_POINT_XYZ[2] - 0.82521).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_ranges() {
        assert!(sampling::DEFAULT_CHIP_MARGIN < sampling::MAX_CHIP_MARGIN);
        assert!(sampling::DEFAULT_TRIM_FRACTION < 0.5);
        assert!(thresholds::MAX_MEAN_DELTA_E < thresholds::MAX_PATCH_DELTA_E);
    }
}
