//! Reference illuminants and chromatic adaptation
//!
//! Implements the Bradford chromatic adaptation transform used to move
//! XYZ values between the D65 white of RGB data and the reference white
//! of a chart's published colors.

use std::fmt;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::constants::{d50, d65};

/// Bradford cone response matrix (XYZ → LMS)
#[rustfmt::skip]
const BRADFORD: [f64; 9] = [
     0.8951,  0.2664, -0.1614,
    -0.7502,  1.7135,  0.0367,
     0.0389, -0.0685,  1.0296,
];

/// Standard illuminant used as the reference white of XYZ and Lab values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReferenceWhite {
    /// Horizon light, ~5000K
    D50,
    /// Average daylight, ~6500K
    #[default]
    D65,
}

impl ReferenceWhite {
    /// XYZ white point with Y normalized to 1
    pub fn white_point(&self) -> [f64; 3] {
        match self {
            ReferenceWhite::D50 => d50::WHITE_POINT_XYZ,
            ReferenceWhite::D65 => d65::WHITE_POINT_XYZ,
        }
    }
}

impl fmt::Display for ReferenceWhite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceWhite::D50 => f.write_str("D50"),
            ReferenceWhite::D65 => f.write_str("D65"),
        }
    }
}

/// Bradford adaptation matrix mapping XYZ under `source` to XYZ under `target`
///
/// Computes `M⁻¹ · diag(ρ_t / ρ_s) · M` where ρ are cone responses of the
/// two white points.
pub fn bradford_matrix(source: ReferenceWhite, target: ReferenceWhite) -> Matrix3<f64> {
    if source == target {
        return Matrix3::identity();
    }

    let m = Matrix3::from_row_slice(&BRADFORD);
    // M is a fixed well-conditioned matrix, inversion cannot fail
    let m_inv = m.try_inverse().unwrap_or_else(Matrix3::identity);

    let ws = source.white_point();
    let wt = target.white_point();
    let rho_s = m * Vector3::new(ws[0], ws[1], ws[2]);
    let rho_t = m * Vector3::new(wt[0], wt[1], wt[2]);

    let scale = Matrix3::from_diagonal(&rho_t.component_div(&rho_s));
    m_inv * scale * m
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_when_same_white() {
        let m = bradford_matrix(ReferenceWhite::D65, ReferenceWhite::D65);
        assert_eq!(m, Matrix3::identity());
    }

    #[test]
    fn test_white_maps_to_white() {
        let m = bradford_matrix(ReferenceWhite::D65, ReferenceWhite::D50);
        let w = d65::WHITE_POINT_XYZ;
        let adapted = m * Vector3::new(w[0], w[1], w[2]);
        assert_relative_eq!(adapted[0], d50::WHITE_POINT_XYZ[0], epsilon = 1e-4);
        assert_relative_eq!(adapted[1], d50::WHITE_POINT_XYZ[1], epsilon = 1e-4);
        assert_relative_eq!(adapted[2], d50::WHITE_POINT_XYZ[2], epsilon = 1e-4);
    }

    #[test]
    fn test_forward_and_back_cancel() {
        let there = bradford_matrix(ReferenceWhite::D65, ReferenceWhite::D50);
        let back = bradford_matrix(ReferenceWhite::D50, ReferenceWhite::D65);
        let product = back * there;
        for r in 0..3 {
            for c in 0..3 {
                let expected = if r == c { 1.0 } else { 0.0 };
                assert_relative_eq!(product[(r, c)], expected, epsilon = 1e-9);
            }
        }
    }
}
