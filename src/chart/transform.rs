//! Chart-to-image plane transforms.
//!
//! Provides:
//! - Least-squares affine fit from ≥3 non-collinear correspondences.
//! - Perspective (homography) fit via DLT with Hartley normalization.
//! - Point projection and reprojection error.

use std::fmt;

use nalgebra::{DMatrix, Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::constants::fitting::{COLLINEARITY_TOLERANCE, PROJECTIVE_EPSILON, SVD_EPSILON};
use crate::{CalibrationError, Result};

// ── Transform kind ───────────────────────────────────────────────────────

/// Geometric transform class used to align a chart to an ROI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Rotation, scale, shear and translation (6 parameters)
    Affine,
    /// Full plane homography (8 parameters)
    #[default]
    Perspective,
}

impl TransformKind {
    /// Minimum number of control points that determine the transform
    pub fn min_points(&self) -> usize {
        match self {
            TransformKind::Affine => 3,
            TransformKind::Perspective => 4,
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformKind::Affine => f.write_str("affine"),
            TransformKind::Perspective => f.write_str("perspective"),
        }
    }
}

// ── Transform ────────────────────────────────────────────────────────────

/// Fitted 3×3 plane transform mapping chart coordinates to image pixels
#[derive(Debug, Clone, PartialEq)]
pub struct ChartTransform {
    kind: TransformKind,
    matrix: Matrix3<f64>,
}

impl ChartTransform {
    /// Identity transform of the given kind
    pub fn identity(kind: TransformKind) -> Self {
        Self {
            kind,
            matrix: Matrix3::identity(),
        }
    }

    /// Fit a transform mapping `src` points onto `dst` points
    ///
    /// Minimizes the total squared point displacement (affine) or the
    /// algebraic DLT error on normalized points (perspective).
    ///
    /// # Errors
    ///
    /// `InsufficientGeometry` for too few or collinear points,
    /// `NumericalFailure` if the solver breaks down.
    pub fn fit(kind: TransformKind, src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Self> {
        if src.len() != dst.len() {
            return Err(CalibrationError::InvalidParameter {
                parameter: "control_points".to_string(),
                value: format!("{} source vs {} destination points", src.len(), dst.len()),
            });
        }

        let needed = kind.min_points();
        if src.len() < needed {
            return Err(CalibrationError::InsufficientGeometry {
                kind,
                needed,
                got: src.len(),
                reason: "too few control points".to_string(),
            });
        }

        for (label, pts) in [("chart", src), ("ROI", dst)] {
            if let Some(reason) = degeneracy(kind, pts) {
                return Err(CalibrationError::InsufficientGeometry {
                    kind,
                    needed,
                    got: pts.len(),
                    reason: format!("{} points {}", label, reason),
                });
            }
        }

        let matrix = match kind {
            TransformKind::Affine => fit_affine(src, dst)?,
            TransformKind::Perspective => fit_perspective(src, dst)?,
        };

        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::numerical(
                format!("{} alignment", kind),
                "transform has non-finite coefficients",
            ));
        }

        Ok(Self { kind, matrix })
    }

    /// Transform class
    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    /// Row-major 3×3 matrix
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Project a 2D point: M * [x, y, 1]^T → [u, v]
    pub fn apply(&self, p: [f64; 2]) -> [f64; 2] {
        project(&self.matrix, p[0], p[1])
    }

    /// Inverse transform (image pixels → chart coordinates)
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|m| {
            let scale = m[(2, 2)];
            let matrix = if scale.abs() > PROJECTIVE_EPSILON { m / scale } else { m };
            Self {
                kind: self.kind,
                matrix,
            }
        })
    }

    /// Root-mean-square reprojection error over correspondences
    pub fn rms_error(&self, src: &[[f64; 2]], dst: &[[f64; 2]]) -> f64 {
        if src.is_empty() {
            return 0.0;
        }
        let sum: f64 = src
            .iter()
            .zip(dst)
            .map(|(s, d)| {
                let e = reprojection_error(&self.matrix, s, d);
                e * e
            })
            .sum();
        (sum / src.len() as f64).sqrt()
    }

    /// Whether every matrix entry is within `tolerance` of the identity
    pub fn is_identity(&self, tolerance: f64) -> bool {
        (self.matrix - Matrix3::identity())
            .iter()
            .all(|v| v.abs() <= tolerance)
    }
}

// ── Projection ───────────────────────────────────────────────────────────

/// Project a 2D point through a 3×3 matrix: M * [x, y, 1]^T → [u, v].
pub fn project(m: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let p = m * Vector3::new(x, y, 1.0);
    if p[2].abs() < PROJECTIVE_EPSILON {
        return [f64::NAN, f64::NAN];
    }
    [p[0] / p[2], p[1] / p[2]]
}

/// Reprojection error: ||project(M, src) - dst||.
pub fn reprojection_error(m: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    let p = project(m, src[0], src[1]);
    let dx = p[0] - dst[0];
    let dy = p[1] - dst[1];
    (dx * dx + dy * dy).sqrt()
}

// ── Degeneracy checks ────────────────────────────────────────────────────

/// Describe why a point set cannot determine the transform, if it cannot
fn degeneracy(kind: TransformKind, pts: &[[f64; 2]]) -> Option<String> {
    if pts.iter().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
        return Some("contain non-finite coordinates".to_string());
    }

    let (_, normalized) = normalize_points(pts);

    // Spread along the weaker principal axis relative to the stronger one
    let centered = DMatrix::from_fn(normalized.len(), 2, |r, c| normalized[r][c]);
    let singular = centered.singular_values();
    let (s_max, s_min) = (singular.max(), singular.min());
    if s_max <= 0.0 || s_min / s_max < COLLINEARITY_TOLERANCE {
        return Some("are collinear or coincident".to_string());
    }

    // A homography from four corners also needs every triple non-collinear
    if kind == TransformKind::Perspective && pts.len() == 4 {
        for skip in 0..4 {
            let tri: Vec<&[f64; 2]> = normalized
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, p)| p)
                .collect();
            let area = triangle_area(tri[0], tri[1], tri[2]);
            if area < COLLINEARITY_TOLERANCE {
                return Some(format!("have three collinear corners (all but #{})", skip + 1));
            }
        }
    }

    None
}

fn triangle_area(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> f64 {
    0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])).abs()
}

// ── Hartley normalization ────────────────────────────────────────────────

/// Compute a normalizing transform: translate centroid to origin, scale so
/// mean distance from origin is sqrt(2).
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > PROJECTIVE_EPSILON {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts.iter().map(|p| [s * (p[0] - cx), s * (p[1] - cy)]).collect();

    (t, normalized)
}

// ── Affine least squares ─────────────────────────────────────────────────

fn fit_affine(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Matrix3<f64>> {
    let n = src.len();

    // Rows [x y 1], one right-hand side column per output coordinate
    let a = DMatrix::from_fn(n, 3, |r, c| match c {
        0 => src[r][0],
        1 => src[r][1],
        _ => 1.0,
    });
    let b = DMatrix::from_fn(n, 2, |r, c| dst[r][c]);

    let solution = a
        .svd(true, true)
        .solve(&b, SVD_EPSILON)
        .map_err(|msg| CalibrationError::numerical("affine alignment", msg))?;

    Ok(Matrix3::new(
        solution[(0, 0)],
        solution[(1, 0)],
        solution[(2, 0)],
        solution[(0, 1)],
        solution[(1, 1)],
        solution[(2, 1)],
        0.0,
        0.0,
        1.0,
    ))
}

// ── DLT ──────────────────────────────────────────────────────────────────

fn fit_perspective(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Matrix3<f64>> {
    let n = src.len();

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    // Build 2n × 9 matrix A
    let mut a = DMatrix::zeros(2 * n, 9);
    for i in 0..n {
        let (sx, sy) = (src_n[i][0], src_n[i][1]);
        let (dx, dy) = (dst_n[i][0], dst_n[i][1]);

        // Row 2i:   [  0  0  0 | -sx -sy -1 | dy*sx  dy*sy  dy ]
        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        // Row 2i+1: [ sx  sy  1 |  0  0  0 | -dx*sx -dx*sy -dx ]
        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // h is the eigenvector of AᵀA with the smallest eigenvalue
    let ata = a.transpose() * &a;
    let eig = nalgebra::SymmetricEigen::new(ata);
    let min_idx = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|(_, x), (_, y)| x.abs().total_cmp(&y.abs()))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let h_norm = Matrix3::from_fn(|r, c| eig.eigenvectors[(r * 3 + c, min_idx)]);

    // Denormalize: H = T_dst^-1 * H_norm * T_src
    let t_dst_inv = t_dst.try_inverse().ok_or_else(|| {
        CalibrationError::numerical("perspective alignment", "normalizing transform not invertible")
    })?;
    let h = t_dst_inv * h_norm * t_src;

    let scale = h[(2, 2)];
    if scale.abs() < PROJECTIVE_EPSILON {
        return Err(CalibrationError::numerical(
            "perspective alignment",
            "homography maps the chart origin to infinity",
        ));
    }
    Ok(h / scale)
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_test_homography() -> Matrix3<f64> {
        Matrix3::new(
            12.0, 1.5, 40.0, //
            -0.8, 11.0, 25.0, //
            0.002, 0.001, 1.0,
        )
    }

    const SQUARE: [[f64; 2]; 4] = [[0.0, 0.0], [6.0, 0.0], [6.0, 4.0], [0.0, 4.0]];

    #[test]
    fn test_identity_for_canonical_corners() {
        for kind in [TransformKind::Affine, TransformKind::Perspective] {
            let t = ChartTransform::fit(kind, &SQUARE, &SQUARE).unwrap();
            assert!(t.is_identity(1e-8), "{} not identity: {:?}", kind, t.matrix());
        }
    }

    #[test]
    fn test_perspective_exact_4points() {
        let h_true = make_test_homography();
        let dst: Vec<[f64; 2]> = SQUARE.iter().map(|s| project(&h_true, s[0], s[1])).collect();

        let t = ChartTransform::fit(TransformKind::Perspective, &SQUARE, &dst).unwrap();
        for (s, d) in SQUARE.iter().zip(&dst) {
            let err = reprojection_error(t.matrix(), s, d);
            assert!(err < 1e-6, "reprojection error too large: {}", err);
        }
        // Interior points follow the same homography
        let p = t.apply([2.5, 1.5]);
        let q = project(&h_true, 2.5, 1.5);
        assert_relative_eq!(p[0], q[0], epsilon = 1e-6);
        assert_relative_eq!(p[1], q[1], epsilon = 1e-6);
    }

    #[test]
    fn test_affine_exact_three_points() {
        let src = [[0.0, 0.0], [6.0, 0.0], [6.0, 4.0]];
        let dst = [[10.0, 20.0], [70.0, 26.0], [66.0, 66.0]];
        let t = ChartTransform::fit(TransformKind::Affine, &src, &dst).unwrap();
        assert!(t.rms_error(&src, &dst) < 1e-9);
        assert_eq!(t.matrix()[(2, 0)], 0.0);
        assert_eq!(t.matrix()[(2, 1)], 0.0);
    }

    #[test]
    fn test_affine_least_squares_splits_error() {
        // Fourth corner displaced; least squares spreads the residual
        let dst = [[0.0, 0.0], [6.0, 0.0], [6.0, 4.0], [0.4, 4.0]];
        let t = ChartTransform::fit(TransformKind::Affine, &SQUARE, &dst).unwrap();
        let rms = t.rms_error(&SQUARE, &dst);
        assert!(rms > 0.0 && rms < 0.4);
    }

    #[test]
    fn test_too_few_points() {
        let src = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        let result = ChartTransform::fit(TransformKind::Perspective, &src, &src);
        assert!(matches!(
            result,
            Err(CalibrationError::InsufficientGeometry { needed: 4, got: 3, .. })
        ));

        let result = ChartTransform::fit(TransformKind::Affine, &src[..2], &src[..2]);
        assert!(matches!(
            result,
            Err(CalibrationError::InsufficientGeometry { needed: 3, got: 2, .. })
        ));
    }

    #[test]
    fn test_collinear_points_rejected() {
        let line = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let result = ChartTransform::fit(TransformKind::Affine, &SQUARE, &line);
        assert!(matches!(result, Err(CalibrationError::InsufficientGeometry { .. })));

        // Three of four corners on one line
        let bent = [[0.0, 0.0], [5.0, 0.0], [10.0, 0.0], [0.0, 8.0]];
        let result = ChartTransform::fit(TransformKind::Perspective, &SQUARE, &bent);
        assert!(matches!(result, Err(CalibrationError::InsufficientGeometry { .. })));
    }

    #[test]
    fn test_inverse_round_trip() {
        let h_true = make_test_homography();
        let dst: Vec<[f64; 2]> = SQUARE.iter().map(|s| project(&h_true, s[0], s[1])).collect();
        let t = ChartTransform::fit(TransformKind::Perspective, &SQUARE, &dst).unwrap();
        let inv = t.inverse().unwrap();

        let p = [3.3, 2.1];
        let back = inv.apply(t.apply(p));
        assert_relative_eq!(p[0], back[0], epsilon = 1e-8);
        assert_relative_eq!(p[1], back[1], epsilon = 1e-8);
    }

    #[test]
    fn test_deterministic() {
        let dst = [[11.0, 9.0], [300.0, 14.0], [296.0, 210.0], [8.0, 205.0]];
        let a = ChartTransform::fit(TransformKind::Perspective, &SQUARE, &dst).unwrap();
        let b = ChartTransform::fit(TransformKind::Perspective, &SQUARE, &dst).unwrap();
        assert_eq!(a, b);
    }
}
