//! Color mapping regression
//!
//! Fits a correction from observed chart colors to reference chart colors
//! in a working color space. Every output band is an independent linear
//! least-squares problem over the method's terms, solved by SVD with a
//! fixed singular-value cutoff and no regularization.
//!
//! | Method                 | Terms per band                         |
//! |------------------------|----------------------------------------|
//! | `Linear`               | 1, x (own band only)                   |
//! | `LinearCrossBand`      | 1, r, g, b                             |
//! | `QuadraticCrossBand`   | above + r², g², b², rg, rb, gb          |
//! | `CubicCrossBand`       | above + all third-order monomials       |
//!
//! A fit needs at least as many patches as the mapping has free
//! coefficients over all three bands (6, 12, 30 and 60).
//!
//! Algorithm tag: `algo-crossband-polynomial-fit`

use std::fmt;
use std::str::FromStr;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::sampler::SampledColor;
use crate::chart::AlignedChart;
use crate::color::ColorSpace;
use crate::constants::fitting::SVD_EPSILON;
use crate::constants::thresholds::{MAX_MEAN_DELTA_E, MAX_PATCH_DELTA_E};
use crate::{CalibrationError, Result};

/// Monomial exponents `[r, g, b]` ordered by total degree
///
/// Degree `d` cross-band fits use the first 4, 10 or 20 entries.
const TERMS: [[usize; 3]; 20] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [0, 0, 1],
    [2, 0, 0],
    [0, 2, 0],
    [0, 0, 2],
    [1, 1, 0],
    [1, 0, 1],
    [0, 1, 1],
    [3, 0, 0],
    [0, 3, 0],
    [0, 0, 3],
    [2, 1, 0],
    [2, 0, 1],
    [1, 2, 0],
    [0, 2, 1],
    [1, 0, 2],
    [0, 1, 2],
    [1, 1, 1],
];

fn cross_band_term_count(degree: usize) -> usize {
    match degree {
        1 => 4,
        2 => 10,
        _ => 20,
    }
}

/// Evaluate the first `count` cross-band terms at `v`
fn cross_band_terms(v: [f64; 3], count: usize) -> [f64; 20] {
    let powers = v.map(|x| [1.0, x, x * x, x * x * x]);
    let mut out = [0.0; 20];
    for (slot, e) in out.iter_mut().zip(TERMS.iter()).take(count) {
        *slot = powers[0][e[0]] * powers[1][e[1]] * powers[2][e[2]];
    }
    out
}

/// Regression family used to map observed colors onto reference colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MappingMethod {
    /// Independent gain and offset per band
    #[serde(rename = "Linear")]
    Linear,
    /// Full 3×3 matrix plus offset
    #[default]
    #[serde(rename = "Linear Cross-band")]
    LinearCrossBand,
    /// Second-order polynomial in all three bands
    #[serde(rename = "Quadratic Cross-band")]
    QuadraticCrossBand,
    /// Third-order polynomial in all three bands
    #[serde(rename = "Cubic Cross-band")]
    CubicCrossBand,
}

impl MappingMethod {
    pub const ALL: [MappingMethod; 4] = [
        MappingMethod::Linear,
        MappingMethod::LinearCrossBand,
        MappingMethod::QuadraticCrossBand,
        MappingMethod::CubicCrossBand,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MappingMethod::Linear => "Linear",
            MappingMethod::LinearCrossBand => "Linear Cross-band",
            MappingMethod::QuadraticCrossBand => "Quadratic Cross-band",
            MappingMethod::CubicCrossBand => "Cubic Cross-band",
        }
    }

    /// Free coefficients solved for each output band
    pub fn terms_per_band(&self) -> usize {
        match self {
            MappingMethod::Linear => 2,
            MappingMethod::LinearCrossBand => cross_band_term_count(1),
            MappingMethod::QuadraticCrossBand => cross_band_term_count(2),
            MappingMethod::CubicCrossBand => cross_band_term_count(3),
        }
    }

    /// Free coefficients of the whole mapping, over all three bands
    ///
    /// A fit needs at least this many patches.
    pub fn free_coefficients(&self) -> usize {
        3 * self.terms_per_band()
    }
}

impl fmt::Display for MappingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MappingMethod {
    type Err = CalibrationError;

    /// Accepts the display names in any case, with or without separators
    fn from_str(s: &str) -> Result<Self> {
        let key = |name: &str| -> String {
            name.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_lowercase())
                .collect()
        };
        let wanted = key(s);
        MappingMethod::ALL
            .into_iter()
            .find(|m| key(m.name()) == wanted)
            .ok_or_else(|| CalibrationError::InvalidParameter {
                parameter: "mapping_method".to_string(),
                value: s.to_string(),
            })
    }
}

/// Fitted color mapping, applied in the working color space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Corrector {
    /// `out[b] = gain[b] * in[b] + offset[b]`
    Linear { gain: [f64; 3], offset: [f64; 3] },
    /// `out = matrix * in + offset`
    LinearCrossBand {
        matrix: [[f64; 3]; 3],
        offset: [f64; 3],
    },
    /// `out[b] = Σ coefficients[b][t] * term_t(in)` over cross-band terms
    Polynomial {
        degree: usize,
        coefficients: [Vec<f64>; 3],
    },
}

impl Corrector {
    /// Mapping that returns its input unchanged
    pub fn identity() -> Self {
        Corrector::LinearCrossBand {
            matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            offset: [0.0; 3],
        }
    }

    /// Method that produces this kind of corrector
    pub fn method(&self) -> MappingMethod {
        match self {
            Corrector::Linear { .. } => MappingMethod::Linear,
            Corrector::LinearCrossBand { .. } => MappingMethod::LinearCrossBand,
            Corrector::Polynomial { degree: 2, .. } => MappingMethod::QuadraticCrossBand,
            Corrector::Polynomial { .. } => MappingMethod::CubicCrossBand,
        }
    }

    /// Check coefficient shapes, e.g. after loading from a file
    pub fn validate(&self) -> Result<()> {
        let ok = match self {
            Corrector::Linear { gain, offset } => all_finite(gain.iter().chain(offset)),
            Corrector::LinearCrossBand { matrix, offset } => {
                all_finite(matrix.iter().flatten().chain(offset))
            }
            Corrector::Polynomial { degree, coefficients } => {
                if !(2..=3).contains(degree) {
                    return Err(CalibrationError::InvalidParameter {
                        parameter: "polynomial_degree".to_string(),
                        value: degree.to_string(),
                    });
                }
                let count = cross_band_term_count(*degree);
                if let Some(band) = coefficients.iter().position(|c| c.len() != count) {
                    return Err(CalibrationError::InvalidParameter {
                        parameter: "polynomial_coefficients".to_string(),
                        value: format!(
                            "band {} has {} coefficients, degree {} needs {}",
                            band,
                            coefficients[band].len(),
                            degree,
                            count
                        ),
                    });
                }
                all_finite(coefficients.iter().flatten())
            }
        };
        if ok {
            Ok(())
        } else {
            Err(CalibrationError::numerical("corrector", "non-finite coefficient"))
        }
    }

    /// Map one working-space color
    pub fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        match self {
            Corrector::Linear { gain, offset } => [
                gain[0] * v[0] + offset[0],
                gain[1] * v[1] + offset[1],
                gain[2] * v[2] + offset[2],
            ],
            Corrector::LinearCrossBand { matrix, offset } => {
                let mut out = *offset;
                for (o, row) in out.iter_mut().zip(matrix) {
                    *o += row[0] * v[0] + row[1] * v[1] + row[2] * v[2];
                }
                out
            }
            Corrector::Polynomial { degree, coefficients } => {
                let count = cross_band_term_count(*degree);
                let terms = cross_band_terms(v, count);
                coefficients
                    .each_ref()
                    .map(|c| c.iter().zip(&terms[..count]).map(|(a, t)| a * t).sum::<f64>())
            }
        }
    }
}

fn all_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> bool {
    values.all(|v| v.is_finite())
}

/// Limits above which a calibration is reported as suspicious
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Largest acceptable mean ΔE over all fitted patches
    pub max_mean_delta_e: f64,
    /// Largest acceptable ΔE of any single patch
    pub max_patch_delta_e: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            max_mean_delta_e: MAX_MEAN_DELTA_E,
            max_patch_delta_e: MAX_PATCH_DELTA_E,
        }
    }
}

/// Non-fatal report that a fitted mapping reproduces the chart poorly
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "poor calibration fit: mean ΔE {mean_delta_e:.2} (limit {max_mean_delta_e:.2}), \
     worst patch {worst_patch_id} ({worst_patch_name}) ΔE {max_delta_e:.2} (limit {max_patch_delta_e:.2})"
)]
pub struct CalibrationQualityWarning {
    pub mean_delta_e: f64,
    pub max_delta_e: f64,
    pub worst_patch_id: usize,
    pub worst_patch_name: String,
    pub max_mean_delta_e: f64,
    pub max_patch_delta_e: f64,
}

/// Fit outcome for one patch, values in the working space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchResidual {
    pub patch_id: usize,
    pub patch_name: String,
    pub observed: [f64; 3],
    pub reference: [f64; 3],
    pub corrected: [f64; 3],
    /// `corrected - reference`
    pub residual: [f64; 3],
    /// CIE76 distance between corrected and reference colors in Lab
    pub delta_e: f64,
}

/// How well a fitted corrector reproduces the chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub method: MappingMethod,
    pub working_space: ColorSpace,
    pub patches: Vec<PatchResidual>,
    pub mean_delta_e: f64,
    pub median_delta_e: f64,
    pub max_delta_e: f64,
    /// Root mean square residual per working-space band
    pub rms_residual: [f64; 3],
}

impl FitDiagnostics {
    fn from_patches(method: MappingMethod, working_space: ColorSpace, patches: Vec<PatchResidual>) -> Self {
        let n = patches.len().max(1) as f64;
        let mut delta_es: Vec<f64> = patches.iter().map(|p| p.delta_e).collect();
        delta_es.sort_by(f64::total_cmp);
        let median_delta_e = match delta_es.len() {
            0 => 0.0,
            len if len % 2 == 1 => delta_es[len / 2],
            len => 0.5 * (delta_es[len / 2 - 1] + delta_es[len / 2]),
        };

        let mut rms_residual = [0.0; 3];
        for p in &patches {
            for (acc, r) in rms_residual.iter_mut().zip(p.residual) {
                *acc += r * r;
            }
        }

        Self {
            method,
            working_space,
            mean_delta_e: delta_es.iter().sum::<f64>() / n,
            median_delta_e,
            max_delta_e: delta_es.last().copied().unwrap_or(0.0),
            rms_residual: rms_residual.map(|s| (s / n).sqrt()),
            patches,
        }
    }

    /// Patch with the largest ΔE
    pub fn worst_patch(&self) -> Option<&PatchResidual> {
        self.patches.iter().max_by(|a, b| a.delta_e.total_cmp(&b.delta_e))
    }

    /// Compare against quality limits
    pub fn check(&self, thresholds: &QualityThresholds) -> Option<CalibrationQualityWarning> {
        if self.mean_delta_e <= thresholds.max_mean_delta_e && self.max_delta_e <= thresholds.max_patch_delta_e {
            return None;
        }
        let worst = self.worst_patch()?;
        Some(CalibrationQualityWarning {
            mean_delta_e: self.mean_delta_e,
            max_delta_e: self.max_delta_e,
            worst_patch_id: worst.patch_id,
            worst_patch_name: worst.patch_name.clone(),
            max_mean_delta_e: thresholds.max_mean_delta_e,
            max_patch_delta_e: thresholds.max_patch_delta_e,
        })
    }
}

/// Fits correctors for a chart in a chosen working space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingFitter {
    method: MappingMethod,
    working_space: ColorSpace,
}

impl MappingFitter {
    pub fn new(method: MappingMethod, working_space: ColorSpace) -> Self {
        Self { method, working_space }
    }

    pub fn method(&self) -> MappingMethod {
        self.method
    }

    pub fn working_space(&self) -> ColorSpace {
        self.working_space
    }

    /// Fit a corrector from sampled patch colors to the chart references
    ///
    /// Samples are device RGB; reference colors are the chart's Lab values.
    /// Both are converted into the working space with the chart's converter.
    ///
    /// # Errors
    ///
    /// - `UnsupportedSpace` if the working space is not a fitting space
    /// - `UnderdeterminedFit` if there are fewer samples than free coefficients
    /// - `InvalidParameter` if a sample names a patch the chart lacks
    /// - `NumericalFailure` if the solver fails
    pub fn fit(&self, samples: &[SampledColor], aligned: &AlignedChart) -> Result<(Corrector, FitDiagnostics)> {
        self.working_space.require_fitting_space()?;
        let converter = aligned.chart().color_converter();

        let mut names = Vec::with_capacity(samples.len());
        let mut observed = Vec::with_capacity(samples.len());
        let mut reference = Vec::with_capacity(samples.len());
        let mut reference_lab = Vec::with_capacity(samples.len());
        for sample in samples {
            let patch = aligned.patch(sample.patch_id).ok_or_else(|| CalibrationError::InvalidParameter {
                parameter: "patch_id".to_string(),
                value: format!("{} is not on chart '{}'", sample.patch_id, aligned.chart().name()),
            })?;
            names.push((patch.id, patch.name.clone()));
            observed.push(converter.convert(sample.value, ColorSpace::DeviceRgb, self.working_space));
            reference.push(converter.convert(patch.reference_lab, ColorSpace::Lab, self.working_space));
            reference_lab.push(patch.reference_lab);
        }

        let corrector = fit_vectors(&observed, &reference, self.method)?;

        let patches = names
            .into_iter()
            .enumerate()
            .map(|(i, (patch_id, patch_name))| {
                let corrected = corrector.apply(observed[i]);
                let corrected_lab = converter.convert(corrected, self.working_space, ColorSpace::Lab);
                PatchResidual {
                    patch_id,
                    patch_name,
                    observed: observed[i],
                    reference: reference[i],
                    corrected,
                    residual: [
                        corrected[0] - reference[i][0],
                        corrected[1] - reference[i][1],
                        corrected[2] - reference[i][2],
                    ],
                    delta_e: converter.delta_e(corrected_lab, reference_lab[i]),
                }
            })
            .collect();

        let diagnostics = FitDiagnostics::from_patches(self.method, self.working_space, patches);
        debug!(
            method = %self.method,
            space = %self.working_space,
            patches = samples.len(),
            mean_delta_e = diagnostics.mean_delta_e,
            max_delta_e = diagnostics.max_delta_e,
            "fitted color mapping"
        );
        Ok((corrector, diagnostics))
    }
}

/// Fit a corrector directly on working-space color vectors
///
/// # Errors
///
/// - `InvalidParameter` if the slices differ in length
/// - `UnderdeterminedFit` if there are fewer pairs than free coefficients
/// - `NumericalFailure` if the solver fails or yields non-finite values
pub fn fit_vectors(observed: &[[f64; 3]], reference: &[[f64; 3]], method: MappingMethod) -> Result<Corrector> {
    if observed.len() != reference.len() {
        return Err(CalibrationError::InvalidParameter {
            parameter: "reference".to_string(),
            value: format!("{} reference colors for {} observed colors", reference.len(), observed.len()),
        });
    }
    let required = method.free_coefficients();
    if observed.len() < required {
        return Err(CalibrationError::UnderdeterminedFit {
            method,
            required,
            available: observed.len(),
        });
    }

    let n = observed.len();
    let corrector = match method {
        MappingMethod::Linear => {
            let mut gain = [0.0; 3];
            let mut offset = [0.0; 3];
            for band in 0..3 {
                let design = DMatrix::from_fn(n, 2, |r, c| if c == 0 { 1.0 } else { observed[r][band] });
                let rhs = DMatrix::from_fn(n, 1, |r, _| reference[r][band]);
                let x = solve_least_squares(design, rhs)?;
                offset[band] = x[(0, 0)];
                gain[band] = x[(1, 0)];
            }
            Corrector::Linear { gain, offset }
        }
        _ => {
            let count = method.terms_per_band();
            let rows: Vec<[f64; 20]> = observed.iter().map(|v| cross_band_terms(*v, count)).collect();
            let design = DMatrix::from_fn(n, count, |r, c| rows[r][c]);
            let rhs = DMatrix::from_fn(n, 3, |r, c| reference[r][c]);
            let x = solve_least_squares(design, rhs)?;

            if method == MappingMethod::LinearCrossBand {
                let mut matrix = [[0.0; 3]; 3];
                let mut offset = [0.0; 3];
                for band in 0..3 {
                    offset[band] = x[(0, band)];
                    for (c, m) in matrix[band].iter_mut().enumerate() {
                        *m = x[(c + 1, band)];
                    }
                }
                Corrector::LinearCrossBand { matrix, offset }
            } else {
                let coefficients = [0, 1, 2].map(|band| x.column(band).iter().copied().collect::<Vec<f64>>());
                let degree = if method == MappingMethod::QuadraticCrossBand { 2 } else { 3 };
                Corrector::Polynomial { degree, coefficients }
            }
        }
    };

    corrector.validate()?;
    Ok(corrector)
}

/// Minimum-norm least-squares solution of `design * x = rhs`
fn solve_least_squares(design: DMatrix<f64>, rhs: DMatrix<f64>) -> Result<DMatrix<f64>> {
    let svd = design.svd(true, true);
    svd.solve(&rhs, SVD_EPSILON)
        .map_err(|e| CalibrationError::numerical("least squares", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid_samples(n_per_axis: usize) -> Vec<[f64; 3]> {
        let step = 1.0 / (n_per_axis - 1) as f64;
        let mut out = Vec::new();
        for i in 0..n_per_axis {
            for j in 0..n_per_axis {
                for k in 0..n_per_axis {
                    out.push([i as f64 * step, j as f64 * step, k as f64 * step]);
                }
            }
        }
        out
    }

    #[test]
    fn test_method_names_round_trip() {
        for method in MappingMethod::ALL {
            assert_eq!(method.name().parse::<MappingMethod>().unwrap(), method);
        }
        assert_eq!("linear cross band".parse::<MappingMethod>().unwrap(), MappingMethod::LinearCrossBand);
        assert!("spline".parse::<MappingMethod>().is_err());
    }

    #[test]
    fn test_terms_per_band() {
        assert_eq!(MappingMethod::Linear.terms_per_band(), 2);
        assert_eq!(MappingMethod::LinearCrossBand.terms_per_band(), 4);
        assert_eq!(MappingMethod::QuadraticCrossBand.terms_per_band(), 10);
        assert_eq!(MappingMethod::CubicCrossBand.terms_per_band(), 20);
    }

    #[test]
    fn test_free_coefficients() {
        let counts: Vec<usize> = MappingMethod::ALL.iter().map(|m| m.free_coefficients()).collect();
        assert_eq!(counts, vec![6, 12, 30, 60]);
    }

    #[test]
    fn test_linear_recovers_gain_offset() {
        let observed = grid_samples(3);
        let reference: Vec<[f64; 3]> = observed
            .iter()
            .map(|v| [2.0 * v[0] + 0.1, 0.5 * v[1] - 0.2, v[2] + 0.3])
            .collect();
        let corrector = fit_vectors(&observed, &reference, MappingMethod::Linear).unwrap();
        match &corrector {
            Corrector::Linear { gain, offset } => {
                assert_relative_eq!(gain[0], 2.0, epsilon = 1e-10);
                assert_relative_eq!(offset[1], -0.2, epsilon = 1e-10);
                assert_relative_eq!(offset[2], 0.3, epsilon = 1e-10);
            }
            other => panic!("unexpected corrector {:?}", other),
        }
    }

    #[test]
    fn test_cross_band_recovers_matrix() {
        let m = [[0.9, 0.1, -0.05], [0.05, 1.1, 0.0], [-0.02, 0.03, 0.95]];
        let observed = grid_samples(3);
        let reference: Vec<[f64; 3]> = observed
            .iter()
            .map(|v| {
                [0, 1, 2].map(|b| m[b][0] * v[0] + m[b][1] * v[1] + m[b][2] * v[2] + 0.01 * b as f64)
            })
            .collect();
        let corrector = fit_vectors(&observed, &reference, MappingMethod::LinearCrossBand).unwrap();
        for (o, r) in observed.iter().zip(&reference) {
            let c = corrector.apply(*o);
            for b in 0..3 {
                assert_relative_eq!(c[b], r[b], epsilon = 1e-10);
            }
        }
        assert_eq!(corrector.method(), MappingMethod::LinearCrossBand);
    }

    #[test]
    fn test_quadratic_and_cubic_fit_polynomials_exactly() {
        let observed = grid_samples(4);
        let reference: Vec<[f64; 3]> = observed
            .iter()
            .map(|v| [v[0] * v[0] + 0.1 * v[1], v[1] * v[2], 0.5 + v[2] * v[2] * v[0]])
            .collect();

        let cubic = fit_vectors(&observed, &reference, MappingMethod::CubicCrossBand).unwrap();
        assert_eq!(cubic.method(), MappingMethod::CubicCrossBand);
        let sample_color = [0.3, 0.7, 0.2];
        let out = cubic.apply(sample_color);
        assert_relative_eq!(out[0], 0.09 + 0.07, epsilon = 1e-9);
        assert_relative_eq!(out[1], 0.14, epsilon = 1e-9);
        assert_relative_eq!(out[2], 0.5 + 0.012, epsilon = 1e-9);

        let quadratic = fit_vectors(&observed, &reference, MappingMethod::QuadraticCrossBand).unwrap();
        let out = quadratic.apply(sample_color);
        assert_relative_eq!(out[1], 0.14, epsilon = 1e-9);
    }

    #[test]
    fn test_underdetermined() {
        let observed = grid_samples(3);
        let err = fit_vectors(&observed[..6], &observed[..6], MappingMethod::LinearCrossBand).unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::UnderdeterminedFit { required: 12, available: 6, .. }
        ));
        let err = fit_vectors(&observed, &observed, MappingMethod::QuadraticCrossBand).unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::UnderdeterminedFit { required: 30, available: 27, .. }
        ));

        // Exactly as many samples as free coefficients is enough
        assert!(fit_vectors(&observed[..12], &observed[..12], MappingMethod::LinearCrossBand).is_ok());
        assert!(fit_vectors(&observed[..6], &observed[..6], MappingMethod::Linear).is_ok());
    }

    #[test]
    fn test_length_mismatch() {
        let observed = grid_samples(2);
        assert!(matches!(
            fit_vectors(&observed, &observed[..5], MappingMethod::Linear),
            Err(CalibrationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_lab_shift_corrected() {
        // Observed Lab colors are the references shifted by (+5, +3, -2)
        let reference: Vec<[f64; 3]> = grid_samples(3)
            .iter()
            .map(|v| [20.0 + 70.0 * v[0], -40.0 + 80.0 * v[1], -40.0 + 80.0 * v[2]])
            .collect();
        let observed: Vec<[f64; 3]> = reference.iter().map(|r| [r[0] + 5.0, r[1] + 3.0, r[2] - 2.0]).collect();
        let corrector = fit_vectors(&observed, &reference, MappingMethod::LinearCrossBand).unwrap();
        let corrected = corrector.apply([55.0, 3.0, -2.0]);
        let de = crate::color::ColorConverter::default().delta_e(corrected, [50.0, 0.0, 0.0]);
        assert!(de < 1.0, "ΔE {}", de);
    }

    #[test]
    fn test_identity_and_validate() {
        let id = Corrector::identity();
        assert_eq!(id.apply([0.2, 0.4, 0.6]), [0.2, 0.4, 0.6]);
        assert!(id.validate().is_ok());

        let bad = Corrector::Polynomial {
            degree: 2,
            coefficients: [vec![0.0; 10], vec![0.0; 9], vec![0.0; 10]],
        };
        assert!(bad.validate().is_err());
        let bad_degree = Corrector::Polynomial {
            degree: 5,
            coefficients: [vec![], vec![], vec![]],
        };
        assert!(bad_degree.validate().is_err());
        let nan = Corrector::Linear {
            gain: [f64::NAN, 1.0, 1.0],
            offset: [0.0; 3],
        };
        assert!(matches!(nan.validate(), Err(CalibrationError::NumericalFailure { .. })));
    }

    #[test]
    fn test_corrector_serde() {
        let corrector = Corrector::LinearCrossBand {
            matrix: [[1.0, 0.5, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            offset: [0.1, 0.0, 0.0],
        };
        let json = serde_json::to_string(&corrector).unwrap();
        assert!(json.contains("\"method\":\"linear_cross_band\""));
        let restored: Corrector = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, corrector);
    }

    #[test]
    fn test_quality_check() {
        let patch = |id: usize, de: f64| PatchResidual {
            patch_id: id,
            patch_name: format!("P{}", id),
            observed: [0.0; 3],
            reference: [0.0; 3],
            corrected: [0.0; 3],
            residual: [de, 0.0, 0.0],
            delta_e: de,
        };
        let good = FitDiagnostics::from_patches(
            MappingMethod::Linear,
            ColorSpace::LinearRgb,
            vec![patch(1, 0.5), patch(2, 1.5), patch(3, 1.0)],
        );
        assert_relative_eq!(good.mean_delta_e, 1.0);
        assert_relative_eq!(good.median_delta_e, 1.0);
        assert_relative_eq!(good.max_delta_e, 1.5);
        assert!(good.check(&QualityThresholds::default()).is_none());

        let bad = FitDiagnostics::from_patches(
            MappingMethod::Linear,
            ColorSpace::LinearRgb,
            vec![patch(1, 0.5), patch(2, 12.0)],
        );
        let warning = bad.check(&QualityThresholds::default()).unwrap();
        assert_eq!(warning.worst_patch_id, 2);
        assert!(warning.to_string().contains("P2"));
    }
}
