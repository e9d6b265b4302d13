//! Patch-grid color charts and their alignment to an image
//!
//! A chart is a `columns × rows` grid of unit chips in chart coordinates.
//! Chip `i` (row-major) occupies `[c, c+1] × [r, r+1]`; its sampling region
//! is the chip shrunk by `chip_margin` on every side. Alignment fits a
//! transform from the chart outline corners to the ROI and maps every chip
//! into image pixels.
//!
//! Algorithm tag: `algo-grid-chart-alignment`

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::roi::Roi;
use super::transform::{ChartTransform, TransformKind};
use crate::color::{ColorConverter, ColorSpace, ReferenceWhite};
use crate::constants::sampling::{DEFAULT_CHIP_MARGIN, MAX_CHIP_MARGIN};
use crate::{CalibrationError, Result};

/// Quadrilateral vertices in drawing order
pub type Quad = [[f64; 2]; 4];

/// One chart swatch with its published reference color
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// 1-based position in row-major chart order
    pub id: usize,
    /// Human-readable swatch name
    pub name: String,
    /// CIE L*a*b* relative to the chart's reference white
    pub reference_lab: [f64; 3],
}

/// Reference chart with a regular grid of patches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridChart {
    name: String,
    columns: usize,
    rows: usize,
    #[serde(default = "default_chip_margin")]
    chip_margin: f64,
    reference_white: ReferenceWhite,
    patches: Vec<Patch>,
    /// Per-patch switch; empty means every patch is enabled
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    enabled: Vec<bool>,
}

fn default_chip_margin() -> f64 {
    DEFAULT_CHIP_MARGIN
}

impl GridChart {
    /// Create a chart from named reference colors listed in row-major order
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the color count does not fill the grid
    pub fn new(
        name: impl Into<String>,
        columns: usize,
        rows: usize,
        reference_white: ReferenceWhite,
        reference_colors: &[(&str, [f64; 3])],
    ) -> Result<Self> {
        let chart = Self::from_table(name, columns, rows, reference_white, reference_colors);
        chart.validate()?;
        Ok(chart)
    }

    /// Chart from a row-major color table, without consistency checks
    pub(crate) fn from_table(
        name: impl Into<String>,
        columns: usize,
        rows: usize,
        reference_white: ReferenceWhite,
        reference_colors: &[(&str, [f64; 3])],
    ) -> Self {
        let patches = reference_colors
            .iter()
            .enumerate()
            .map(|(i, (patch_name, lab))| Patch {
                id: i + 1,
                name: patch_name.to_string(),
                reference_lab: *lab,
            })
            .collect();

        Self {
            name: name.into(),
            columns,
            rows,
            chip_margin: DEFAULT_CHIP_MARGIN,
            reference_white,
            patches,
            enabled: Vec::new(),
        }
    }

    /// Check structural consistency (used after deserialization too)
    pub fn validate(&self) -> Result<()> {
        if self.columns == 0 || self.rows == 0 {
            return Err(CalibrationError::InvalidParameter {
                parameter: "chart_grid".to_string(),
                value: format!("{}x{}", self.columns, self.rows),
            });
        }
        if self.patches.len() != self.columns * self.rows {
            return Err(CalibrationError::InvalidParameter {
                parameter: "chart_patches".to_string(),
                value: format!(
                    "{} reference colors for a {}x{} grid",
                    self.patches.len(),
                    self.columns,
                    self.rows
                ),
            });
        }
        if let Some((i, p)) = self.patches.iter().enumerate().find(|(i, p)| p.id != i + 1) {
            return Err(CalibrationError::InvalidParameter {
                parameter: "chart_patch_id".to_string(),
                value: format!("patch at position {} has id {}", i + 1, p.id),
            });
        }
        if !self.enabled.is_empty() && self.enabled.len() != self.patches.len() {
            return Err(CalibrationError::InvalidParameter {
                parameter: "enabled_patches".to_string(),
                value: format!("{} flags for {} patches", self.enabled.len(), self.patches.len()),
            });
        }
        if !(0.0..=MAX_CHIP_MARGIN).contains(&self.chip_margin) {
            return Err(CalibrationError::InvalidParameter {
                parameter: "chip_margin".to_string(),
                value: self.chip_margin.to_string(),
            });
        }
        Ok(())
    }

    /// Copy of this chart with a different sampling margin
    pub fn with_chip_margin(&self, chip_margin: f64) -> Result<Self> {
        let chart = Self {
            chip_margin,
            ..self.clone()
        };
        chart.validate()?;
        Ok(chart)
    }

    /// Copy of this chart with only the flagged patches taking part in fitting
    pub fn with_enabled_patches(&self, enabled: &[bool]) -> Result<Self> {
        let chart = Self {
            enabled: enabled.to_vec(),
            ..self.clone()
        };
        chart.validate()?;
        Ok(chart)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn chip_margin(&self) -> f64 {
        self.chip_margin
    }

    pub fn reference_white(&self) -> ReferenceWhite {
        self.reference_white
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Whether the patch at `index` (0-based) takes part in fitting
    pub fn is_enabled(&self, index: usize) -> bool {
        self.enabled.get(index).copied().unwrap_or(true)
    }

    /// Number of patches taking part in fitting
    pub fn enabled_count(&self) -> usize {
        (0..self.patches.len()).filter(|i| self.is_enabled(*i)).count()
    }

    /// Converter between the chart's Lab values and other spaces
    pub fn color_converter(&self) -> ColorConverter {
        ColorConverter::new(self.reference_white)
    }

    /// Reference colors of all patches expressed in `space`
    pub fn reference_colors(&self, space: ColorSpace) -> Vec<[f64; 3]> {
        let converter = self.color_converter();
        self.patches
            .iter()
            .map(|p| converter.convert(p.reference_lab, ColorSpace::Lab, space))
            .collect()
    }

    /// Chart outline corners: top-left, top-right, bottom-right, bottom-left
    pub fn reference_outline(&self) -> Quad {
        let (w, h) = (self.columns as f64, self.rows as f64);
        [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]]
    }

    /// Full chip square of the patch at `index` in chart coordinates
    pub fn patch_outline(&self, index: usize) -> Quad {
        self.chip_rect(index, 0.0)
    }

    /// Chip square shrunk by the chip margin, in chart coordinates
    pub fn patch_sampling_outline(&self, index: usize) -> Quad {
        self.chip_rect(index, self.chip_margin)
    }

    fn chip_rect(&self, index: usize, margin: f64) -> Quad {
        let c = (index % self.columns) as f64;
        let r = (index / self.columns) as f64;
        [
            [c + margin, r + margin],
            [c + 1.0 - margin, r + margin],
            [c + 1.0 - margin, r + 1.0 - margin],
            [c + margin, r + 1.0 - margin],
        ]
    }

    /// Align the chart to an ROI in image coordinates
    ///
    /// The ROI points correspond, in order, to the chart outline corners.
    /// Affine alignment uses 3 or 4 corners, perspective alignment all 4.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientGeometry` if the ROI points cannot be matched to
    /// the outline corners or are degenerate
    pub fn align_to(&self, roi: &Roi, kind: TransformKind) -> Result<AlignedChart> {
        let outline = self.reference_outline();
        if roi.len() > outline.len() {
            return Err(CalibrationError::InsufficientGeometry {
                kind,
                needed: kind.min_points(),
                got: roi.len(),
                reason: format!("the chart outline has only {} corners to match", outline.len()),
            });
        }

        let src = &outline[..roi.len()];
        let transform = ChartTransform::fit(kind, src, roi.points())?;
        debug!(
            chart = %self.name,
            kind = %kind,
            rms = transform.rms_error(src, roi.points()),
            "aligned chart to ROI"
        );

        let patches = self
            .patches
            .iter()
            .enumerate()
            .map(|(i, patch)| AlignedPatch {
                id: patch.id,
                name: patch.name.clone(),
                reference_lab: patch.reference_lab,
                enabled: self.is_enabled(i),
                outline: map_quad(&transform, &self.patch_outline(i)),
                sampling_outline: map_quad(&transform, &self.patch_sampling_outline(i)),
            })
            .collect();

        Ok(AlignedChart {
            chart: self.clone(),
            outline: map_quad(&transform, &outline),
            transform,
            patches,
        })
    }
}

fn map_quad(transform: &ChartTransform, quad: &Quad) -> Quad {
    [
        transform.apply(quad[0]),
        transform.apply(quad[1]),
        transform.apply(quad[2]),
        transform.apply(quad[3]),
    ]
}

/// Patch geometry mapped into image pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPatch {
    pub id: usize,
    pub name: String,
    pub reference_lab: [f64; 3],
    pub enabled: bool,
    /// Full chip outline in image pixels
    pub outline: Quad,
    /// Sampling region (chip minus margin) in image pixels
    pub sampling_outline: Quad,
}

impl AlignedPatch {
    /// Whether an image point lies inside the sampling region
    ///
    /// Even-odd crossing test, valid for any simple quadrilateral.
    pub fn samples(&self, x: f64, y: f64) -> bool {
        let q = &self.sampling_outline;
        let mut inside = false;
        let mut j = q.len() - 1;
        for i in 0..q.len() {
            let (xi, yi) = (q[i][0], q[i][1]);
            let (xj, yj) = (q[j][0], q[j][1]);
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Bounding box of the sampling region: (min_x, min_y, max_x, max_y)
    pub fn sampling_bounds(&self) -> (f64, f64, f64, f64) {
        let q = &self.sampling_outline;
        q.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), p| (x0.min(p[0]), y0.min(p[1]), x1.max(p[0]), y1.max(p[1])),
        )
    }
}

/// Chart whose patch geometry has been mapped into an image
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedChart {
    chart: GridChart,
    transform: ChartTransform,
    outline: Quad,
    patches: Vec<AlignedPatch>,
}

impl AlignedChart {
    /// Chart template this alignment was derived from
    pub fn chart(&self) -> &GridChart {
        &self.chart
    }

    /// Fitted chart → image transform
    pub fn transform(&self) -> &ChartTransform {
        &self.transform
    }

    /// Chart outline in image pixels
    pub fn outline(&self) -> &Quad {
        &self.outline
    }

    /// All patches in chart order
    pub fn patches(&self) -> &[AlignedPatch] {
        &self.patches
    }

    /// Patches taking part in fitting, in chart order
    pub fn enabled_patches(&self) -> impl Iterator<Item = &AlignedPatch> {
        self.patches.iter().filter(|p| p.enabled)
    }

    /// Look up a patch by its 1-based id
    pub fn patch(&self, id: usize) -> Option<&AlignedPatch> {
        id.checked_sub(1).and_then(|i| self.patches.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ColorCharts;

    fn small_chart() -> GridChart {
        GridChart::new(
            "Test 2x2",
            2,
            2,
            ReferenceWhite::D65,
            &[
                ("White", [95.0, 0.0, 0.0]),
                ("Gray", [50.0, 0.0, 0.0]),
                ("Red", [45.0, 60.0, 40.0]),
                ("Blue", [30.0, 20.0, -50.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_grid_size_must_match_colors() {
        let result = GridChart::new("bad", 3, 2, ReferenceWhite::D65, &[("a", [50.0, 0.0, 0.0])]);
        assert!(matches!(result, Err(CalibrationError::InvalidParameter { .. })));
    }

    #[test]
    fn test_patch_outlines() {
        let chart = small_chart();
        assert_eq!(chart.patch_outline(3), [[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 2.0]]);
        let s = chart.patch_sampling_outline(0);
        assert!((s[0][0] - 0.2).abs() < 1e-12);
        assert!((s[2][1] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_identity_alignment() {
        let chart = small_chart();
        let roi = Roi::new(chart.reference_outline().to_vec()).unwrap();
        for kind in [TransformKind::Affine, TransformKind::Perspective] {
            let aligned = chart.align_to(&roi, kind).unwrap();
            assert!(aligned.transform().is_identity(1e-8));
            for (i, patch) in aligned.patches().iter().enumerate() {
                let expected = chart.patch_outline(i);
                for k in 0..4 {
                    assert!((patch.outline[k][0] - expected[k][0]).abs() < 1e-8);
                    assert!((patch.outline[k][1] - expected[k][1]).abs() < 1e-8);
                }
            }
        }
    }

    #[test]
    fn test_alignment_scales_patches() {
        let chart = small_chart();
        let roi = Roi::from_rect(100.0, 50.0, 200.0, 200.0);
        let aligned = chart.align_to(&roi, TransformKind::Perspective).unwrap();
        let last = aligned.patch(4).unwrap();
        assert!((last.outline[0][0] - 200.0).abs() < 1e-6);
        assert!((last.outline[0][1] - 150.0).abs() < 1e-6);
        assert!(last.samples(250.0, 200.0)); // chip center
        assert!(!last.samples(205.0, 200.0)); // inside chip but in margin
        let (x0, y0, x1, y1) = last.sampling_bounds();
        assert!((x0 - 220.0).abs() < 1e-6 && (x1 - 280.0).abs() < 1e-6);
        assert!((y0 - 170.0).abs() < 1e-6 && (y1 - 230.0).abs() < 1e-6);
    }

    #[test]
    fn test_affine_alignment_from_three_corners() {
        let chart = small_chart();
        let roi = Roi::new(vec![[10.0, 10.0], [110.0, 10.0], [110.0, 110.0]]).unwrap();
        let aligned = chart.align_to(&roi, TransformKind::Affine).unwrap();
        let bl = aligned.outline()[3];
        assert!((bl[0] - 10.0).abs() < 1e-8 && (bl[1] - 110.0).abs() < 1e-8);

        let err = chart.align_to(&roi, TransformKind::Perspective).unwrap_err();
        assert!(matches!(err, CalibrationError::InsufficientGeometry { needed: 4, got: 3, .. }));
    }

    #[test]
    fn test_too_many_roi_points() {
        let chart = small_chart();
        let roi = Roi::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.5, 1.5]]).unwrap();
        assert!(matches!(
            chart.align_to(&roi, TransformKind::Affine),
            Err(CalibrationError::InsufficientGeometry { got: 5, .. })
        ));
    }

    #[test]
    fn test_enabled_patches() {
        let chart = small_chart()
            .with_enabled_patches(&[true, false, true, false])
            .unwrap();
        assert_eq!(chart.enabled_count(), 2);
        let aligned = chart
            .align_to(&Roi::from_rect(0.0, 0.0, 20.0, 20.0), TransformKind::Affine)
            .unwrap();
        let ids: Vec<usize> = aligned.enabled_patches().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3]);

        assert!(small_chart().with_enabled_patches(&[true]).is_err());
    }

    #[test]
    fn test_chip_margin_bounds() {
        assert!(small_chart().with_chip_margin(0.3).is_ok());
        assert!(small_chart().with_chip_margin(0.5).is_err());
        assert!(small_chart().with_chip_margin(-0.1).is_err());
    }

    #[test]
    fn test_reference_colors_in_lab_are_unchanged() {
        let chart = ColorCharts::color_checker_24();
        let labs = chart.reference_colors(ColorSpace::Lab);
        assert_eq!(labs[21], chart.patches()[21].reference_lab);
    }

    #[test]
    fn test_serde_round_trip() {
        let chart = small_chart().with_enabled_patches(&[true, true, false, true]).unwrap();
        let json = serde_json::to_string(&chart).unwrap();
        let restored: GridChart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, chart);
        assert!(restored.validate().is_ok());
    }
}
