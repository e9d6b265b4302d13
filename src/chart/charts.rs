//! Built-in reference charts and a name-keyed chart catalog

use std::collections::BTreeMap;

use tracing::debug;

use super::grid::GridChart;
use crate::color::ReferenceWhite;
use crate::{CalibrationError, Result};

/// Name of the built-in 24-patch chart
pub const COLOR_CHECKER_24: &str = "ColorChecker 24";

/// GretagMacbeth ColorChecker Classic, post-2009 formulation, D50 L*a*b*
const COLOR_CHECKER_24_LAB: [(&str, [f64; 3]); 24] = [
    ("Dark Skin", [37.54, 14.37, 14.92]),
    ("Light Skin", [64.66, 19.27, 17.50]),
    ("Blue Sky", [49.32, -3.82, -22.54]),
    ("Foliage", [43.46, -12.74, 22.72]),
    ("Blue Flower", [54.94, 9.61, -24.79]),
    ("Bluish Green", [70.48, -32.26, -0.37]),
    ("Orange", [62.73, 35.83, 56.50]),
    ("Purplish Blue", [39.43, 10.75, -45.17]),
    ("Moderate Red", [50.57, 48.64, 16.67]),
    ("Purple", [30.10, 22.54, -20.87]),
    ("Yellow Green", [71.77, -24.13, 58.19]),
    ("Orange Yellow", [71.51, 18.24, 67.37]),
    ("Blue", [28.37, 15.42, -49.80]),
    ("Green", [54.38, -39.72, 32.27]),
    ("Red", [42.43, 51.05, 28.62]),
    ("Yellow", [81.80, 2.67, 80.41]),
    ("Magenta", [50.63, 51.28, -14.12]),
    ("Cyan", [49.57, -29.71, -28.32]),
    ("White 9.5", [95.19, -1.03, 2.93]),
    ("Neutral 8", [81.29, -0.57, 0.44]),
    ("Neutral 6.5", [66.89, -0.75, -0.06]),
    ("Neutral 5", [50.76, -0.13, 0.14]),
    ("Neutral 3.5", [35.63, -0.46, -0.48]),
    ("Black 2", [20.64, 0.07, -0.46]),
];

/// Name of the built-in 30-patch ColorGauge chart
pub const COLOR_GAUGE_MATTE: &str = "Image Science ColorGauge Matte";

/// Neutral steps of the ColorGauge, nominal D50 L*a*b*, light to dark
const COLOR_GAUGE_NEUTRALS: [(&str, [f64; 3]); 12] = [
    ("N1", [96.0, 0.0, 0.0]),
    ("N2", [90.0, 0.0, 0.0]),
    ("N3", [84.0, 0.0, 0.0]),
    ("N4", [78.0, 0.0, 0.0]),
    ("N5", [72.0, 0.0, 0.0]),
    ("N6", [66.0, 0.0, 0.0]),
    ("N7", [59.0, 0.0, 0.0]),
    ("N8", [52.0, 0.0, 0.0]),
    ("N9", [44.0, 0.0, 0.0]),
    ("N10", [36.0, 0.0, 0.0]),
    ("N11", [28.0, 0.0, 0.0]),
    ("N12", [20.0, 0.0, 0.0]),
];

/// Factory for built-in chart templates
pub struct ColorCharts;

impl ColorCharts {
    /// 6 × 4 ColorChecker, dark skin at top-left, D50 reference white
    pub fn color_checker_24() -> GridChart {
        GridChart::from_table(COLOR_CHECKER_24, 6, 4, ReferenceWhite::D50, &COLOR_CHECKER_24_LAB)
    }

    /// 6 × 5 Image Science ColorGauge Matte, D50 reference white
    ///
    /// The top three rows carry the 18 chromatic ColorChecker colors in
    /// ColorChecker order, the bottom two rows a 12-step neutral ramp.
    /// Values are nominal; register a custom chart built from the target's
    /// measurement sheet when per-batch data is available.
    pub fn image_science_color_gauge_matte() -> GridChart {
        let table: Vec<(&str, [f64; 3])> = COLOR_CHECKER_24_LAB[..18]
            .iter()
            .chain(COLOR_GAUGE_NEUTRALS.iter())
            .copied()
            .collect();
        GridChart::from_table(COLOR_GAUGE_MATTE, 6, 5, ReferenceWhite::D50, &table)
    }
}

/// Chart templates available to a calibration session, keyed by name
#[derive(Debug, Clone)]
pub struct ChartCatalog {
    charts: BTreeMap<String, GridChart>,
}

impl Default for ChartCatalog {
    /// Catalog with every built-in chart registered
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.insert(ColorCharts::color_checker_24());
        catalog.insert(ColorCharts::image_science_color_gauge_matte());
        catalog
    }
}

impl ChartCatalog {
    /// Catalog with no charts
    pub fn empty() -> Self {
        Self {
            charts: BTreeMap::new(),
        }
    }

    /// Add a custom chart, replacing any chart with the same name
    pub fn register(&mut self, chart: GridChart) -> Result<()> {
        chart.validate()?;
        debug!(chart = chart.name(), patches = chart.patches().len(), "registered chart");
        self.insert(chart);
        Ok(())
    }

    fn insert(&mut self, chart: GridChart) {
        self.charts.insert(chart.name().to_string(), chart);
    }

    /// Look up a chart by exact name
    pub fn get(&self, name: &str) -> Result<&GridChart> {
        self.charts
            .get(name)
            .ok_or_else(|| CalibrationError::InvalidParameter {
                parameter: "chart".to_string(),
                value: format!("unknown chart '{}' (known: {})", name, self.names().join(", ")),
            })
    }

    /// Registered chart names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.charts.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorConverter, ColorSpace};

    #[test]
    fn test_color_checker_layout() {
        let chart = ColorCharts::color_checker_24();
        assert_eq!(chart.columns(), 6);
        assert_eq!(chart.rows(), 4);
        assert_eq!(chart.patches().len(), 24);
        assert_eq!(chart.patches()[0].name, "Dark Skin");
        assert_eq!(chart.patches()[23].id, 24);
        assert_eq!(chart.reference_white(), ReferenceWhite::D50);
        assert_eq!(chart.enabled_count(), 24);
    }

    #[test]
    fn test_color_gauge_layout() {
        let chart = ColorCharts::image_science_color_gauge_matte();
        assert!(chart.validate().is_ok());
        assert_eq!(chart.name(), COLOR_GAUGE_MATTE);
        assert_eq!((chart.columns(), chart.rows()), (6, 5));
        assert_eq!(chart.patches().len(), 30);
        assert_eq!(chart.patches()[0].name, "Dark Skin");
        assert_eq!(chart.patches()[17].name, "Cyan");
        assert_eq!(chart.patches()[18].name, "N1");
        assert_eq!(chart.patches()[29].id, 30);
        assert_eq!(chart.reference_white(), ReferenceWhite::D50);

        // The neutral ramp darkens monotonically
        let ramp: Vec<f64> = chart.patches()[18..].iter().map(|p| p.reference_lab[0]).collect();
        assert!(ramp.windows(2).all(|w| w[0] > w[1]));

        // Enough patches for a quadratic cross-band fit
        assert!(chart.enabled_count() >= crate::calibration::MappingMethod::QuadraticCrossBand.free_coefficients());
    }

    #[test]
    fn test_neutral_row_is_neutral() {
        let chart = ColorCharts::color_checker_24();
        for patch in &chart.patches()[18..] {
            let chroma = patch.reference_lab[1].hypot(patch.reference_lab[2]);
            assert!(chroma < 3.2, "{} chroma {}", patch.name, chroma);
        }
    }

    #[test]
    fn test_reference_colors_in_srgb_gamut_mostly() {
        let chart = ColorCharts::color_checker_24();
        let converter = ColorConverter::new(ReferenceWhite::D50);
        let in_gamut = chart
            .patches()
            .iter()
            .filter(|p| converter.is_in_srgb_gamut(p.reference_lab))
            .count();
        assert!(in_gamut >= 20);
        let rgb = chart.reference_colors(ColorSpace::DeviceRgb);
        assert!(rgb[18].iter().all(|c| *c > 0.9));
    }

    #[test]
    fn test_catalog_lookup() {
        let mut catalog = ChartCatalog::default();
        assert!(catalog.get(COLOR_CHECKER_24).is_ok());
        assert_eq!(catalog.get(COLOR_GAUGE_MATTE).unwrap().patches().len(), 30);
        assert!(matches!(
            catalog.get("nope"),
            Err(CalibrationError::InvalidParameter { .. })
        ));

        let custom = GridChart::new("Gray pair", 2, 1, ReferenceWhite::D65, &[
            ("Light", [80.0, 0.0, 0.0]),
            ("Dark", [20.0, 0.0, 0.0]),
        ])
        .unwrap();
        catalog.register(custom).unwrap();
        assert_eq!(catalog.names(), vec![COLOR_CHECKER_24, "Gray pair", COLOR_GAUGE_MATTE]);
        assert!(ChartCatalog::empty().names().is_empty());
    }
}
