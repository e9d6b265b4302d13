//! Region of interest locating a chart in an image

use serde::{Deserialize, Serialize};

use crate::{CalibrationError, Result};

/// Ordered polygon vertices in image pixel coordinates
///
/// For chart alignment the vertices are the chart outline corners in the
/// order top-left, top-right, bottom-right, bottom-left (as seen in the
/// chart's own layout, regardless of how the chart is rotated in the image).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roi {
    points: Vec<[f64; 2]>,
}

impl Roi {
    /// Create an ROI from ordered points
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if any coordinate is not finite
    pub fn new(points: Vec<[f64; 2]>) -> Result<Self> {
        if let Some(p) = points.iter().find(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return Err(CalibrationError::InvalidParameter {
                parameter: "roi".to_string(),
                value: format!("non-finite point ({}, {})", p[0], p[1]),
            });
        }
        Ok(Self { points })
    }

    /// Axis-aligned rectangle ROI
    pub fn from_rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            points: vec![
                [x, y],
                [x + width, y],
                [x + width, y + height],
                [x, y + height],
            ],
        }
    }

    /// Polygon vertices
    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the ROI has no vertices
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_corner_order() {
        let roi = Roi::from_rect(10.0, 20.0, 100.0, 50.0);
        assert_eq!(
            roi.points(),
            &[[10.0, 20.0], [110.0, 20.0], [110.0, 70.0], [10.0, 70.0]]
        );
        assert_eq!(roi.len(), 4);
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(Roi::new(vec![[0.0, f64::NAN]]).is_err());
        assert!(Roi::new(vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_serde_as_point_list() {
        let roi: Roi = serde_json::from_str("[[1.0, 2.0], [3.0, 4.0], [5.0, 7.0]]").unwrap();
        assert_eq!(roi.len(), 3);
        assert_eq!(serde_json::to_string(&roi).unwrap(), "[[1.0,2.0],[3.0,4.0],[5.0,7.0]]");
    }
}
