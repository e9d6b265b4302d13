//! Chart geometry module
//!
//! This module describes reference charts as patch grids, locates them in
//! images through an ROI and fits the chart → image transform.

pub mod charts;
pub mod grid;
pub mod roi;
pub mod transform;

pub use charts::{ChartCatalog, ColorCharts, COLOR_CHECKER_24, COLOR_GAUGE_MATTE};
pub use grid::{AlignedChart, AlignedPatch, GridChart, Patch, Quad};
pub use roi::Roi;
pub use transform::{ChartTransform, TransformKind};
