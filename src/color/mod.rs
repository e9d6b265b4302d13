//! Color space math and color statistics module
//!
//! This module handles conversions between RGB, XYZ, Lab and LCh,
//! chromatic adaptation between reference whites, and robust
//! reduction of pixel sets to representative colors.

pub mod analysis;
pub mod conversion;
pub mod illuminant;
pub mod space;

pub use analysis::{summarize, ChannelStatistic, ColorSummary};
pub use conversion::ColorConverter;
pub use illuminant::ReferenceWhite;
pub use space::ColorSpace;
