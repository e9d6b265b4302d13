//! Robust color statistics
//!
//! Reduces a set of pixel colors to one representative color with:
//! - Per-channel median (default, insensitive to specular highlights)
//! - Per-channel trimmed mean (tails removed symmetrically)
//! - Plain mean (for noise-free synthetic data)
//! - Spread reporting for diagnostics
//!
//! Algorithm tag: `algo-robust-color-extraction`

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::sampling::DEFAULT_TRIM_FRACTION;
use crate::{CalibrationError, Result};

/// Central tendency statistic applied to each channel independently
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelStatistic {
    /// Middle value; average of the two middle values for even counts
    #[default]
    Median,
    /// Mean after removing `fraction` of the values from each tail
    TrimmedMean { fraction: f64 },
    /// Arithmetic mean
    Mean,
}

impl ChannelStatistic {
    /// Trimmed mean with the default tail fraction
    pub fn trimmed_mean() -> Self {
        ChannelStatistic::TrimmedMean {
            fraction: DEFAULT_TRIM_FRACTION,
        }
    }

    /// Check statistic parameters
    pub fn validate(&self) -> Result<()> {
        if let ChannelStatistic::TrimmedMean { fraction } = self {
            if !(0.0..0.5).contains(fraction) {
                return Err(CalibrationError::InvalidParameter {
                    parameter: "trim_fraction".to_string(),
                    value: fraction.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Reduce one channel to a single value
    ///
    /// Sorts `values` in place. Returns `None` for an empty slice.
    pub fn reduce(&self, values: &mut [f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        match self {
            ChannelStatistic::Mean => Some(mean(values)),
            ChannelStatistic::Median => {
                values.sort_by(f64::total_cmp);
                let n = values.len();
                if n % 2 == 1 {
                    Some(values[n / 2])
                } else {
                    Some(0.5 * (values[n / 2 - 1] + values[n / 2]))
                }
            }
            ChannelStatistic::TrimmedMean { fraction } => {
                values.sort_by(f64::total_cmp);
                let n = values.len();
                let cut = ((n as f64) * fraction).floor() as usize;
                // Keep at least one value even for tiny samples
                let cut = cut.min((n - 1) / 2);
                Some(mean(&values[cut..n - cut]))
            }
        }
    }
}

impl fmt::Display for ChannelStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatistic::Median => f.write_str("median"),
            ChannelStatistic::TrimmedMean { fraction } => {
                write!(f, "trimmed mean ({:.0}%)", fraction * 100.0)
            }
            ChannelStatistic::Mean => f.write_str("mean"),
        }
    }
}

/// Representative color of a pixel set with spread information
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorSummary {
    /// Representative value per channel
    pub value: [f64; 3],
    /// Standard deviation per channel
    pub std_dev: [f64; 3],
    /// Number of pixels summarized
    pub pixel_count: usize,
}

/// Summarize pixel colors channel by channel
///
/// Returns `None` when `pixels` is empty.
pub fn summarize(pixels: &[[f64; 3]], statistic: ChannelStatistic) -> Option<ColorSummary> {
    if pixels.is_empty() {
        return None;
    }

    let mut value = [0.0; 3];
    let mut std_dev = [0.0; 3];
    let mut channel: Vec<f64> = Vec::with_capacity(pixels.len());
    for c in 0..3 {
        channel.clear();
        channel.extend(pixels.iter().map(|p| p[c]));
        std_dev[c] = standard_deviation(&channel);
        value[c] = statistic.reduce(&mut channel)?;
    }

    Some(ColorSummary {
        value,
        std_dev,
        pixel_count: pixels.len(),
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn standard_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_squared_diff: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (sum_squared_diff / values.len() as f64).sqrt()
}
