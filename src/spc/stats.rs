//! SPC Statistics
//!
//! Population mean and standard deviation over every quality-good point of
//! the window (no downsampling), then control limits and zones.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::types::{AnalysisError, ControlLimits, LimitSource, SummaryStatistics};

/// Caller-supplied limits.
///
/// `target` replaces the center line and leaves the calculated ±3σ limits
/// in place. Only a complete `ucl`/`lcl` pair replaces the limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitOverrides {
    pub ucl: Option<f64>,
    pub lcl: Option<f64>,
    pub target: Option<f64>,
}

impl LimitOverrides {
    pub fn is_empty(&self) -> bool {
        self.ucl.is_none() && self.lcl.is_none() && self.target.is_none()
    }
}

/// Summary statistics and control limits
pub struct SpcStatEngine;

impl SpcStatEngine {
    /// Count, mean, population standard deviation, min, max.
    ///
    /// `None` for an empty series.
    pub fn summarize(values: &[f64]) -> Option<SummaryStatistics> {
        if values.is_empty() {
            return None;
        }
        Some(SummaryStatistics {
            point_count: values.len(),
            mean: values.mean(),
            std_dev: values.population_std_dev(),
            min: Statistics::min(values),
            max: Statistics::max(values),
        })
    }

    /// ±3σ limits around the mean, centered on the target when one is given.
    pub fn control_limits(stats: &SummaryStatistics, overrides: &LimitOverrides) -> ControlLimits {
        let center = overrides.target.unwrap_or(stats.mean);

        match (overrides.ucl, overrides.lcl) {
            (Some(ucl), Some(lcl)) => ControlLimits {
                center_line: center,
                sigma: (ucl - lcl).abs() / 6.0,
                ucl,
                lcl,
                source: LimitSource::Provided,
            },
            _ => {
                // UCL/LCL stay on the mean; only zones and sides follow the target
                let mut limits = ControlLimits::from_center_and_sigma(stats.mean, stats.std_dev);
                limits.center_line = center;
                limits
            }
        }
    }

    /// Rule evaluation needs at least `min_points` points.
    ///
    /// The error is not fatal to a result: callers still report statistics.
    pub fn check_rule_minimum(tag: &str, points: usize, min_points: usize) -> Result<(), AnalysisError> {
        if points < min_points {
            return Err(AnalysisError::InsufficientData {
                tag: tag.to_string(),
                valid: points,
                required: min_points,
            });
        }
        Ok(())
    }
}
