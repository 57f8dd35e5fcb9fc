//! Counter deltas, OEE ratios, and production summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::TagValue;

/// Net change of a cumulative counter over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterWindowDelta {
    pub tag: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub delta: f64,
    /// Samples left after dropping restart artifacts
    pub valid_sample_count: usize,
    /// Counter resets detected across historian restarts
    #[serde(default)]
    pub resets_detected: usize,
}

/// A ratio in `[0, 1]` or the `N/A` sentinel.
///
/// Serialized as a bare number or the string `"N/A"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OeeRatio {
    Value(f64),
    NotApplicable,
}

impl OeeRatio {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::NotApplicable => None,
        }
    }

    pub fn is_na(&self) -> bool {
        matches!(self, Self::NotApplicable)
    }

    /// `numerator / denominator` when the denominator is positive.
    pub fn ratio(numerator: f64, denominator: f64) -> Self {
        if denominator > 0.0 {
            Self::Value(numerator / denominator)
        } else {
            Self::NotApplicable
        }
    }
}

impl std::fmt::Display for OeeRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{:.1}%", v * 100.0),
            Self::NotApplicable => write!(f, "N/A"),
        }
    }
}

impl Serialize for OeeRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::NotApplicable => serializer.serialize_str("N/A"),
        }
    }
}

impl<'de> Deserialize<'de> for OeeRatio {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(Self::Value(v)),
            Raw::Text(s) if s == "N/A" => Ok(Self::NotApplicable),
            Raw::Text(s) => Err(serde::de::Error::custom(format!(
                "expected a number or \"N/A\", got \"{s}\""
            ))),
        }
    }
}

/// Availability x Performance x Quality breakdown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OeeResult {
    pub availability: OeeRatio,
    /// Never above 1.0: overperformance is not credited
    pub performance: OeeRatio,
    pub quality: OeeRatio,
    /// N/A whenever any component is N/A
    pub oee: OeeRatio,
}

/// Inputs to the OEE computation, already reduced to window deltas
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OeeInputs {
    pub time_running: f64,
    pub time_idle: f64,
    pub time_down_unplanned: f64,
    pub time_down_planned: f64,
    pub count_outfeed: f64,
    pub count_defect: f64,
    /// Optional: only feeds the yield figure
    pub count_infeed: Option<f64>,
    /// Latest valid `rateactual` sample
    pub rate_actual: Option<f64>,
    /// Latest valid `ratestandard` sample
    pub rate_standard: Option<f64>,
    /// Mean `rateactual` over non-zero readings
    pub rate_actual_running_avg: Option<f64>,
}

impl OeeInputs {
    pub fn scheduled_time(&self) -> f64 {
        self.time_running + self.time_idle + self.time_down_unplanned + self.time_down_planned
    }
}

/// Seconds spent in each equipment state during the window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeUtilization {
    pub total_seconds: f64,
    pub running_seconds: f64,
    pub idle_seconds: f64,
    pub planned_down_seconds: f64,
    pub unplanned_down_seconds: f64,
    pub pct_running: f64,
    pub pct_idle: f64,
    pub pct_planned_down: f64,
    pub pct_unplanned_down: f64,
}

/// Latest readings of the line's active work order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderSummary {
    pub number: Option<TagValue>,
    pub product: Option<String>,
    pub actual: Option<f64>,
    pub target: Option<f64>,
    pub defects: Option<f64>,
    /// `actual / target`, N/A without a positive target
    pub completion: OeeRatio,
    pub uom: Option<String>,
}

/// Throughput, yield, and rate figures reported next to OEE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionSummary {
    pub time_utilization: TimeUtilization,
    pub units_in: Option<f64>,
    pub units_out: f64,
    pub defects: f64,
    /// Good units out per unit in
    pub yield_ratio: OeeRatio,
    /// Units out per running hour
    pub throughput_per_hour: f64,
    pub rate_actual: Option<f64>,
    pub rate_standard: Option<f64>,
    /// Uncapped actual / standard
    pub rate_efficiency: OeeRatio,
    pub rate_actual_running_avg: Option<f64>,
    /// `None` when the line publishes no work-order tags
    #[serde(default)]
    pub work_order: Option<WorkOrderSummary>,
}
