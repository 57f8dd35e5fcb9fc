//! Historian samples and analysis windows

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Historian quality codes
pub mod quality_codes {
    /// Marks a sample written while the historian was restarting.
    ///
    /// These samples are excluded from every calculation and the gap around
    /// them is neither downtime nor data loss.
    pub const HISTORIAN_RESTART: i32 = 28;
    /// OPC "good" quality, assumed when the historian omits the code
    pub const GOOD: i32 = 192;
}

fn default_quality() -> i32 {
    quality_codes::GOOD
}

/// One `(timestamp, value, qualityCode)` triple from the historian.
///
/// Sequences of samples are always chronological; insertion order is
/// chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(default = "default_quality")]
    pub quality: i32,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            quality: quality_codes::GOOD,
        }
    }

    pub fn with_quality(timestamp: DateTime<Utc>, value: f64, quality: i32) -> Self {
        Self {
            timestamp,
            value,
            quality,
        }
    }

    /// True when the sample was written during a historian restart.
    pub fn is_restart_artifact(&self, restart_code: i32) -> bool {
        self.quality == restart_code
    }
}

/// A tag reading that may be text (state names, lot numbers) or a number.
///
/// Numeric strings are read as numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Number(f64),
    Text(String),
}

impl TagValue {
    /// Interpret a raw historian JSON value. `null`, arrays and objects have no reading.
    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        match v {
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::Bool(b) => Some(Self::Number(if *b { 1.0 } else { 0.0 })),
            serde_json::Value::String(s) => {
                let trimmed = s.trim();
                Some(match trimmed.parse::<f64>() {
                    Ok(n) => Self::Number(n),
                    Err(_) => Self::Text(trimmed.to_string()),
                })
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl std::fmt::Display for TagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Most recent reading of a tag inside a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestValue {
    pub timestamp: DateTime<Utc>,
    pub value: TagValue,
    #[serde(default = "default_quality")]
    pub quality: i32,
}

impl LatestValue {
    pub fn new(timestamp: DateTime<Utc>, value: TagValue) -> Self {
        Self {
            timestamp,
            value,
            quality: quality_codes::GOOD,
        }
    }
}

impl From<&Sample> for LatestValue {
    fn from(sample: &Sample) -> Self {
        Self {
            timestamp: sample.timestamp,
            value: TagValue::Number(sample.value),
            quality: sample.quality,
        }
    }
}

/// Closed analysis window `[start, end]` in absolute time.
///
/// Relative and shift-named windows are resolved into this form at the call
/// boundary (see `acquisition::window`); core components only see absolute
/// windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AnalysisWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, super::AnalysisError> {
        if end < start {
            return Err(super::AnalysisError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Keep only samples usable for calculation: inside the window, not flagged
/// as restart artifacts, and finite.
pub fn valid_samples<'a>(
    samples: &'a [Sample],
    window: &AnalysisWindow,
    restart_code: i32,
) -> Vec<&'a Sample> {
    samples
        .iter()
        .filter(|s| {
            window.contains(s.timestamp)
                && !s.is_restart_artifact(restart_code)
                && s.value.is_finite()
        })
        .collect()
}
