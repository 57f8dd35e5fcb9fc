//! SPC records: summary statistics, control limits, zones, violations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Phase;

/// Sigma multiple of the control limits
pub const CONTROL_LIMIT_SIGMA: f64 = 3.0;

/// Mean / spread / extremes over every quality-good point of a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub point_count: usize,
    pub mean: f64,
    /// Population standard deviation
    #[serde(rename = "stdev")]
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Where the control limits came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitSource {
    Calculated,
    Provided,
}

/// Center line, sigma, and the ±3σ limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlLimits {
    #[serde(rename = "cl")]
    pub center_line: f64,
    pub sigma: f64,
    pub ucl: f64,
    pub lcl: f64,
    pub source: LimitSource,
}

/// Sigma band of a point relative to the center line.
///
/// C = [0, 1σ], B = (1σ, 2σ], A = (2σ, 3σ], mirrored on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    C,
    B,
    A,
    /// Outside the control limits
    Beyond,
}

impl ControlLimits {
    pub fn from_center_and_sigma(center_line: f64, sigma: f64) -> Self {
        Self {
            center_line,
            sigma,
            ucl: center_line + CONTROL_LIMIT_SIGMA * sigma,
            lcl: center_line - CONTROL_LIMIT_SIGMA * sigma,
            source: LimitSource::Calculated,
        }
    }

    pub fn is_beyond(&self, value: f64) -> bool {
        value > self.ucl || value < self.lcl
    }

    pub fn zone_of(&self, value: f64) -> Zone {
        if self.is_beyond(value) {
            return Zone::Beyond;
        }
        let distance = (value - self.center_line).abs();
        if distance <= self.sigma {
            Zone::C
        } else if distance <= 2.0 * self.sigma {
            Zone::B
        } else {
            Zone::A
        }
    }

    /// +1 above, -1 below, 0 exactly on the center line
    pub fn side_of(&self, value: f64) -> i8 {
        if value > self.center_line {
            1
        } else if value < self.center_line {
            -1
        } else {
            0
        }
    }
}

/// Action class of a rule firing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Immediate,
    Trend,
    Process,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate => write!(f, "IMMEDIATE"),
            Self::Trend => write!(f, "TREND"),
            Self::Process => write!(f, "PROCESS"),
        }
    }
}

/// The four Western Electric tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum WesternElectricRule {
    /// Point outside [lcl, ucl]
    BeyondLimits = 1,
    /// 9+ consecutive points on one side of the center line
    NineOneSide = 2,
    /// 6+ consecutive points strictly increasing or decreasing
    SixTrend = 3,
    /// 14+ consecutive points alternating direction
    FourteenAlternating = 4,
}

impl WesternElectricRule {
    pub const ALL: [Self; 4] = [
        Self::BeyondLimits,
        Self::NineOneSide,
        Self::SixTrend,
        Self::FourteenAlternating,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::BeyondLimits => Severity::Immediate,
            Self::NineOneSide | Self::SixTrend => Severity::Trend,
            Self::FourteenAlternating => Severity::Process,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::BeyondLimits => "Point beyond control limits",
            Self::NineOneSide => "9 consecutive points on one side of center line",
            Self::SixTrend => "6 consecutive points steadily increasing or decreasing",
            Self::FourteenAlternating => "14 consecutive points alternating up and down",
        }
    }
}

impl From<WesternElectricRule> for u8 {
    fn from(rule: WesternElectricRule) -> Self {
        rule.id()
    }
}

impl TryFrom<u8> for WesternElectricRule {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|r| r.id() == id)
            .ok_or_else(|| format!("unknown Western Electric rule {id}"))
    }
}

/// Why a violation was (or was not) dismissed as a batch-cycle artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactAnnotation {
    BatchCycleBoundary,
    FillPhaseMonotonic,
    DrainPhaseMonotonic,
    Genuine,
}

impl ArtifactAnnotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BatchCycleBoundary => "batch-cycle-boundary",
            Self::FillPhaseMonotonic => "fill-phase-monotonic",
            Self::DrainPhaseMonotonic => "drain-phase-monotonic",
            Self::Genuine => "genuine",
        }
    }
}

/// Rule firing before phase context is applied.
///
/// Carries the triggering (last) point of the qualifying run plus the
/// start of the run, which the annotator needs for containment checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawViolation {
    pub rule: WesternElectricRule,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub run_start: DateTime<Utc>,
    pub zone: Zone,
}

/// Annotated rule violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "rule")]
    pub rule_id: u8,
    pub tag: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub severity: Severity,
    pub description: String,
    pub run_start: DateTime<Utc>,
    pub zone: Zone,
    /// `None` for tags that are never phase-annotated
    pub phase_at_timestamp: Option<Phase>,
    pub is_expected_artifact: bool,
    pub annotation: Option<ArtifactAnnotation>,
}

impl Violation {
    /// Wrap a raw firing without phase context (non-vat tags).
    pub fn unannotated(tag: &str, raw: &RawViolation) -> Self {
        Self {
            rule_id: raw.rule.id(),
            tag: tag.to_string(),
            timestamp: raw.timestamp,
            value: raw.value,
            severity: raw.rule.severity(),
            description: raw.rule.description().to_string(),
            run_start: raw.run_start,
            zone: raw.zone,
            phase_at_timestamp: None,
            is_expected_artifact: false,
            annotation: None,
        }
    }
}
