//! Serializable analysis output

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    AnalysisError, AnalysisWindow, ControlLimits, CounterWindowDelta, LatestValue, OeeResult,
    PhaseSegment, ProductionSummary, SummaryStatistics, TagKind, Violation,
};

/// Note attached when a window holds no valid points at all
pub const NO_DATA_NOTE: &str = "No data points in the specified period";

/// Compact per-tag (or per-line) result record.
///
/// Statistics are flattened so the JSON reads
/// `{tag, point_count, mean, stdev, min, max, control_limits, violations, oee, phases}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub tag: String,
    pub kind: TagKind,
    pub period: AnalysisWindow,
    #[serde(flatten)]
    pub statistics: Option<SummaryStatistics>,
    pub control_limits: Option<ControlLimits>,
    /// False when the window had too few points for rule evaluation
    pub rules_evaluated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub violations: Vec<Violation>,
    /// `rule_N` → total firings, including those not listed in `violations`
    pub violation_summary: BTreeMap<String, usize>,
    pub violation_count: usize,
    /// Any violation that is not an expected batch-cycle artifact
    pub quality_flag: bool,
    pub oee: Option<OeeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<ProductionSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counters: Option<Vec<CounterWindowDelta>>,
    pub phases: Option<Vec<PhaseSegment>>,
}

impl AnalysisRecord {
    /// Record with nothing computed yet
    pub fn new(tag: impl Into<String>, kind: TagKind, period: AnalysisWindow) -> Self {
        Self {
            tag: tag.into(),
            kind,
            period,
            statistics: None,
            control_limits: None,
            rules_evaluated: false,
            note: None,
            violations: Vec::new(),
            violation_summary: BTreeMap::new(),
            violation_count: 0,
            quality_flag: false,
            oee: None,
            production: None,
            counters: None,
            phases: None,
        }
    }
}

/// Failed analysis target, reported next to its successful siblings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFailure {
    pub target: String,
    pub code: String,
    pub message: String,
}

impl AnalysisFailure {
    pub fn from_error(target: impl Into<String>, err: &AnalysisError) -> Self {
        Self {
            target: target.into(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// One target of an analysis call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisEntry {
    Ok(Box<AnalysisRecord>),
    Error(AnalysisFailure),
}

impl AnalysisEntry {
    pub fn error(target: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        Self::Error(AnalysisFailure {
            target: target.into(),
            code: code.to_string(),
            message: message.into(),
        })
    }

    pub fn from_result(target: &str, result: Result<AnalysisRecord, AnalysisError>) -> Self {
        match result {
            Ok(record) => Self::Ok(Box::new(record)),
            Err(e) => Self::Error(AnalysisFailure::from_error(target, &e)),
        }
    }

    /// Tag path or line path the entry belongs to
    pub fn target(&self) -> &str {
        match self {
            Self::Ok(record) => &record.tag,
            Self::Error(failure) => &failure.target,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Site-wide fan-out result, entries sorted by target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteReport {
    pub site: String,
    pub period: AnalysisWindow,
    pub entries: Vec<AnalysisEntry>,
}

impl SiteReport {
    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_error()).count()
    }
}

/// Latest equipment state names and published OEE metrics of one line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStates {
    pub line: String,
    /// Machine name → latest state reading, `null` when nothing was published
    pub equipment: BTreeMap<String, Option<LatestValue>>,
    /// The historian's own `metric/*` values, not recomputed
    pub metrics: OeeResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatState {
    pub vat: String,
    pub state: Option<LatestValue>,
}

/// Equipment snapshot of a site at the end of a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteStates {
    pub site: String,
    pub period: AnalysisWindow,
    pub lines: Vec<LineStates>,
    pub vats: Vec<VatState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataRangeStatus {
    Ok,
    NoData,
}

/// Where a site's historian data actually lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRange {
    pub site: String,
    pub status: DataRangeStatus,
    pub tag_probed: String,
    pub points_sampled: usize,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    /// Shift-aligned window ending at the shift that holds the latest point
    pub recommended: Option<AnalysisWindow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> AnalysisWindow {
        AnalysisWindow::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_statistics_are_flattened() {
        let mut record = AnalysisRecord::new("a/b/weight", TagKind::Unknown, window());
        record.statistics = Some(SummaryStatistics {
            point_count: 3,
            mean: 2.0,
            std_dev: 0.5,
            min: 1.0,
            max: 3.0,
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["point_count"], 3);
        assert_eq!(json["stdev"], 0.5);
        assert!(json.get("statistics").is_none());
        assert!(json.get("note").is_none());
    }

    #[test]
    fn test_entry_status_tag() {
        let err = AnalysisError::InsufficientData {
            tag: "x".into(),
            valid: 0,
            required: 2,
        };
        let entry = AnalysisEntry::from_result("x", Err(err));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "insufficient_data");
        assert_eq!(entry.target(), "x");

        let ok = AnalysisEntry::from_result(
            "y",
            Ok(AnalysisRecord::new("y", TagKind::Counter, window())),
        );
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["tag"], "y");
    }
}
