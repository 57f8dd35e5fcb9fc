//! Pipeline Integration Tests
//!
//! Site fan-out with partial failures, deterministic output, equipment-state
//! snapshots and data-range discovery, all against in-memory historians.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use plantwatch::acquisition::{HistorianFetch, MemoryHistorian, TagSeries};
use plantwatch::production::oee::line_tag;
use plantwatch::types::{DataRangeStatus, TagValue};
use plantwatch::{AnalysisEntry, AnalysisWindow, Analyzer, FetchError, PlantConfig, Sample};

const SITE: &str = "Enterprise B/Site2";
const LINE01: &str = "Enterprise B/Site2/fillerproduction/fillingline01";
const VAT01: &str = "Enterprise B/Site2/liquidprocessing/mixroom01/vat01/processdata/process/weight";
const VAT02: &str = "Enterprise B/Site2/liquidprocessing/mixroom01/vat02/processdata/process/weight";

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn shift() -> AnalysisWindow {
    AnalysisWindow::new(t(0), t(720)).unwrap()
}

fn counter(end: f64) -> Vec<Sample> {
    vec![Sample::new(t(0), 0.0), Sample::new(t(720), end)]
}

/// Line 01 and vat 01 have data; line 02 has none; vat 02 is never asked for.
fn site_historian() -> MemoryHistorian {
    let mut historian = MemoryHistorian::new();
    for (field, end) in [
        ("timerunning", 36_000.0),
        ("timeidle", 3_600.0),
        ("timedownunplanned", 1_800.0),
        ("timedownplanned", 1_800.0),
        ("countoutfeed", 10_000.0),
        ("countdefect", 100.0),
    ] {
        historian.insert(line_tag(LINE01, field), counter(end));
    }
    historian.insert(
        line_tag(LINE01, "rateactual"),
        vec![Sample::new(t(10), 20.0), Sample::new(t(20), 22.0)],
    );
    historian.insert(line_tag(LINE01, "ratestandard"), vec![Sample::new(t(0), 25.0)]);

    let weights = (0..30)
        .map(|i| Sample::new(t(i), 5_000.0 + if i % 2 == 0 { 10.0 } else { -10.0 }))
        .collect();
    historian.insert(VAT01, weights);
    historian
}

/// Delegates to an inner historian but fails any query touching `poisoned`.
struct FlakyHistorian {
    inner: MemoryHistorian,
    poisoned: &'static str,
}

#[async_trait]
impl HistorianFetch for FlakyHistorian {
    async fn fetch(&self, tags: &[String], window: &AnalysisWindow) -> Result<TagSeries, FetchError> {
        if tags.iter().any(|t| t == self.poisoned) {
            return Err(FetchError::RetriesExhausted {
                attempts: 3,
                last: "connection refused".to_string(),
            });
        }
        self.inner.fetch(tags, window).await
    }
}

fn site_analyzer() -> Analyzer {
    let historian = FlakyHistorian {
        inner: site_historian(),
        poisoned: VAT02,
    };
    Analyzer::new(Arc::new(historian), PlantConfig::default())
}

// ============================================================================
// Site fan-out
// ============================================================================

#[tokio::test]
async fn site_failures_are_isolated_per_target() {
    let report = site_analyzer().analyze_site(SITE, &shift()).await.unwrap();

    let targets: Vec<&str> = report.entries.iter().map(|e| e.target()).collect();
    assert_eq!(
        targets,
        vec![
            LINE01,
            "Enterprise B/Site2/fillerproduction/fillingline02",
            VAT01,
            VAT02,
        ]
    );
    assert_eq!(report.failed_count(), 2);

    let codes: Vec<Option<&str>> = report
        .entries
        .iter()
        .map(|e| match e {
            AnalysisEntry::Ok(_) => None,
            AnalysisEntry::Error(f) => Some(f.code.as_str()),
        })
        .collect();
    assert_eq!(
        codes,
        vec![None, Some("insufficient_data"), None, Some("upstream_fetch")]
    );

    match &report.entries[0] {
        AnalysisEntry::Ok(record) => assert!(!record.oee.as_ref().unwrap().oee.is_na()),
        AnalysisEntry::Error(f) => panic!("line 01 failed: {}", f.message),
    }
    match &report.entries[2] {
        AnalysisEntry::Ok(record) => {
            assert!(record.phases.is_some());
            assert!(record.rules_evaluated);
        }
        AnalysisEntry::Error(f) => panic!("vat 01 failed: {}", f.message),
    }
}

/// Panics on any query touching `poisoned`
struct PanickingHistorian {
    inner: MemoryHistorian,
    poisoned: &'static str,
}

#[async_trait]
impl HistorianFetch for PanickingHistorian {
    async fn fetch(&self, tags: &[String], window: &AnalysisWindow) -> Result<TagSeries, FetchError> {
        if tags.iter().any(|t| t == self.poisoned) {
            panic!("historian client bug");
        }
        self.inner.fetch(tags, window).await
    }
}

#[tokio::test]
async fn panicking_target_is_reported_not_dropped() {
    let historian = PanickingHistorian {
        inner: site_historian(),
        poisoned: VAT02,
    };
    let analyzer = Analyzer::new(Arc::new(historian), PlantConfig::default());
    let report = analyzer.analyze_site(SITE, &shift()).await.unwrap();

    assert_eq!(report.entries.len(), 4);
    match &report.entries[3] {
        AnalysisEntry::Error(f) => {
            assert_eq!(f.target, VAT02);
            assert_eq!(f.code, "task_failed");
        }
        AnalysisEntry::Ok(_) => panic!("vat 02 should have failed"),
    }
    // Siblings are unaffected
    assert!(!report.entries[0].is_error());
    assert!(!report.entries[2].is_error());
}

#[tokio::test]
async fn site_report_is_deterministic() {
    let analyzer = site_analyzer();
    let first = serde_json::to_string(&analyzer.analyze_site(SITE, &shift()).await.unwrap()).unwrap();
    let second = serde_json::to_string(&analyzer.analyze_site(SITE, &shift()).await.unwrap()).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn unknown_site_is_an_error() {
    let err = site_analyzer()
        .analyze_site("Enterprise B/Site42", &shift())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "unknown_site");
}

#[tokio::test]
async fn entry_json_shape() {
    let report = site_analyzer().analyze_site(SITE, &shift()).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    let vat = &json["entries"][2];
    assert_eq!(vat["status"], "ok");
    assert_eq!(vat["tag"], VAT01);
    assert_eq!(vat["point_count"], 30);
    assert!(vat["stdev"].is_number());
    assert!(vat["control_limits"]["ucl"].is_number());

    let failed = &json["entries"][3];
    assert_eq!(failed["status"], "error");
    assert_eq!(failed["code"], "upstream_fetch");
    assert!(failed["message"].as_str().unwrap().contains("connection refused"));
}

// ============================================================================
// Equipment states
// ============================================================================

fn state_tag(line: &str, machine: &str) -> String {
    format!("{line}/{machine}/processdata/state/name")
}

fn states_historian() -> MemoryHistorian {
    MemoryHistorian::new()
        .with_text(state_tag(LINE01, "washer"), t(30), "Running")
        .with_text(state_tag(LINE01, "filler"), t(30), "Running")
        .with_text(state_tag(LINE01, "filler"), t(400), "Blocked")
        .with_series(format!("{LINE01}/metric/oee"), vec![Sample::new(t(60), 0.58), Sample::new(t(600), 0.61)])
        .with_series(format!("{LINE01}/metric/availability"), vec![Sample::new(t(600), 0.9)])
        .with_text(
            "Enterprise B/Site2/liquidprocessing/mixroom01/vat01/processdata/state/name",
            t(500),
            "Pasteurizing",
        )
}

#[tokio::test]
async fn line_equipment_states_take_latest_readings() {
    let analyzer = Analyzer::new(Arc::new(states_historian()), PlantConfig::default());
    let states = analyzer.equipment_states(LINE01, &shift()).await.unwrap();

    assert_eq!(states.line, LINE01);
    let names: Vec<&str> = states.equipment.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["caploader", "filler", "washer"]);
    assert_eq!(
        states.equipment["filler"].as_ref().unwrap().value,
        TagValue::Text("Blocked".to_string())
    );
    assert_eq!(states.equipment["filler"].as_ref().unwrap().timestamp, t(400));
    assert!(states.equipment["caploader"].is_none());

    assert_eq!(states.metrics.oee.value(), Some(0.61));
    assert_eq!(states.metrics.availability.value(), Some(0.9));
    assert!(states.metrics.quality.is_na());
}

#[tokio::test]
async fn site_states_cover_every_line_and_vat() {
    let analyzer = Analyzer::new(Arc::new(states_historian()), PlantConfig::default());
    let states = analyzer.site_states(SITE, &shift()).await.unwrap();

    assert_eq!(states.lines.len(), 2);
    assert_eq!(states.lines[0].line, LINE01);
    assert!(states.lines[1].equipment.values().all(Option::is_none));
    assert!(states.lines[1].metrics.oee.is_na());

    let vats: Vec<&str> = states.vats.iter().map(|v| v.vat.as_str()).collect();
    assert_eq!(vats, vec!["vat01", "vat02"]);
    assert_eq!(
        states.vats[0].state.as_ref().map(|r| r.value.to_string()),
        Some("Pasteurizing".to_string())
    );
    assert!(states.vats[1].state.is_none());

    let json = serde_json::to_value(&states).unwrap();
    assert!(json["vats"][1]["state"].is_null());
    assert_eq!(json["lines"][0]["equipment"]["washer"]["value"], "Running");
}

#[tokio::test]
async fn states_for_unknown_site_is_an_error() {
    let analyzer = Analyzer::new(Arc::new(MemoryHistorian::new()), PlantConfig::default());
    let err = analyzer.site_states("Enterprise B/Site42", &shift()).await.unwrap_err();
    assert_eq!(err.code(), "unknown_site");
}

// ============================================================================
// Discovery
// ============================================================================

#[tokio::test]
async fn discover_finds_range_and_recommends_a_shift() {
    let probe = format!("{LINE01}/metric/oee");
    let latest = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
    let historian = MemoryHistorian::new().with_series(
        probe.as_str(),
        vec![
            Sample::new(latest - Duration::days(3), 0.71),
            Sample::new(latest, 0.74),
        ],
    );
    let analyzer = Analyzer::new(Arc::new(historian), PlantConfig::default());

    let now = Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap();
    let range = analyzer.discover(SITE, now).await.unwrap();

    assert_eq!(range.status, DataRangeStatus::Ok);
    assert_eq!(range.tag_probed, probe);
    assert_eq!(range.points_sampled, 2);
    assert_eq!(range.latest, Some(latest));

    // Latest point sits in the 06:00-18:00 day shift
    let recommended = range.recommended.unwrap();
    assert_eq!(recommended.start, Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap());
    assert_eq!(recommended.end, Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap());
}

#[tokio::test]
async fn discover_without_data_is_not_an_error() {
    let analyzer = Analyzer::new(Arc::new(MemoryHistorian::new()), PlantConfig::default());
    let range = analyzer.discover(SITE, Utc::now()).await.unwrap();

    assert_eq!(range.status, DataRangeStatus::NoData);
    assert!(range.earliest.is_none());
    assert!(range.recommended.is_none());

    let json = serde_json::to_value(&range).unwrap();
    assert_eq!(json["status"], "no_data");
}
