//! Result Assembler
//!
//! Packages the outputs of the pure components into `AnalysisRecord`s.
//! No new computation happens here beyond counting and capping.

use std::collections::{BTreeMap, HashMap};

use crate::config::SpcConfig;
use crate::types::{
    AnalysisEntry, AnalysisRecord, AnalysisWindow, ControlLimits, CounterWindowDelta, LatestValue,
    LineStates, OeeRatio, OeeResult, PhaseSegment, ProductionSummary, SiteReport,
    SummaryStatistics, TagKind, Violation,
};

/// Published line metrics read by the equipment snapshot
pub const LINE_METRICS: [&str; 4] = ["oee", "availability", "performance", "quality"];

pub fn line_metric_tag(line: &str, metric: &str) -> String {
    format!("{}/metric/{}", line.trim_end_matches('/'), metric)
}

/// Everything the SPC path produced for one tag
#[derive(Debug, Clone, Default)]
pub struct SpcOutcome {
    pub statistics: Option<SummaryStatistics>,
    pub limits: Option<ControlLimits>,
    pub rules_evaluated: bool,
    pub note: Option<String>,
    pub violations: Vec<Violation>,
    pub phases: Option<Vec<PhaseSegment>>,
}

/// Everything the OEE path produced for one line
#[derive(Debug, Clone)]
pub struct OeeOutcome {
    pub oee: OeeResult,
    pub production: ProductionSummary,
    pub counters: Vec<CounterWindowDelta>,
}

pub struct ResultAssembler;

impl ResultAssembler {
    pub fn spc_record(
        tag: &str,
        kind: TagKind,
        period: AnalysisWindow,
        outcome: SpcOutcome,
        config: &SpcConfig,
    ) -> AnalysisRecord {
        let mut record = AnalysisRecord::new(tag, kind, period);

        record.quality_flag = !kind.is_storage_tank()
            && outcome.violations.iter().any(|v| !v.is_expected_artifact);
        record.violation_count = outcome.violations.len();
        record.violation_summary = Self::summarize(&outcome.violations);
        record.violations =
            Self::cap_per_rule(outcome.violations, config.max_violation_details_per_rule);

        record.statistics = outcome.statistics;
        record.control_limits = outcome.limits;
        record.rules_evaluated = outcome.rules_evaluated;
        record.note = outcome.note;
        record.phases = outcome.phases;
        record
    }

    pub fn oee_record(line: &str, period: AnalysisWindow, outcome: OeeOutcome) -> AnalysisRecord {
        let mut record = AnalysisRecord::new(line, TagKind::Counter, period);
        record.oee = Some(outcome.oee);
        record.production = Some(outcome.production);
        record.counters = Some(outcome.counters);
        record
    }

    /// `rule_N` → firings, for every rule that fired
    pub fn summarize(violations: &[Violation]) -> BTreeMap<String, usize> {
        let mut summary = BTreeMap::new();
        for v in violations {
            *summary.entry(format!("rule_{}", v.rule_id)).or_insert(0) += 1;
        }
        summary
    }

    /// Keep the first `max_per_rule` firings of each rule, chronologically.
    pub fn cap_per_rule(mut violations: Vec<Violation>, max_per_rule: usize) -> Vec<Violation> {
        violations.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.rule_id.cmp(&b.rule_id)));
        let mut seen: BTreeMap<u8, usize> = BTreeMap::new();
        violations.retain(|v| {
            let count = seen.entry(v.rule_id).or_insert(0);
            *count += 1;
            *count <= max_per_rule
        });
        violations
    }

    /// Site report with entries in deterministic target order.
    /// Pick a line's state and metric readings out of a latest-value batch.
    ///
    /// `state_tags` pairs each machine name with its state tag. Restart-flagged
    /// readings count as missing; a missing or non-numeric metric is N/A.
    pub fn line_states(
        line: &str,
        state_tags: &[(String, String)],
        latest: &HashMap<String, LatestValue>,
        restart_code: i32,
    ) -> LineStates {
        let reading = |tag: &str| latest.get(tag).filter(|r| r.quality != restart_code);

        let equipment = state_tags
            .iter()
            .map(|(name, tag)| (name.clone(), reading(tag).cloned()))
            .collect();

        let metric = |name: &str| {
            reading(&line_metric_tag(line, name))
                .and_then(|r| r.value.as_f64())
                .filter(|v| v.is_finite())
                .map_or(OeeRatio::NotApplicable, OeeRatio::Value)
        };

        LineStates {
            line: line.to_string(),
            equipment,
            metrics: OeeResult {
                availability: metric("availability"),
                performance: metric("performance"),
                quality: metric("quality"),
                oee: metric("oee"),
            },
        }
    }

    pub fn site_report(site: &str, period: AnalysisWindow, mut entries: Vec<AnalysisEntry>) -> SiteReport {
        entries.sort_by(|a, b| a.target().cmp(b.target()));
        SiteReport {
            site: site.to_string(),
            period,
            entries,
        }
    }
}
