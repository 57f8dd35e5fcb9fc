//! Analysis entry points
//!
//! Wires the historian fetch into the pure components and the assembler.
//! The calls exposed:
//!
//! - `analyze_tag`: SPC (plus phases and annotation for vat weights)
//! - `analyze_line`: OEE and production summary for a filling line
//! - `analyze_site`: every line and vessel of a site, concurrently
//! - `equipment_states` / `site_states`: latest machine states and published metrics
//! - `discover`: where a site's data actually lives
//!
//! The `*_series` variants take already-fetched samples and never touch the
//! network, so replay and tests go through exactly the same code.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::acquisition::{recommend_window, HistorianFetch, TagSeries};
use crate::batch::PhaseSegmenter;
use crate::config::{defaults, PlantConfig};
use crate::pipeline::assembler::{line_metric_tag, OeeOutcome, ResultAssembler, SpcOutcome, LINE_METRICS};
use crate::production::{oee, OeeComputer};
use crate::spc::{LimitOverrides, SpcStatEngine, ViolationAnnotator, WesternElectricEvaluator};
use crate::types::{
    valid_samples, AnalysisEntry, AnalysisError, AnalysisRecord, AnalysisWindow, DataRange,
    DataRangeStatus, LineStates, Sample, SiteReport, SiteStates, TagKind, VatState,
    WorkOrderSummary, NO_DATA_NOTE,
};

/// Error code for a target whose analysis task died without a result
pub const TASK_FAILED: &str = "task_failed";

/// One unit of site fan-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Filling line path, analysed for OEE
    Line(String),
    /// Vessel weight tag, analysed for SPC
    Tag(String),
}

impl Target {
    pub fn path(&self) -> &str {
        match self {
            Self::Line(p) | Self::Tag(p) => p,
        }
    }
}

/// Shared entry point for all analyses.
///
/// Cheap to clone: the fetcher and config are behind `Arc`s.
#[derive(Clone)]
pub struct Analyzer {
    fetcher: Arc<dyn HistorianFetch>,
    config: Arc<PlantConfig>,
}

impl Analyzer {
    pub fn new(fetcher: Arc<dyn HistorianFetch>, config: PlantConfig) -> Self {
        Self {
            fetcher,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PlantConfig {
        &self.config
    }

    // ========================================================================
    // SPC
    // ========================================================================

    /// Fetch one tag and run SPC on it.
    pub async fn analyze_tag(
        &self,
        tag: &str,
        window: &AnalysisWindow,
        overrides: &LimitOverrides,
    ) -> Result<AnalysisRecord, AnalysisError> {
        let samples = self
            .fetcher
            .fetch_one(tag, window)
            .await
            .map_err(|e| AnalysisError::fetch(tag, e))?;
        self.analyze_series(tag, &samples, window, overrides)
    }

    /// SPC over already-fetched samples.
    ///
    /// Fewer valid points than the rule minimum still yields statistics,
    /// with `rules_evaluated = false` and a note.
    pub fn analyze_series(
        &self,
        tag: &str,
        samples: &[Sample],
        window: &AnalysisWindow,
        overrides: &LimitOverrides,
    ) -> Result<AnalysisRecord, AnalysisError> {
        let kind = TagKind::classify(tag);
        let spc = &self.config.spc;
        let valid = valid_samples(samples, window, self.config.quality.restart_quality_code);

        let values: Vec<f64> = valid.iter().map(|s| s.value).collect();
        let Some(statistics) = SpcStatEngine::summarize(&values) else {
            debug!(tag = %tag, fetched = samples.len(), "No valid points in window");
            let outcome = SpcOutcome {
                note: Some(NO_DATA_NOTE.to_string()),
                ..Default::default()
            };
            return Ok(ResultAssembler::spc_record(tag, kind, *window, outcome, spc));
        };
        let limits = SpcStatEngine::control_limits(&statistics, overrides);

        let phases = if kind.is_vat_weight() {
            let segments = PhaseSegmenter::segment(&valid, window, &self.config.batch);
            if self.config.batch.strict_ambiguity {
                PhaseSegmenter::require_unambiguous(&segments)?;
            }
            Some(segments)
        } else {
            None
        };

        let mut outcome = SpcOutcome {
            statistics: Some(statistics),
            limits: Some(limits),
            ..Default::default()
        };

        match SpcStatEngine::check_rule_minimum(tag, values.len(), spc.min_points_for_rules) {
            Ok(()) => {
                let raw = WesternElectricEvaluator::new(limits).evaluate(&valid);
                outcome.violations =
                    ViolationAnnotator::annotate(tag, &kind, &raw, phases.as_deref(), spc);
                outcome.rules_evaluated = true;
            }
            Err(e) => {
                debug!(tag = %tag, error = %e, "Skipping rule evaluation");
                outcome.note = Some(format!(
                    "Only {} data points, minimum {} required for Western Electric Rule evaluation. \
                     Statistics reported only.",
                    values.len(),
                    spc.min_points_for_rules
                ));
            }
        }
        outcome.phases = phases;

        Ok(ResultAssembler::spc_record(tag, kind, *window, outcome, spc))
    }

    // ========================================================================
    // OEE
    // ========================================================================

    /// Fetch a line's counters and rates and compute OEE.
    pub async fn analyze_line(
        &self,
        line: &str,
        window: &AnalysisWindow,
    ) -> Result<AnalysisRecord, AnalysisError> {
        let series = self
            .fetcher
            .fetch(&oee::line_tags(line), window)
            .await
            .map_err(|e| AnalysisError::fetch(line, e))?;
        let mut record = self.analyze_line_series(line, &series, window)?;
        if let Some(production) = record.production.as_mut() {
            production.work_order = self.work_order(line, window).await;
        }
        Ok(record)
    }

    /// Latest work-order readings. A failed fetch only drops the block.
    async fn work_order(&self, line: &str, window: &AnalysisWindow) -> Option<WorkOrderSummary> {
        match self.fetcher.fetch_latest(&oee::work_order_tags(line), window).await {
            Ok(latest) => {
                OeeComputer::work_order(line, &latest, self.config.quality.restart_quality_code)
            }
            Err(e) => {
                warn!(line = %line, error = %e, "Work-order fetch failed, omitting work order");
                None
            }
        }
    }

    pub fn analyze_line_series(
        &self,
        line: &str,
        series: &TagSeries,
        window: &AnalysisWindow,
    ) -> Result<AnalysisRecord, AnalysisError> {
        let (inputs, counters) = OeeComputer::gather_inputs(
            line,
            series,
            window,
            self.config.quality.restart_quality_code,
        )?;
        let outcome = OeeOutcome {
            oee: OeeComputer::compute(&inputs),
            production: OeeComputer::production_summary(&inputs),
            counters,
        };
        debug!(line = %line, oee = %outcome.oee.oee, "Line OEE computed");
        Ok(ResultAssembler::oee_record(line, *window, outcome))
    }

    // ========================================================================
    // Site fan-out
    // ========================================================================

    /// Lines, vats and tanks configured for `site_path`, sorted by path.
    pub fn site_targets(&self, site_path: &str) -> Result<Vec<Target>, AnalysisError> {
        let site = self
            .config
            .site(site_path)
            .ok_or_else(|| AnalysisError::UnknownSite(site_path.to_string()))?;
        let layout = &self.config.layout;

        let mut targets: Vec<Target> = site
            .filling_lines
            .iter()
            .map(|l| Target::Line(layout.line_path(site_path, l)))
            .chain(
                site.vats
                    .iter()
                    .map(|v| Target::Tag(layout.vat_weight_tag(site_path, v))),
            )
            .chain(
                site.tanks
                    .iter()
                    .map(|t| Target::Tag(layout.tank_weight_tag(site_path, t))),
            )
            .collect();
        targets.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(targets)
    }

    /// Analyse every target of a site concurrently.
    ///
    /// Each target succeeds or fails on its own; a failure becomes an error
    /// entry and never aborts its siblings.
    pub async fn analyze_site(
        &self,
        site_path: &str,
        window: &AnalysisWindow,
    ) -> Result<SiteReport, AnalysisError> {
        let targets = self.site_targets(site_path)?;
        info!(site = %site_path, targets = targets.len(), "Starting site analysis");

        let mut pending: BTreeSet<String> = targets.iter().map(|t| t.path().to_string()).collect();
        let permits = Arc::new(Semaphore::new(defaults::MAX_CONCURRENT_TARGETS));
        let mut set = JoinSet::new();
        for target in targets {
            let this = self.clone();
            let permits = Arc::clone(&permits);
            let window = *window;
            set.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return AnalysisEntry::error(
                        target.path(),
                        TASK_FAILED,
                        "analysis scheduler shut down before the target ran",
                    );
                };
                this.analyze_target(&target, &window).await
            });
        }

        let mut entries = Vec::new();
        let mut task_errors = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(entry) => {
                    pending.remove(entry.target());
                    entries.push(entry);
                }
                Err(e) => {
                    error!(site = %site_path, error = %e, "Target analysis task failed");
                    task_errors.push(e.to_string());
                }
            }
        }

        // A panicked or cancelled task never reports its target
        let cause = task_errors.join("; ");
        for target in pending {
            warn!(target = %target, "No result for target, reporting task failure");
            entries.push(AnalysisEntry::error(
                target,
                TASK_FAILED,
                format!("analysis task did not complete: {cause}"),
            ));
        }

        let report = ResultAssembler::site_report(site_path, *window, entries);
        info!(
            site = %site_path,
            entries = report.entries.len(),
            failed = report.failed_count(),
            "Site analysis complete"
        );
        Ok(report)
    }

    async fn analyze_target(&self, target: &Target, window: &AnalysisWindow) -> AnalysisEntry {
        let result = match target {
            Target::Line(line) => self.analyze_line(line, window).await,
            Target::Tag(tag) => {
                self.analyze_tag(tag, window, &LimitOverrides::default())
                    .await
            }
        };
        if let Err(ref e) = result {
            warn!(target = %target.path(), code = e.code(), error = %e, "Analysis target failed");
        }
        AnalysisEntry::from_result(target.path(), result)
    }

    // ========================================================================
    // Equipment states
    // ========================================================================

    /// `(machine, state tag)` for every configured machine on `line`
    fn state_tags(&self, line: &str) -> Vec<(String, String)> {
        let layout = &self.config.layout;
        layout
            .line_equipment
            .iter()
            .map(|m| (m.clone(), layout.equipment_state_tag(line, m)))
            .collect()
    }

    fn line_snapshot_tags(line: &str, state_tags: &[(String, String)]) -> Vec<String> {
        state_tags
            .iter()
            .map(|(_, tag)| tag.clone())
            .chain(LINE_METRICS.iter().map(|m| line_metric_tag(line, m)))
            .collect()
    }

    /// Latest state of each machine on `line`, plus the line's published OEE metrics.
    pub async fn equipment_states(
        &self,
        line: &str,
        window: &AnalysisWindow,
    ) -> Result<LineStates, AnalysisError> {
        let state_tags = self.state_tags(line);
        let latest = self
            .fetcher
            .fetch_latest(&Self::line_snapshot_tags(line, &state_tags), window)
            .await
            .map_err(|e| AnalysisError::fetch(line, e))?;
        Ok(ResultAssembler::line_states(
            line,
            &state_tags,
            &latest,
            self.config.quality.restart_quality_code,
        ))
    }

    /// Equipment snapshot of every line and vat of a site, in one fetch.
    pub async fn site_states(
        &self,
        site_path: &str,
        window: &AnalysisWindow,
    ) -> Result<SiteStates, AnalysisError> {
        let site = self
            .config
            .site(site_path)
            .ok_or_else(|| AnalysisError::UnknownSite(site_path.to_string()))?;
        let layout = &self.config.layout;
        let restart_code = self.config.quality.restart_quality_code;

        let lines: Vec<(String, Vec<(String, String)>)> = site
            .filling_lines
            .iter()
            .map(|l| {
                let path = layout.line_path(site_path, l);
                let state_tags = self.state_tags(&path);
                (path, state_tags)
            })
            .collect();
        let vats: Vec<(String, String)> = site
            .vats
            .iter()
            .map(|v| (v.clone(), layout.vat_state_tag(site_path, v)))
            .collect();

        let tags: Vec<String> = lines
            .iter()
            .flat_map(|(path, state_tags)| Self::line_snapshot_tags(path, state_tags))
            .chain(vats.iter().map(|(_, tag)| tag.clone()))
            .collect();
        let latest = self
            .fetcher
            .fetch_latest(&tags, window)
            .await
            .map_err(|e| AnalysisError::fetch(site_path, e))?;

        let states = SiteStates {
            site: site_path.to_string(),
            period: *window,
            lines: lines
                .iter()
                .map(|(path, state_tags)| {
                    ResultAssembler::line_states(path, state_tags, &latest, restart_code)
                })
                .collect(),
            vats: vats
                .into_iter()
                .map(|(vat, tag)| VatState {
                    state: latest.get(&tag).filter(|r| r.quality != restart_code).cloned(),
                    vat,
                })
                .collect(),
        };

        info!(
            site = %site_path,
            tags = tags.len(),
            readings = latest.len(),
            "Equipment states collected"
        );
        Ok(states)
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Probe a site's first line OEE tag over the lookback period.
    ///
    /// No data is a `no_data` result, not an error.
    pub async fn discover(
        &self,
        site_path: &str,
        now: DateTime<Utc>,
    ) -> Result<DataRange, AnalysisError> {
        let first_line = self
            .config
            .site(site_path)
            .and_then(|s| s.filling_lines.first())
            .ok_or_else(|| AnalysisError::UnknownSite(site_path.to_string()))?;
        let probe = self.config.layout.probe_tag(site_path, first_line);

        let window = AnalysisWindow::new(
            now - Duration::days(defaults::DISCOVERY_LOOKBACK_DAYS),
            now,
        )?;
        let samples = self
            .fetcher
            .fetch_one(&probe, &window)
            .await
            .map_err(|e| AnalysisError::fetch(&probe, e))?;

        let earliest = samples.iter().map(|s| s.timestamp).min();
        let latest = samples.iter().map(|s| s.timestamp).max();
        let range = DataRange {
            site: site_path.to_string(),
            status: if samples.is_empty() {
                DataRangeStatus::NoData
            } else {
                DataRangeStatus::Ok
            },
            tag_probed: probe,
            points_sampled: samples.len(),
            earliest,
            latest,
            recommended: latest.map(|ts| recommend_window(ts, &self.config.shifts)),
        };

        info!(
            site = %site_path,
            points = range.points_sampled,
            status = ?range.status,
            "Data range discovered"
        );
        Ok(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::MemoryHistorian;
    use chrono::TimeZone;

    fn window() -> AnalysisWindow {
        AnalysisWindow::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn analyzer() -> Analyzer {
        Analyzer::new(Arc::new(MemoryHistorian::new()), PlantConfig::default())
    }

    fn series(values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new(window().start + Duration::minutes(i as i64), v))
            .collect()
    }

    #[test]
    fn test_empty_window_reports_note() {
        let record = analyzer()
            .analyze_series("a/b/rateactual", &[], &window(), &LimitOverrides::default())
            .unwrap();
        assert!(record.statistics.is_none());
        assert_eq!(record.note.as_deref(), Some(NO_DATA_NOTE));
        assert!(!record.rules_evaluated);
    }

    #[test]
    fn test_few_points_still_report_statistics() {
        let record = analyzer()
            .analyze_series(
                "a/b/rateactual",
                &series(&[1.0, 2.0, 3.0]),
                &window(),
                &LimitOverrides::default(),
            )
            .unwrap();
        assert_eq!(record.statistics.map(|s| s.point_count), Some(3));
        assert!(!record.rules_evaluated);
        assert!(record
            .note
            .as_deref()
            .is_some_and(|n| n.starts_with("Only 3 data points, minimum 20")));
        assert!(record.violations.is_empty());
    }

    #[test]
    fn test_site_targets_sorted() {
        let targets = analyzer().site_targets("Enterprise B/Site2").unwrap();
        let paths: Vec<&str> = targets.iter().map(Target::path).collect();
        assert_eq!(paths.len(), 4);
        let mut sorted = paths.clone();
        sorted.sort_unstable();
        assert_eq!(paths, sorted);
        assert!(paths[0].contains("fillerproduction/fillingline01"));
    }

    #[test]
    fn test_unknown_site() {
        let err = analyzer().site_targets("Enterprise B/Site9").unwrap_err();
        assert_eq!(err.code(), "unknown_site");
    }
}
