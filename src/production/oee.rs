//! OEE Computation
//!
//! Availability x Performance x Quality from counter deltas and the latest
//! rate readings of a filling line:
//!
//! - `scheduled = running + idle + unplanned + planned`
//! - `availability = (scheduled - unplanned) / scheduled` (planned downtime is not penalized)
//! - `performance = min(1, rateactual / ratestandard)`
//! - `quality = (outfeed - defect) / outfeed`
//!
//! Any undefined component makes OEE itself `N/A`.
//!
//! The work-order block is read from latest values and never affects OEE.

use std::collections::HashMap;

use tracing::debug;

use super::counters::CounterDeltaCalculator;
use crate::types::{
    AnalysisError, AnalysisWindow, CounterWindowDelta, LatestValue, OeeInputs, OeeRatio,
    OeeResult, ProductionSummary, Sample, TagValue, TimeUtilization, WorkOrderSummary,
};

/// Counter fields that must produce a delta for OEE to be computed
pub const REQUIRED_COUNTERS: [&str; 6] = [
    "timerunning",
    "timeidle",
    "timedownunplanned",
    "timedownplanned",
    "countoutfeed",
    "countdefect",
];

/// Tag path of a line's metric input field
pub fn line_tag(line: &str, field: &str) -> String {
    format!("{}/metric/input/{}", line.trim_end_matches('/'), field)
}

/// Every tag the OEE computation reads for `line`
pub fn line_tags(line: &str) -> Vec<String> {
    REQUIRED_COUNTERS
        .iter()
        .chain(["countinfeed", "rateactual", "ratestandard"].iter())
        .map(|f| line_tag(line, f))
        .collect()
}

/// Work-order fields under `{line}/workorder/`
pub const WORK_ORDER_FIELDS: [&str; 6] = [
    "workordernumber",
    "lotnumber/item/itemname",
    "quantityactual",
    "quantitytarget",
    "quantitydefect",
    "uom",
];

pub fn work_order_tag(line: &str, field: &str) -> String {
    format!("{}/workorder/{}", line.trim_end_matches('/'), field)
}

pub fn work_order_tags(line: &str) -> Vec<String> {
    WORK_ORDER_FIELDS.iter().map(|f| work_order_tag(line, f)).collect()
}

fn work_order_reading<'a>(
    latest: &'a HashMap<String, LatestValue>,
    line: &str,
    field: &str,
    restart_code: i32,
) -> Option<&'a TagValue> {
    latest
        .get(&work_order_tag(line, field))
        .filter(|r| r.quality != restart_code)
        .map(|r| &r.value)
}

/// OEE and production-summary math
pub struct OeeComputer;

impl OeeComputer {
    /// Reduce a line's fetched series to OEE inputs.
    ///
    /// Required counter failures propagate unchanged. `countinfeed` only feeds
    /// the yield figure and missing rates only make performance N/A, so neither
    /// fails the line.
    pub fn gather_inputs(
        line: &str,
        series: &HashMap<String, Vec<Sample>>,
        window: &AnalysisWindow,
        restart_code: i32,
    ) -> Result<(OeeInputs, Vec<CounterWindowDelta>), AnalysisError> {
        let samples_for = |field: &str| -> (String, &[Sample]) {
            let tag = line_tag(line, field);
            let samples = series.get(&tag).map(Vec::as_slice).unwrap_or(&[]);
            (tag, samples)
        };

        let mut deltas = Vec::with_capacity(REQUIRED_COUNTERS.len() + 1);
        for field in REQUIRED_COUNTERS {
            let (tag, samples) = samples_for(field);
            deltas.push(CounterDeltaCalculator::delta(&tag, samples, window, restart_code)?);
        }

        let (infeed_tag, infeed_samples) = samples_for("countinfeed");
        let count_infeed =
            match CounterDeltaCalculator::delta(&infeed_tag, infeed_samples, window, restart_code) {
                Ok(d) => {
                    let value = d.delta;
                    deltas.push(d);
                    Some(value)
                }
                Err(e) => {
                    debug!(tag = %infeed_tag, error = %e, "Infeed counter unavailable, yield will be N/A");
                    None
                }
            };

        let (_, actual) = samples_for("rateactual");
        let (_, standard) = samples_for("ratestandard");

        let inputs = OeeInputs {
            time_running: deltas[0].delta,
            time_idle: deltas[1].delta,
            time_down_unplanned: deltas[2].delta,
            time_down_planned: deltas[3].delta,
            count_outfeed: deltas[4].delta,
            count_defect: deltas[5].delta,
            count_infeed,
            rate_actual: CounterDeltaCalculator::latest_rate(actual, window, restart_code),
            rate_standard: CounterDeltaCalculator::latest_rate(standard, window, restart_code),
            rate_actual_running_avg: CounterDeltaCalculator::running_average_rate(
                actual,
                window,
                restart_code,
            ),
        };

        Ok((inputs, deltas))
    }

    /// Availability, performance, quality, and their product.
    pub fn compute(inputs: &OeeInputs) -> OeeResult {
        let scheduled = inputs.scheduled_time();
        let availability = OeeRatio::ratio(scheduled - inputs.time_down_unplanned, scheduled);

        let performance = match (inputs.rate_actual, inputs.rate_standard) {
            (Some(actual), Some(standard)) if standard > 0.0 => {
                OeeRatio::Value((actual / standard).min(1.0))
            }
            _ => OeeRatio::NotApplicable,
        };

        // Defects can briefly exceed outfeed when counters lag each other
        let quality = match OeeRatio::ratio(
            inputs.count_outfeed - inputs.count_defect,
            inputs.count_outfeed,
        ) {
            OeeRatio::Value(q) => OeeRatio::Value(q.clamp(0.0, 1.0)),
            na => na,
        };

        let oee = match (availability, performance, quality) {
            (OeeRatio::Value(a), OeeRatio::Value(p), OeeRatio::Value(q)) => OeeRatio::Value(a * p * q),
            _ => OeeRatio::NotApplicable,
        };

        debug!(
            availability = %availability,
            performance = %performance,
            quality = %quality,
            oee = %oee,
            "OEE computed"
        );

        OeeResult {
            availability,
            performance,
            quality,
            oee,
        }
    }

    /// Time utilization, throughput, yield, and rate efficiency.
    pub fn production_summary(inputs: &OeeInputs) -> ProductionSummary {
        let total = inputs.scheduled_time();
        let pct = |part: f64| if total > 0.0 { part / total * 100.0 } else { 0.0 };

        let time_utilization = TimeUtilization {
            total_seconds: total,
            running_seconds: inputs.time_running,
            idle_seconds: inputs.time_idle,
            planned_down_seconds: inputs.time_down_planned,
            unplanned_down_seconds: inputs.time_down_unplanned,
            pct_running: pct(inputs.time_running),
            pct_idle: pct(inputs.time_idle),
            pct_planned_down: pct(inputs.time_down_planned),
            pct_unplanned_down: pct(inputs.time_down_unplanned),
        };

        let running_hours = inputs.time_running / 3600.0;
        let throughput_per_hour = if running_hours > 0.0 {
            inputs.count_outfeed / running_hours
        } else {
            0.0
        };

        let yield_ratio = match inputs.count_infeed {
            Some(infeed) => OeeRatio::ratio(inputs.count_outfeed - inputs.count_defect, infeed),
            None => OeeRatio::NotApplicable,
        };

        let rate_efficiency = match (inputs.rate_actual, inputs.rate_standard) {
            (Some(actual), Some(standard)) => OeeRatio::ratio(actual, standard),
            _ => OeeRatio::NotApplicable,
        };

        ProductionSummary {
            time_utilization,
            units_in: inputs.count_infeed,
            units_out: inputs.count_outfeed,
            defects: inputs.count_defect,
            yield_ratio,
            throughput_per_hour,
            rate_actual: inputs.rate_actual,
            rate_standard: inputs.rate_standard,
            rate_efficiency,
            rate_actual_running_avg: inputs.rate_actual_running_avg,
            work_order: None,
        }
    }

    /// Work-order block from latest readings.
    ///
    /// Restart-flagged readings count as missing. `None` when no field has a
    /// reading at all.
    pub fn work_order(
        line: &str,
        latest: &HashMap<String, LatestValue>,
        restart_code: i32,
    ) -> Option<WorkOrderSummary> {
        let reading = |field: &str| work_order_reading(latest, line, field, restart_code);
        if WORK_ORDER_FIELDS.iter().all(|f| reading(f).is_none()) {
            return None;
        }

        let number = |field: &str| reading(field).and_then(TagValue::as_f64);
        let actual = number("quantityactual");
        let target = number("quantitytarget");
        let completion = match (actual, target) {
            (Some(actual), Some(target)) => OeeRatio::ratio(actual, target),
            _ => OeeRatio::NotApplicable,
        };

        Some(WorkOrderSummary {
            number: reading("workordernumber").cloned(),
            product: reading("lotnumber/item/itemname").map(ToString::to_string),
            actual,
            target,
            defects: number("quantitydefect"),
            completion,
            uom: reading("uom").map(ToString::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::quality_codes::HISTORIAN_RESTART;
    use chrono::{Duration, TimeZone, Utc};

    fn inputs() -> OeeInputs {
        OeeInputs {
            time_running: 30_000.0,
            time_idle: 6_000.0,
            time_down_unplanned: 4_000.0,
            time_down_planned: 3_200.0,
            count_outfeed: 10_000.0,
            count_defect: 200.0,
            count_infeed: Some(10_500.0),
            rate_actual: Some(90.0),
            rate_standard: Some(100.0),
            rate_actual_running_avg: Some(88.0),
        }
    }

    #[test]
    fn test_oee_components() {
        let r = OeeComputer::compute(&inputs());
        let scheduled = 43_200.0;
        assert!((r.availability.value().unwrap() - (scheduled - 4_000.0) / scheduled).abs() < 1e-12);
        assert!((r.performance.value().unwrap() - 0.9).abs() < 1e-12);
        assert!((r.quality.value().unwrap() - 0.98).abs() < 1e-12);
        let expected = r.availability.value().unwrap() * 0.9 * 0.98;
        assert!((r.oee.value().unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_planned_downtime_not_penalized() {
        let mut i = inputs();
        i.time_down_unplanned = 0.0;
        let r = OeeComputer::compute(&i);
        assert_eq!(r.availability.value(), Some(1.0));
    }

    #[test]
    fn test_performance_capped() {
        let mut i = inputs();
        i.rate_actual = Some(130.0);
        let r = OeeComputer::compute(&i);
        assert_eq!(r.performance.value(), Some(1.0));
        // Efficiency in the summary is uncapped
        let s = OeeComputer::production_summary(&i);
        assert!((s.rate_efficiency.value().unwrap() - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_na_propagates_to_oee() {
        let mut i = inputs();
        i.rate_standard = Some(0.0);
        let r = OeeComputer::compute(&i);
        assert!(r.performance.is_na());
        assert!(r.oee.is_na());
        assert!(!r.availability.is_na());

        let r = OeeComputer::compute(&OeeInputs::default());
        assert!(r.availability.is_na());
        assert!(r.quality.is_na());
        assert!(r.oee.is_na());
    }

    #[test]
    fn test_summary_figures() {
        let s = OeeComputer::production_summary(&inputs());
        assert!((s.throughput_per_hour - 1200.0).abs() < 1e-9);
        assert!((s.yield_ratio.value().unwrap() - 9_800.0 / 10_500.0).abs() < 1e-12);
        let pct_sum = s.time_utilization.pct_running
            + s.time_utilization.pct_idle
            + s.time_utilization.pct_planned_down
            + s.time_utilization.pct_unplanned_down;
        assert!((pct_sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_work_order_completion() {
        let line = "Enterprise B/Site1/fillerproduction/fillingline01";
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let mut latest = HashMap::new();
        for (field, value) in [
            ("workordernumber", TagValue::Text("WO-1187".to_string())),
            ("quantityactual", TagValue::Number(450.0)),
            ("quantitytarget", TagValue::Number(1_800.0)),
            ("uom", TagValue::Text("cases".to_string())),
        ] {
            latest.insert(work_order_tag(line, field), LatestValue::new(at, value));
        }

        let wo = OeeComputer::work_order(line, &latest, HISTORIAN_RESTART).unwrap();
        assert_eq!(wo.completion.value(), Some(0.25));
        assert_eq!(wo.uom.as_deref(), Some("cases"));
        assert_eq!(wo.product, None);
        assert_eq!(wo.defects, None);

        // A zero target leaves completion undefined
        latest.insert(
            work_order_tag(line, "quantitytarget"),
            LatestValue::new(at, TagValue::Number(0.0)),
        );
        let wo = OeeComputer::work_order(line, &latest, HISTORIAN_RESTART).unwrap();
        assert!(wo.completion.is_na());

        assert!(OeeComputer::work_order(line, &HashMap::new(), HISTORIAN_RESTART).is_none());
    }

    #[test]
    fn test_gather_propagates_required_counter_failure() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap();
        let window = AnalysisWindow::new(start, start + Duration::hours(1)).unwrap();
        let line = "Enterprise B/Site1/fillerproduction/fillingline01";

        let mut series = HashMap::new();
        for field in REQUIRED_COUNTERS.iter().skip(1) {
            series.insert(
                line_tag(line, field),
                vec![
                    Sample::new(start, 0.0),
                    Sample::new(start + Duration::minutes(30), 10.0),
                ],
            );
        }

        let err = OeeComputer::gather_inputs(line, &series, &window, HISTORIAN_RESTART).unwrap_err();
        match err {
            AnalysisError::InsufficientData { tag, .. } => assert!(tag.ends_with("timerunning")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
