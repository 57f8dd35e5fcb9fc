//! Violation Annotation
//!
//! Places each firing on a vat weight tag inside the batch cycle and decides
//! whether the cycle itself explains it. Fill ramps and drains are monotonic
//! by nature, so trends and one-sided runs inside them say nothing about the
//! process. Rule 4 (alternation) is never explained by the cycle.
//!
//! Storage tanks and every non-weight tag pass through unannotated.

use chrono::{DateTime, Utc};

use crate::config::{defaults, SpcConfig};
use crate::types::{
    phase_at, ArtifactAnnotation, Phase, PhaseSegment, RawViolation, TagKind, Violation,
    WesternElectricRule,
};

/// Batch-cycle context for SPC violations
pub struct ViolationAnnotator;

impl ViolationAnnotator {
    /// Annotate raw firings for `tag`.
    ///
    /// `segments` is the phase segmentation of the same window. Without it
    /// (or for tags other than vat weights) violations are wrapped as-is.
    pub fn annotate(
        tag: &str,
        kind: &TagKind,
        raw: &[RawViolation],
        segments: Option<&[PhaseSegment]>,
        config: &SpcConfig,
    ) -> Vec<Violation> {
        let segments = match segments {
            Some(s) if kind.is_vat_weight() => s,
            _ => return raw.iter().map(|r| Violation::unannotated(tag, r)).collect(),
        };

        let boundary = config.artifact_boundary_secs.min(defaults::MAX_DURATION_SECS) as i64;
        let boundaries = boundary_instants(segments);
        let drains = drain_spans(segments);

        let violations: Vec<Violation> = raw
            .iter()
            .map(|r| {
                let annotation = classify(r, segments, &boundaries, &drains, boundary);
                let mut v = Violation::unannotated(tag, r);
                v.phase_at_timestamp = phase_at(segments, r.timestamp);
                v.is_expected_artifact = annotation != ArtifactAnnotation::Genuine;
                v.annotation = Some(annotation);
                v
            })
            .collect();

        let artifacts = violations.iter().filter(|v| v.is_expected_artifact).count();
        tracing::debug!(
            tag = %tag,
            violations = violations.len(),
            artifacts,
            "Annotated violations against batch phases"
        );
        violations
    }
}

fn classify(
    raw: &RawViolation,
    segments: &[PhaseSegment],
    boundaries: &[DateTime<Utc>],
    drains: &[(DateTime<Utc>, DateTime<Utc>)],
    boundary_secs: i64,
) -> ArtifactAnnotation {
    match raw.rule {
        WesternElectricRule::BeyondLimits => {
            let near_edge = boundaries
                .iter()
                .any(|edge| (raw.timestamp - *edge).num_seconds().abs() <= boundary_secs);
            if near_edge {
                ArtifactAnnotation::BatchCycleBoundary
            } else {
                ArtifactAnnotation::Genuine
            }
        }
        WesternElectricRule::NineOneSide | WesternElectricRule::SixTrend => {
            let in_fill = segments
                .iter()
                .filter(|s| s.phase == Phase::Fill && !s.is_zero_duration())
                .any(|s| s.covers(raw.run_start, raw.timestamp));
            if in_fill {
                return ArtifactAnnotation::FillPhaseMonotonic;
            }
            let in_drain = drains
                .iter()
                .any(|(start, end)| raw.run_start >= *start && raw.timestamp <= *end);
            if in_drain {
                ArtifactAnnotation::DrainPhaseMonotonic
            } else {
                ArtifactAnnotation::Genuine
            }
        }
        WesternElectricRule::FourteenAlternating => ArtifactAnnotation::Genuine,
    }
}

/// Fill starts plus both edges of every Transfer/CIP segment
fn boundary_instants(segments: &[PhaseSegment]) -> Vec<DateTime<Utc>> {
    let mut edges = Vec::new();
    for s in segments {
        match s.phase {
            Phase::Fill => edges.push(s.start),
            p if p.is_drain() => {
                edges.push(s.start);
                edges.push(s.end);
            }
            _ => {}
        }
    }
    edges
}

/// Contiguous Transfer/CIP runs merged into single spans
fn drain_spans(segments: &[PhaseSegment]) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut spans: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    let mut extending = false;
    for s in segments {
        if !s.phase.is_drain() {
            extending = false;
            continue;
        }
        match spans.last_mut() {
            Some(span) if extending && span.1 == s.start => span.1 = s.end,
            _ => spans.push((s.start, s.end)),
        }
        extending = true;
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Vessel, Zone};
    use chrono::{Duration, TimeZone};

    fn t(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap() + Duration::minutes(min)
    }

    fn seg(phase: Phase, start: i64, end: i64) -> PhaseSegment {
        PhaseSegment {
            phase,
            start: t(start),
            end: t(end),
            sample_count: 1,
            inferred: false,
            ambiguity: None,
        }
    }

    fn cycle() -> Vec<PhaseSegment> {
        vec![
            seg(Phase::Idle, 0, 10),
            seg(Phase::Fill, 10, 60),
            seg(Phase::Mix, 60, 80),
            seg(Phase::Pasteurize, 80, 120),
            seg(Phase::Cool, 120, 130),
            seg(Phase::Transfer, 130, 150),
            seg(Phase::Cip, 150, 180),
            seg(Phase::Idle, 180, 240),
        ]
    }

    fn raw(rule: WesternElectricRule, run_start: i64, at: i64) -> RawViolation {
        RawViolation {
            rule,
            timestamp: t(at),
            value: 1.0,
            run_start: t(run_start),
            zone: Zone::A,
        }
    }

    fn annotate_one(r: RawViolation, kind: TagKind) -> Violation {
        let segments = cycle();
        ViolationAnnotator::annotate(
            "Site1/vat01/weight",
            &kind,
            &[r],
            Some(&segments),
            &SpcConfig::default(),
        )
        .remove(0)
    }

    fn vat() -> TagKind {
        TagKind::Weight(Vessel::Vat)
    }

    #[test]
    fn test_trend_inside_fill_is_artifact() {
        let v = annotate_one(raw(WesternElectricRule::SixTrend, 20, 30), vat());
        assert!(v.is_expected_artifact);
        assert_eq!(v.annotation, Some(ArtifactAnnotation::FillPhaseMonotonic));
        assert_eq!(v.phase_at_timestamp, Some(Phase::Fill));
    }

    #[test]
    fn test_run_crossing_fill_end_is_genuine() {
        let v = annotate_one(raw(WesternElectricRule::NineOneSide, 50, 70), vat());
        assert!(!v.is_expected_artifact);
        assert_eq!(v.annotation, Some(ArtifactAnnotation::Genuine));
        assert_eq!(v.phase_at_timestamp, Some(Phase::Mix));
    }

    #[test]
    fn test_run_across_transfer_and_cip_is_drain_artifact() {
        let v = annotate_one(raw(WesternElectricRule::SixTrend, 140, 160), vat());
        assert_eq!(v.annotation, Some(ArtifactAnnotation::DrainPhaseMonotonic));
        assert!(v.is_expected_artifact);
    }

    #[test]
    fn test_rule1_near_fill_start_is_boundary_artifact() {
        let v = annotate_one(raw(WesternElectricRule::BeyondLimits, 12, 12), vat());
        assert_eq!(v.annotation, Some(ArtifactAnnotation::BatchCycleBoundary));
    }

    #[test]
    fn test_rule1_mid_pasteurize_is_genuine() {
        let v = annotate_one(raw(WesternElectricRule::BeyondLimits, 100, 100), vat());
        assert_eq!(v.annotation, Some(ArtifactAnnotation::Genuine));
        assert!(!v.is_expected_artifact);
    }

    #[test]
    fn test_rule4_is_never_an_artifact() {
        let v = annotate_one(raw(WesternElectricRule::FourteenAlternating, 15, 40), vat());
        assert!(!v.is_expected_artifact);
        assert_eq!(v.annotation, Some(ArtifactAnnotation::Genuine));
    }

    #[test]
    fn test_storage_tank_is_not_annotated() {
        let v = annotate_one(
            raw(WesternElectricRule::SixTrend, 20, 30),
            TagKind::Weight(Vessel::StorageTank),
        );
        assert!(!v.is_expected_artifact);
        assert_eq!(v.annotation, None);
        assert_eq!(v.phase_at_timestamp, None);
    }

    #[test]
    fn test_drain_spans_merge_adjacent() {
        let spans = drain_spans(&cycle());
        assert_eq!(spans, vec![(t(130), t(180))]);
    }
}
