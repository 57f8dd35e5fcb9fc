//! Batch Phase Segmentation
//!
//! Partitions a vat's weight trajectory into labeled phase segments that
//! cover the whole analysis window.
//!
//! The historian records weight with deadband compression, so the flat
//! holds (Mix, Pasteurize, Cool, Blocked) usually show up as gaps with no
//! samples at all. Segmentation therefore works in two passes:
//!
//! 1. Classify every step between consecutive samples as rise / fall / hold
//!    and group them into runs. A fall of 0.7%-1.7% at a non-zero level is the
//!    one-time Pasteurize→Cool drop; sub-threshold wiggles are blips that only
//!    split a hold into hold-runs.
//! 2. Walk the runs through the cycle order
//!    `Idle → Fill → Mix → Pasteurize → Cool → [Blocked] → Transfer → CIP → Idle`,
//!    using duration priors where the data carries no boundary.
//!
//! Cool and Blocked overlap in duration; holds that land in the overlap keep
//! the chosen label plus an `AmbiguousPhase` describing the alternative.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::config::{defaults, BatchConfig};
use crate::types::{
    segment_index_at, AmbiguousPhase, AnalysisError, AnalysisWindow, Phase, PhaseSegment, Sample,
};

// ============================================================================
// Runs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepKind {
    Rise,
    Fall,
    Hold,
    /// Pasteurize→Cool drop recorded across a deadband gap
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Rise,
    Fall,
    Hold,
    Drop,
    Blip,
}

/// Maximal run of same-kind steps, as point indices `[first, last]`
#[derive(Debug, Clone, Copy)]
struct Run {
    kind: RunKind,
    first: usize,
    last: usize,
}

/// Flat stretch of weight: hold runs with any drops/blips inside
#[derive(Debug, Clone)]
struct HoldRegion {
    first: usize,
    last: usize,
    /// End point of the first drop run
    drop_at: Option<usize>,
    /// Start points of blips (and of any drop after the first)
    blips: Vec<usize>,
}

#[derive(Debug, Clone)]
enum Region {
    Rise { first: usize, last: usize },
    Fall { first: usize, last: usize },
    Hold(HoldRegion),
}

/// Where the vat is in its cycle while walking the regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleState {
    Unknown,
    Filled,
    /// Hold phases after Fill already labeled
    Held,
    Draining,
    Drained,
}

// ============================================================================
// Segmenter
// ============================================================================

/// Vat weight phase segmenter
pub struct PhaseSegmenter;

impl PhaseSegmenter {
    /// Segment valid (quality-filtered, chronological) weight samples over `window`.
    ///
    /// Always returns at least one segment; the segments are contiguous and
    /// span exactly `[window.start, window.end]`.
    pub fn segment(
        samples: &[&Sample],
        window: &AnalysisWindow,
        config: &BatchConfig,
    ) -> Vec<PhaseSegment> {
        if samples.is_empty() {
            return vec![PhaseSegment {
                phase: Phase::Idle,
                start: window.start,
                end: window.end,
                sample_count: 0,
                inferred: true,
                ambiguity: None,
            }];
        }

        let steps = Self::classify_steps(samples, config);
        let runs = Self::group_runs(&steps, samples, config);
        let regions = Self::build_regions(&runs);

        let mut labeler = Labeler {
            samples,
            config,
            out: Vec::new(),
        };
        let mut state = CycleState::Unknown;
        for (i, region) in regions.iter().enumerate() {
            let next_is_fall = matches!(regions.get(i + 1), Some(Region::Fall { .. }));
            state = labeler.label(region, state, next_is_fall);
        }

        let mut segments = labeler.out;
        if segments.is_empty() {
            // Single sample: no steps to classify
            segments.push(single_sample_segment(samples));
        }

        Self::fit_to_window(&mut segments, window);
        let mut segments = Self::merge_adjacent(segments);
        Self::count_samples(&mut segments, samples);

        debug!(
            samples = samples.len(),
            segments = segments.len(),
            ambiguous = segments.iter().filter(|s| s.ambiguity.is_some()).count(),
            "Vat weight segmented"
        );

        segments
    }

    /// Fail with the first unresolved Cool/Blocked ambiguity, if any.
    pub fn require_unambiguous(segments: &[PhaseSegment]) -> Result<(), AnalysisError> {
        match segments.iter().find_map(|s| s.ambiguity.as_ref()) {
            Some(a) => Err(AnalysisError::AmbiguousPhase(a.clone())),
            None => Ok(()),
        }
    }

    fn classify_steps(samples: &[&Sample], config: &BatchConfig) -> Vec<StepKind> {
        let gap_threshold = Self::gap_threshold_secs(samples, config);

        samples
            .windows(2)
            .map(|pair| {
                let (prev, next) = (pair[0], pair[1]);
                let dv = next.value - prev.value;
                let dt = (next.timestamp - prev.timestamp).num_seconds() as f64;

                if prev.value.abs() <= config.zero_tolerance && next.value.abs() <= config.zero_tolerance {
                    return StepKind::Hold;
                }

                if dt > gap_threshold && prev.value > config.zero_tolerance {
                    // Deadband gap: a small net change is still hold time
                    let fraction = -dv / prev.value;
                    if fraction >= config.pasteurize_drop_min
                        && fraction <= config.pasteurize_drop_max
                        && next.value > config.zero_tolerance
                    {
                        return StepKind::Drop;
                    }
                    if fraction.abs() < config.pasteurize_drop_min {
                        return StepKind::Hold;
                    }
                }

                if dv > config.flat_tolerance {
                    StepKind::Rise
                } else if dv < -config.flat_tolerance {
                    StepKind::Fall
                } else {
                    StepKind::Hold
                }
            })
            .collect()
    }

    /// `max(min_gap_secs, gap_factor × median step)`
    fn gap_threshold_secs(samples: &[&Sample], config: &BatchConfig) -> f64 {
        let mut dts: Vec<f64> = samples
            .windows(2)
            .map(|p| (p[1].timestamp - p[0].timestamp).num_seconds() as f64)
            .collect();
        if dts.is_empty() {
            return config.min_gap_secs as f64;
        }
        dts.sort_by(|a, b| a.total_cmp(b));
        let median = dts[dts.len() / 2];
        (config.gap_factor * median).max(config.min_gap_secs as f64)
    }

    fn group_runs(steps: &[StepKind], samples: &[&Sample], config: &BatchConfig) -> Vec<Run> {
        let mut runs: Vec<Run> = Vec::new();
        let mut current: Option<(StepKind, usize)> = None;

        // Step k joins points k and k+1
        for (k, kind) in steps.iter().enumerate() {
            match current {
                Some((c, _)) if c == *kind => {}
                Some((c, start)) => {
                    runs.push(Self::finish_run(c, start, k, samples, config));
                    current = Some((*kind, k));
                }
                None => current = Some((*kind, k)),
            }
        }
        if let Some((c, start)) = current {
            runs.push(Self::finish_run(c, start, steps.len(), samples, config));
        }
        runs
    }

    fn finish_run(
        kind: StepKind,
        first: usize,
        last: usize,
        samples: &[&Sample],
        config: &BatchConfig,
    ) -> Run {
        let start_v = samples[first].value;
        let end_v = samples[last].value;
        let at_level = start_v > config.zero_tolerance && end_v > config.zero_tolerance;

        let kind = match kind {
            StepKind::Hold => RunKind::Hold,
            StepKind::Drop => RunKind::Drop,
            StepKind::Rise if at_level && (end_v - start_v) / start_v < config.pasteurize_drop_min => {
                RunKind::Blip
            }
            StepKind::Rise => RunKind::Rise,
            StepKind::Fall if at_level => {
                let fraction = (start_v - end_v) / start_v;
                if fraction < config.pasteurize_drop_min {
                    RunKind::Blip
                } else if fraction <= config.pasteurize_drop_max {
                    RunKind::Drop
                } else {
                    RunKind::Fall
                }
            }
            StepKind::Fall => RunKind::Fall,
        };

        Run { kind, first, last }
    }

    fn build_regions(runs: &[Run]) -> Vec<Region> {
        let mut regions: Vec<Region> = Vec::new();

        for run in runs {
            match run.kind {
                RunKind::Rise => regions.push(Region::Rise {
                    first: run.first,
                    last: run.last,
                }),
                RunKind::Fall => regions.push(Region::Fall {
                    first: run.first,
                    last: run.last,
                }),
                RunKind::Hold | RunKind::Drop | RunKind::Blip => {
                    if !matches!(regions.last(), Some(Region::Hold(_))) {
                        regions.push(Region::Hold(HoldRegion {
                            first: run.first,
                            last: run.last,
                            drop_at: None,
                            blips: Vec::new(),
                        }));
                    }
                    if let Some(Region::Hold(hold)) = regions.last_mut() {
                        hold.last = run.last;
                        match run.kind {
                            RunKind::Drop if hold.drop_at.is_none() => hold.drop_at = Some(run.last),
                            RunKind::Drop | RunKind::Blip => hold.blips.push(run.first),
                            _ => {}
                        }
                    }
                }
            }
        }
        regions
    }

    /// Stretch the outer segments to the window edges.
    fn fit_to_window(segments: &mut [PhaseSegment], window: &AnalysisWindow) {
        if let Some(first) = segments.first_mut() {
            first.start = window.start.min(first.start);
        }
        if let Some(last) = segments.last_mut() {
            last.end = window.end.max(last.end);
        }
    }

    /// Collapse neighbours with the same phase (e.g. Transfer / hold-while-draining / Transfer).
    fn merge_adjacent(segments: Vec<PhaseSegment>) -> Vec<PhaseSegment> {
        let mut merged: Vec<PhaseSegment> = Vec::with_capacity(segments.len());
        for seg in segments {
            match merged.last_mut() {
                Some(prev)
                    if prev.phase == seg.phase
                        && prev.ambiguity.is_none()
                        && seg.ambiguity.is_none()
                        && !prev.is_zero_duration()
                        && !seg.is_zero_duration() =>
                {
                    prev.end = seg.end;
                    prev.inferred |= seg.inferred;
                }
                _ => merged.push(seg),
            }
        }
        merged
    }

    fn count_samples(segments: &mut [PhaseSegment], samples: &[&Sample]) {
        for sample in samples {
            if let Some(i) = segment_index_at(segments, sample.timestamp) {
                segments[i].sample_count += 1;
            }
        }
    }
}

/// Segment for a lone sample: nothing to infer a phase from.
fn single_sample_segment(samples: &[&Sample]) -> PhaseSegment {
    let ts = samples[0].timestamp;
    PhaseSegment {
        phase: Phase::Idle,
        start: ts,
        end: ts,
        sample_count: 0,
        inferred: true,
        ambiguity: None,
    }
}

// ============================================================================
// Labeling
// ============================================================================

struct Labeler<'a> {
    samples: &'a [&'a Sample],
    config: &'a BatchConfig,
    out: Vec<PhaseSegment>,
}

impl Labeler<'_> {
    fn t(&self, i: usize) -> DateTime<Utc> {
        self.samples[i].timestamp
    }

    fn push(&mut self, phase: Phase, start: DateTime<Utc>, end: DateTime<Utc>, inferred: bool) {
        self.out.push(PhaseSegment {
            phase,
            start,
            end,
            sample_count: 0,
            inferred,
            ambiguity: None,
        });
    }

    fn push_ambiguous(
        &mut self,
        phase: Phase,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        candidates: Vec<Phase>,
        reason: String,
    ) {
        self.out.push(PhaseSegment {
            phase,
            start,
            end,
            sample_count: 0,
            inferred: true,
            ambiguity: Some(AmbiguousPhase {
                start,
                end,
                candidates,
                reason,
            }),
        });
    }

    fn label(&mut self, region: &Region, state: CycleState, next_is_fall: bool) -> CycleState {
        match region {
            Region::Rise { first, last } => {
                self.push(Phase::Fill, self.t(*first), self.t(*last), false);
                CycleState::Filled
            }
            Region::Fall { first, last } => {
                let start = self.t(*first);
                if state == CycleState::Filled {
                    // Holds too short to leave a trace in compressed data
                    for phase in [Phase::Mix, Phase::Pasteurize, Phase::Cool] {
                        self.push(phase, start, start, true);
                    }
                }
                self.push(Phase::Transfer, start, self.t(*last), false);
                if self.samples[*last].value.abs() <= self.config.zero_tolerance {
                    CycleState::Drained
                } else {
                    CycleState::Draining
                }
            }
            Region::Hold(hold) => self.label_hold(hold, state, next_is_fall),
        }
    }

    fn label_hold(&mut self, hold: &HoldRegion, state: CycleState, next_is_fall: bool) -> CycleState {
        let start = self.t(hold.first);
        let end = self.t(hold.last);

        if self.samples[hold.first].value.abs() <= self.config.zero_tolerance {
            if state == CycleState::Drained {
                let cip_end = end.min(start + secs(self.config.cip_max_secs));
                self.push(Phase::Cip, start, cip_end, false);
                if cip_end < end {
                    self.push(Phase::Idle, cip_end, end, true);
                }
            } else {
                self.push(Phase::Idle, start, end, false);
            }
            return CycleState::Unknown;
        }

        match state {
            CycleState::Draining => {
                self.push(Phase::Transfer, start, end, false);
                CycleState::Draining
            }
            CycleState::Filled => {
                match hold.drop_at {
                    Some(drop_idx) => {
                        let drop_at = self.t(drop_idx);
                        let (mix_end, prior) = match hold.blips.iter().map(|b| self.t(*b)).find(|b| *b < drop_at) {
                            Some(blip) => (blip, false),
                            None => (drop_at.min(start + secs(self.config.mix_duration_secs)), true),
                        };
                        self.push(Phase::Mix, start, mix_end, prior);
                        self.push(Phase::Pasteurize, mix_end, drop_at, prior);
                        self.label_cool_or_blocked(drop_at, end);
                    }
                    None => match hold.blips.first().map(|b| self.t(*b)) {
                        Some(blip) => {
                            self.push(Phase::Mix, start, blip, false);
                            self.push(Phase::Pasteurize, blip, end, false);
                            if next_is_fall {
                                self.push(Phase::Cool, end, end, true);
                            }
                        }
                        None if next_is_fall => {
                            let mix_end = end.min(start + secs(self.config.mix_duration_secs));
                            self.push(Phase::Mix, start, mix_end, true);
                            self.push(Phase::Pasteurize, mix_end, end, true);
                            self.push(Phase::Cool, end, end, true);
                        }
                        // Still holding at the window edge: nothing bounds Mix yet
                        None => self.push(Phase::Mix, start, end, false),
                    },
                }
                CycleState::Held
            }
            CycleState::Unknown | CycleState::Held | CycleState::Drained => {
                if let Some(drop_idx) = hold.drop_at {
                    let drop_at = self.t(drop_idx);
                    self.push(Phase::Pasteurize, start, drop_at, true);
                    self.label_cool_or_blocked(drop_at, end);
                    CycleState::Held
                } else if next_is_fall {
                    self.label_cool_or_blocked(start, end);
                    CycleState::Held
                } else {
                    self.push(Phase::Idle, start, end, true);
                    CycleState::Unknown
                }
            }
        }
    }

    /// Split a post-Pasteurize hold into Cool and Blocked by duration.
    fn label_cool_or_blocked(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        let held = (end - start).num_seconds().max(0) as u64;
        let cfg = self.config;

        if held <= cfg.blocked_min_secs {
            self.push(Phase::Cool, start, end, held < cfg.cool_min_secs);
        } else if held <= cfg.cool_max_secs {
            self.push_ambiguous(
                Phase::Cool,
                start,
                end,
                vec![Phase::Cool, Phase::Blocked],
                format!(
                    "{held}s hold fits both cool (<= {}s) and blocked (>= {}s) durations",
                    cfg.cool_max_secs, cfg.blocked_min_secs
                ),
            );
        } else {
            let cool_end = start + secs(cfg.cool_max_secs);
            self.push(Phase::Cool, start, cool_end, true);
            let blocked = held - cfg.cool_max_secs;
            if blocked > cfg.blocked_max_secs {
                self.push_ambiguous(
                    Phase::Blocked,
                    cool_end,
                    end,
                    vec![Phase::Blocked, Phase::Idle],
                    format!(
                        "{blocked}s blocked hold exceeds the {}s envelope",
                        cfg.blocked_max_secs
                    ),
                );
            } else {
                self.push(Phase::Blocked, cool_end, end, true);
            }
        }
    }
}

fn secs(s: u64) -> Duration {
    Duration::seconds(s.min(defaults::MAX_DURATION_SECS) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap()
    }

    fn at(minutes: i64, value: f64) -> Sample {
        Sample::new(t0() + Duration::minutes(minutes), value)
    }

    fn window(minutes: i64) -> AnalysisWindow {
        AnalysisWindow::new(t0(), t0() + Duration::minutes(minutes)).unwrap()
    }

    fn run(samples: &[Sample], window: &AnalysisWindow) -> Vec<PhaseSegment> {
        let refs: Vec<&Sample> = samples.iter().collect();
        PhaseSegmenter::segment(&refs, window, &BatchConfig::default())
    }

    fn phases(segments: &[PhaseSegment]) -> Vec<Phase> {
        segments.iter().map(|s| s.phase).collect()
    }

    fn assert_covers(segments: &[PhaseSegment], window: &AnalysisWindow) {
        assert_eq!(segments.first().unwrap().start, window.start);
        assert_eq!(segments.last().unwrap().end, window.end);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "segments must be contiguous");
            assert!(pair[0].start <= pair[0].end);
        }
    }

    /// Idle, fill, compressed hold with a 1% drop, short cool, drain, CIP
    fn full_cycle() -> Vec<Sample> {
        let mut s = Vec::new();
        for m in 0..5 {
            s.push(at(m, 0.0));
        }
        for (k, m) in (5..15).enumerate() {
            s.push(at(m, 1000.0 * (k as f64 + 1.0)));
        }
        s.push(at(44, 9900.0));
        s.push(at(49, 9900.0));
        for (k, m) in (50..60).enumerate() {
            s.push(at(m, (9900.0 - 1100.0 * (k as f64 + 1.0)).max(0.0)));
        }
        for m in 60..=100 {
            s.push(at(m, 0.0));
        }
        s
    }

    #[test]
    fn test_fill_then_flat_is_fill_then_mix() {
        let mut samples = Vec::new();
        for i in 0..50 {
            samples.push(at(i, 11000.0 * i as f64 / 49.0));
        }
        for i in 50..70 {
            samples.push(at(i, 11000.0));
        }
        let w = window(69);
        let segments = run(&samples, &w);
        assert_eq!(phases(&segments), vec![Phase::Fill, Phase::Mix]);
        assert_covers(&segments, &w);
    }

    #[test]
    fn test_full_cycle_order() {
        let w = window(100);
        let samples = full_cycle();
        let segments = run(&samples, &w);

        assert_eq!(
            phases(&segments),
            vec![
                Phase::Idle,
                Phase::Fill,
                Phase::Mix,
                Phase::Pasteurize,
                Phase::Cool,
                Phase::Transfer,
                Phase::Cip,
                Phase::Idle,
            ]
        );
        assert_covers(&segments, &w);

        // Mix takes the configured prior, Pasteurize runs until the drop
        assert_eq!(segments[2].start, t0() + Duration::minutes(14));
        assert_eq!(segments[2].end, t0() + Duration::minutes(24));
        assert_eq!(segments[3].end, t0() + Duration::minutes(44));
        // CIP capped at 30 minutes
        assert_eq!(segments[6].duration_secs(), 1800);

        let counted: usize = segments.iter().map(|s| s.sample_count).sum();
        assert_eq!(counted, samples.len());
        assert_eq!(segments[2].sample_count, 0, "compressed mix has no samples");
    }

    #[test]
    fn test_fill_straight_into_transfer_infers_zero_duration_holds() {
        let mut samples = Vec::new();
        for i in 0..10 {
            samples.push(at(i, 1000.0 * (i as f64 + 1.0)));
        }
        for i in 10..20 {
            samples.push(at(i, 10000.0 - 1000.0 * (i as f64 - 9.0)));
        }
        let w = window(19);
        let segments = run(&samples, &w);
        assert_eq!(
            phases(&segments),
            vec![Phase::Fill, Phase::Mix, Phase::Pasteurize, Phase::Cool, Phase::Transfer]
        );
        for seg in &segments[1..4] {
            assert!(seg.is_zero_duration());
            assert!(seg.inferred);
            assert_eq!(seg.sample_count, 0);
        }
        assert_covers(&segments, &w);
    }

    fn drop_then_hold(hold_minutes: i64) -> (Vec<Sample>, AnalysisWindow) {
        let mut samples = vec![at(0, 0.0)];
        for i in 1..=10 {
            samples.push(at(i, 1000.0 * i as f64));
        }
        samples.push(at(40, 9900.0));
        let transfer_at = 40 + hold_minutes;
        samples.push(at(transfer_at, 9900.0));
        for k in 1..=9 {
            samples.push(at(transfer_at + k, 9900.0 - 1100.0 * k as f64));
        }
        let end = transfer_at + 9;
        (samples, window(end))
    }

    #[test]
    fn test_overlapping_cool_blocked_is_ambiguous() {
        let (samples, w) = drop_then_hold(10);
        let segments = run(&samples, &w);
        let cool = segments.iter().find(|s| s.phase == Phase::Cool).unwrap();
        let ambiguity = cool.ambiguity.as_ref().unwrap();
        assert_eq!(ambiguity.candidates, vec![Phase::Cool, Phase::Blocked]);
        assert!(!segments.iter().any(|s| s.phase == Phase::Blocked));

        let err = PhaseSegmenter::require_unambiguous(&segments).unwrap_err();
        assert_eq!(err.code(), "ambiguous_phase");
    }

    #[test]
    fn test_long_hold_splits_into_cool_and_blocked() {
        let (samples, w) = drop_then_hold(25);
        let segments = run(&samples, &w);
        let labels = phases(&segments);
        let cool = labels.iter().position(|p| *p == Phase::Cool).unwrap();
        assert_eq!(labels[cool + 1], Phase::Blocked);
        assert_eq!(labels[cool + 2], Phase::Transfer);
        assert_eq!(segments[cool].duration_secs(), 840);
        assert!(PhaseSegmenter::require_unambiguous(&segments).is_ok());
    }

    #[test]
    fn test_short_cool_is_unambiguous() {
        let (samples, w) = drop_then_hold(3);
        let segments = run(&samples, &w);
        assert!(segments.iter().any(|s| s.phase == Phase::Cool));
        assert!(segments.iter().all(|s| s.ambiguity.is_none()));
    }

    #[test]
    fn test_hold_before_transfer_uses_mix_prior() {
        let mut samples = Vec::new();
        for i in 0..10 {
            samples.push(at(i, 1000.0 * (i as f64 + 1.0)));
        }
        samples.push(at(60, 10000.0));
        for k in 1..=9 {
            samples.push(at(60 + k, 10000.0 - 1000.0 * k as f64));
        }
        let w = window(69);
        let segments = run(&samples, &w);

        assert_eq!(
            phases(&segments),
            vec![Phase::Fill, Phase::Mix, Phase::Pasteurize, Phase::Cool, Phase::Transfer]
        );
        assert_covers(&segments, &w);
        assert_eq!(segments[1].start, t0() + Duration::minutes(9));
        assert_eq!(segments[1].end, t0() + Duration::minutes(19));
        assert!(segments[1].inferred);
        assert_eq!(segments[2].end, t0() + Duration::minutes(60));
        assert!(segments[3].is_zero_duration());
    }

    #[test]
    fn test_unbounded_durations_do_not_overflow() {
        let config = BatchConfig {
            mix_duration_secs: u64::MAX,
            cip_max_secs: u64::MAX,
            cool_max_secs: u64::MAX,
            blocked_min_secs: u64::MAX,
            blocked_max_secs: u64::MAX,
            ..BatchConfig::default()
        };
        let samples = full_cycle();
        let refs: Vec<&Sample> = samples.iter().collect();
        let w = window(100);
        let segments = PhaseSegmenter::segment(&refs, &w, &config);
        assert_covers(&segments, &w);
        assert!(segments.iter().any(|s| s.phase == Phase::Cip));
    }

    #[test]
    fn test_empty_window_is_single_idle() {
        let w = window(60);
        let segments = run(&[], &w);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].phase, Phase::Idle);
        assert!(segments[0].inferred);
        assert_covers(&segments, &w);
    }

    #[test]
    fn test_single_sample_covers_window() {
        let w = window(60);
        let segments = run(&[at(30, 500.0)], &w);
        assert_eq!(phases(&segments), vec![Phase::Idle]);
        assert_eq!(segments[0].sample_count, 1);
        assert_covers(&segments, &w);
    }
}
