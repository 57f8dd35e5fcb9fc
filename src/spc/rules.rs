//! Western Electric Rule Evaluation
//!
//! All four rules run in a single chronological pass. Each rule keeps its
//! own run state and resets after it fires, so a long excursion reports
//! once per full run length rather than once per point.
//!
//! 1. One point beyond the 3σ limits
//! 2. Nine consecutive points strictly on one side of the center line
//! 3. Six consecutive points steadily increasing or decreasing
//! 4. Fourteen consecutive points alternating up and down

use chrono::{DateTime, Utc};

use crate::types::{ControlLimits, RawViolation, Sample, WesternElectricRule};

/// Points on one side of the center line for rule 2
pub const RULE2_RUN_LENGTH: usize = 9;
/// Points in a monotonic trend for rule 3
pub const RULE3_RUN_LENGTH: usize = 6;
/// Points in an alternating sequence for rule 4
pub const RULE4_RUN_LENGTH: usize = 14;

/// Streaming state for one rule.
///
/// `push` sees every point once, in time order, and returns the start of
/// the completed run when the rule fires on that point.
trait RunRule {
    fn rule(&self) -> WesternElectricRule;
    fn push(&mut self, point: &Sample, limits: &ControlLimits) -> Option<DateTime<Utc>>;
}

fn direction(from: f64, to: f64) -> i8 {
    if to > from {
        1
    } else if to < from {
        -1
    } else {
        0
    }
}

// ============================================================================
// Rule 1: beyond limits
// ============================================================================

struct BeyondLimits;

impl RunRule for BeyondLimits {
    fn rule(&self) -> WesternElectricRule {
        WesternElectricRule::BeyondLimits
    }

    fn push(&mut self, point: &Sample, limits: &ControlLimits) -> Option<DateTime<Utc>> {
        limits.is_beyond(point.value).then_some(point.timestamp)
    }
}

// ============================================================================
// Rule 2: nine on one side
// ============================================================================

#[derive(Default)]
struct SideRun {
    side: i8,
    len: usize,
    start: Option<DateTime<Utc>>,
}

impl RunRule for SideRun {
    fn rule(&self) -> WesternElectricRule {
        WesternElectricRule::NineOneSide
    }

    fn push(&mut self, point: &Sample, limits: &ControlLimits) -> Option<DateTime<Utc>> {
        let side = limits.side_of(point.value);
        if side == 0 {
            // A point on the center line belongs to neither side
            *self = Self::default();
            return None;
        }

        if side != self.side || self.len == 0 {
            self.side = side;
            self.len = 1;
            self.start = Some(point.timestamp);
        } else {
            self.len += 1;
        }

        if self.len >= RULE2_RUN_LENGTH {
            let start = self.start.take();
            self.len = 0;
            return start;
        }
        None
    }
}

// ============================================================================
// Rule 3: six-point trend
// ============================================================================

#[derive(Default)]
struct Trend {
    dir: i8,
    len: usize,
    start: Option<DateTime<Utc>>,
    prev: Option<(DateTime<Utc>, f64)>,
}

impl RunRule for Trend {
    fn rule(&self) -> WesternElectricRule {
        WesternElectricRule::SixTrend
    }

    fn push(&mut self, point: &Sample, _limits: &ControlLimits) -> Option<DateTime<Utc>> {
        let prev = self.prev.replace((point.timestamp, point.value));
        let Some((prev_ts, prev_value)) = prev else {
            self.len = 1;
            self.start = Some(point.timestamp);
            return None;
        };

        let dir = direction(prev_value, point.value);
        if dir == 0 {
            self.dir = 0;
            self.len = 1;
            self.start = Some(point.timestamp);
        } else if dir == self.dir {
            self.len += 1;
        } else {
            self.dir = dir;
            self.len = 2;
            self.start = Some(prev_ts);
        }

        if self.len >= RULE3_RUN_LENGTH {
            let start = self.start.replace(point.timestamp);
            // The firing point opens the next run
            self.dir = 0;
            self.len = 1;
            return start;
        }
        None
    }
}

// ============================================================================
// Rule 4: fourteen alternating
// ============================================================================

#[derive(Default)]
struct Alternation {
    last_dir: i8,
    len: usize,
    start: Option<DateTime<Utc>>,
    prev: Option<(DateTime<Utc>, f64)>,
}

impl RunRule for Alternation {
    fn rule(&self) -> WesternElectricRule {
        WesternElectricRule::FourteenAlternating
    }

    fn push(&mut self, point: &Sample, _limits: &ControlLimits) -> Option<DateTime<Utc>> {
        let prev = self.prev.replace((point.timestamp, point.value));
        let Some((prev_ts, prev_value)) = prev else {
            self.len = 1;
            self.start = Some(point.timestamp);
            return None;
        };

        let dir = direction(prev_value, point.value);
        if dir == 0 {
            self.last_dir = 0;
            self.len = 1;
            self.start = Some(point.timestamp);
        } else if self.last_dir != 0 && dir == -self.last_dir {
            self.last_dir = dir;
            self.len += 1;
        } else {
            self.last_dir = dir;
            self.len = 2;
            self.start = Some(prev_ts);
        }

        if self.len >= RULE4_RUN_LENGTH {
            let start = self.start.replace(point.timestamp);
            self.last_dir = 0;
            self.len = 1;
            return start;
        }
        None
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Runs all four rules over a chronologically ordered series.
pub struct WesternElectricEvaluator {
    limits: ControlLimits,
}

impl WesternElectricEvaluator {
    pub fn new(limits: ControlLimits) -> Self {
        Self { limits }
    }

    /// Every firing, in time order. Firings on the same point are ordered
    /// by rule number.
    pub fn evaluate(&self, points: &[&Sample]) -> Vec<RawViolation> {
        let mut rules: [Box<dyn RunRule>; 4] = [
            Box::new(BeyondLimits),
            Box::new(SideRun::default()),
            Box::new(Trend::default()),
            Box::new(Alternation::default()),
        ];

        let mut violations = Vec::new();
        for point in points {
            for rule in rules.iter_mut() {
                if let Some(run_start) = rule.push(point, &self.limits) {
                    violations.push(RawViolation {
                        rule: rule.rule(),
                        timestamp: point.timestamp,
                        value: point.value,
                        run_start,
                        zone: self.limits.zone_of(point.value),
                    });
                }
            }
        }

        tracing::debug!(
            points = points.len(),
            violations = violations.len(),
            "Western Electric evaluation complete"
        );
        violations
    }
}
