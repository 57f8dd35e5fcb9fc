//! Batch vat phase segments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Physical phase of a batch vat.
///
/// Full cycle order: Idle → Fill → Mix → Pasteurize → Cool → [Blocked] → Transfer → CIP → Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Fill,
    Mix,
    Pasteurize,
    Cool,
    /// Held full because downstream storage is unavailable
    Blocked,
    Transfer,
    /// Clean-in-place
    #[serde(rename = "CIP")]
    Cip,
}

impl Phase {
    pub fn is_drain(&self) -> bool {
        matches!(self, Self::Transfer | Self::Cip)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Fill => write!(f, "Fill"),
            Self::Mix => write!(f, "Mix"),
            Self::Pasteurize => write!(f, "Pasteurize"),
            Self::Cool => write!(f, "Cool"),
            Self::Blocked => write!(f, "Blocked"),
            Self::Transfer => write!(f, "Transfer"),
            Self::Cip => write!(f, "CIP"),
        }
    }
}

/// A hold that duration/position heuristics could not settle.
///
/// Attached to the affected segment instead of being dropped, so callers
/// can apply more context (e.g. downstream tank state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguousPhase {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Labels the hold is consistent with, chosen label first
    pub candidates: Vec<Phase>,
    pub reason: String,
}

impl std::fmt::Display for AmbiguousPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<String> = self.candidates.iter().map(ToString::to_string).collect();
        write!(
            f,
            "hold {} → {} could be {}: {}",
            self.start.to_rfc3339(),
            self.end.to_rfc3339(),
            labels.join(" or "),
            self.reason
        )
    }
}

/// Contiguous labeled span of a vat's weight trajectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSegment {
    pub phase: Phase,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Samples attributed to this segment (may be zero under deadband compression)
    pub sample_count: usize,
    /// Boundaries inferred from bracketing timestamps and duration priors
    /// rather than observed directly
    #[serde(default)]
    pub inferred: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambiguity: Option<AmbiguousPhase>,
}

impl PhaseSegment {
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    pub fn is_zero_duration(&self) -> bool {
        self.start == self.end
    }

    /// Containment is `(start, end]`; the first segment of a segmentation
    /// also owns its start instant. Zero-duration segments contain nothing.
    pub fn contains(&self, ts: DateTime<Utc>, is_first: bool) -> bool {
        (ts > self.start && ts <= self.end) || (is_first && ts == self.start)
    }

    /// Closed-interval check used for "run lies entirely within" tests
    pub fn covers(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        from >= self.start && to <= self.end
    }
}

/// Index of the segment containing `ts`, if any.
pub fn segment_index_at(segments: &[PhaseSegment], ts: DateTime<Utc>) -> Option<usize> {
    segments
        .iter()
        .enumerate()
        .find(|(i, s)| s.contains(ts, *i == 0))
        .map(|(i, _)| i)
}

/// Phase in effect at `ts`, if the segmentation covers it.
pub fn phase_at(segments: &[PhaseSegment], ts: DateTime<Utc>) -> Option<Phase> {
    segment_index_at(segments, ts).map(|i| segments[i].phase)
}
