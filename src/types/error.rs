//! Error taxonomy for the analytic core and the historian boundary

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::AmbiguousPhase;

/// Historian transport errors.
///
/// Raised only at the fetch boundary; the pure components never see them
/// except wrapped in [`AnalysisError::UpstreamFetch`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Historian returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Timeout after {0}s waiting for historian")]
    Timeout(u64),

    #[error("Malformed historian response: {0}")]
    Decode(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("Tag not available: {0}")]
    Unavailable(String),
}

impl FetchError {
    /// Transient failures are retried with backoff inside the fetch boundary.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Decode(_) | Self::RetriesExhausted { .. } | Self::Unavailable(_) => false,
        }
    }
}

/// Analysis failures
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Insufficient data for {tag}: {valid} valid samples, need {required}")]
    InsufficientData {
        tag: String,
        valid: usize,
        required: usize,
    },

    #[error("Counter anomaly on {tag}: negative delta {delta} ({first} → {last}) without a detected reset")]
    CounterAnomaly {
        tag: String,
        delta: f64,
        first: f64,
        last: f64,
    },

    #[error("Ambiguous phase: {0}")]
    AmbiguousPhase(AmbiguousPhase),

    #[error("Historian fetch failed for {tag}: {source}")]
    UpstreamFetch {
        tag: String,
        #[source]
        source: FetchError,
    },

    #[error("Invalid window: end {end} precedes start {start}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Unknown site '{0}': no equipment configured under [sites]")]
    UnknownSite(String),
}

impl AnalysisError {
    /// Stable machine code for error entries
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientData { .. } => "insufficient_data",
            Self::CounterAnomaly { .. } => "counter_anomaly",
            Self::AmbiguousPhase(_) => "ambiguous_phase",
            Self::UpstreamFetch { .. } => "upstream_fetch",
            Self::InvalidWindow { .. } => "invalid_window",
            Self::UnknownSite(_) => "unknown_site",
        }
    }

    pub fn fetch(tag: impl Into<String>, source: FetchError) -> Self {
        Self::UpstreamFetch {
            tag: tag.into(),
            source,
        }
    }
}
