//! System-wide default constants.
//!
//! Fixed values that are not worth a config key. Grouped by subsystem.

// ============================================================================
// Data-range discovery
// ============================================================================

/// How far back the discovery probe looks (days).
pub const DISCOVERY_LOOKBACK_DAYS: i64 = 30;

// ============================================================================
// Batch durations
// ============================================================================

/// Upper bound for any configured duration in seconds (one week).
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 3_600;

// ============================================================================
// Historian client
// ============================================================================

/// `User-Agent` sent with historian queries.
pub const HISTORIAN_USER_AGENT: &str = concat!("plantwatch/", env!("CARGO_PKG_VERSION"));

/// Characters of an error response body kept in `FetchError::Status`.
pub const ERROR_BODY_PREVIEW_CHARS: usize = 200;

// ============================================================================
// Site fan-out
// ============================================================================

/// Upper bound on concurrently running target analyses per site.
///
/// Each target issues its own fetch batches, so this also bounds open
/// historian requests.
pub const MAX_CONCURRENT_TARGETS: usize = 8;
