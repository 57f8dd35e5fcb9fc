//! Counter Delta Calculation
//!
//! Converts a monotonic cumulative counter into its net change over a window.
//! Samples flagged with the historian-restart quality code are discarded, and
//! the gap they sit in is neither downtime nor data loss.
//!
//! A counter that steps backwards across a restart gap was reset by the
//! restart; the delta is then summed piecewise. A backward step anywhere
//! else is a counter/clock anomaly and is reported, never clamped.

use tracing::debug;

use crate::types::{valid_samples, AnalysisError, AnalysisWindow, CounterWindowDelta, Sample};

/// Minimum valid samples for a delta
pub const MIN_COUNTER_SAMPLES: usize = 2;

/// First/last value of a run of valid samples between detected resets
#[derive(Debug, Clone, Copy)]
struct CounterRun {
    first: f64,
    last: f64,
}

/// Counter delta and rate reductions
pub struct CounterDeltaCalculator;

impl CounterDeltaCalculator {
    /// Net delta of `tag` over `window`.
    ///
    /// # Errors
    /// - `InsufficientData` when fewer than 2 valid samples remain
    /// - `CounterAnomaly` when the counter goes backwards without a detected reset
    pub fn delta(
        tag: &str,
        samples: &[Sample],
        window: &AnalysisWindow,
        restart_code: i32,
    ) -> Result<CounterWindowDelta, AnalysisError> {
        let valid_count = valid_samples(samples, window, restart_code).len();
        if valid_count < MIN_COUNTER_SAMPLES {
            return Err(AnalysisError::InsufficientData {
                tag: tag.to_string(),
                valid: valid_count,
                required: MIN_COUNTER_SAMPLES,
            });
        }

        let runs = Self::split_at_resets(samples, window, restart_code);

        if let Some(bad) = runs.iter().find(|r| r.last < r.first) {
            return Err(AnalysisError::CounterAnomaly {
                tag: tag.to_string(),
                delta: bad.last - bad.first,
                first: bad.first,
                last: bad.last,
            });
        }

        // Pre-reset run counts its own span; each post-reset run counted up from zero
        let delta = runs
            .iter()
            .enumerate()
            .map(|(i, run)| if i == 0 { run.last - run.first } else { run.last })
            .sum();
        let resets_detected = runs.len() - 1;

        debug!(
            tag = %tag,
            delta = delta,
            samples = valid_count,
            resets = resets_detected,
            "Counter delta computed"
        );

        Ok(CounterWindowDelta {
            tag: tag.to_string(),
            window_start: window.start,
            window_end: window.end,
            delta,
            valid_sample_count: valid_count,
            resets_detected,
        })
    }

    /// Split the valid samples into runs separated by detected resets.
    ///
    /// A reset is a backward step between two valid samples with at least one
    /// restart-flagged sample between them.
    fn split_at_resets(
        samples: &[Sample],
        window: &AnalysisWindow,
        restart_code: i32,
    ) -> Vec<CounterRun> {
        let mut runs: Vec<CounterRun> = Vec::new();
        let mut restart_since_last_valid = false;

        for sample in samples.iter().filter(|s| window.contains(s.timestamp)) {
            if sample.is_restart_artifact(restart_code) {
                restart_since_last_valid = true;
                continue;
            }
            if !sample.value.is_finite() {
                continue;
            }

            match runs.last_mut() {
                Some(run) if sample.value < run.last && restart_since_last_valid => {
                    runs.push(CounterRun {
                        first: sample.value,
                        last: sample.value,
                    });
                }
                Some(run) => run.last = sample.value,
                None => runs.push(CounterRun {
                    first: sample.value,
                    last: sample.value,
                }),
            }
            restart_since_last_valid = false;
        }

        runs
    }

    /// Most recent valid reading of a rate tag, zero included.
    pub fn latest_rate(samples: &[Sample], window: &AnalysisWindow, restart_code: i32) -> Option<f64> {
        valid_samples(samples, window, restart_code)
            .last()
            .map(|s| s.value)
    }

    /// Mean rate while running: zero readings mean "not running" and are dropped.
    pub fn running_average_rate(
        samples: &[Sample],
        window: &AnalysisWindow,
        restart_code: i32,
    ) -> Option<f64> {
        let running: Vec<f64> = valid_samples(samples, window, restart_code)
            .into_iter()
            .map(|s| s.value)
            .filter(|v| *v != 0.0)
            .collect();

        if running.is_empty() {
            None
        } else {
            Some(running.iter().sum::<f64>() / running.len() as f64)
        }
    }
}
