//! Analysis window resolution
//!
//! Callers name a window three ways: absolute timestamps, a relative offset
//! back from now (`-30m`, `-1h`, `-2d`), or a shift name. All three resolve
//! here into an absolute `AnalysisWindow`; nothing past this point sees a
//! relative time.
//!
//! Shifts are fixed UTC hours from `[shifts]`: day runs day_start..night_start,
//! night runs night_start..day_start of the next day.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use regex::Regex;
use thiserror::Error;

use crate::config::ShiftConfig;
use crate::types::{AnalysisError, AnalysisWindow};

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("Cannot parse time '{0}' (expected RFC 3339, 'now', or an offset like -1h)")]
    Unparseable(String),

    #[error("Unknown shift '{0}' (expected last, current, day or night)")]
    UnknownShift(String),

    #[error("Offset '{0}' is outside the representable time range")]
    OffsetOutOfRange(String),

    #[error(transparent)]
    Invalid(#[from] AnalysisError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftName {
    /// Most recently completed shift
    Last,
    /// Start of the running shift up to now
    Current,
    /// Today's day shift
    Day,
    /// Tonight's shift, ending tomorrow morning
    Night,
}

impl FromStr for ShiftName {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last" => Ok(Self::Last),
            "current" => Ok(Self::Current),
            "day" => Ok(Self::Day),
            "night" => Ok(Self::Night),
            other => Err(WindowError::UnknownShift(other.to_string())),
        }
    }
}

/// One end of a window as the caller wrote it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    Now,
    Absolute(DateTime<Utc>),
    /// Offset back from now
    Ago(Duration),
}

impl TimeSpec {
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, WindowError> {
        match self {
            Self::Now => Ok(now),
            Self::Absolute(ts) => Ok(*ts),
            Self::Ago(offset) => now
                .checked_sub_signed(*offset)
                .ok_or_else(|| WindowError::OffsetOutOfRange(format!("-{}s", offset.num_seconds()))),
        }
    }
}

fn offset_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^-\s*(\d+)\s*([smhd])$").ok())
        .as_ref()
}

impl FromStr for TimeSpec {
    type Err = WindowError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        if s.eq_ignore_ascii_case("now") {
            return Ok(Self::Now);
        }

        if let Some(caps) = offset_pattern().and_then(|re| re.captures(s)) {
            let amount: i64 = caps[1]
                .parse()
                .map_err(|_| WindowError::OffsetOutOfRange(raw.to_string()))?;
            let offset = match &caps[2] {
                "s" => Duration::try_seconds(amount),
                "m" => Duration::try_minutes(amount),
                "h" => Duration::try_hours(amount),
                _ => Duration::try_days(amount),
            }
            .ok_or_else(|| WindowError::OffsetOutOfRange(raw.to_string()))?;
            return Ok(Self::Ago(offset));
        }

        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self::Absolute(ts.with_timezone(&Utc)));
        }
        // Naive timestamps and bare dates are UTC
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(Self::Absolute(naive.and_utc()));
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(Self::Absolute(midnight.and_utc()));
            }
        }
        Err(WindowError::Unparseable(raw.to_string()))
    }
}

/// How the caller asked for a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSpec {
    Explicit { start: TimeSpec, end: TimeSpec },
    Shift(ShiftName),
}

impl WindowSpec {
    /// Build from command-line style arguments.
    ///
    /// An explicit start overrides the shift; a missing end means now.
    /// With neither, the last completed shift is used.
    pub fn from_args(
        start: Option<&str>,
        end: Option<&str>,
        shift: Option<&str>,
    ) -> Result<Self, WindowError> {
        if let Some(start) = start {
            let end = match end {
                Some(e) => e.parse()?,
                None => TimeSpec::Now,
            };
            return Ok(Self::Explicit {
                start: start.parse()?,
                end,
            });
        }
        match shift {
            Some(name) => Ok(Self::Shift(name.parse()?)),
            None => Ok(Self::Shift(ShiftName::Last)),
        }
    }

    pub fn resolve(&self, now: DateTime<Utc>, shifts: &ShiftConfig) -> Result<AnalysisWindow, WindowError> {
        let (start, end) = match self {
            Self::Explicit { start, end } => (start.resolve(now)?, end.resolve(now)?),
            Self::Shift(name) => shift_bounds(*name, now, shifts),
        };
        Ok(AnalysisWindow::new(start, end)?)
    }
}

fn at_hour(day: NaiveDate, hour: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)) + Duration::hours(i64::from(hour))
}

fn is_day(ts: DateTime<Utc>, shifts: &ShiftConfig) -> bool {
    (shifts.day_start_hour..shifts.night_start_hour).contains(&ts.hour())
}

/// Start of the shift containing `ts`
pub fn shift_start_containing(ts: DateTime<Utc>, shifts: &ShiftConfig) -> DateTime<Utc> {
    let today = ts.date_naive();
    if is_day(ts, shifts) {
        at_hour(today, shifts.day_start_hour)
    } else if ts.hour() >= shifts.night_start_hour {
        at_hour(today, shifts.night_start_hour)
    } else {
        at_hour(today - Duration::days(1), shifts.night_start_hour)
    }
}

fn shift_bounds(name: ShiftName, now: DateTime<Utc>, shifts: &ShiftConfig) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let day_start = at_hour(today, shifts.day_start_hour);
    let night_start = at_hour(today, shifts.night_start_hour);
    let day_len = night_start - day_start;

    match name {
        ShiftName::Day => (day_start, night_start),
        ShiftName::Night => (night_start, day_start + Duration::days(1)),
        ShiftName::Current => (shift_start_containing(now, shifts), now),
        ShiftName::Last => {
            let current = shift_start_containing(now, shifts);
            if is_day(now, shifts) {
                // Last night's shift
                (current - (Duration::days(1) - day_len), current)
            } else {
                // The day shift before this night
                (current - day_len, current)
            }
        }
    }
}

/// The full shift containing the latest data point.
pub fn recommend_window(latest: DateTime<Utc>, shifts: &ShiftConfig) -> AnalysisWindow {
    let start = shift_start_containing(latest, shifts);
    let day_len = Duration::hours(i64::from(shifts.night_start_hour) - i64::from(shifts.day_start_hour));
    let end = if is_day(latest, shifts) {
        start + day_len
    } else {
        start + (Duration::days(1) - day_len)
    };
    AnalysisWindow { start, end }
}
