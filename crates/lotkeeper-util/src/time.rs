//! Time utilities for lotkeeper
//!
//! All scheduling happens in facility-local time, which is a fixed UTC offset
//! taken from configuration rather than the host timezone.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `LOTKEEPER_MOCK_TIME` environment variable can be set
//! to shift the clock used by every time-sensitive operation. The value is
//! read as UTC and the clock keeps advancing from it at the real rate.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-06-01 01:59:00`)

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};
use std::sync::OnceLock;
use std::time::Duration;

use crate::{LotkeeperError, Result};

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "LOTKEEPER_MOCK_TIME";

/// Canonical storage format for calendar dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical storage format for time of day (24-hour)
pub const TIME_FORMAT: &str = "%H:%M";

/// Format used when showing dates to people
pub const DISPLAY_DATE_FORMAT: &str = "%m-%d-%Y";

/// UTC+8, the offset the facility originally ran under
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 8 * 3600;

static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let raw = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            match NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S") {
                Ok(naive) => {
                    let offset = naive.and_utc().signed_duration_since(Utc::now());
                    tracing::info!(
                        mock_time = %raw,
                        offset_secs = offset.num_seconds(),
                        "Mock time enabled"
                    );
                    Some(offset)
                }
                Err(_) => {
                    tracing::warn!(
                        mock_time = %raw,
                        expected_format = "%Y-%m-%d %H:%M:%S",
                        "Invalid mock time format"
                    );
                    None
                }
            }
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Current UTC time, respecting mock time in debug builds.
pub fn now() -> DateTime<Utc> {
    let real_now = Utc::now();
    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Clock pinned to the facility's fixed UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacilityClock {
    offset: FixedOffset,
}

impl FacilityClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Current facility-local time
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.localize(now())
    }

    /// Current facility-local calendar date
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// Instant at which a facility-local date and time of day occur
    pub fn scheduled_instant(&self, date: NaiveDate, time: NaiveTime) -> DateTime<FixedOffset> {
        let local = date.and_time(time);
        let utc = local - chrono::Duration::seconds(i64::from(self.offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc, self.offset)
    }
}

impl Default for FacilityClock {
    fn default() -> Self {
        Self::new(FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix()))
    }
}

/// Parse an ISO calendar date (`YYYY-MM-DD`)
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    let shaped = s.len() == 10
        && s.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return Err(LotkeeperError::validation(format!(
            "invalid date '{}': expected YYYY-MM-DD",
            s
        )));
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| LotkeeperError::validation(format!("invalid date '{}': {}", s, e)))
}

/// Parse a 24-hour time of day (`HH:MM`)
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    let invalid = |why: &str| LotkeeperError::validation(format!("invalid time '{}': {}", s, why));

    let (hour, minute) = s.split_once(':').ok_or_else(|| invalid("expected HH:MM"))?;
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hour) || !two_digits(minute) {
        return Err(invalid("expected HH:MM"));
    }

    let hour: u32 = hour.parse().map_err(|_| invalid("invalid hour"))?;
    let minute: u32 = minute.parse().map_err(|_| invalid("invalid minute"))?;
    if hour >= 24 {
        return Err(invalid("hour must be 0-23"));
    }
    if minute >= 60 {
        return Err(invalid("minute must be 0-59"));
    }

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| invalid("out of range"))
}

/// Parse a fixed UTC offset such as `+08:00`, `-05:30` or `Z`
pub fn parse_utc_offset(s: &str) -> std::result::Result<FixedOffset, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| "invalid offset".to_string());
    }

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(format!("offset '{}' must start with '+' or '-'", s)),
    };

    let (hours, minutes) = rest
        .split_once(':')
        .ok_or_else(|| format!("offset '{}' must look like +HH:MM", s))?;
    let hours: i32 = hours
        .parse()
        .map_err(|_| format!("invalid offset hours in '{}'", s))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| format!("invalid offset minutes in '{}'", s))?;

    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(format!("offset '{}' is out of range", s));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| format!("offset '{}' is out of range", s))
}

/// Format a date the way the admin screens show it (`MM-DD-YYYY`)
pub fn format_display_date(date: NaiveDate) -> String {
    date.format(DISPLAY_DATE_FORMAT).to_string()
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
