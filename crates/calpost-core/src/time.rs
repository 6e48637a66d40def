//! Time types for event drafts.
//!
//! This module provides [`EventTime`] for representing the start/end of a
//! draft (either a specific datetime or an all-day date) and the parsing
//! helpers used by the command line and the interactive prompt.

use std::cmp::Ordering;
use std::fmt;

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents the time of a calendar event.
///
/// - **DateTime**: a specific point in time, keeping the offset it was
///   entered with so it can be sent back to the API unchanged
/// - **AllDay**: a date without a specific time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific datetime.
    DateTime(DateTime<FixedOffset>),
    /// An all-day event date.
    AllDay(NaiveDate),
}

impl EventTime {
    /// Creates a new `EventTime::DateTime` from a datetime in any timezone.
    pub fn from_datetime<Tz: TimeZone>(dt: DateTime<Tz>) -> Self {
        Self::DateTime(dt.fixed_offset())
    }

    /// Creates a new `EventTime::AllDay` from a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    /// Returns `true` if this is an all-day event time.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Returns the datetime if this is a `DateTime` variant.
    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            Self::AllDay(_) => None,
        }
    }

    /// Returns the date portion of this event time, in its own offset.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::DateTime(dt) => dt.date_naive(),
            Self::AllDay(date) => *date,
        }
    }

    /// Returns this time shifted by `delta`.
    ///
    /// All-day values move by whole days only; the sub-day part of `delta`
    /// is dropped.
    pub fn shifted(&self, delta: Duration) -> Self {
        match self {
            Self::DateTime(dt) => Self::DateTime(*dt + delta),
            Self::AllDay(date) => Self::AllDay(*date + Duration::days(delta.num_days())),
        }
    }

    /// Converts to the all-day form, keeping the date.
    pub fn to_all_day(&self) -> Self {
        Self::AllDay(self.date())
    }

    /// Converts to the timed form.
    ///
    /// All-day values become `at` on that date in `tz`. Timed values are
    /// returned unchanged.
    pub fn to_timed<Tz: TimeZone>(&self, at: NaiveTime, tz: &Tz) -> Self {
        match self {
            Self::DateTime(_) => *self,
            Self::AllDay(date) => {
                let naive = date.and_time(at);
                match tz.from_local_datetime(&naive).earliest() {
                    Some(dt) => Self::DateTime(dt.fixed_offset()),
                    // Inside a DST gap; fall back to the offset in effect at UTC.
                    None => Self::DateTime(tz.from_utc_datetime(&naive).fixed_offset()),
                }
            }
        }
    }

    /// Returns the signed distance from `earlier` to `self`.
    ///
    /// All-day values count from midnight UTC of their date.
    pub fn duration_since(&self, earlier: &EventTime) -> Duration {
        self.sort_key() - earlier.sort_key()
    }

    fn sort_key(&self) -> DateTime<FixedOffset> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => date
                .and_time(NaiveTime::MIN)
                .and_utc()
                .fixed_offset(),
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders by instant. On a tie an all-day value sorts before a timed one, so
/// `Ordering::Equal` only holds for values that are also `==`.
impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| other.is_all_day().cmp(&self.is_all_day()))
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DateTime(dt) => write!(f, "{}", dt.format("%a %Y-%m-%d %H:%M")),
            Self::AllDay(date) => write!(f, "{} (all day)", date.format("%a %Y-%m-%d")),
        }
    }
}

/// Error returned when a user-supplied time cannot be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    /// The input matched none of the accepted formats.
    #[error("unrecognized date/time '{0}' (expected e.g. 2024-03-15 10:00, 2024-03-15, 14:30 or now)")]
    Unrecognized(String),
    /// The local time does not exist or is ambiguous (DST transition).
    #[error("local time '{0}' is ambiguous or does not exist in this timezone")]
    AmbiguousLocal(String),
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parses a user-supplied start/end time.
///
/// Accepted forms, tried in order:
/// - `now`
/// - RFC 3339 (`2024-03-15T10:00:00+01:00`)
/// - local datetime (`2024-03-15 10:00`, `2024-03-15T10:00[:SS]`)
/// - date only (`2024-03-15`), producing an all-day value
/// - time only (`14:30`), on the date of `now`
///
/// Local forms are interpreted in `tz`.
pub fn parse_event_time<Tz: TimeZone>(
    input: &str,
    now: DateTime<Tz>,
) -> Result<EventTime, TimeParseError> {
    let input = input.trim();
    let tz = now.timezone();

    if input.eq_ignore_ascii_case("now") {
        return Ok(EventTime::from_datetime(now));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(EventTime::DateTime(dt));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return resolve_local(&tz, naive, input);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(EventTime::AllDay(date));
    }

    if let Ok(time) = NaiveTime::parse_from_str(input, "%H:%M") {
        let naive = now.date_naive().and_time(time);
        return resolve_local(&tz, naive, input);
    }

    Err(TimeParseError::Unrecognized(input.to_string()))
}

fn resolve_local<Tz: TimeZone>(
    tz: &Tz,
    naive: NaiveDateTime,
    input: &str,
) -> Result<EventTime, TimeParseError> {
    tz.from_local_datetime(&naive)
        .single()
        .map(EventTime::from_datetime)
        .ok_or_else(|| TimeParseError::AmbiguousLocal(input.to_string()))
}

/// Rounds a datetime up to the next quarter hour.
///
/// Used to seed the date picker, whose minute wheel moves in 15 minute steps.
/// Values already on a quarter hour (with zero seconds) are returned as-is.
pub fn round_up_to_quarter<Tz: TimeZone>(dt: DateTime<Tz>) -> DateTime<Tz> {
    let truncated = dt
        .with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or_else(|| dt.clone());
    let minute = truncated.minute();
    let on_boundary = minute % 15 == 0 && truncated == dt;
    if on_boundary {
        return dt;
    }
    let add = 15 - (minute % 15);
    truncated + Duration::minutes(i64::from(add))
}
