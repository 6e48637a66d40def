//! The calendar event draft.
//!
//! An [`EventDraft`] is what the user edits before posting: a title, an
//! optional location and description, a start and an optional end. Whether
//! the event is all-day is carried by the [`EventTime`] variant.

use chrono::{Duration, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::EventTime;

/// Default length of a timed event when no end is given.
pub const DEFAULT_DURATION_MINUTES: i64 = 60;

/// Errors found when validating a draft before posting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    /// The title is empty or whitespace.
    #[error("event title must not be empty")]
    EmptySummary,
    /// Start and end are not both timed or both all-day.
    #[error("start and end must both be all-day or both have a time")]
    MixedKinds,
    /// The end is before the start.
    #[error("event end ({end}) is before its start ({start})")]
    EndBeforeStart {
        /// Formatted start.
        start: String,
        /// Formatted end.
        end: String,
    },
}

/// A calendar event being composed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    /// The event title.
    pub summary: String,
    /// Where the event takes place.
    pub location: Option<String>,
    /// Free-form notes.
    pub description: Option<String>,
    /// When the event starts.
    pub start: EventTime,
    /// When the event ends; derived from the start when unset.
    pub end: Option<EventTime>,
}

impl EventDraft {
    /// Creates a draft with a title and a start.
    pub fn new(summary: impl Into<String>, start: EventTime) -> Self {
        Self {
            summary: summary.into(),
            location: None,
            description: None,
            start,
            end: None,
        }
    }

    /// Sets the end time.
    pub fn with_end(mut self, end: EventTime) -> Self {
        self.end = Some(end);
        self
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = non_blank(location.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = non_blank(description.into());
        self
    }

    /// Returns true when the draft describes an all-day event.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    /// Returns the end that will be sent.
    ///
    /// Without an explicit end, timed events last `default_duration` and
    /// all-day events last one day. All-day end dates are exclusive, so an
    /// explicit end on the start date is moved to the following day.
    pub fn resolved_end(&self, default_duration: Duration) -> EventTime {
        match (self.start, self.end) {
            (EventTime::AllDay(start), Some(EventTime::AllDay(end))) if end <= start => {
                EventTime::AllDay(start + Duration::days(1))
            }
            (_, Some(end)) => end,
            (EventTime::AllDay(start), None) => EventTime::AllDay(start + Duration::days(1)),
            (start, None) => start.shifted(default_duration),
        }
    }

    /// Checks that the draft can be posted.
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.summary.trim().is_empty() {
            return Err(DraftError::EmptySummary);
        }

        if let Some(end) = self.end {
            if end.is_all_day() != self.start.is_all_day() {
                return Err(DraftError::MixedKinds);
            }
            if end < self.start {
                return Err(DraftError::EndBeforeStart {
                    start: self.start.to_string(),
                    end: end.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Switches the draft between all-day and timed.
    ///
    /// Timed values keep their local date. All-day values become `at` in
    /// `tz` on their date.
    pub fn set_all_day<Tz: TimeZone>(&mut self, all_day: bool, at: NaiveTime, tz: &Tz) {
        if all_day == self.is_all_day() {
            return;
        }
        if all_day {
            self.start = self.start.to_all_day();
            self.end = self.end.map(|e| e.to_all_day());
        } else {
            self.start = self.start.to_timed(at, tz);
            self.end = self.end.map(|e| e.to_timed(at, tz));
        }
    }
}

pub(crate) fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, NaiveDate};

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<FixedOffset> {
        tz().with_ymd_and_hms(2024, 3, 15, h, m, 0).unwrap()
    }

    fn day(d: u32) -> EventTime {
        EventTime::AllDay(NaiveDate::from_ymd_opt(2024, 3, d).unwrap())
    }

    #[test]
    fn resolved_end_defaults_to_duration() {
        let draft = EventDraft::new("Standup", EventTime::DateTime(at(9, 0)));
        assert_eq!(
            draft.resolved_end(Duration::minutes(30)),
            EventTime::DateTime(at(9, 30))
        );
    }

    #[test]
    fn resolved_end_all_day_is_exclusive() {
        let draft = EventDraft::new("Holiday", day(15));
        assert_eq!(draft.resolved_end(Duration::minutes(60)), day(16));

        let same_day = EventDraft::new("Holiday", day(15)).with_end(day(15));
        assert_eq!(same_day.resolved_end(Duration::minutes(60)), day(16));

        let multi = EventDraft::new("Trip", day(15)).with_end(day(18));
        assert_eq!(multi.resolved_end(Duration::minutes(60)), day(18));
    }

    #[test]
    fn validate_rejects_blank_summary() {
        let draft = EventDraft::new("   ", EventTime::DateTime(at(9, 0)));
        assert_eq!(draft.validate(), Err(DraftError::EmptySummary));
    }

    #[test]
    fn validate_rejects_end_before_start() {
        let draft = EventDraft::new("Review", EventTime::DateTime(at(10, 0)))
            .with_end(EventTime::DateTime(at(9, 0)));
        let err = draft.validate().unwrap_err();
        assert!(matches!(err, DraftError::EndBeforeStart { .. }));
        assert!(err.to_string().contains("before its start"));
    }

    #[test]
    fn validate_accepts_zero_length() {
        let draft = EventDraft::new("Reminder", EventTime::DateTime(at(10, 0)))
            .with_end(EventTime::DateTime(at(10, 0)));
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn validate_rejects_mixed_kinds() {
        let draft = EventDraft::new("Odd", day(15)).with_end(EventTime::DateTime(at(10, 0)));
        assert_eq!(draft.validate(), Err(DraftError::MixedKinds));
    }

    #[test]
    fn blank_optional_fields_are_dropped() {
        let draft = EventDraft::new("Lunch", day(15))
            .with_location("  ")
            .with_description(" bring snacks ");
        assert_eq!(draft.location, None);
        assert_eq!(draft.description.as_deref(), Some("bring snacks"));
    }

    #[test]
    fn set_all_day_round_trip() {
        let mut draft = EventDraft::new("Offsite", EventTime::DateTime(at(14, 0)))
            .with_end(EventTime::DateTime(at(16, 0)));
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();

        draft.set_all_day(true, nine, &tz());
        assert!(draft.is_all_day());
        assert_eq!(draft.start, day(15));
        assert_eq!(draft.end, Some(day(15)));

        draft.set_all_day(false, nine, &tz());
        assert_eq!(draft.start, EventTime::DateTime(at(9, 0)));
        assert_eq!(draft.end, Some(EventTime::DateTime(at(9, 0))));
    }
}
