//! Event composer: the editing form behind `calpost post --interactive`.
//!
//! The composer is a headless model of a single-screen form. It shows one row
//! per draft field, edits text rows inline, edits date rows through one
//! shared date picker and guards the Post action so that one press results in
//! exactly one create request.
//!
//! ```text
//!            select(text row)              select(date row) / toggle
//!   ┌──────┐ ────────────────▶ EditingText   ┌──────┐ ───────────────▶ PickingDate
//!   │ Idle │ ◀──────────────── accept/cancel │ Idle │ ◀─────────────── accept/cancel
//!   └──────┘                                 └──────┘
//!      │ begin_post ──▶ post in flight ──▶ finish_post ──▶ Idle
//! ```

use std::fmt;

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
use thiserror::Error;
use tracing::debug;

use crate::draft::{DEFAULT_DURATION_MINUTES, DraftError, EventDraft, non_blank};
use crate::time::{EventTime, round_up_to_quarter};

/// One row of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Event title.
    Summary,
    /// Event location.
    Location,
    /// Event notes.
    Description,
    /// Start date/time.
    Start,
    /// End date/time.
    End,
    /// All-day switch.
    AllDay,
}

impl Field {
    /// All rows in display order.
    pub const ALL: [Field; 6] = [
        Field::Summary,
        Field::Location,
        Field::Description,
        Field::Start,
        Field::End,
        Field::AllDay,
    ];

    /// Returns the row label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Summary => "Title",
            Self::Location => "Location",
            Self::Description => "Description",
            Self::Start => "Starts",
            Self::End => "Ends",
            Self::AllDay => "All-day",
        }
    }

    /// Returns true for rows edited through the date picker.
    pub fn is_date(&self) -> bool {
        matches!(self, Self::Start | Self::End)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the form is currently doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Nothing is being edited.
    Idle,
    /// A text row is being edited.
    EditingText {
        /// The row being edited.
        field: Field,
        /// Uncommitted text.
        buffer: String,
    },
    /// The date picker is shown for a date row.
    PickingDate {
        /// The row being edited.
        field: Field,
        /// The value currently under the picker.
        value: EventTime,
        /// Whether the picker shows dates only.
        date_only: bool,
    },
}

/// Result of the last post, for the result display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// The event was created.
    Created {
        /// Provider event id.
        id: String,
        /// Link to the event in the calendar UI.
        html_link: Option<String>,
    },
    /// The request failed.
    Failed(String),
}

/// Errors returned by composer actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposerError {
    /// Post pressed while a previous post has not finished.
    #[error("a post request is already in flight")]
    PostInFlight,
    /// Post pressed while a row is still being edited.
    #[error("finish editing '{0}' before posting")]
    EditInProgress(Field),
    /// The picked end is before the start.
    #[error("end ({end}) cannot be before start ({start})")]
    EndBeforeStart {
        /// Formatted start.
        start: String,
        /// Formatted end.
        end: String,
    },
    /// The draft failed validation.
    #[error(transparent)]
    Invalid(#[from] DraftError),
}

/// Headless event form.
#[derive(Debug, Clone)]
pub struct EventComposer<Tz: TimeZone = Local> {
    draft: EventDraft,
    mode: Mode,
    post_in_flight: bool,
    last_outcome: Option<PostOutcome>,
    default_duration: Duration,
    all_day_time: NaiveTime,
    tz: Tz,
    fixed_now: Option<DateTime<Utc>>,
}

impl EventComposer<Local> {
    /// Creates an empty form in the local timezone.
    pub fn new() -> Self {
        Self::with_timezone(Local)
    }
}

impl Default for EventComposer<Local> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Tz: TimeZone> EventComposer<Tz> {
    /// Creates an empty form whose start is the next quarter hour in `tz`.
    pub fn with_timezone(tz: Tz) -> Self {
        let start = EventTime::from_datetime(round_up_to_quarter(Utc::now().with_timezone(&tz)));
        Self::from_draft(EventDraft::new("", start), tz)
    }

    /// Creates a form pre-filled with `draft`.
    pub fn from_draft(draft: EventDraft, tz: Tz) -> Self {
        Self {
            draft,
            mode: Mode::Idle,
            post_in_flight: false,
            last_outcome: None,
            default_duration: Duration::minutes(DEFAULT_DURATION_MINUTES),
            all_day_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            tz,
            fixed_now: None,
        }
    }

    /// Sets the length used when the end is left empty.
    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration = duration;
        self
    }

    /// Pins the clock used to seed the start of an untouched form.
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.fixed_now = Some(now);
        if self.draft.summary.is_empty() && self.draft.end.is_none() {
            let seeded = EventTime::from_datetime(round_up_to_quarter(self.now()));
            self.draft.start = if self.draft.is_all_day() {
                seeded.to_all_day()
            } else {
                seeded
            };
        }
        self
    }

    /// Returns the draft as currently committed.
    pub fn draft(&self) -> &EventDraft {
        &self.draft
    }

    /// Returns the current mode.
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Returns true while the date picker is shown.
    pub fn is_date_picker_visible(&self) -> bool {
        matches!(self.mode, Mode::PickingDate { .. })
    }

    /// Returns true between `begin_post` and `finish_post`.
    pub fn is_post_in_flight(&self) -> bool {
        self.post_in_flight
    }

    /// Returns the result of the last finished post.
    pub fn last_outcome(&self) -> Option<&PostOutcome> {
        self.last_outcome.as_ref()
    }

    /// Returns every row with its display value.
    pub fn rows(&self) -> Vec<(Field, String)> {
        Field::ALL
            .iter()
            .map(|field| (*field, self.display_value(*field)))
            .collect()
    }

    fn display_value(&self, field: Field) -> String {
        match field {
            Field::Summary if self.draft.summary.is_empty() => "(untitled)".to_string(),
            Field::Summary => self.draft.summary.clone(),
            Field::Location => self.draft.location.clone().unwrap_or_else(|| "(none)".to_string()),
            Field::Description => self
                .draft
                .description
                .clone()
                .unwrap_or_else(|| "(none)".to_string()),
            Field::Start => self.draft.start.to_string(),
            Field::End => match self.draft.end {
                Some(end) => end.to_string(),
                None => format!("{} (default)", self.draft.resolved_end(self.default_duration)),
            },
            Field::AllDay => if self.draft.is_all_day() { "yes" } else { "no" }.to_string(),
        }
    }

    /// Returns the composer's notion of "now" in its timezone.
    pub fn now(&self) -> DateTime<Tz> {
        self.fixed_now
            .unwrap_or_else(Utc::now)
            .with_timezone(&self.tz)
    }

    /// Selects a row.
    ///
    /// Any open edit is discarded first. Text rows start inline editing,
    /// date rows show the date picker and the all-day row flips immediately.
    pub fn select(&mut self, field: Field) {
        if self.mode != Mode::Idle {
            debug!(?field, "discarding open edit on row change");
        }
        self.mode = Mode::Idle;

        match field {
            Field::Summary | Field::Location | Field::Description => {
                let buffer = match field {
                    Field::Summary => self.draft.summary.clone(),
                    Field::Location => self.draft.location.clone().unwrap_or_default(),
                    _ => self.draft.description.clone().unwrap_or_default(),
                };
                self.mode = Mode::EditingText { field, buffer };
            }
            Field::Start | Field::End => self.show_picker(field),
            Field::AllDay => {
                let all_day = !self.draft.is_all_day();
                self.draft.set_all_day(all_day, self.all_day_time, &self.tz);
            }
        }
    }

    fn show_picker(&mut self, field: Field) {
        let current = match field {
            Field::End => self.draft.end.unwrap_or_else(|| self.draft.resolved_end(self.default_duration)),
            _ => self.draft.start,
        };
        self.mode = Mode::PickingDate {
            field,
            value: current,
            date_only: self.draft.is_all_day(),
        };
    }

    /// Replaces the text being edited.
    pub fn edit_text(&mut self, text: impl Into<String>) {
        if let Mode::EditingText { buffer, .. } = &mut self.mode {
            *buffer = text.into();
        }
    }

    /// Commits the text being edited.
    pub fn accept_editing(&mut self) {
        if let Mode::EditingText { field, buffer } = std::mem::replace(&mut self.mode, Mode::Idle) {
            match field {
                Field::Summary => self.draft.summary = buffer.trim().to_string(),
                Field::Location => self.draft.location = non_blank(buffer),
                Field::Description => self.draft.description = non_blank(buffer),
                _ => {}
            }
        }
    }

    /// Drops the text being edited.
    pub fn cancel_editing(&mut self) {
        if matches!(self.mode, Mode::EditingText { .. }) {
            self.mode = Mode::Idle;
        }
    }

    /// Moves the picker to `value`.
    ///
    /// The value is coerced to the picker's current mode.
    pub fn set_picker_value(&mut self, value: EventTime) {
        let all_day_time = self.all_day_time;
        let tz = self.tz.clone();
        if let Mode::PickingDate { value: current, date_only, .. } = &mut self.mode {
            *current = if *date_only {
                value.to_all_day()
            } else {
                value.to_timed(all_day_time, &tz)
            };
        }
    }

    /// Switches the picker between date-and-time and date-only.
    ///
    /// When no picker is shown, opens it on the start row.
    pub fn toggle_date_picker(&mut self) {
        let all_day_time = self.all_day_time;
        let tz = self.tz.clone();
        if let Mode::PickingDate { value, date_only, .. } = &mut self.mode {
            *date_only = !*date_only;
            *value = if *date_only {
                value.to_all_day()
            } else {
                value.to_timed(all_day_time, &tz)
            };
            return;
        }
        self.select(Field::Start);
    }

    /// Commits the picked value.
    ///
    /// A start moved past the end drags the end along, keeping the duration.
    /// An end before the start is rejected and the picker stays open.
    pub fn accept_selected_date(&mut self) -> Result<(), ComposerError> {
        let Mode::PickingDate { field, value, date_only } = self.mode.clone() else {
            return Ok(());
        };

        // Work on a copy so a rejected value leaves the draft untouched.
        let mut draft = self.draft.clone();
        if date_only != draft.is_all_day() {
            draft.set_all_day(date_only, self.all_day_time, &self.tz);
        }

        match field {
            Field::Start => {
                let old_start = draft.start;
                draft.start = value;
                if let Some(end) = draft.end
                    && end < value
                {
                    let length = end.duration_since(&old_start).max(Duration::zero());
                    draft.end = Some(value.shifted(length));
                }
            }
            _ => {
                if value < draft.start {
                    return Err(ComposerError::EndBeforeStart {
                        start: draft.start.to_string(),
                        end: value.to_string(),
                    });
                }
                draft.end = Some(value);
            }
        }

        self.draft = draft;
        self.mode = Mode::Idle;
        Ok(())
    }

    /// Hides the picker without changing the draft.
    pub fn cancel_picking_date(&mut self) {
        if self.is_date_picker_visible() {
            self.mode = Mode::Idle;
        }
    }

    /// Starts a post.
    ///
    /// Returns the draft to send, with its end resolved. Until
    /// [`finish_post`](Self::finish_post) is called further presses are
    /// refused, so each press sends at most one request.
    pub fn begin_post(&mut self) -> Result<EventDraft, ComposerError> {
        if self.post_in_flight {
            return Err(ComposerError::PostInFlight);
        }
        match &self.mode {
            Mode::Idle => {}
            Mode::EditingText { field, .. } | Mode::PickingDate { field, .. } => {
                return Err(ComposerError::EditInProgress(*field));
            }
        }

        let end = self.draft.resolved_end(self.default_duration);
        let outgoing = self.draft.clone().with_end(end);
        outgoing.validate()?;

        self.post_in_flight = true;
        Ok(outgoing)
    }

    /// Records the result of the post started by `begin_post`.
    pub fn finish_post(&mut self, outcome: PostOutcome) {
        self.post_in_flight = false;
        self.last_outcome = Some(outcome);
    }
}
