//! Core types: event drafts, the event composer, time parsing, tracing

pub mod composer;
pub mod draft;
pub mod time;
pub mod tracing;

pub use composer::{ComposerError, EventComposer, Field, Mode, PostOutcome};
pub use draft::{DEFAULT_DURATION_MINUTES, DraftError, EventDraft};
pub use time::{EventTime, TimeParseError, parse_event_time, round_up_to_quarter};
pub use tracing::{TracingConfig, TracingError, init_tracing};
