//! The seam between the event form and the calendar backend.

use std::future::Future;
use std::pin::Pin;

use calpost_core::EventDraft;

use crate::client::CreatedEvent;
use crate::error::{GoogleError, GoogleResult};

/// A boxed future for async trait methods.
///
/// Boxing keeps [`EventPublisher`] object-safe so callers can hold a
/// `&dyn EventPublisher`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can create calendar events.
///
/// Each call to [`publish`](EventPublisher::publish) or
/// [`quick_add`](EventPublisher::quick_add) sends exactly one create request.
pub trait EventPublisher: Send + Sync {
    /// Returns a display name for the target (e.g. `"google:default"`).
    fn name(&self) -> &str;

    /// Creates an event from a draft.
    fn publish(&self, draft: EventDraft) -> BoxFuture<'_, GoogleResult<CreatedEvent>>;

    /// Creates an event from free text.
    fn quick_add(&self, text: String) -> BoxFuture<'_, GoogleResult<CreatedEvent>>;
}

/// A publisher that always fails.
///
/// Stands in for the Google account when it could not be set up, so the
/// form still runs and reports the setup error on Post.
#[derive(Debug)]
pub struct ErrorPublisher {
    name: String,
    error: GoogleError,
}

impl ErrorPublisher {
    /// Creates a new error publisher.
    pub fn new(name: impl Into<String>, error: GoogleError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }

    fn error(&self) -> GoogleError {
        GoogleError::new(self.error.code(), self.error.message()).with_account(&self.name)
    }
}

impl EventPublisher for ErrorPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, _draft: EventDraft) -> BoxFuture<'_, GoogleResult<CreatedEvent>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn quick_add(&self, _text: String) -> BoxFuture<'_, GoogleResult<CreatedEvent>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GoogleErrorCode;
    use calpost_core::EventTime;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn error_publisher_always_fails() {
        let publisher = ErrorPublisher::new(
            "google:default",
            GoogleError::configuration("missing client_id"),
        );
        assert_eq!(publisher.name(), "google:default");

        let draft = EventDraft::new(
            "Lunch",
            EventTime::from_date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()),
        );
        let err = publisher.publish(draft).await.unwrap_err();
        assert_eq!(err.code(), GoogleErrorCode::ConfigurationError);
        assert_eq!(err.account(), Some("google:default"));
        assert_eq!(
            err.to_string(),
            "[google:default] configuration_error: missing client_id"
        );

        let err = publisher.quick_add("Lunch tomorrow".into()).await.unwrap_err();
        assert_eq!(err.message(), "missing client_id");
    }

    #[test]
    fn publisher_is_object_safe() {
        let publisher: Box<dyn EventPublisher> =
            Box::new(ErrorPublisher::new("broken", GoogleError::internal("boom")));
        assert_eq!(publisher.name(), "broken");
    }
}
