//! Google Calendar API client.
//!
//! Thin wrapper over the three Calendar v3 endpoints calpost needs:
//! `events.insert`, `events.quickAdd` and `calendarList.list`.

use std::time::Duration;

use calpost_core::{EventDraft, EventTime};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GoogleError, GoogleResult};

/// Base URL for Google Calendar API v3.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Settings applied when turning a draft into a request body.
#[derive(Debug, Clone)]
pub struct InsertOptions {
    /// IANA time zone sent alongside timed start and end values.
    pub time_zone: Option<String>,
    /// Length of a timed event whose draft has no end.
    pub default_duration: chrono::Duration,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            time_zone: None,
            default_duration: chrono::Duration::minutes(calpost_core::DEFAULT_DURATION_MINUTES),
        }
    }
}

/// The event Google created.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    /// Event identifier.
    pub id: String,
    /// Link to the event in the Google Calendar web UI.
    #[serde(default)]
    pub html_link: Option<String>,
    /// Event status, normally "confirmed".
    #[serde(default)]
    pub status: Option<String>,
    /// Title as stored by Google (Quick Add derives it from the text).
    #[serde(default)]
    pub summary: Option<String>,
}

/// Calendar list entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    /// Calendar ID.
    pub id: String,
    /// Calendar display name.
    #[serde(default)]
    pub summary: String,
    /// Whether this is the user's primary calendar.
    #[serde(default)]
    pub primary: bool,
    /// The user's access role ("owner", "writer", "reader"...).
    #[serde(default)]
    pub access_role: Option<String>,
    /// Calendar time zone.
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl CalendarListEntry {
    /// Returns true if events can be created in this calendar.
    pub fn is_writable(&self) -> bool {
        matches!(self.access_role.as_deref(), Some("owner") | Some("writer"))
    }
}

#[derive(Debug, Deserialize)]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
}

/// Request body for `events.insert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEvent {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    start: ApiEventTime,
    end: ApiEventTime,
}

impl NewEvent {
    /// Builds the request body from a draft.
    ///
    /// The draft is expected to be valid; a missing end is filled in with
    /// [`EventDraft::resolved_end`].
    pub fn from_draft(draft: &EventDraft, options: &InsertOptions) -> Self {
        let end = draft.resolved_end(options.default_duration);
        Self {
            summary: draft.summary.trim().to_string(),
            location: draft.location.clone(),
            description: draft.description.clone(),
            start: ApiEventTime::new(&draft.start, options.time_zone.as_deref()),
            end: ApiEventTime::new(&end, options.time_zone.as_deref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

impl ApiEventTime {
    fn new(time: &EventTime, time_zone: Option<&str>) -> Self {
        match time {
            EventTime::DateTime(dt) => Self {
                date_time: Some(dt.to_rfc3339()),
                date: None,
                time_zone: time_zone.map(str::to_string),
            },
            // Google rejects timeZone on date-only values of a new event.
            EventTime::AllDay(date) => Self {
                date_time: None,
                date: Some(date.format("%Y-%m-%d").to_string()),
                time_zone: None,
            },
        }
    }
}

/// Google Calendar API client.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    access_token: String,
}

impl GoogleCalendarClient {
    /// Creates a new client with the given access token.
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> GoogleResult<Self> {
        Self::with_user_agent(access_token, timeout, None)
    }

    /// Creates a new client that sends a custom User-Agent header.
    pub fn with_user_agent(
        access_token: impl Into<String>,
        timeout: Duration,
        user_agent: Option<&str>,
    ) -> GoogleResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent);
        }
        let http_client = builder
            .build()
            .map_err(|e| GoogleError::internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            access_token: access_token.into(),
        })
    }

    /// Updates the access token (after refresh).
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
    }

    /// Creates an event from a draft.
    pub async fn insert_event(
        &self,
        calendar_id: &str,
        draft: &EventDraft,
        options: &InsertOptions,
    ) -> GoogleResult<CreatedEvent> {
        let url = format!("{}/events", calendar_url(calendar_id));
        let body = serde_json::to_string(&NewEvent::from_draft(draft, options))
            .map_err(|e| GoogleError::internal(format!("failed to encode event: {}", e)))?;

        debug!(calendar = calendar_id, "inserting event");
        let request = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        let event: CreatedEvent = parse_json(send(request).await?)?;
        debug!(id = %event.id, "event created");
        Ok(event)
    }

    /// Creates an event from free text, letting Google parse the date.
    pub async fn quick_add(&self, calendar_id: &str, text: &str) -> GoogleResult<CreatedEvent> {
        if text.trim().is_empty() {
            return Err(GoogleError::bad_request("quick add text must not be empty"));
        }

        let url = format!("{}/events/quickAdd", calendar_url(calendar_id));
        debug!(calendar = calendar_id, "quick-adding event");
        let request = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .query(&[("text", text)]);

        parse_json(send(request).await?)
    }

    /// Lists the calendars on the user's calendar list.
    pub async fn list_calendars(&self) -> GoogleResult<Vec<CalendarListEntry>> {
        let url = format!("{}/users/me/calendarList", CALENDAR_API_BASE);
        let request = self.http_client.get(&url).bearer_auth(&self.access_token);

        let list: CalendarListResponse = parse_json(send(request).await?)?;
        debug!("fetched {} calendars", list.items.len());
        Ok(list.items)
    }
}

fn calendar_url(calendar_id: &str) -> String {
    format!(
        "{}/calendars/{}",
        CALENDAR_API_BASE,
        urlencoding::encode(calendar_id)
    )
}

/// Sends a request and returns the body of a successful response.
async fn send(request: reqwest::RequestBuilder) -> GoogleResult<String> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            GoogleError::network("request timeout")
        } else if e.is_connect() {
            GoogleError::network(format!("connection failed: {}", e))
        } else {
            GoogleError::network(format!("request failed: {}", e))
        }
    })?;

    let status = response.status();
    let retry_after = retry_after_secs(response.headers());
    let body = response
        .text()
        .await
        .map_err(|e| GoogleError::network(format!("failed to read response: {}", e)))?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(status_error(status, retry_after, &body))
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(body: String) -> GoogleResult<T> {
    serde_json::from_str(&body)
        .map_err(|e| GoogleError::invalid_response(format!("failed to parse response: {}", e)))
}

fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

/// Maps a non-success Calendar API response to an error.
pub(crate) fn status_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> GoogleError {
    let detail = api_error_message(body);
    match status {
        StatusCode::UNAUTHORIZED => GoogleError::authentication("access token expired or invalid"),
        StatusCode::FORBIDDEN => GoogleError::authorization(format!(
            "access denied to calendar{}",
            detail.map(|d| format!(": {}", d)).unwrap_or_default()
        )),
        StatusCode::NOT_FOUND => GoogleError::not_found("calendar not found"),
        StatusCode::BAD_REQUEST => GoogleError::bad_request(format!(
            "event rejected: {}",
            detail.unwrap_or_else(|| body.trim().to_string())
        )),
        StatusCode::TOO_MANY_REQUESTS => GoogleError::rate_limited(format!(
            "rate limit exceeded{}",
            retry_after
                .map(|s| format!(", retry after {} seconds", s))
                .unwrap_or_default()
        )),
        _ => GoogleError::server(format!(
            "API error ({}): {}",
            status,
            detail.unwrap_or_else(|| body.trim().to_string())
        )),
    }
}

/// Extracts `error.message` from a Google API error body.
fn api_error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }
    #[derive(Deserialize)]
    struct Detail {
        message: String,
    }

    serde_json::from_str::<Envelope>(body)
        .ok()
        .map(|e| e.error.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GoogleErrorCode;
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    fn paris() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    fn timed_draft() -> EventDraft {
        let start = paris().with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        EventDraft::new("Team sync", EventTime::from_datetime(start))
            .with_location("Room 4")
            .with_description("Weekly catch-up")
    }

    #[test]
    fn timed_event_body() {
        let options = InsertOptions {
            time_zone: Some("Europe/Paris".to_string()),
            ..InsertOptions::default()
        };
        let body = NewEvent::from_draft(&timed_draft(), &options);

        insta::assert_json_snapshot!(body, @r#"
        {
          "summary": "Team sync",
          "location": "Room 4",
          "description": "Weekly catch-up",
          "start": {
            "dateTime": "2024-03-15T10:00:00+01:00",
            "timeZone": "Europe/Paris"
          },
          "end": {
            "dateTime": "2024-03-15T11:00:00+01:00",
            "timeZone": "Europe/Paris"
          }
        }
        "#);
    }

    #[test]
    fn all_day_event_body() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let draft = EventDraft::new("Offsite", EventTime::from_date(date));
        let options = InsertOptions {
            time_zone: Some("Europe/Paris".to_string()),
            ..InsertOptions::default()
        };
        let body = NewEvent::from_draft(&draft, &options);

        insta::assert_json_snapshot!(body, @r#"
        {
          "summary": "Offsite",
          "start": {
            "date": "2024-03-15"
          },
          "end": {
            "date": "2024-03-16"
          }
        }
        "#);
    }

    #[test]
    fn explicit_end_and_no_time_zone() {
        let start = paris().with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let end = paris().with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        let draft = EventDraft::new("  Standup ", EventTime::from_datetime(start))
            .with_end(EventTime::from_datetime(end));

        let json = serde_json::to_value(NewEvent::from_draft(&draft, &InsertOptions::default()))
            .unwrap();
        assert_eq!(json["summary"], "Standup");
        assert_eq!(json["end"]["dateTime"], "2024-03-15T10:30:00+01:00");
        assert!(json["end"].get("timeZone").is_none());
        assert!(json.get("location").is_none());
    }

    #[test]
    fn parse_created_event() {
        let json = r#"{
            "kind": "calendar#event",
            "id": "abc123",
            "status": "confirmed",
            "htmlLink": "https://www.google.com/calendar/event?eid=YWJjMTIz",
            "summary": "Team sync",
            "start": {"dateTime": "2024-03-15T10:00:00+01:00"}
        }"#;
        let event: CreatedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.id, "abc123");
        assert_eq!(event.status.as_deref(), Some("confirmed"));
        assert_eq!(
            event.html_link.as_deref(),
            Some("https://www.google.com/calendar/event?eid=YWJjMTIz")
        );
    }

    #[test]
    fn parse_calendar_list() {
        let json = r#"{
            "items": [
                {"id": "primary@gmail.com", "summary": "Personal", "primary": true, "accessRole": "owner"},
                {"id": "en.usa#holiday@group.v.calendar.google.com", "summary": "Holidays", "accessRole": "reader"}
            ]
        }"#;
        let list: CalendarListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(list.items.len(), 2);
        assert!(list.items[0].primary);
        assert!(list.items[0].is_writable());
        assert!(!list.items[1].primary);
        assert!(!list.items[1].is_writable());
    }

    #[test]
    fn calendar_id_is_encoded() {
        assert_eq!(
            calendar_url("team@group.calendar.google.com"),
            "https://www.googleapis.com/calendar/v3/calendars/team%40group.calendar.google.com"
        );
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (StatusCode::UNAUTHORIZED, GoogleErrorCode::AuthenticationFailed),
            (StatusCode::FORBIDDEN, GoogleErrorCode::AuthorizationFailed),
            (StatusCode::NOT_FOUND, GoogleErrorCode::NotFound),
            (StatusCode::BAD_REQUEST, GoogleErrorCode::BadRequest),
            (StatusCode::TOO_MANY_REQUESTS, GoogleErrorCode::RateLimited),
            (StatusCode::INTERNAL_SERVER_ERROR, GoogleErrorCode::ServerError),
            (StatusCode::CONFLICT, GoogleErrorCode::ServerError),
        ];
        for (status, code) in cases {
            assert_eq!(status_error(status, None, "").code(), code, "{}", status);
        }
    }

    #[test]
    fn rate_limit_mentions_retry_after() {
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, Some(30), "");
        assert!(err.message().contains("retry after 30 seconds"));
    }

    #[test]
    fn bad_request_uses_api_message() {
        let body = r#"{"error":{"code":400,"message":"The specified time range is empty.","errors":[]}}"#;
        let err = status_error(StatusCode::BAD_REQUEST, None, body);
        assert_eq!(err.message(), "event rejected: The specified time range is empty.");
    }
}
