//! `calpost post`: build an event from flags or the interactive form and
//! create it.

use std::io::{self, Write};

use calpost_core::{
    EventComposer, EventDraft, EventTime, PostOutcome, parse_event_time, round_up_to_quarter,
};
use calpost_google::{CreatedEvent, EventPublisher};
use chrono::{DateTime, Local, NaiveTime, TimeZone};
use tracing::{debug, info};

use crate::cli::PostArgs;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::prompt;

/// Runs `calpost post`.
pub async fn run(args: PostArgs, config: &ClientConfig) -> ClientResult<()> {
    let mut config = config.clone();
    if let Some(calendar) = &args.calendar {
        config.google.get_or_insert_with(Default::default).calendar_id = Some(calendar.clone());
    }
    let account = super::open_account(&config)?;

    let created = if let Some(text) = &args.quick {
        info!("posting through quick add");
        account.quick_add(text).await?
    } else {
        let draft = draft_from_args(&args, Local::now())?;
        let mut composer = EventComposer::from_draft(draft, Local)
            .with_default_duration(config.default_duration());

        if args.interactive {
            let stdin = io::stdin();
            let stdout = io::stdout();
            match prompt::run(&mut composer, &account, stdin.lock(), stdout.lock()).await? {
                Some(created) => created,
                None => {
                    println!("Nothing posted.");
                    return Ok(());
                }
            }
        } else {
            post_once(&mut composer, &account).await?
        }
    };

    print_created(&created, args.json)?;

    if args.open {
        open_link(&created)?;
    }
    Ok(())
}

/// Presses Post once: sends exactly one create request for the form's
/// current values and records the outcome on the form.
pub async fn post_once<Tz: TimeZone>(
    composer: &mut EventComposer<Tz>,
    publisher: &dyn EventPublisher,
) -> ClientResult<CreatedEvent> {
    let draft = composer.begin_post()?;
    debug!(summary = %draft.summary, publisher = publisher.name(), "posting event");

    let result = publisher.publish(draft).await;
    composer.finish_post(outcome_of(&result));
    result.map_err(ClientError::from)
}

/// Converts a publish result into the form's outcome.
pub fn outcome_of(result: &Result<CreatedEvent, calpost_google::GoogleError>) -> PostOutcome {
    match result {
        Ok(event) => PostOutcome::Created {
            id: event.id.clone(),
            html_link: event.html_link.clone(),
        },
        Err(e) => PostOutcome::Failed(e.to_string()),
    }
}

/// Builds the initial draft from command-line flags.
///
/// Without `--start` the event starts at the next quarter hour. A
/// date-only start, or `--all-day`, makes an all-day event and a timed end
/// keeps only its date. A date-only end after a timed start is refused.
pub fn draft_from_args<Tz: TimeZone>(args: &PostArgs, now: DateTime<Tz>) -> ClientResult<EventDraft> {
    let tz = now.timezone();
    let start = match &args.start {
        Some(s) => parse_event_time(s, now.clone())?,
        None => EventTime::from_datetime(round_up_to_quarter(now.clone())),
    };
    let end = args
        .end
        .as_deref()
        .map(|s| parse_event_time(s, now.clone()))
        .transpose()?;

    let mut draft = EventDraft::new(args.title.clone().unwrap_or_default(), start);
    draft.end = end;
    if let Some(location) = &args.location {
        draft = draft.with_location(location.as_str());
    }
    if let Some(description) = &args.description {
        draft = draft.with_description(description.as_str());
    }

    let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN);
    if args.all_day {
        draft.set_all_day(true, nine, &tz);
    }
    if draft.is_all_day() {
        draft.end = draft.end.map(|e| e.to_all_day());
    } else if draft.end.is_some_and(|e| e.is_all_day()) {
        return Err(ClientError::Input(
            "--end is a date but --start has a time; give --end a time or use --all-day"
                .to_string(),
        ));
    }

    Ok(draft)
}

fn print_created(created: &CreatedEvent, json: bool) -> ClientResult<()> {
    if json {
        let out = serde_json::to_string_pretty(created)
            .map_err(|e| ClientError::Action(format!("failed to encode event: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    let mut stdout = io::stdout().lock();
    write_created(&mut stdout, created)?;
    Ok(())
}

fn write_created(out: &mut impl Write, created: &CreatedEvent) -> io::Result<()> {
    writeln!(
        out,
        "Event created: {}",
        created.summary.as_deref().unwrap_or("(untitled)")
    )?;
    writeln!(out, "  id:     {}", created.id)?;
    if let Some(status) = &created.status {
        writeln!(out, "  status: {}", status)?;
    }
    if let Some(link) = &created.html_link {
        writeln!(out, "  link:   {}", link)?;
    }
    Ok(())
}

fn open_link(created: &CreatedEvent) -> ClientResult<()> {
    let link = created
        .html_link
        .as_deref()
        .ok_or_else(|| ClientError::Action("the created event has no link".to_string()))?;
    open::that(link).map_err(|e| ClientError::Action(format!("failed to open {}: {}", link, e)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use calpost_core::ComposerError;
    use calpost_google::{BoxFuture, GoogleError, GoogleResult};
    use chrono::{FixedOffset, NaiveDate};
    use std::sync::Mutex;

    /// Records every request instead of sending it.
    #[derive(Default)]
    pub(crate) struct RecordingPublisher {
        pub(crate) drafts: Mutex<Vec<EventDraft>>,
        pub(crate) fail: bool,
    }

    impl RecordingPublisher {
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub(crate) fn count(&self) -> usize {
            self.drafts.lock().unwrap().len()
        }

        pub(crate) fn last(&self) -> EventDraft {
            self.drafts.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl EventPublisher for RecordingPublisher {
        fn name(&self) -> &str {
            "recording"
        }

        fn publish(&self, draft: EventDraft) -> BoxFuture<'_, GoogleResult<CreatedEvent>> {
            let summary = draft.summary.clone();
            self.drafts.lock().unwrap().push(draft);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    return Err(GoogleError::server("API error (503): backend unavailable"));
                }
                Ok(CreatedEvent {
                    id: "evt1".to_string(),
                    html_link: Some("https://calendar.google.com/event?eid=evt1".to_string()),
                    status: Some("confirmed".to_string()),
                    summary: Some(summary),
                })
            })
        }

        fn quick_add(&self, _text: String) -> BoxFuture<'_, GoogleResult<CreatedEvent>> {
            Box::pin(async { Err(GoogleError::internal("not used")) })
        }
    }

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    fn now() -> DateTime<FixedOffset> {
        tz().with_ymd_and_hms(2024, 3, 15, 8, 7, 30).unwrap()
    }

    fn args(title: &str) -> PostArgs {
        PostArgs {
            title: Some(title.to_string()),
            ..PostArgs::default()
        }
    }

    #[test]
    fn defaults_to_next_quarter_hour() {
        let draft = draft_from_args(&args("Standup"), now()).unwrap();
        assert_eq!(
            draft.start,
            EventTime::from_datetime(tz().with_ymd_and_hms(2024, 3, 15, 8, 15, 0).unwrap())
        );
        assert_eq!(draft.end, None);
        assert!(!draft.is_all_day());
    }

    #[test]
    fn all_day_flag_converts_start_and_end() {
        let args = PostArgs {
            start: Some("2024-03-20 10:00".to_string()),
            end: Some("2024-03-21 10:00".to_string()),
            all_day: true,
            ..args("Offsite")
        };
        let draft = draft_from_args(&args, now()).unwrap();
        let day = |d| EventTime::from_date(NaiveDate::from_ymd_opt(2024, 3, d).unwrap());
        assert_eq!(draft.start, day(20));
        assert_eq!(draft.end, Some(day(21)));
    }

    #[test]
    fn date_only_start_is_all_day() {
        let args = PostArgs {
            start: Some("2024-03-20".to_string()),
            ..args("Holiday")
        };
        let draft = draft_from_args(&args, now()).unwrap();
        assert!(draft.is_all_day());
    }

    #[test]
    fn date_only_start_truncates_timed_end() {
        let args = PostArgs {
            start: Some("2024-03-20".to_string()),
            end: Some("2024-03-22 18:00".to_string()),
            ..args("Conference")
        };
        let draft = draft_from_args(&args, now()).unwrap();
        let day = |d| EventTime::from_date(NaiveDate::from_ymd_opt(2024, 3, d).unwrap());
        assert_eq!(draft.start, day(20));
        assert_eq!(draft.end, Some(day(22)));
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn date_only_end_after_timed_start_is_refused() {
        let args = PostArgs {
            start: Some("2024-03-20 10:00".to_string()),
            end: Some("2024-03-21".to_string()),
            ..args("Conference")
        };
        let err = draft_from_args(&args, now()).unwrap_err();
        assert!(matches!(err, ClientError::Input(_)));
        assert!(err.to_string().contains("--end is a date"));
    }

    #[test]
    fn bad_start_is_input_error() {
        let args = PostArgs {
            start: Some("next tuesday".to_string()),
            ..args("Lunch")
        };
        let err = draft_from_args(&args, now()).unwrap_err();
        assert!(matches!(err, ClientError::Input(_)));
        assert!(err.to_string().contains("next tuesday"));
    }

    #[tokio::test]
    async fn one_press_sends_one_request_with_current_values() {
        let publisher = RecordingPublisher::default();
        let cli_args = PostArgs {
            start: Some("2024-03-15 10:00".to_string()),
            location: Some("Room 4".to_string()),
            ..args("Team sync")
        };
        let draft = draft_from_args(&cli_args, now()).unwrap();
        let mut composer = EventComposer::from_draft(draft, tz());

        let created = post_once(&mut composer, &publisher).await.unwrap();

        assert_eq!(publisher.count(), 1);
        assert_eq!(created.id, "evt1");
        let sent = publisher.last();
        assert_eq!(sent.summary, "Team sync");
        assert_eq!(sent.location.as_deref(), Some("Room 4"));
        assert_eq!(
            sent.end,
            Some(EventTime::from_datetime(
                tz().with_ymd_and_hms(2024, 3, 15, 11, 0, 0).unwrap()
            ))
        );
        assert!(!composer.is_post_in_flight());
        assert!(matches!(
            composer.last_outcome(),
            Some(PostOutcome::Created { id, .. }) if id == "evt1"
        ));
    }

    #[tokio::test]
    async fn invalid_form_sends_nothing() {
        let publisher = RecordingPublisher::default();
        let draft = draft_from_args(&args("  "), now()).unwrap();
        let mut composer = EventComposer::from_draft(draft, tz());

        let err = post_once(&mut composer, &publisher).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Composer(ComposerError::Invalid(_))
        ));
        assert_eq!(publisher.count(), 0);
        assert!(!composer.is_post_in_flight());
    }

    #[tokio::test]
    async fn failed_post_is_recorded_and_can_be_retried() {
        let publisher = RecordingPublisher::failing();
        let draft = draft_from_args(&args("Retro"), now()).unwrap();
        let mut composer = EventComposer::from_draft(draft, tz());

        assert!(post_once(&mut composer, &publisher).await.is_err());
        assert!(matches!(
            composer.last_outcome(),
            Some(PostOutcome::Failed(msg)) if msg.contains("503")
        ));
        assert!(!composer.is_post_in_flight());

        assert!(post_once(&mut composer, &publisher).await.is_err());
        assert_eq!(publisher.count(), 2);
    }

    #[test]
    fn created_event_text_output() {
        let created = CreatedEvent {
            id: "abc123".to_string(),
            html_link: Some("https://www.google.com/calendar/event?eid=YWJj".to_string()),
            status: Some("confirmed".to_string()),
            summary: Some("Team sync".to_string()),
        };
        let mut out = Vec::new();
        write_created(&mut out, &created).unwrap();
        insta::assert_snapshot!(String::from_utf8(out).unwrap(), @r"
        Event created: Team sync
          id:     abc123
          status: confirmed
          link:   https://www.google.com/calendar/event?eid=YWJj
        ");
    }
}
