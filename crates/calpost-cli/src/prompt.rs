//! Line-oriented driver for the event form (`calpost post --interactive`).
//!
//! Each input line is one action:
//!
//! | input        | action                                         |
//! |--------------|------------------------------------------------|
//! | `1`..`6`     | select a row                                   |
//! | `a` / `c`    | accept / cancel the open edit or date picker   |
//! | `t`          | switch the picker between date+time and date   |
//! | `p`          | post                                           |
//! | `q`          | quit without posting                           |
//! | `?`          | help                                           |
//!
//! Any other line is text for the open edit, or a time for the open date
//! picker. Prefix a line with `\` to send it as text verbatim (`\a`, `\2`).

use std::io::{BufRead, Write};

use calpost_core::{EventComposer, Field, Mode, parse_event_time};
use calpost_google::{CreatedEvent, EventPublisher};
use chrono::TimeZone;
use tracing::debug;

use crate::commands::post::post_once;
use crate::error::{ClientError, ClientResult};

const HELP: &str = "\
  1-6  select a row        a  accept       c  cancel
  t    toggle date-only    p  post         q  quit
  other lines are text for the open row (prefix with \\ to type a, c, t, p, q or a number)";

/// One parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Select(Field),
    Accept,
    Cancel,
    Toggle,
    Post,
    Quit,
    Help,
    Empty,
    Text(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    if let Some(text) = line.strip_prefix('\\') {
        return Input::Text(text);
    }
    match line.trim() {
        "" => Input::Empty,
        "a" => Input::Accept,
        "c" => Input::Cancel,
        "t" => Input::Toggle,
        "p" => Input::Post,
        "q" => Input::Quit,
        "?" | "h" => Input::Help,
        other => match other.parse::<usize>() {
            Ok(n) if (1..=Field::ALL.len()).contains(&n) => Input::Select(Field::ALL[n - 1]),
            _ => Input::Text(line),
        },
    }
}

/// Runs the form until the event is posted or the user quits.
///
/// Returns the created event, or `None` when the user quit or input ended.
/// A failed post is reported and the form stays open for another try.
pub async fn run<Tz, R, W>(
    composer: &mut EventComposer<Tz>,
    publisher: &dyn EventPublisher,
    mut input: R,
    mut output: W,
) -> ClientResult<Option<CreatedEvent>>
where
    Tz: TimeZone,
    R: BufRead,
    W: Write,
{
    render(composer, &mut output)?;

    let mut line = String::new();
    loop {
        write!(output, "{}", prompt_for(composer.mode()))?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(None);
        }
        let line = line.trim_end_matches(['\r', '\n']);
        let action = parse_input(line);
        debug!(?action, "prompt input");

        match action {
            Input::Quit => return Ok(None),
            Input::Help => writeln!(output, "{}", HELP)?,
            Input::Empty => {}
            Input::Select(field) => composer.select(field),
            Input::Accept => match composer.mode() {
                Mode::EditingText { .. } => composer.accept_editing(),
                Mode::PickingDate { .. } => {
                    if let Err(e) = composer.accept_selected_date() {
                        writeln!(output, "! {}", e)?;
                        continue;
                    }
                }
                Mode::Idle => writeln!(output, "nothing to accept")?,
            },
            Input::Cancel => {
                composer.cancel_editing();
                composer.cancel_picking_date();
            }
            Input::Toggle => composer.toggle_date_picker(),
            Input::Text(text) => match composer.mode() {
                Mode::EditingText { .. } => composer.edit_text(text),
                Mode::PickingDate { .. } => match parse_event_time(text, composer.now()) {
                    Ok(value) => composer.set_picker_value(value),
                    Err(e) => {
                        writeln!(output, "! {}", e)?;
                        continue;
                    }
                },
                Mode::Idle => {
                    writeln!(output, "unknown command '{}', type ? for help", text.trim())?;
                    continue;
                }
            },
            Input::Post => {
                writeln!(output, "posting...")?;
                match post_once(composer, publisher).await {
                    Ok(created) => {
                        writeln!(output, "posted: {}", created.id)?;
                        return Ok(Some(created));
                    }
                    Err(ClientError::Composer(e)) => writeln!(output, "! {}", e)?,
                    Err(e) => writeln!(output, "! post failed: {}", e)?,
                }
                continue;
            }
        }

        render(composer, &mut output)?;
    }
}

fn prompt_for(mode: &Mode) -> String {
    match mode {
        Mode::Idle => "> ".to_string(),
        Mode::EditingText { field, .. } => format!("{}> ", field),
        Mode::PickingDate { field, date_only: true, .. } => format!("{} (date)> ", field),
        Mode::PickingDate { field, .. } => format!("{} (date and time)> ", field),
    }
}

fn render<Tz: TimeZone, W: Write>(composer: &EventComposer<Tz>, out: &mut W) -> std::io::Result<()> {
    for (i, (field, value)) in composer.rows().iter().enumerate() {
        writeln!(out, "{:>2}. {:<12} {}", i + 1, field.label(), value)?;
    }
    match composer.mode() {
        Mode::Idle => {}
        Mode::EditingText { field, buffer } => {
            writeln!(out, "editing {}: {}", field, buffer)?;
        }
        Mode::PickingDate { field, value, .. } => {
            writeln!(out, "picking {}: {}", field, value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::post::tests::RecordingPublisher;
    use calpost_core::{EventDraft, EventTime, PostOutcome};
    use chrono::{FixedOffset, NaiveDate, Utc};
    use std::io::Cursor;

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    fn composer() -> EventComposer<FixedOffset> {
        let now = tz().with_ymd_and_hms(2024, 3, 15, 8, 7, 0).unwrap();
        EventComposer::with_timezone(tz()).with_clock(now.with_timezone(&Utc))
    }

    async fn drive(
        composer: &mut EventComposer<FixedOffset>,
        publisher: &RecordingPublisher,
        script: &str,
    ) -> (Option<CreatedEvent>, String) {
        let mut out = Vec::new();
        let result = run(composer, publisher, Cursor::new(script.as_bytes()), &mut out)
            .await
            .unwrap();
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn input_parsing() {
        assert_eq!(parse_input("1"), Input::Select(Field::Summary));
        assert_eq!(parse_input(" 6 "), Input::Select(Field::AllDay));
        assert_eq!(parse_input("7"), Input::Text("7"));
        assert_eq!(parse_input("a"), Input::Accept);
        assert_eq!(parse_input("p"), Input::Post);
        assert_eq!(parse_input(""), Input::Empty);
        assert_eq!(parse_input("\\a"), Input::Text("a"));
        assert_eq!(parse_input("Team sync"), Input::Text("Team sync"));
    }

    #[tokio::test]
    async fn edit_title_and_post_once() {
        let publisher = RecordingPublisher::default();
        let mut form = composer();

        let (created, out) = drive(&mut form, &publisher, "1\nTeam sync\na\np\n").await;

        assert_eq!(created.unwrap().id, "evt1");
        assert_eq!(publisher.count(), 1);
        let sent = publisher.last();
        assert_eq!(sent.summary, "Team sync");
        assert_eq!(
            sent.start,
            EventTime::from_datetime(tz().with_ymd_and_hms(2024, 3, 15, 8, 15, 0).unwrap())
        );
        assert!(out.contains("posted: evt1"));
    }

    #[tokio::test]
    async fn pick_start_and_location() {
        let publisher = RecordingPublisher::default();
        let mut form = composer();

        let script = "1\nDentist\na\n2\nMain St 4\na\n4\n2024-03-18 14:30\na\np\n";
        drive(&mut form, &publisher, script).await;

        let sent = publisher.last();
        assert_eq!(sent.location.as_deref(), Some("Main St 4"));
        assert_eq!(
            sent.start,
            EventTime::from_datetime(tz().with_ymd_and_hms(2024, 3, 18, 14, 30, 0).unwrap())
        );
        assert_eq!(
            sent.end,
            Some(EventTime::from_datetime(
                tz().with_ymd_and_hms(2024, 3, 18, 15, 30, 0).unwrap()
            ))
        );
    }

    #[tokio::test]
    async fn toggle_makes_all_day() {
        let publisher = RecordingPublisher::default();
        let mut form = composer();

        drive(&mut form, &publisher, "1\nOffsite\na\nt\nt\n2024-03-20\na\np\n").await;

        let sent = publisher.last();
        let day = |d| EventTime::from_date(NaiveDate::from_ymd_opt(2024, 3, d).unwrap());
        assert_eq!(sent.start, day(20));
        assert_eq!(sent.end, Some(day(21)));
    }

    #[tokio::test]
    async fn post_refused_while_editing() {
        let publisher = RecordingPublisher::default();
        let mut form = composer();

        let (created, out) = drive(&mut form, &publisher, "1\nLunch\np\nq\n").await;

        assert!(created.is_none());
        assert_eq!(publisher.count(), 0);
        assert!(out.contains("finish editing 'Title' before posting"));
    }

    #[tokio::test]
    async fn empty_title_is_not_sent() {
        let publisher = RecordingPublisher::default();
        let mut form = composer();

        let (created, out) = drive(&mut form, &publisher, "p\nq\n").await;

        assert!(created.is_none());
        assert_eq!(publisher.count(), 0);
        assert!(out.contains("event title must not be empty"));
    }

    #[tokio::test]
    async fn each_press_after_failure_sends_one_request() {
        let publisher = RecordingPublisher::failing();
        let mut form = composer();

        let (created, out) = drive(&mut form, &publisher, "1\nRetro\na\np\np\nq\n").await;

        assert!(created.is_none());
        assert_eq!(publisher.count(), 2);
        assert!(out.contains("post failed"));
        assert!(matches!(form.last_outcome(), Some(PostOutcome::Failed(_))));
    }

    #[tokio::test]
    async fn end_before_start_keeps_picker_open() {
        let publisher = RecordingPublisher::default();
        let draft = EventDraft::new(
            "Review",
            EventTime::from_datetime(tz().with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()),
        );
        let now = tz().with_ymd_and_hms(2024, 3, 15, 8, 7, 0).unwrap();
        let mut form = EventComposer::from_draft(draft, tz()).with_clock(now.with_timezone(&Utc));

        let (_, out) = drive(&mut form, &publisher, "5\n09:00\na\n").await;

        assert!(out.contains("cannot be before start"));
        assert!(form.is_date_picker_visible());
    }

    #[tokio::test]
    async fn bad_time_and_unknown_command_are_reported() {
        let publisher = RecordingPublisher::default();
        let mut form = composer();

        let (_, out) = drive(&mut form, &publisher, "hello\n4\nsoonish\nc\nq\n").await;

        assert!(out.contains("unknown command 'hello'"));
        assert!(out.contains("unrecognized date/time 'soonish'"));
        assert!(!form.is_date_picker_visible());
        assert_eq!(publisher.count(), 0);
    }

    #[tokio::test]
    async fn end_of_input_quits() {
        let publisher = RecordingPublisher::default();
        let mut form = composer();
        let (created, _) = drive(&mut form, &publisher, "1\nhalf typed").await;
        assert!(created.is_none());
        assert_eq!(publisher.count(), 0);
    }
}
