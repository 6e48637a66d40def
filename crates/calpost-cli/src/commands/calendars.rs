//! `calpost calendars`: list the calendars events can be posted to.

use std::io::{self, Write};

use calpost_google::CalendarListEntry;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Lists the account's calendars, marking the configured target.
pub async fn list(config: &ClientConfig, json: bool) -> ClientResult<()> {
    let account = super::open_account(config)?;
    let calendars = account.list_calendars().await?;

    if json {
        let out = serde_json::to_string_pretty(&calendars)
            .map_err(|e| ClientError::Action(format!("failed to encode calendars: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    let target = &account.config().calendar_id;
    write_table(&mut io::stdout().lock(), &calendars, target)?;
    Ok(())
}

fn write_table(
    out: &mut impl Write,
    calendars: &[CalendarListEntry],
    target: &str,
) -> io::Result<()> {
    if calendars.is_empty() {
        return writeln!(out, "No calendars.");
    }

    for calendar in calendars {
        let is_target = calendar.id == target || (target == "primary" && calendar.primary);
        let marker = if is_target { "*" } else { " " };
        let access = if calendar.is_writable() { "" } else { "  (read-only)" };
        writeln!(out, "{} {}{}", marker, calendar.summary, access)?;
        writeln!(out, "    {}", calendar.id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, summary: &str, primary: bool, role: &str) -> CalendarListEntry {
        CalendarListEntry {
            id: id.to_string(),
            summary: summary.to_string(),
            primary,
            access_role: Some(role.to_string()),
            time_zone: None,
        }
    }

    fn render(calendars: &[CalendarListEntry], target: &str) -> String {
        let mut out = Vec::new();
        write_table(&mut out, calendars, target).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn primary_is_marked_by_default() {
        let calendars = vec![
            entry("me@example.com", "Personal", true, "owner"),
            entry("holidays@group.v.calendar.google.com", "Holidays", false, "reader"),
        ];
        insta::assert_snapshot!(render(&calendars, "primary"), @r"
        * Personal
            me@example.com
          Holidays  (read-only)
            holidays@group.v.calendar.google.com
        ");
    }

    #[test]
    fn configured_calendar_is_marked() {
        let calendars = vec![
            entry("me@example.com", "Personal", true, "owner"),
            entry("team@group.calendar.google.com", "Team", false, "writer"),
        ];
        let out = render(&calendars, "team@group.calendar.google.com");
        assert!(out.contains("* Team"));
        assert!(out.contains("  Personal"));
    }

    #[test]
    fn empty_list() {
        assert_eq!(render(&[], "primary"), "No calendars.\n");
    }
}
