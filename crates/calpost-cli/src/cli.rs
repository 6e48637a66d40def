//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// calpost - Post events to Google Calendar
#[derive(Debug, Parser)]
#[command(name = "calpost")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALPOST_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authentication commands
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Create an event
    Post(PostArgs),

    /// List calendars the account can see
    Calendars {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Authentication actions.
#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Sign in to Google Calendar
    Google {
        /// OAuth client ID (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        client_id: Option<String>,

        /// OAuth client secret (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
        client_secret: Option<String>,

        /// Path to Google Cloud Console credentials JSON file
        ///
        /// This is the JSON file downloaded from the Google Cloud Console
        /// OAuth 2.0 credentials page. Alternative to providing client_id
        /// and client_secret separately.
        #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
        credentials_file: Option<PathBuf>,

        /// Force re-authentication even if already authenticated
        #[arg(long, short)]
        force: bool,
    },

    /// Revoke calpost's access and delete the stored tokens
    Revoke,

    /// Show authentication status
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// Options of `calpost post`.
#[derive(Debug, Clone, Default, Args)]
pub struct PostArgs {
    /// Event title
    #[arg(long, short)]
    pub title: Option<String>,

    /// Start: "2024-03-15 10:00", "2024-03-15" (all day), "14:30" or "now"
    #[arg(long, short)]
    pub start: Option<String>,

    /// End, same formats as --start (default: start + default duration)
    #[arg(long, short)]
    pub end: Option<String>,

    /// Event location
    #[arg(long, short)]
    pub location: Option<String>,

    /// Event description
    #[arg(long, short)]
    pub description: Option<String>,

    /// Create an all-day event
    #[arg(long)]
    pub all_day: bool,

    /// Calendar to post to (overrides config)
    #[arg(long)]
    pub calendar: Option<String>,

    /// Let Google parse the event from free text ("Lunch with Ana tomorrow 1pm")
    #[arg(long, short, conflicts_with_all = ["title", "start", "end", "location", "description", "all_day", "interactive"])]
    pub quick: Option<String>,

    /// Edit the event in an interactive form before posting
    #[arg(long, short)]
    pub interactive: bool,

    /// Open the created event in the browser
    #[arg(long)]
    pub open: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_post_flags() {
        let cli = Cli::try_parse_from([
            "calpost",
            "post",
            "--title",
            "Team sync",
            "--start",
            "2024-03-15 10:00",
            "--location",
            "Room 4",
            "--open",
        ])
        .unwrap();

        let Command::Post(args) = cli.command else {
            panic!("expected post command");
        };
        assert_eq!(args.title.as_deref(), Some("Team sync"));
        assert_eq!(args.start.as_deref(), Some("2024-03-15 10:00"));
        assert_eq!(args.location.as_deref(), Some("Room 4"));
        assert!(args.open);
        assert!(!args.interactive);
    }

    #[test]
    fn quick_conflicts_with_title() {
        let result = Cli::try_parse_from([
            "calpost", "post", "--quick", "Lunch tomorrow", "--title", "Lunch",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["calpost", "auth", "status", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(matches!(
            cli.command,
            Command::Auth {
                action: AuthAction::Status { json: false }
            }
        ));
    }
}
