//! Subcommand implementations.

pub mod auth;
pub mod calendars;
pub mod config;
pub mod post;

use calpost_google::GoogleAccount;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Opens the Google account described by `config.toml`.
///
/// The configuration is validated first, so no command talks to Google with
/// settings `calpost config validate` would reject.
pub(crate) fn open_account(config: &ClientConfig) -> ClientResult<GoogleAccount> {
    config.validate().map_err(ClientError::Config)?;
    let google_config = config.google_config().map_err(ClientError::Config)?;
    let account =
        GoogleAccount::new(google_config)?.with_default_duration(config.default_duration());
    Ok(account)
}
