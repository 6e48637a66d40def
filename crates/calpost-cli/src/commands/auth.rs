//! Authentication commands.

use std::path::{Path, PathBuf};

use calpost_google::{GoogleAccount, OAuthCredentials, Revocation};
use tracing::{info, warn};

use crate::config::{ClientConfig, GoogleSettings};
use crate::error::{ClientError, ClientResult};

/// Where the credentials were resolved from.
#[derive(Debug, PartialEq)]
enum CredentialSource {
    /// From CLI flags (--client-id/--client-secret or --credentials-file)
    Cli,
    /// From config.toml (already persisted)
    Config,
}

/// Runs the Google sign-in flow.
///
/// Credentials given on the command line are written to `config_path` so
/// later commands find them.
pub async fn google(
    client_id: Option<String>,
    client_secret: Option<String>,
    credentials_file: Option<PathBuf>,
    force: bool,
    config: &ClientConfig,
    config_path: &Path,
) -> ClientResult<()> {
    let (credentials, source) = resolve_google_credentials(
        client_id,
        client_secret,
        credentials_file,
        config.google.as_ref(),
    )?;
    credentials
        .validate()
        .map_err(|e| ClientError::Config(format!("invalid Google credentials: {}", e)))?;

    let google_config = config.apply_settings(calpost_google::GoogleConfig::new(credentials.clone()));
    let account = GoogleAccount::new(google_config)?;

    if source == CredentialSource::Cli {
        save_credentials(config_path, &credentials);
    }

    if !force && !account.needs_reauth() {
        println!("Already authenticated with Google Calendar.");
        println!("Use --force to re-authenticate.");
        return Ok(());
    }

    println!("Starting Google Calendar authentication...");
    println!();
    println!("A browser window will open for you to authorize access.");
    println!("If the browser doesn't open, check the terminal for a URL to copy.");
    println!();

    account.authenticate().await?;

    info!("Google authentication successful");
    println!("Authentication successful!");
    println!("Tokens saved to {}", account.config().token_path.display());
    println!();
    println!("You can now post events: calpost post --title \"Lunch\" --start 12:30");
    Ok(())
}

/// Revokes the grant at Google and deletes the stored tokens.
pub async fn revoke(config: &ClientConfig) -> ClientResult<()> {
    let account = super::open_account(config)?;

    match account.revoke_access().await {
        Ok(Some(Revocation::Revoked)) => println!("Access revoked."),
        Ok(Some(Revocation::AlreadyInvalid)) => {
            println!("Access was already revoked or expired.")
        }
        Ok(None) => println!("Not signed in; nothing to revoke."),
        Err(e) => {
            warn!("remote revocation failed: {}", e);
            println!("Local tokens removed, but Google did not confirm the revocation.");
            return Err(e.into());
        }
    }

    println!(
        "Removed tokens at {}",
        account.config().token_path.display()
    );
    Ok(())
}

/// Prints authentication status.
pub async fn status(config: &ClientConfig, json: bool) -> ClientResult<()> {
    let account = super::open_account(config)?;
    let status = account.status().await;

    if json {
        let value = serde_json::json!({
            "account": status.account,
            "authenticated": status.is_authenticated,
            "needs_reauth": status.needs_reauth,
            "has_refresh_token": status.has_refresh_token,
            "expires_in_secs": status.expires_in_secs,
            "token_path": status.token_path,
            "calendar_id": status.calendar_id,
            "calendar_count": status.calendar_count,
            "error": status.error,
        });
        let out = serde_json::to_string_pretty(&value)
            .map_err(|e| ClientError::Action(format!("failed to encode status: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    println!("account:        {}", status.account);
    println!(
        "authenticated:  {}",
        if status.is_authenticated { "yes" } else { "no" }
    );
    if status.needs_reauth {
        println!("                run 'calpost auth google' to sign in");
    }
    println!(
        "refresh token:  {}",
        if status.has_refresh_token { "yes" } else { "no" }
    );
    if let Some(secs) = status.expires_in_secs {
        if secs > 0 {
            println!("access token:   valid for {} min", secs / 60);
        } else {
            println!("access token:   expired");
        }
    }
    println!("calendar:       {}", status.calendar_id);
    if let Some(count) = status.calendar_count {
        println!("calendars:      {}", count);
    }
    println!("tokens:         {}", status.token_path.display());
    if let Some(error) = status.error {
        println!("error:          {}", error);
    }
    Ok(())
}

/// Resolves Google credentials from multiple sources.
///
/// Priority (highest to lowest):
/// 1. CLI `--client-id` + `--client-secret`
/// 2. CLI `--credentials-file` (Google Cloud Console JSON)
/// 3. `config.toml` `[google]` section (with secret resolution)
fn resolve_google_credentials(
    cli_client_id: Option<String>,
    cli_client_secret: Option<String>,
    cli_credentials_file: Option<PathBuf>,
    config_google: Option<&GoogleSettings>,
) -> ClientResult<(OAuthCredentials, CredentialSource)> {
    match (cli_client_id, cli_client_secret) {
        (Some(id), Some(secret)) => {
            return Ok((OAuthCredentials::new(id, secret), CredentialSource::Cli));
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(ClientError::Config(
                "both --client-id and --client-secret are required when providing credentials directly"
                    .to_string(),
            ));
        }
        (None, None) => {}
    }

    if let Some(path) = cli_credentials_file {
        let credentials = OAuthCredentials::from_file(&path).map_err(|e| {
            ClientError::Config(format!(
                "failed to load credentials from {}: {}",
                path.display(),
                e.message()
            ))
        })?;
        return Ok((credentials, CredentialSource::Cli));
    }

    if let Some(google) = config_google.filter(|g| g.has_credentials()) {
        let credentials = google.resolve_credentials().map_err(|e| {
            ClientError::Config(format!(
                "failed to resolve Google credentials from config: {}",
                e
            ))
        })?;
        return Ok((credentials, CredentialSource::Config));
    }

    Err(ClientError::Config(format!(
        "Google credentials are required. Provide via:\n  \
         - client_id + client_secret in {}\n  \
         - --client-id and --client-secret flags\n  \
         - --credentials-file flag (path to Google Cloud Console JSON)\n  \
         - GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET env vars",
        ClientConfig::default_path().display()
    )))
}

/// Saves credentials under `[google]` in `config_path`, best effort.
fn save_credentials(config_path: &Path, credentials: &OAuthCredentials) {
    match write_credentials(config_path, credentials) {
        Ok(()) => println!("Credentials saved to {}", config_path.display()),
        Err(e) => warn!("could not save credentials to {}: {}", config_path.display(), e),
    }
}

/// Writes credentials into the config file, keeping its other content and
/// comments.
fn write_credentials(config_path: &Path, credentials: &OAuthCredentials) -> Result<(), String> {
    let content = match std::fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(format!("failed to read config: {}", e)),
    };

    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| format!("failed to parse config: {}", e))?;

    let google = doc
        .entry("google")
        .or_insert_with(toml_edit::table)
        .as_table_mut()
        .ok_or_else(|| "[google] is not a table".to_string())?;
    google["client_id"] = toml_edit::value(credentials.client_id.as_str());
    google["client_secret"] = toml_edit::value(credentials.client_secret.as_str());

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
    }
    std::fs::write(config_path, doc.to_string())
        .map_err(|e| format!("failed to write config: {}", e))
}
