//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/calpost/config.toml` by default.
//!
//! Credential values (`client_id`, `client_secret`) support secret references:
//! - `pass::path/in/store` is resolved via `pass show`
//! - `env::VAR_NAME` is resolved from the environment
//! - plain text is used as-is

use std::path::{Path, PathBuf};

use calpost_core::DEFAULT_DURATION_MINUTES;
use calpost_google::{GoogleConfig, OAuthCredentials};
use serde::{Deserialize, Serialize};

use crate::secret;

/// Upper bound for `event.default_duration_minutes`.
const MAX_DURATION_MINUTES: i64 = 7 * 24 * 60;

/// Configuration for the calpost client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Google account settings.
    pub google: Option<GoogleSettings>,

    /// Defaults for new events.
    pub event: EventSettings,
}

/// Defaults applied to new events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    /// Length of an event posted without an end.
    pub default_duration_minutes: i64,

    /// IANA time zone sent with timed events (e.g. "Europe/Paris").
    pub time_zone: Option<String>,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            default_duration_minutes: DEFAULT_DURATION_MINUTES,
            time_zone: None,
        }
    }
}

/// Google account settings.
///
/// Credentials are stored inline and support secret references
/// (`pass::…`, `env::…`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client ID.
    pub client_id: Option<String>,

    /// OAuth client secret.
    pub client_secret: Option<String>,

    /// Calendar events are posted to; the primary calendar when unset.
    pub calendar_id: Option<String>,

    /// Path to token storage.
    pub token_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Loads configuration from the default path.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse {}: {}", path.display(), e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calpost")
            .join("config.toml")
    }

    /// Returns the default event length.
    ///
    /// Values chrono cannot represent fall back to the built-in default;
    /// [`validate`](Self::validate) reports them.
    pub fn default_duration(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.event.default_duration_minutes)
            .unwrap_or_else(|| chrono::Duration::minutes(DEFAULT_DURATION_MINUTES))
    }

    /// Checks values that parse but cannot be used.
    pub fn validate(&self) -> Result<(), String> {
        let minutes = self.event.default_duration_minutes;
        if minutes <= 0 {
            return Err(format!(
                "event.default_duration_minutes must be positive, got {}",
                minutes
            ));
        }
        if minutes > MAX_DURATION_MINUTES {
            return Err(format!(
                "event.default_duration_minutes must be at most {} (one week), got {}",
                MAX_DURATION_MINUTES, minutes
            ));
        }
        if let Some(tz) = &self.event.time_zone
            && (tz.trim().is_empty() || tz.contains(char::is_whitespace))
        {
            return Err(format!("event.time_zone '{}' is not an IANA zone name", tz));
        }
        if let Some(google) = &self.google
            && google
                .calendar_id
                .as_deref()
                .is_some_and(|id| id.trim().is_empty())
        {
            return Err("google.calendar_id must not be empty".to_string());
        }
        Ok(())
    }

    /// Builds the Google account configuration from `[google]` and `[event]`.
    pub fn google_config(&self) -> Result<GoogleConfig, String> {
        let google = self.google.as_ref().ok_or_else(missing_credentials_help)?;
        let credentials = google.resolve_credentials()?;
        credentials.validate().map_err(str::to_string)?;
        Ok(self.apply_settings(GoogleConfig::new(credentials)))
    }

    /// Applies calendar, token path and time zone settings to `config`.
    pub fn apply_settings(&self, mut config: GoogleConfig) -> GoogleConfig {
        if let Some(google) = &self.google {
            if let Some(id) = &google.calendar_id {
                config = config.with_calendar_id(id);
            }
            if let Some(path) = &google.token_path {
                config = config.with_token_path(path);
            }
        }
        if let Some(tz) = &self.event.time_zone {
            config = config.with_time_zone(tz);
        }
        config
    }

    /// Returns a copy safe to print, with plain-text secrets masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(google) = copy.google.as_mut()
            && let Some(value) = google.client_secret.as_mut()
        {
            *value = secret::redact(value);
        }
        copy
    }
}

impl GoogleSettings {
    /// Resolves the OAuth credentials, expanding secret references.
    pub fn resolve_credentials(&self) -> Result<OAuthCredentials, String> {
        let raw_id = self.client_id.as_deref().ok_or_else(missing_credentials_help)?;
        let raw_secret = self.client_secret.as_deref().ok_or_else(|| {
            "client_secret is missing from [google] section in config.toml".to_string()
        })?;

        let client_id = secret::resolve(raw_id)
            .map_err(|e| format!("failed to resolve client_id: {}", e))?;
        let client_secret = secret::resolve(raw_secret)
            .map_err(|e| format!("failed to resolve client_secret: {}", e))?;

        Ok(OAuthCredentials::new(client_id, client_secret))
    }

    /// Returns true when both credential fields are set.
    pub fn has_credentials(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

fn missing_credentials_help() -> String {
    format!(
        "Google credentials not found. Add to {}:\n  \
         [google]\n  \
         client_id = \"YOUR_ID.apps.googleusercontent.com\"\n  \
         client_secret = \"YOUR_SECRET\"\n\n  \
         Or run: calpost auth google --credentials-file <path>",
        ClientConfig::default_path().display()
    )
}
