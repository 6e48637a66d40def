//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dumps the configuration, with plain-text secrets masked.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(&config.redacted())
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);
    Ok(())
}

/// Validates the configuration, including credential references.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate().map_err(ClientError::Config)?;

    if let Some(google) = &config.google
        && (google.client_id.is_some() || google.client_secret.is_some())
    {
        config
            .google_config()
            .map_err(|e| ClientError::Config(format!("invalid Google credentials: {}", e)))?;
        println!("Google credentials are valid.");
    }

    println!("Configuration is valid.");
    Ok(())
}

/// Shows the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    let exists = if path.exists() { "" } else { " (not created yet)" };
    println!("config: {}{}", path.display(), exists);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> ClientConfig {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(validate(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn validate_rejects_bad_client_id() {
        let config = parse("[google]\nclient_id = \"not-a-google-id\"\nclient_secret = \"s\"\n");
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains(".apps.googleusercontent.com"));
    }

    #[test]
    fn validate_rejects_half_configured_credentials() {
        let config = parse("[google]\nclient_secret = \"s\"\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn redacted_dump_roundtrips_as_toml() {
        let config = parse(
            "[google]\nclient_id = \"id.apps.googleusercontent.com\"\nclient_secret = \"plain\"\n\n[event]\ntime_zone = \"Europe/Paris\"\n",
        );
        let dumped = toml::to_string_pretty(&config.redacted()).unwrap();
        let reparsed = parse(&dumped);
        let google = reparsed.google.unwrap();
        assert_eq!(google.client_secret.as_deref(), Some("********"));
        assert_eq!(reparsed.event.time_zone.as_deref(), Some("Europe/Paris"));
    }
}
