//! Log output for the `calpost` binary.
//!
//! Library code only emits through the `tracing` macros. The binary installs
//! one compact subscriber on stderr, leaving stdout to command output.
//! `RUST_LOG` replaces the preset filter when set.

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Error installing the subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    /// A global subscriber is already installed.
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// How much the binary logs, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Level for calpost's own crates when `RUST_LOG` is unset.
    pub level: Level,
    /// Print file and line of each event.
    pub show_location: bool,
    /// Print the module path of each event.
    pub show_target: bool,
}

impl TracingConfig {
    /// Normal runs: warnings only.
    #[must_use]
    pub fn cli() -> Self {
        Self {
            level: Level::WARN,
            show_location: false,
            show_target: false,
        }
    }

    /// `--debug` runs.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            level: Level::DEBUG,
            show_location: true,
            show_target: true,
        }
    }

    /// Filter used when `RUST_LOG` is unset. Targets are matched by prefix,
    /// so `calpost` covers every `calpost_*` crate.
    fn default_directive(&self) -> String {
        format!("calpost={}", self.level.as_str().to_ascii_lowercase())
    }
}

/// Installs the global subscriber. Call once, early in `main`.
///
/// # Errors
///
/// Fails if a subscriber is already installed.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let layer = fmt::layer()
        .compact()
        .without_time()
        .with_writer(std::io::stderr)
        .with_target(config.show_target)
        .with_file(config.show_location)
        .with_line_number(config.show_location);

    let subscriber = tracing_subscriber::registry().with(filter).with(layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_quiet() {
        let config = TracingConfig::cli();
        assert_eq!(config.level, Level::WARN);
        assert!(!config.show_location);
        assert_eq!(config.default_directive(), "calpost=warn");
    }

    #[test]
    fn cli_debug_is_verbose() {
        let config = TracingConfig::cli_debug();
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.show_location && config.show_target);
        assert_eq!(config.default_directive(), "calpost=debug");
    }

    #[test]
    fn default_directives_parse() {
        for config in [TracingConfig::cli(), TracingConfig::cli_debug()] {
            assert!(EnvFilter::try_new(config.default_directive()).is_ok());
        }
    }
}
