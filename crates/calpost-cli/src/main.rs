//! calpost CLI entry point.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use calpost_cli::cli::{AuthAction, Cli, Command, ConfigAction};
use calpost_cli::commands;
use calpost_cli::config::ClientConfig;
use calpost_cli::error::{ClientError, ClientResult};
use calpost_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);

    let config = if cli.config.is_some() {
        ClientConfig::load_from(&config_path)
    } else {
        ClientConfig::load()
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", ClientError::Config(e));
            return ExitCode::FAILURE;
        }
    };

    let tracing_config = if cli.debug || config.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli.command, &config, &config_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &ClientConfig, config_path: &Path) -> ClientResult<()> {
    match command {
        Command::Auth { action } => match action {
            AuthAction::Google {
                client_id,
                client_secret,
                credentials_file,
                force,
            } => {
                commands::auth::google(
                    client_id,
                    client_secret,
                    credentials_file,
                    force,
                    config,
                    config_path,
                )
                .await
            }
            AuthAction::Revoke => commands::auth::revoke(config).await,
            AuthAction::Status { json } => commands::auth::status(config, json).await,
        },
        Command::Post(args) => commands::post::run(args, config).await,
        Command::Calendars { json } => commands::calendars::list(config, json).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(config, config_path),
            ConfigAction::Validate => commands::config::validate(config),
            ConfigAction::Path => commands::config::path(config_path),
        },
    }
}
