//! calpost command-line interface
//!
//! This crate provides the `calpost` binary: Google sign-in, posting events
//! from flags or an interactive form, and config.toml management.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod prompt;
pub mod secret;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
