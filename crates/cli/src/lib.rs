// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tidewire - command line client for realtime databases.
//!
//! This crate provides the `tw` binary: a thin shell around
//! [`tw_conn::PersistentConnection`] for streaming a location, writing to it,
//! and registering on-disconnect actions.
//!
//! # Main Components
//!
//! - [`Cli`] - Argument parsing
//! - [`Config`] - Optional TOML config file, overridden by flags
//! - [`Error`] - Error types for all commands

mod cli;
mod commands;

pub mod config;
pub mod error;

pub use cli::{Cli, Command, GlobalArgs, OnDisconnectCommand, QueryArgs};
pub use config::{Config, Settings};
pub use error::{Error, Result};

use tracing_subscriber::EnvFilter;

/// Runs one command to completion.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Config::discover(cli.global.config.as_deref())?.resolve(&cli.global);
    match cli.command {
        Command::Listen { path, query } => commands::listen::run(settings, &path, &query).await,
        Command::Put { path, value } => commands::write::put(settings, &path, &value).await,
        Command::Merge { path, value } => commands::write::merge(settings, &path, &value).await,
        Command::OnDisconnect(command) => commands::on_disconnect::run(settings, &command).await,
    }
}

/// Logs to stderr. `RUST_LOG` wins over the verbosity flag.
pub fn setup_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
