// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

const COMMANDS_HELP: &str = "\
Commands:
  listen         Stream updates at a path until interrupted
  put            Replace the value at a path
  merge          Update children at a path
  on-disconnect  Register an action the server runs when this client goes away";

const QUICKSTART_HELP: &str = "\
Examples:
  tw --host localhost:9000 --insecure listen /scores --order-by-value --limit-to-last 3
  tw put /users/ada '{\"name\": \"Ada\"}'
  tw on-disconnect put /presence/ada false";

#[derive(Parser)]
#[command(name = "tw")]
#[command(about = "Talk to a realtime database over a persistent connection")]
#[command(version)]
#[command(before_help = COMMANDS_HELP)]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection flags shared by every command. Each overrides the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (default: <config dir>/tidewire/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database host, with optional port
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Database namespace
    #[arg(long, short = 'n', global = true)]
    pub namespace: Option<String>,

    /// Connect with ws:// instead of wss://
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Credential to authenticate with
    #[arg(long, env = "TW_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Connect as a privileged backend client
    #[arg(long, global = true)]
    pub admin: bool,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream updates at a path as JSON lines until interrupted
    #[command(after_help = "Examples:\n  \
        tw listen /users                              Everything under /users\n  \
        tw listen /scores --order-by-value --limit-to-last 3\n  \
        tw listen /users --order-by-child age --start-at 18")]
    Listen {
        /// Location to listen at
        path: String,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Replace the value at a path
    Put {
        path: String,
        /// JSON value (bare words are taken as strings)
        value: String,
    },

    /// Update the given children at a path, leaving others untouched
    Merge {
        path: String,
        /// JSON object of children to update
        value: String,
    },

    /// Register an action the server applies when this client disconnects
    #[command(name = "on-disconnect", subcommand)]
    OnDisconnect(OnDisconnectCommand),
}

#[derive(Subcommand, Debug)]
pub enum OnDisconnectCommand {
    /// Replace the value at a path on disconnect
    Put { path: String, value: String },
    /// Update children at a path on disconnect
    Merge { path: String, value: String },
    /// Cancel every on-disconnect action at or below a path
    Cancel { path: String },
}

/// Query filters for `listen`.
#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Order by key
    #[arg(long, conflicts_with_all = ["order_by_value", "order_by_child"])]
    pub order_by_key: bool,

    /// Order by value
    #[arg(long, conflicts_with = "order_by_child")]
    pub order_by_value: bool,

    /// Order by the value of a child path
    #[arg(long, value_name = "PATH")]
    pub order_by_child: Option<String>,

    /// Lower bound, as JSON
    #[arg(long, value_name = "JSON")]
    pub start_at: Option<String>,

    /// Upper bound, as JSON
    #[arg(long, value_name = "JSON")]
    pub end_at: Option<String>,

    /// Keep only the first N children
    #[arg(long, value_name = "N", conflicts_with = "limit_to_last")]
    pub limit_to_first: Option<u32>,

    /// Keep only the last N children
    #[arg(long, value_name = "N")]
    pub limit_to_last: Option<u32>,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
