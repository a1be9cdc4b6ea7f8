// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command line configuration.
//!
//! Settings come from an optional TOML file, overridden by command line
//! flags:
//!
//! ```toml
//! host = "db.example.com"
//! namespace = "prod"
//! token = "..."
//! admin = false
//!
//! [reconnect]
//! max_delay_ms = 60000
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tw_conn::{ClientKind, ConnectionConfig, Endpoint, ReconnectPolicy};

use crate::cli::GlobalArgs;
use crate::error::{Error, Result};

const CONFIG_DIR_NAME: &str = "tidewire";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_HOST: &str = "localhost:9000";
const DEFAULT_NAMESPACE: &str = "default";

/// Contents of the config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub host: Option<String>,
    pub namespace: Option<String>,
    /// Use `wss://` (default: true).
    pub secure: Option<bool>,
    pub token: Option<String>,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub connection: ConnectionConfig,
    pub token: Option<String>,
}

impl Config {
    /// Parses the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ConfigNotFound(path.display().to_string()),
            _ => Error::Io(e),
        })?;
        toml::from_str(&content).map_err(|e| Error::InvalidConfig {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Loads an explicitly named file, or the default file when it exists.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Config::load(path);
        }
        match default_path() {
            Some(path) if path.exists() => Config::load(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Applies command line overrides.
    pub fn resolve(self, args: &GlobalArgs) -> Settings {
        let host = args
            .host
            .clone()
            .or(self.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let namespace = args
            .namespace
            .clone()
            .or(self.namespace)
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let secure = !args.insecure && self.secure.unwrap_or(true);

        let mut connection = ConnectionConfig::new(Endpoint::new(host, namespace, secure));
        connection.reconnect = self.reconnect;
        if args.admin || self.admin {
            connection.client_kind = ClientKind::Admin;
        }
        connection.sdk_version = env!("CARGO_PKG_VERSION").to_string();

        Settings {
            connection,
            token: args.token.clone().or(self.token),
        }
    }
}

/// `<config dir>/tidewire/config.toml`.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
