// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection configuration.
//!
//! Everything the connection needs to know before it starts:
//! - `endpoint`: where the database lives and which namespace to address
//! - `reconnect`: the backoff policy between attempts
//! - `client_kind`: admin clients retry faster and report a different SDK name
//! - `auth_override`: extra fields attached to every auth request

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tw_core::PROTOCOL_VERSION;
use url::Url;

/// The server endpoint of a database namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host, with an optional port (e.g. `db.example.com` or `localhost:9000`).
    pub host: String,
    pub namespace: String,
    /// Use `wss://` instead of `ws://` (default: true).
    #[serde(default = "default_secure")]
    pub secure: bool,
}

fn default_secure() -> bool {
    true
}

impl Endpoint {
    pub fn new(host: impl Into<String>, namespace: impl Into<String>, secure: bool) -> Self {
        Endpoint {
            host: host.into(),
            namespace: namespace.into(),
            secure,
        }
    }

    /// The WebSocket URL for a connection attempt.
    ///
    /// `last_session_id` asks the server to resume the previous session.
    pub fn connection_url(&self, last_session_id: Option<&str>) -> Result<Url, url::ParseError> {
        let scheme = if self.secure { "wss" } else { "ws" };
        let mut url = Url::parse(&format!("{}://{}/.ws", scheme, self.host))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("v", PROTOCOL_VERSION);
            query.append_pair("ns", &self.namespace);
            if let Some(session) = last_session_id {
                query.append_pair("ls", session);
            }
        }
        Ok(url)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::new("localhost:9000", "default", false)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.secure { "https" } else { "http" };
        write!(f, "{}://{}/?ns={}", scheme, self.host, self.namespace)
    }
}

/// Reconnection backoff policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay before the first retry, and after any reset (default: 1000).
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    /// Ceiling for the delay (default: 300000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Ceiling for admin credentials, and the delay applied after repeated
    /// invalid tokens (default: 30000).
    #[serde(default = "default_admin_max_delay_ms")]
    pub admin_max_delay_ms: u64,
    /// Growth factor applied after each scheduled retry (default: 1.3).
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// A session that lived longer than this resets the delay (default: 30000).
    #[serde(default = "default_reset_after_ms")]
    pub reset_after_ms: u64,
    /// Consecutive invalid-token revocations before the provider is warned
    /// (default: 3).
    #[serde(default = "default_invalid_token_threshold")]
    pub invalid_token_threshold: u32,
}

fn default_min_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    5 * 60 * 1000
}

fn default_admin_max_delay_ms() -> u64 {
    30 * 1000
}

fn default_multiplier() -> f64 {
    1.3
}

fn default_reset_after_ms() -> u64 {
    30_000
}

fn default_invalid_token_threshold() -> u32 {
    3
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            admin_max_delay_ms: default_admin_max_delay_ms(),
            multiplier: default_multiplier(),
            reset_after_ms: default_reset_after_ms(),
            invalid_token_threshold: default_invalid_token_threshold(),
        }
    }
}

/// What kind of process is connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    #[default]
    Standard,
    /// A backend process with privileged credentials.
    Admin,
}

impl ClientKind {
    /// Client name reported in the connect stats.
    pub fn stats_name(self) -> &'static str {
        match self {
            ClientKind::Standard => "rust",
            ClientKind::Admin => "admin_rust",
        }
    }
}

/// Extra fields attached to auth requests.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthOverride {
    #[default]
    Default,
    /// Authenticate as unauthenticated (`noauth: true`).
    NoAuth,
    /// Variables exposed to security rules as `auth` (`authvar`).
    Vars(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub endpoint: Endpoint,
    pub reconnect: ReconnectPolicy,
    pub client_kind: ClientKind,
    /// Reported once per process in the connect stats.
    pub sdk_version: String,
    pub auth_override: AuthOverride,
}

impl ConnectionConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        ConnectionConfig {
            endpoint,
            ..ConnectionConfig::default()
        }
    }

    /// Stats counter name identifying this client, e.g. `sdk.rust.0-4-0`.
    pub fn connect_stats_key(&self) -> String {
        format!(
            "sdk.{}.{}",
            self.client_kind.stats_name(),
            self.sdk_version.replace('.', "-")
        )
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            endpoint: Endpoint::default(),
            reconnect: ReconnectPolicy::default(),
            client_kind: ClientKind::default(),
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            auth_override: AuthOverride::default(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
