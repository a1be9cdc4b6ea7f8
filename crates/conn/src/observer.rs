// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Notifications from the connection to the layer above it.

use serde_json::Value;
use tracing::info;

/// Server facts learned on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server clock minus local clock, in milliseconds.
    pub server_time_offset_ms: i64,
}

/// Receives everything the server pushes that is not a response.
///
/// Every hook defaults to doing nothing, except security debug packets which
/// are logged.
pub trait ConnectionObserver: Send + Sync {
    fn on_data_update(&self, _path: &str, _data: &Value, _is_merge: bool, _tag: Option<u64>) {}

    fn on_connect_status(&self, _connected: bool) {}

    fn on_server_info_update(&self, _info: ServerInfo) {}

    fn on_security_debug(&self, body: &Value) {
        if let Some(msg) = body.get("msg").and_then(Value::as_str) {
            for line in msg.lines() {
                info!("security debug: {}", line);
            }
        }
    }
}

/// An observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ConnectionObserver for NoopObserver {}
