// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations.
//!
//! Every command opens one [`PersistentConnection`], issues its request, and
//! waits for the server's acknowledgement, the connection stopping, or Ctrl-C,
//! whichever comes first.

pub(crate) mod listen;
pub(crate) mod on_disconnect;
pub(crate) mod write;

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::info;
use tw_conn::{
    Collaborators, ConnectionObserver, Environment, PersistentConnection, StaticTokenProvider,
    WebSocketTransport, WriteCallback,
};
use tw_core::Status;

use crate::config::Settings;
use crate::error::{Error, Result};

/// Reports connection changes to the log and, optionally, data to stdout.
pub(crate) struct CliObserver {
    print_data: bool,
}

impl ConnectionObserver for CliObserver {
    fn on_data_update(&self, path: &str, data: &Value, is_merge: bool, _tag: Option<u64>) {
        if self.print_data {
            println!("{}", json!({ "path": path, "data": data, "merge": is_merge }));
        }
    }

    fn on_connect_status(&self, connected: bool) {
        if connected {
            info!("connected");
        } else {
            info!("disconnected");
        }
    }
}

pub(crate) fn connect(settings: Settings, print_data: bool) -> Result<PersistentConnection> {
    info!(endpoint = %settings.connection.endpoint, "connecting");
    let collaborators = Collaborators {
        transport: Arc::new(WebSocketTransport::new()),
        auth: Arc::new(StaticTokenProvider::new(settings.token)),
        environment: Environment::default(),
        observer: Arc::new(CliObserver { print_data }),
    };
    Ok(PersistentConnection::start(settings.connection, collaborators)?)
}

/// A completion callback and the receiver it reports to.
pub(crate) fn completion() -> (WriteCallback, oneshot::Receiver<(Status, Option<Value>)>) {
    let (tx, rx) = oneshot::channel();
    let callback: WriteCallback = Box::new(move |status, data| {
        let _ = tx.send((status, data));
    });
    (callback, rx)
}

/// Waits for an acknowledgement, giving up on Ctrl-C or if the connection
/// stops.
pub(crate) async fn acknowledged(
    conn: &PersistentConnection,
    ack: oneshot::Receiver<(Status, Option<Value>)>,
) -> Result<()> {
    tokio::select! {
        result = ack => {
            let (status, data) = result.map_err(|_| Error::Interrupted)?;
            check_status(status, data)
        }
        result = conn.wait() => {
            result?;
            Err(Error::Interrupted)
        }
        _ = tokio::signal::ctrl_c() => Err(Error::Interrupted),
    }
}

/// Keeps the connection open until Ctrl-C or until it stops on its own.
pub(crate) async fn hold_open(conn: &PersistentConnection) -> Result<()> {
    tokio::select! {
        result = conn.wait() => Ok(result?),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(())
        }
    }
}

pub(crate) fn check_status(status: Status, data: Option<Value>) -> Result<()> {
    if status.is_ok() {
        return Ok(());
    }
    let detail = data.map(|d| match d {
        Value::String(s) => s,
        other => other.to_string(),
    });
    Err(Error::Rejected {
        status: status.as_str().to_string(),
        detail,
    })
}

/// Parses a command line value as JSON, taking anything else as a string.
pub(crate) fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
