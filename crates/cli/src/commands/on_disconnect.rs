// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use tracing::info;

use super::write::merge_value;
use super::{acknowledged, completion, connect, hold_open, parse_value};
use crate::cli::OnDisconnectCommand;
use crate::config::Settings;
use crate::error::Result;

/// Registers the action, then keeps the session open so the server has a
/// client whose departure triggers it.
pub(crate) async fn run(settings: Settings, command: &OnDisconnectCommand) -> Result<()> {
    let conn = connect(settings, false)?;
    let (callback, ack) = completion();
    match command {
        OnDisconnectCommand::Put { path, value } => {
            conn.on_disconnect_put(path, parse_value(value), Some(callback));
        }
        OnDisconnectCommand::Merge { path, value } => {
            conn.on_disconnect_merge(path, merge_value(value)?, Some(callback));
        }
        OnDisconnectCommand::Cancel { path } => {
            conn.on_disconnect_cancel(path, Some(callback));
        }
    }

    let result = match acknowledged(&conn, ack).await {
        Ok(()) => {
            println!("registered; press Ctrl-C to disconnect");
            info!("on-disconnect action registered");
            hold_open(&conn).await
        }
        Err(e) => Err(e),
    };
    conn.shutdown();
    result
}
