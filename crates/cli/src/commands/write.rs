// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::Value;

use super::{acknowledged, completion, connect, parse_value};
use crate::config::Settings;
use crate::error::{Error, Result};

pub(crate) async fn put(settings: Settings, path: &str, raw: &str) -> Result<()> {
    let conn = connect(settings, false)?;
    let (callback, ack) = completion();
    conn.put(path, parse_value(raw), Some(callback), None);
    let result = acknowledged(&conn, ack).await;
    conn.shutdown();
    report(result)
}

pub(crate) async fn merge(settings: Settings, path: &str, raw: &str) -> Result<()> {
    let data = merge_value(raw)?;
    let conn = connect(settings, false)?;
    let (callback, ack) = completion();
    conn.merge(path, data, Some(callback), None);
    let result = acknowledged(&conn, ack).await;
    conn.shutdown();
    report(result)
}

/// A merge needs an object of children to update.
pub(crate) fn merge_value(raw: &str) -> Result<Value> {
    match parse_value(raw) {
        value @ Value::Object(_) => Ok(value),
        _ => Err(Error::MergeNotObject),
    }
}

fn report(result: Result<()>) -> Result<()> {
    if result.is_ok() {
        println!("ok");
    }
    result
}

#[cfg(test)]
#[path = "write_tests.rs"]
mod tests;
