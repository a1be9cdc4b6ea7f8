// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    malformed_message = { Error::MalformedMessage("not an object".into()), "not an object" },
    malformed_frame = { Error::MalformedFrame("missing 'd'".into()), "missing 'd'" },
    unknown_layer = { Error::UnknownLayer("x".into()), "'x'" },
)]
fn error_display_contains(err: Error, expected: &str) {
    assert!(err.to_string().contains(expected));
}

#[test]
fn malformed_push_names_action() {
    let err = Error::MalformedPush { action: "d".into(), reason: "missing path".into() };
    let msg = err.to_string();
    assert!(msg.contains("'d'"));
    assert!(msg.contains("missing path"));
}

#[test]
fn json_error_converts() {
    let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
    assert!(err.to_string().starts_with("json error"));
}
