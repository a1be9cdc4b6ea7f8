// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn default_query_identifier() {
    let query = Query::at("/users");
    assert!(query.params.is_default());
    assert!(query.query_identifier().is_default());
    assert_eq!(query.query_identifier().as_str(), "default");
    assert!(query.query_object().is_empty());
}

#[test]
fn ordered_but_unbounded_is_not_default() {
    let params = QueryParams::default().order_by(Index::Key);
    assert!(params.loads_all_data());
    assert!(!params.is_default());
    assert_eq!(params.query_identifier().as_str(), r#"{"i":".key"}"#);
}

#[test]
fn query_object_wire_keys() {
    let params = QueryParams::default()
        .order_by(Index::Child(Path::new("age")))
        .start_at(Bound::with_name(json!(18), "a"))
        .end_at(Bound::new(json!(65)))
        .limit_to_last(10);
    let obj = Value::Object(params.query_object());
    assert_eq!(
        obj,
        json!({"sp": 18, "sn": "a", "ep": 65, "l": 10, "vf": "r", "i": "age"})
    );
}

#[test]
fn identifier_has_sorted_keys() {
    let params = QueryParams::default().order_by(Index::Value).limit_to_first(3);
    assert_eq!(params.query_identifier().as_str(), r#"{"i":".value","l":3,"vf":"l"}"#);
}

#[test]
fn identical_params_share_identifier() {
    let a = QueryParams::default().order_by(Index::Key).limit_to_first(5);
    let b = QueryParams::default().limit_to_first(5).order_by(Index::Key);
    assert_eq!(a.query_identifier(), b.query_identifier());
}

#[parameterized(
    priority = { Index::Priority, ".priority" },
    key = { Index::Key, ".key" },
    value = { Index::Value, ".value" },
    child = { Index::Child(Path::new("/meta/score")), "meta/score" },
)]
fn index_display(index: Index, expected: &str) {
    assert_eq!(index.to_string(), expected);
}

#[test]
fn wire_identifier_absent_is_default() {
    assert!(QueryId::from_wire(None).is_default());
    assert!(QueryId::from_wire(Some(&Value::Null)).is_default());
}

#[test]
fn wire_identifier_matches_local_identifier() {
    let params = QueryParams::default().order_by(Index::Key).limit_to_first(2);
    let wire = json!([{"l": 2, "vf": "l", "i": ".key"}]);
    assert_eq!(QueryId::from_wire(Some(&wire)), params.query_identifier());
}

#[test]
fn wire_identifier_joins_array_items() {
    let wire = json!([{"b": 1, "a": 2}, "x"]);
    assert_eq!(QueryId::from_wire(Some(&wire)).as_str(), r#"{"a":2,"b":1}$"x""#);
}
