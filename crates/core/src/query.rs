// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Query parameters and query identity.
//!
//! A listen is keyed by its normalized path plus a [`QueryId`]. The identifier
//! is `default` for an unfiltered listen and otherwise the canonical (sorted
//! key) JSON of the query object sent on the wire.

use std::fmt;

use serde_json::{Map, Value};

use crate::path::Path;

const INDEX_START_VALUE: &str = "sp";
const INDEX_START_NAME: &str = "sn";
const INDEX_END_VALUE: &str = "ep";
const INDEX_END_NAME: &str = "en";
const LIMIT: &str = "l";
const VIEW_FROM: &str = "vf";
const INDEX: &str = "i";

const DEFAULT_QUERY_ID: &str = "default";

/// Ordering index for a query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Index {
    #[default]
    Priority,
    Key,
    Value,
    /// Order by the value at a child path.
    Child(Path),
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::Priority => f.write_str(".priority"),
            Index::Key => f.write_str(".key"),
            Index::Value => f.write_str(".value"),
            Index::Child(path) => f.write_str(&path.pieces().join("/")),
        }
    }
}

/// Which end of the ordered range a limit keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewFrom {
    Left,
    Right,
}

impl ViewFrom {
    fn as_str(self) -> &'static str {
        match self {
            ViewFrom::Left => "l",
            ViewFrom::Right => "r",
        }
    }
}

/// A start or end bound: an index value and an optional child key tiebreak.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub value: Value,
    pub name: Option<String>,
}

impl Bound {
    pub fn new(value: Value) -> Self {
        Bound { value, name: None }
    }

    pub fn with_name(value: Value, name: impl Into<String>) -> Self {
        Bound { value, name: Some(name.into()) }
    }
}

/// Filtering and ordering applied to a listen.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryParams {
    pub index: Index,
    pub start: Option<Bound>,
    pub end: Option<Bound>,
    pub limit: Option<(u32, ViewFrom)>,
}

impl QueryParams {
    pub fn order_by(mut self, index: Index) -> Self {
        self.index = index;
        self
    }

    pub fn start_at(mut self, bound: Bound) -> Self {
        self.start = Some(bound);
        self
    }

    pub fn end_at(mut self, bound: Bound) -> Self {
        self.end = Some(bound);
        self
    }

    pub fn limit_to_first(mut self, limit: u32) -> Self {
        self.limit = Some((limit, ViewFrom::Left));
        self
    }

    pub fn limit_to_last(mut self, limit: u32) -> Self {
        self.limit = Some((limit, ViewFrom::Right));
        self
    }

    /// True when no bounds or limit are set.
    pub fn loads_all_data(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.limit.is_none()
    }

    /// True for an unfiltered listen on the default index.
    pub fn is_default(&self) -> bool {
        self.loads_all_data() && self.index == Index::Priority
    }

    /// The query object sent with non-default listens.
    pub fn query_object(&self) -> Map<String, Value> {
        let mut obj = Map::new();
        if let Some(start) = &self.start {
            obj.insert(INDEX_START_VALUE.into(), start.value.clone());
            if let Some(name) = &start.name {
                obj.insert(INDEX_START_NAME.into(), Value::String(name.clone()));
            }
        }
        if let Some(end) = &self.end {
            obj.insert(INDEX_END_VALUE.into(), end.value.clone());
            if let Some(name) = &end.name {
                obj.insert(INDEX_END_NAME.into(), Value::String(name.clone()));
            }
        }
        if let Some((limit, view_from)) = self.limit {
            obj.insert(LIMIT.into(), Value::from(limit));
            obj.insert(VIEW_FROM.into(), Value::String(view_from.as_str().into()));
        }
        // Priority is the server default, so it is never sent.
        if self.index != Index::Priority {
            obj.insert(INDEX.into(), Value::String(self.index.to_string()));
        }
        obj
    }

    pub fn query_identifier(&self) -> QueryId {
        QueryId::from_object(&self.query_object())
    }
}

/// Identity of a query at a given path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(String);

impl QueryId {
    pub fn default_id() -> Self {
        QueryId(DEFAULT_QUERY_ID.to_string())
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_QUERY_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        if obj.is_empty() {
            return QueryId::default_id();
        }
        QueryId(canonical_json(&Value::Object(obj.clone())))
    }

    /// Rebuilds the identifier from the `q` field of a listen revocation.
    ///
    /// The server sends either nothing (default query) or an array of query
    /// objects whose canonical forms are joined with `$`.
    pub fn from_wire(query: Option<&Value>) -> Self {
        match query {
            None | Some(Value::Null) => QueryId::default_id(),
            Some(Value::Array(items)) => {
                QueryId(items.iter().map(canonical_json).collect::<Vec<_>>().join("$"))
            }
            Some(Value::Object(obj)) => QueryId::from_object(obj),
            Some(other) => QueryId(canonical_json(other)),
        }
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compact JSON with object keys in sorted order.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(obj) => {
            let mut entries: Vec<(&String, &Value)> = obj.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), canonical_json(v)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}

/// A listen target: a location plus the parameters filtering it.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub path: Path,
    pub params: QueryParams,
}

impl Query {
    pub fn new(path: impl Into<Path>, params: QueryParams) -> Self {
        Query { path: path.into(), params }
    }

    /// An unfiltered listen at `path`.
    pub fn at(path: impl Into<Path>) -> Self {
        Query::new(path, QueryParams::default())
    }

    pub fn query_identifier(&self) -> QueryId {
        self.params.query_identifier()
    }

    pub fn query_object(&self) -> Map<String, Value> {
        self.params.query_object()
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
