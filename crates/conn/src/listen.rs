// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Active listen registrations.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tw_core::{Path, Query, QueryId, Status};

use crate::error::{ConnError, Result};

/// Produces the hash of the locally cached data for a listen.
///
/// Called with the connection's session locked, so it must not call back
/// into the connection.
pub type HashFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Receives the outcome of a listen: the response status and any payload,
/// or `permission_denied` when the server revokes it later.
pub type ListenCallback = Arc<dyn Fn(Status, Option<Value>) + Send + Sync>;

/// Registration key: normalized path plus query identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenKey {
    pub path: String,
    pub query_id: QueryId,
}

impl ListenKey {
    pub fn new(path: &str, query_id: QueryId) -> Self {
        ListenKey {
            path: Path::normalize(path),
            query_id,
        }
    }

    pub fn for_query(query: &Query) -> Self {
        ListenKey {
            path: query.path.to_string(),
            query_id: query.query_identifier(),
        }
    }
}

impl fmt::Display for ListenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.query_id)
    }
}

pub struct ListenSpec {
    pub query: Query,
    /// Distinguishes non-default queries on the same path. Only tagged
    /// listens send their query object.
    pub tag: Option<u64>,
    pub hash_fn: HashFn,
    pub on_complete: ListenCallback,
}

impl fmt::Debug for ListenSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenSpec")
            .field("query", &self.query)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// At most one listen per key.
#[derive(Debug, Default)]
pub struct ListenRegistry {
    listens: BTreeMap<ListenKey, Arc<ListenSpec>>,
}

impl ListenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listen, refusing to replace an existing one.
    pub fn insert(&mut self, key: ListenKey, spec: Arc<ListenSpec>) -> Result<()> {
        if self.listens.contains_key(&key) {
            return Err(ConnError::DuplicateListen {
                path: key.path,
                query_id: key.query_id.to_string(),
            });
        }
        self.listens.insert(key, spec);
        Ok(())
    }

    pub fn get(&self, key: &ListenKey) -> Option<&Arc<ListenSpec>> {
        self.listens.get(key)
    }

    pub fn remove(&mut self, key: &ListenKey) -> Option<Arc<ListenSpec>> {
        self.listens.remove(key)
    }

    /// True if `spec` is still the registration held for `key`.
    pub fn is_current(&self, key: &ListenKey, spec: &Arc<ListenSpec>) -> bool {
        self.listens.get(key).is_some_and(|held| Arc::ptr_eq(held, spec))
    }

    /// All registrations in key order (grouped by path).
    pub fn iter(&self) -> impl Iterator<Item = (&ListenKey, &Arc<ListenSpec>)> {
        self.listens.iter()
    }

    pub fn len(&self) -> usize {
        self.listens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listens.is_empty()
    }
}

#[cfg(test)]
#[path = "listen_tests.rs"]
mod tests;
