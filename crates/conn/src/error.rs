// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for tw-conn operations.

use thiserror::Error;

/// Errors raised by the connection API.
///
/// Per-request server failures are not errors here: they reach the
/// request's completion callback as a status.
#[derive(Debug, Error)]
pub enum ConnError {
    #[error("listen() called twice for {path} with query '{query_id}'")]
    DuplicateListen { path: String, query_id: String },

    #[error("non-default query '{query_id}' at {path} loads all data")]
    InvalidQuery { path: String, query_id: String },

    #[error("unknown event type: '{0}'")]
    UnknownEvent(String),

    #[error("a server-side error has occurred: {0}")]
    ServerError(String),

    #[error("connection task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A specialized Result type for tw-conn operations.
pub type Result<T> = std::result::Result<T, ConnError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
