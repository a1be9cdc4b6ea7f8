// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors surfaced by the `tw` command line.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid config file {path}: {message}")]
    InvalidConfig { path: String, message: String },

    #[error("the server rejected the request: {status}{}", .detail.as_ref().map(|d| format!(" ({})", d)).unwrap_or_default())]
    Rejected {
        status: String,
        detail: Option<String>,
    },

    #[error("merge value must be a JSON object\n  hint: e.g. '{{\"name\": \"Ada\"}}'")]
    MergeNotObject,

    #[error("interrupted before the server acknowledged the request")]
    Interrupted,

    #[error(transparent)]
    Connection(#[from] tw_conn::ConnError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
