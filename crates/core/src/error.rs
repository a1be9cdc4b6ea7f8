// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for tw-core operations.

use thiserror::Error;

/// All possible errors that can occur while decoding wire data.
#[derive(Debug, Error)]
pub enum Error {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed server message: {0}")]
    MalformedMessage(String),

    #[error("malformed push '{action}': {reason}")]
    MalformedPush { action: String, reason: String },

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("unknown protocol layer: '{0}'")]
    UnknownLayer(String),
}

/// A specialized Result type for tw-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
