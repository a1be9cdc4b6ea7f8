// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response correlation.

use std::collections::HashMap;
use std::sync::Arc;

use tw_core::RequestId;

use crate::listen::{ListenKey, ListenSpec};
use crate::writes::{WriteCallback, WriteId};

/// What to do when the response to a request arrives.
pub enum PendingResponse {
    /// Act only if `spec` is still the registration for `key`.
    Listen { key: ListenKey, spec: Arc<ListenSpec> },
    Write(WriteId),
    OnDisconnect(Option<WriteCallback>),
    /// Act only if `token` is still the stored credential.
    Auth { token: String },
    Stats,
}

impl std::fmt::Debug for PendingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingResponse::Listen { key, .. } => f.debug_struct("Listen").field("key", key).finish(),
            PendingResponse::Write(id) => f.debug_tuple("Write").field(id).finish(),
            PendingResponse::OnDisconnect(_) => f.write_str("OnDisconnect"),
            PendingResponse::Auth { .. } => f.write_str("Auth"),
            PendingResponse::Stats => f.write_str("Stats"),
        }
    }
}

/// Request numbers and their pending responses.
///
/// Numbers keep increasing across sessions; the pending entries are dropped
/// wholesale when a session ends.
#[derive(Debug, Default)]
pub struct RequestTable {
    last_id: RequestId,
    pending: HashMap<RequestId, PendingResponse>,
}

impl RequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> RequestId {
        self.last_id += 1;
        self.last_id
    }

    pub fn insert(&mut self, id: RequestId, pending: PendingResponse) {
        self.pending.insert(id, pending);
    }

    pub fn take(&mut self, id: RequestId) -> Option<PendingResponse> {
        self.pending.remove(&id)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
