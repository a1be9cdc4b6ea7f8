// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Outstanding writes and queued on-disconnect actions.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde_json::Value;
use tw_core::protocol::{OnDisconnectBody, WriteBody};
use tw_core::{Action, Status};

/// Receives the outcome of a write or on-disconnect request.
pub type WriteCallback = Box<dyn FnOnce(Status, Option<Value>) + Send>;

/// Stable identity of an outstanding write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WriteId(u64);

impl fmt::Display for WriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Put,
    Merge,
}

pub struct OutstandingWrite {
    pub kind: WriteKind,
    pub body: WriteBody,
    pub on_complete: Option<WriteCallback>,
    /// Set once the write has been handed to a live channel. A transmitted
    /// write is cancelled when that channel dies.
    pub queued: bool,
}

impl OutstandingWrite {
    pub fn action(&self) -> Action {
        match self.kind {
            WriteKind::Put => Action::Put(self.body.clone()),
            WriteKind::Merge => Action::Merge(self.body.clone()),
        }
    }
}

impl fmt::Debug for OutstandingWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutstandingWrite")
            .field("kind", &self.kind)
            .field("body", &self.body)
            .field("queued", &self.queued)
            .finish_non_exhaustive()
    }
}

/// Writes awaiting acknowledgement, in submission order.
///
/// Ids are never reused while any write is outstanding; the counter restarts
/// once the table drains.
#[derive(Debug, Default)]
pub struct OutstandingWrites {
    writes: BTreeMap<WriteId, OutstandingWrite>,
    next_id: u64,
}

impl OutstandingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: OutstandingWrite) -> WriteId {
        let id = WriteId(self.next_id);
        self.next_id += 1;
        self.writes.insert(id, write);
        id
    }

    pub fn get_mut(&mut self, id: WriteId) -> Option<&mut OutstandingWrite> {
        self.writes.get_mut(&id)
    }

    /// Removes an acknowledged write.
    pub fn complete(&mut self, id: WriteId) -> Option<OutstandingWrite> {
        let write = self.writes.remove(&id);
        self.compact();
        write
    }

    /// Removes every write that was transmitted, in submission order.
    pub fn take_transmitted(&mut self) -> Vec<OutstandingWrite> {
        let ids: Vec<WriteId> = self
            .writes
            .iter()
            .filter(|(_, w)| w.queued)
            .map(|(id, _)| *id)
            .collect();
        let taken = ids.iter().filter_map(|id| self.writes.remove(id)).collect();
        self.compact();
        taken
    }

    pub fn ids(&self) -> Vec<WriteId> {
        self.writes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    fn compact(&mut self) {
        if self.writes.is_empty() {
            self.next_id = 0;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDisconnectKind {
    Put,
    Merge,
    Cancel,
}

impl OnDisconnectKind {
    pub fn action(self, body: OnDisconnectBody) -> Action {
        match self {
            OnDisconnectKind::Put => Action::OnDisconnectPut(body),
            OnDisconnectKind::Merge => Action::OnDisconnectMerge(body),
            OnDisconnectKind::Cancel => Action::OnDisconnectCancel(body),
        }
    }
}

pub struct OnDisconnectRequest {
    pub kind: OnDisconnectKind,
    pub path: String,
    pub data: Value,
    pub on_complete: Option<WriteCallback>,
}

impl fmt::Debug for OnDisconnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnDisconnectRequest")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

/// On-disconnect actions registered while no session was available.
pub type OnDisconnectQueue = VecDeque<OnDisconnectRequest>;

#[cfg(test)]
#[path = "writes_tests.rs"]
mod tests;
