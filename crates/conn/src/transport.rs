// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the realtime channel.
//!
//! Provides a trait-based transport layer that enables:
//! - Real WebSocket connections for production
//! - Mock transports for unit testing
//!
//! A transport reports what happens on a channel through an [`EventSink`].
//! Every event is tagged with the [`ConnectionId`] of the attempt that opened
//! the channel, so events from a replaced channel can be told apart.

use std::fmt;

use serde_json::Value;
use tokio::sync::mpsc;
use tw_core::Request;

use crate::config::Endpoint;

/// Identifies one connection attempt: `<session>:<attempt>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId {
    pub session: u64,
    pub attempt: u64,
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.session, self.attempt)
    }
}

/// Events a transport reports about its channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The server accepted the connection.
    Ready { timestamp: u64, session_id: String },
    /// A decoded data message.
    Message(Value),
    /// The channel ended, for any reason.
    Disconnected,
    /// The server shut the connection down and asked the client not to retry.
    Killed(String),
}

/// Sending half of the transport event channel, bound to one attempt.
#[derive(Debug, Clone)]
pub struct EventSink {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
}

impl EventSink {
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>) -> Self {
        EventSink { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Reports an event. Returns false once the connection is gone.
    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx.send((self.id, event)).is_ok()
    }
}

/// Everything a transport needs to open a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub id: ConnectionId,
    pub endpoint: Endpoint,
    /// Session to resume, if the server still remembers it.
    pub last_session_id: Option<String>,
}

/// An open (or opening) duplex channel.
pub trait RealtimeChannel: Send {
    /// Queues a request for transmission.
    fn send_request(&mut self, request: &Request);

    /// Closes the channel. No further events are expected to matter.
    fn close(&mut self);
}

/// Opens channels to the server.
pub trait Transport: Send + Sync {
    /// Starts opening a channel. Readiness, inbound messages and termination
    /// are reported through `sink`.
    fn open(&self, request: OpenRequest, sink: EventSink) -> Box<dyn RealtimeChannel>;
}
