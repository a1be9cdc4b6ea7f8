// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tw-conn: Persistent realtime connection
//!
//! A long-lived, auto-reconnecting session manager that multiplexes listens,
//! writes and on-disconnect actions over a single transport. The session
//! state machine lives in [`session`]; [`PersistentConnection`] drives it
//! from a tokio task.

pub mod auth;
pub mod backoff;
pub mod config;
pub mod connection;
pub mod emitter;
pub mod error;
pub mod listen;
pub mod monitor;
pub mod observer;
pub mod request;
pub mod session;
pub mod transport;
pub mod websocket;
pub mod writes;

#[cfg(test)]
mod test_helpers;

pub use auth::{AuthError, AuthToken, AuthTokenProvider, StaticTokenProvider};
pub use backoff::{Backoff, JitterSource, RandomJitter};
pub use config::{AuthOverride, ClientKind, ConnectionConfig, Endpoint, ReconnectPolicy};
pub use connection::{Collaborators, PersistentConnection};
pub use emitter::{EventEmitter, EventSource, SubscriptionId};
pub use error::{ConnError, Result};
pub use listen::{HashFn, ListenCallback};
pub use monitor::{Environment, OnlineMonitor, VisibilityMonitor};
pub use observer::{ConnectionObserver, ServerInfo};
pub use session::ConnectionState;
pub use transport::{ConnectionId, EventSink, OpenRequest, RealtimeChannel, Transport, TransportEvent};
pub use websocket::WebSocketTransport;
pub use writes::{OnDisconnectKind, WriteCallback};
