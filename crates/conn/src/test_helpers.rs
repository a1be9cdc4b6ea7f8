// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test doubles for connection tests.

#![allow(clippy::unwrap_used)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tw_core::{ClockSource, Request};

use crate::auth::{AuthError, AuthToken, AuthTokenProvider, TokenResult};
use crate::observer::{ConnectionObserver, ServerInfo};
use crate::transport::{ConnectionId, EventSink, OpenRequest, RealtimeChannel, Transport};

#[derive(Default)]
struct MockTransportState {
    opened: Vec<OpenRequest>,
    sinks: Vec<EventSink>,
    sent: Vec<(ConnectionId, Request)>,
    closed: Vec<ConnectionId>,
}

/// Records every channel opened and every request sent.
#[derive(Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockTransportState>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opened(&self) -> Vec<OpenRequest> {
        self.state.lock().unwrap().opened.clone()
    }

    pub fn last_sink(&self) -> Option<EventSink> {
        self.state.lock().unwrap().sinks.last().cloned()
    }

    pub fn sent(&self) -> Vec<Request> {
        self.state.lock().unwrap().sent.iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn sent_codes(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().sent.iter().map(|(_, r)| r.action.code()).collect()
    }

    /// The most recent request with the given action code.
    pub fn last_sent(&self, code: &str) -> Option<Request> {
        self.sent().into_iter().rev().find(|r| r.action.code() == code)
    }

    pub fn clear_sent(&self) {
        self.state.lock().unwrap().sent.clear();
    }

    pub fn closed(&self) -> Vec<ConnectionId> {
        self.state.lock().unwrap().closed.clone()
    }
}

impl Transport for MockTransport {
    fn open(&self, request: OpenRequest, sink: EventSink) -> Box<dyn RealtimeChannel> {
        let id = request.id;
        let mut state = self.state.lock().unwrap();
        state.opened.push(request);
        state.sinks.push(sink);
        Box::new(MockChannel {
            id,
            state: Arc::clone(&self.state),
        })
    }
}

struct MockChannel {
    id: ConnectionId,
    state: Arc<Mutex<MockTransportState>>,
}

impl RealtimeChannel for MockChannel {
    fn send_request(&mut self, request: &Request) {
        self.state.lock().unwrap().sent.push((self.id, request.clone()));
    }

    fn close(&mut self) {
        self.state.lock().unwrap().closed.push(self.id);
    }
}

/// Hands out a configurable token and counts calls.
#[derive(Default)]
pub struct MockTokenProvider {
    token: Mutex<Option<String>>,
    fail: AtomicBool,
    requests: Mutex<Vec<bool>>,
    invalid_notices: AtomicUsize,
}

impl MockTokenProvider {
    pub fn new(token: Option<&str>) -> Arc<Self> {
        let provider = Self::default();
        *provider.token.lock().unwrap() = token.map(str::to_string);
        Arc::new(provider)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// The `force_refresh` flag of every fetch so far.
    pub fn requests(&self) -> Vec<bool> {
        self.requests.lock().unwrap().clone()
    }

    pub fn invalid_notices(&self) -> usize {
        self.invalid_notices.load(Ordering::SeqCst)
    }

    pub fn resolve(&self, force_refresh: bool) -> TokenResult {
        self.requests.lock().unwrap().push(force_refresh);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AuthError::Fetch("provider unavailable".into()));
        }
        Ok(self.token.lock().unwrap().clone().map(AuthToken::new))
    }
}

impl AuthTokenProvider for MockTokenProvider {
    fn get_token(
        &self,
        force_refresh: bool,
    ) -> Pin<Box<dyn Future<Output = TokenResult> + Send + '_>> {
        let result = self.resolve(force_refresh);
        Box::pin(async move { result })
    }

    fn notify_for_invalid_token(&self) {
        self.invalid_notices.fetch_add(1, Ordering::SeqCst);
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Arc<Self> {
        Arc::new(ManualClock {
            now: AtomicU64::new(start_ms),
        })
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl ClockSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Data {
        path: String,
        data: Value,
        is_merge: bool,
        tag: Option<u64>,
    },
    Status(bool),
    ServerInfo(ServerInfo),
    SecurityDebug(Value),
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Observed> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Observed::Status(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

impl ConnectionObserver for RecordingObserver {
    fn on_data_update(&self, path: &str, data: &Value, is_merge: bool, tag: Option<u64>) {
        self.events.lock().unwrap().push(Observed::Data {
            path: path.to_string(),
            data: data.clone(),
            is_merge,
            tag,
        });
    }

    fn on_connect_status(&self, connected: bool) {
        self.events.lock().unwrap().push(Observed::Status(connected));
    }

    fn on_server_info_update(&self, info: ServerInfo) {
        self.events.lock().unwrap().push(Observed::ServerInfo(info));
    }

    fn on_security_debug(&self, body: &Value) {
        self.events.lock().unwrap().push(Observed::SecurityDebug(body.clone()));
    }
}

/// Jitter that always uses the full delay.
pub fn full_jitter() -> Box<dyn crate::backoff::JitterSource> {
    Box::new(|| 1.0)
}
