// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The session state machine.
//!
//! [`Session`] is synchronous: every input (application call, timer firing,
//! credential resolution, transport event) is a method call that mutates
//! state and may queue outbound requests. The async parts live in
//! [`crate::connection`], which feeds these inputs in and reads back what
//! the session wants next:
//! - [`Session::scheduled_connect`]: the pending connect timer, if any
//! - [`Session::take_token_request`]: a credential fetch to start
//! - [`Session::take_dispatch`]: callbacks to run once the lock is released
//!
//! Lifecycle: `Disconnected` → `Connecting` (credential fetch, then transport
//! open) → `Connected` (ready signal received) → `Disconnected` on any
//! failure, with a reconnect scheduled unless interrupted or offline.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tw_core::protocol::{AuthBody, ListenBody, OnDisconnectBody, UnlistenBody, WriteBody};
use tw_core::{token, Action, ClockSource, Push, Query, QueryId, Request, Response, ServerMessage, Status};

use crate::auth::{AuthTokenProvider, TokenResult};
use crate::backoff::{Backoff, JitterSource};
use crate::config::{AuthOverride, ClientKind, ConnectionConfig};
use crate::error::{ConnError, Result};
use crate::listen::{HashFn, ListenCallback, ListenKey, ListenRegistry, ListenSpec};
use crate::observer::{ConnectionObserver, ServerInfo};
use crate::request::{PendingResponse, RequestTable};
use crate::transport::{ConnectionId, EventSink, OpenRequest, RealtimeChannel, Transport, TransportEvent};
use crate::writes::{
    OnDisconnectKind, OnDisconnectQueue, OnDisconnectRequest, OutstandingWrite, OutstandingWrites,
    WriteCallback, WriteId, WriteKind,
};

/// Interrupt reason recorded when the server kills the connection.
pub const SERVER_KILL_INTERRUPT_REASON: &str = "server_kill";

/// Interrupt reason recorded by [`Session::shutdown`].
pub const SHUTDOWN_INTERRUPT_REASON: &str = "shutdown";

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(0);

/// Work queued for after the session lock is released.
pub type Deferred = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport and no attempt in progress.
    Disconnected,
    /// Fetching a credential or waiting for the transport's ready signal.
    Connecting,
    Connected,
}

/// A credential fetch the driver should start for attempt `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRequest {
    pub id: ConnectionId,
    pub force_refresh: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConnectTimer {
    generation: u64,
    delay_ms: u64,
}

/// The transport held for the current attempt. `channel` is empty while the
/// credential is still being fetched.
struct Realtime {
    id: ConnectionId,
    channel: Option<Box<dyn RealtimeChannel>>,
}

/// Collaborators a session talks to.
pub struct SessionDeps {
    pub transport: Arc<dyn Transport>,
    pub auth: Arc<dyn AuthTokenProvider>,
    pub observer: Arc<dyn ConnectionObserver>,
    pub clock: Arc<dyn ClockSource>,
    pub jitter: Box<dyn JitterSource>,
    pub events: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
}

pub struct Session {
    id: u64,
    config: ConnectionConfig,
    transport: Arc<dyn Transport>,
    auth: Arc<dyn AuthTokenProvider>,
    observer: Arc<dyn ConnectionObserver>,
    clock: Arc<dyn ClockSource>,
    jitter: Box<dyn JitterSource>,
    events: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,

    interrupt_reasons: BTreeSet<String>,
    listens: ListenRegistry,
    writes: OutstandingWrites,
    on_disconnect_queue: OnDisconnectQueue,
    requests: RequestTable,
    connected: bool,
    backoff: Backoff,
    online: bool,
    visible: bool,
    last_session_id: Option<String>,

    realtime: Option<Realtime>,
    token_request: Option<TokenRequest>,
    connect_timer: Option<ConnectTimer>,
    timer_generation: u64,
    next_attempt: u64,

    auth_token: Option<String>,
    force_token_refresh: bool,
    invalid_auth_token_count: u32,

    first_connection: bool,
    last_attempt_ms: Option<u64>,
    last_established_ms: Option<u64>,
    index_warnings: HashSet<(String, String)>,
    dispatch: Vec<Deferred>,
}

impl Session {
    /// Creates a session with a connection attempt scheduled immediately.
    pub fn new(config: ConnectionConfig, deps: SessionDeps) -> Self {
        let mut backoff = Backoff::new(config.reconnect.clone());
        if config.client_kind == ClientKind::Admin {
            backoff.use_admin_max();
        }
        let mut session = Session {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            config,
            transport: deps.transport,
            auth: deps.auth,
            observer: deps.observer,
            clock: deps.clock,
            jitter: deps.jitter,
            events: deps.events,
            interrupt_reasons: BTreeSet::new(),
            listens: ListenRegistry::new(),
            writes: OutstandingWrites::new(),
            on_disconnect_queue: OnDisconnectQueue::new(),
            requests: RequestTable::new(),
            connected: false,
            backoff,
            online: true,
            visible: false,
            last_session_id: None,
            realtime: None,
            token_request: None,
            connect_timer: None,
            timer_generation: 0,
            next_attempt: 0,
            auth_token: None,
            force_token_refresh: false,
            invalid_auth_token_count: 0,
            first_connection: true,
            last_attempt_ms: None,
            last_established_ms: None,
            index_warnings: HashSet::new(),
            dispatch: Vec::new(),
        };
        session.schedule_connect(0);
        session
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        if self.connected {
            ConnectionState::Connected
        } else if self.realtime.is_some() {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Base delay for the next reconnect.
    pub fn reconnect_delay(&self) -> u64 {
        self.backoff.current()
    }

    pub fn max_reconnect_delay(&self) -> u64 {
        self.backoff.max()
    }

    pub fn last_session_id(&self) -> Option<&str> {
        self.last_session_id.as_deref()
    }

    pub fn is_interrupted(&self, reason: &str) -> bool {
        self.interrupt_reasons.contains(reason)
    }

    /// The pending connect timer as `(generation, delay_ms)`.
    pub fn scheduled_connect(&self) -> Option<(u64, u64)> {
        self.connect_timer.map(|t| (t.generation, t.delay_ms))
    }

    pub fn take_token_request(&mut self) -> Option<TokenRequest> {
        self.token_request.take()
    }

    /// The attempt still waiting for its credential, if any.
    pub fn pending_token_attempt(&self) -> Option<ConnectionId> {
        self.realtime
            .as_ref()
            .filter(|r| r.channel.is_none())
            .map(|r| r.id)
    }

    pub fn take_dispatch(&mut self) -> Vec<Deferred> {
        std::mem::take(&mut self.dispatch)
    }

    // Application calls

    /// Registers a listen and sends it if a session is established.
    pub fn listen(
        &mut self,
        query: Query,
        hash_fn: HashFn,
        tag: Option<u64>,
        on_complete: ListenCallback,
    ) -> Result<()> {
        let key = ListenKey::for_query(&query);
        debug!(conn = self.id, listen = %key, "listen called");
        check_query(&query)?;
        let spec = Arc::new(ListenSpec {
            query,
            tag,
            hash_fn,
            on_complete,
        });
        self.listens.insert(key.clone(), Arc::clone(&spec))?;
        if self.connected {
            self.send_listen(key, spec);
        }
        Ok(())
    }

    /// Removes a listen. Only a listen that could have been sent produces
    /// wire traffic; unknown keys are ignored.
    pub fn unlisten(&mut self, query: &Query, tag: Option<u64>) -> Result<()> {
        let key = ListenKey::for_query(query);
        debug!(conn = self.id, listen = %key, "unlisten called");
        check_query(query)?;
        if self.listens.remove(&key).is_some() && self.connected {
            let (query_object, tag) = match tag {
                Some(tag) => (Some(query.query_object()), Some(tag)),
                None => (None, None),
            };
            let body = UnlistenBody {
                path: key.path,
                query: query_object,
                tag,
            };
            self.send_request(Action::Unlisten(body), None);
        }
        Ok(())
    }

    pub fn put(&mut self, path: &str, data: Value, on_complete: Option<WriteCallback>, hash: Option<String>) {
        self.put_internal(WriteKind::Put, path, data, on_complete, hash);
    }

    pub fn merge(&mut self, path: &str, data: Value, on_complete: Option<WriteCallback>, hash: Option<String>) {
        self.put_internal(WriteKind::Merge, path, data, on_complete, hash);
    }

    /// Sends an on-disconnect action now, or queues it for the next session.
    pub fn on_disconnect(
        &mut self,
        kind: OnDisconnectKind,
        path: &str,
        data: Value,
        on_complete: Option<WriteCallback>,
    ) {
        if self.connected {
            self.send_on_disconnect(kind, path.to_string(), data, on_complete);
        } else {
            self.on_disconnect_queue.push_back(OnDisconnectRequest {
                kind,
                path: path.to_string(),
                data,
                on_complete,
            });
        }
    }

    /// Stores a new credential and authenticates with it right away.
    ///
    /// `None` drops authentication on the current session; without a session
    /// the next one simply starts unauthenticated.
    pub fn refresh_auth_token(&mut self, token: Option<String>) {
        debug!(conn = self.id, "auth token refreshed");
        self.auth_token = token.clone();
        match token {
            Some(token) => {
                self.try_auth();
                self.reduce_reconnect_delay_if_admin(&token);
            }
            None => {
                if self.connected {
                    self.send_request(Action::Unauth(Default::default()), None);
                }
            }
        }
    }

    /// Sends usage counters. Dropped when no session is established.
    pub fn report_stats(&mut self, counters: BTreeMap<String, u64>) {
        if self.connected {
            debug!(conn = self.id, ?counters, "report stats");
            let body = tw_core::protocol::StatsBody { counters };
            self.send_request(Action::Stats(body), Some(PendingResponse::Stats));
        }
    }

    /// Suppresses reconnection until `reason` is resumed, closing any
    /// transport held now.
    pub fn interrupt(&mut self, reason: &str) {
        info!(conn = self.id, reason, "interrupting connection");
        self.interrupt_reasons.insert(reason.to_string());
        if self.realtime.is_some() {
            self.close_realtime();
        } else {
            self.connect_timer = None;
            if self.connected {
                self.on_realtime_disconnect();
            }
        }
    }

    pub fn resume(&mut self, reason: &str) {
        info!(conn = self.id, reason, "resuming connection");
        self.interrupt_reasons.remove(reason);
        if self.interrupt_reasons.is_empty() {
            self.backoff.reset();
            if self.realtime.is_none() {
                self.schedule_connect(0);
            }
        }
    }

    /// Stops the session for good.
    pub fn shutdown(&mut self) {
        self.interrupt(SHUTDOWN_INTERRUPT_REASON);
    }

    // Environment

    pub fn on_online(&mut self, online: bool) {
        self.online = online;
        if online {
            debug!(conn = self.id, "went online");
            self.backoff.reset();
            if self.realtime.is_none() {
                self.schedule_connect(0);
            }
        } else {
            debug!(conn = self.id, "went offline, killing connection");
            if self.realtime.is_some() {
                self.close_realtime();
            }
        }
    }

    pub fn on_visible(&mut self, visible: bool) {
        if visible && !self.visible {
            debug!(conn = self.id, "became visible, reducing delay");
            self.backoff.reset();
            if self.realtime.is_none() {
                self.schedule_connect(0);
            }
        }
        self.visible = visible;
    }

    // Driver inputs

    /// The connect timer fired. Stale generations are ignored.
    pub fn on_connect_timer(&mut self, generation: u64) {
        if self.connect_timer.map(|t| t.generation) != Some(generation) {
            return;
        }
        self.connect_timer = None;
        self.establish_connection();
    }

    /// A credential fetch finished.
    pub fn on_token(&mut self, id: ConnectionId, result: TokenResult) {
        if self.pending_token_attempt() != Some(id) {
            debug!(conn = self.id, attempt = %id, "token fetch completed but was canceled");
            return;
        }
        match result {
            Ok(token) => {
                debug!(conn = self.id, attempt = %id, "token fetch completed, opening transport");
                self.auth_token = token.map(|t| t.access_token);
                let request = OpenRequest {
                    id,
                    endpoint: self.config.endpoint.clone(),
                    last_session_id: self.last_session_id.clone(),
                };
                let channel = self.transport.open(request, EventSink::new(id, self.events.clone()));
                if let Some(realtime) = self.realtime.as_mut() {
                    realtime.channel = Some(channel);
                }
            }
            Err(e) => {
                debug!(conn = self.id, attempt = %id, "failed to get token: {}", e);
                if self.config.client_kind == ClientKind::Admin {
                    warn!("{}", e);
                }
                self.close_realtime();
            }
        }
    }

    /// Applies an event reported by the transport of attempt `id`.
    ///
    /// Events from any other attempt are ignored. Returns an error only for
    /// a fatal server-reported protocol violation.
    pub fn on_transport_event(&mut self, id: ConnectionId, event: TransportEvent) -> Result<()> {
        let current = self
            .realtime
            .as_ref()
            .is_some_and(|r| r.id == id && r.channel.is_some());
        if !current {
            debug!(conn = self.id, attempt = %id, "ignoring event from replaced transport");
            return Ok(());
        }
        match event {
            TransportEvent::Ready { timestamp, session_id } => self.on_ready(timestamp, session_id),
            TransportEvent::Message(message) => return self.on_data_message(message),
            TransportEvent::Disconnected => self.on_realtime_disconnect(),
            TransportEvent::Killed(reason) => {
                warn!("{} ({})", reason, self.config.endpoint);
                self.interrupt(SERVER_KILL_INTERRUPT_REASON);
            }
        }
        Ok(())
    }

    // Internals

    fn should_reconnect(&self) -> bool {
        self.interrupt_reasons.is_empty() && self.online
    }

    fn schedule_connect(&mut self, delay_ms: u64) {
        if self.realtime.is_some() {
            warn!(conn = self.id, "connect scheduled while a transport is held");
            return;
        }
        self.timer_generation += 1;
        self.connect_timer = Some(ConnectTimer {
            generation: self.timer_generation,
            delay_ms,
        });
    }

    fn establish_connection(&mut self) {
        if !self.should_reconnect() {
            debug!(conn = self.id, "not connecting: interrupted or offline");
            return;
        }
        let id = ConnectionId {
            session: self.id,
            attempt: self.next_attempt,
        };
        self.next_attempt += 1;
        debug!(conn = self.id, attempt = %id, "making a connection attempt");
        self.last_attempt_ms = Some(self.clock.now_ms());
        self.last_established_ms = None;
        self.realtime = Some(Realtime { id, channel: None });
        self.token_request = Some(TokenRequest {
            id,
            force_refresh: std::mem::take(&mut self.force_token_refresh),
        });
    }

    /// Closes the held transport and handles the disconnect immediately.
    fn close_realtime(&mut self) {
        let Some(realtime) = self.realtime.take() else {
            return;
        };
        if let Some(mut channel) = realtime.channel {
            channel.close();
        }
        self.on_realtime_disconnect();
    }

    fn on_ready(&mut self, timestamp: u64, session_id: String) {
        info!(conn = self.id, session = %session_id, "connection ready");
        let now = self.clock.now_ms();
        self.connected = true;
        self.last_established_ms = Some(now);
        let server_time_offset_ms = timestamp as i64 - now as i64;
        self.notify(move |o| o.on_server_info_update(ServerInfo { server_time_offset_ms }));
        self.last_session_id = Some(session_id);
        if self.first_connection {
            self.send_connect_stats();
        }
        self.restore_state();
        self.first_connection = false;
        self.notify(|o| o.on_connect_status(true));
    }

    fn on_realtime_disconnect(&mut self) {
        debug!(conn = self.id, "data client disconnected");
        self.connected = false;
        self.realtime = None;
        self.token_request = None;

        self.cancel_sent_transactions();
        self.requests.clear();

        if self.should_reconnect() {
            let now = self.clock.now_ms();
            if !self.visible {
                debug!(conn = self.id, "not visible, delaying reconnect");
                self.backoff.force_max();
                self.last_attempt_ms = Some(now);
            } else if let Some(established) = self.last_established_ms.take() {
                if now.saturating_sub(established) > self.backoff.policy().reset_after_ms {
                    self.backoff.reset();
                }
            }

            let elapsed = self.last_attempt_ms.map_or(0, |t| now.saturating_sub(t));
            let delay = self.backoff.next_delay(elapsed, self.jitter.as_mut());
            debug!(conn = self.id, delay_ms = delay, "trying to reconnect");
            self.schedule_connect(delay);
        }
        self.notify(|o| o.on_connect_status(false));
    }

    fn cancel_sent_transactions(&mut self) {
        for write in self.writes.take_transmitted() {
            if let Some(on_complete) = write.on_complete {
                self.defer(move || on_complete(Status::Disconnect, None));
            }
        }
    }

    /// Replays everything the new session needs, in order: auth, listens,
    /// writes, then queued on-disconnect actions.
    fn restore_state(&mut self) {
        self.try_auth();

        let listens: Vec<(ListenKey, Arc<ListenSpec>)> = self
            .listens
            .iter()
            .map(|(key, spec)| (key.clone(), Arc::clone(spec)))
            .collect();
        for (key, spec) in listens {
            self.send_listen(key, spec);
        }

        for id in self.writes.ids() {
            self.send_put(id);
        }

        while let Some(request) = self.on_disconnect_queue.pop_front() {
            self.send_on_disconnect(request.kind, request.path, request.data, request.on_complete);
        }
    }

    fn send_connect_stats(&mut self) {
        let mut counters = BTreeMap::new();
        counters.insert(self.config.connect_stats_key(), 1);
        self.report_stats(counters);
    }

    fn send_request(&mut self, action: Action, pending: Option<PendingResponse>) {
        let id = self.requests.next_id();
        let Some(channel) = self.realtime.as_mut().and_then(|r| r.channel.as_mut()) else {
            warn!(conn = self.id, action = action.code(), "request dropped: no transport");
            return;
        };
        let request = Request::new(id, action);
        debug!(conn = self.id, request = %request.to_json().unwrap_or_default(), "send");
        channel.send_request(&request);
        if let Some(pending) = pending {
            self.requests.insert(id, pending);
        }
    }

    fn send_listen(&mut self, key: ListenKey, spec: Arc<ListenSpec>) {
        debug!(conn = self.id, listen = %key, "listen");
        let (query, tag) = match spec.tag {
            Some(tag) => (Some(spec.query.query_object()), Some(tag)),
            None => (None, None),
        };
        let body = ListenBody {
            path: key.path.clone(),
            query,
            tag,
            hash: (spec.hash_fn)(),
        };
        self.send_request(Action::Listen(body), Some(PendingResponse::Listen { key, spec }));
    }

    fn put_internal(
        &mut self,
        kind: WriteKind,
        path: &str,
        data: Value,
        on_complete: Option<WriteCallback>,
        hash: Option<String>,
    ) {
        let body = WriteBody {
            path: path.to_string(),
            data,
            hash,
        };
        let id = self.writes.push(OutstandingWrite {
            kind,
            body,
            on_complete,
            queued: false,
        });
        if self.connected {
            self.send_put(id);
        } else {
            debug!(conn = self.id, path, "buffering put");
        }
    }

    fn send_put(&mut self, id: WriteId) {
        let connected = self.connected;
        let Some(write) = self.writes.get_mut(id) else {
            return;
        };
        write.queued = connected;
        let action = write.action();
        self.send_request(action, Some(PendingResponse::Write(id)));
    }

    fn send_on_disconnect(
        &mut self,
        kind: OnDisconnectKind,
        path: String,
        data: Value,
        on_complete: Option<WriteCallback>,
    ) {
        debug!(conn = self.id, ?kind, path = %path, "on disconnect");
        let action = kind.action(OnDisconnectBody { path, data });
        self.send_request(action, Some(PendingResponse::OnDisconnect(on_complete)));
    }

    fn try_auth(&mut self) {
        if !self.connected {
            return;
        }
        let Some(token) = self.auth_token.clone() else {
            return;
        };
        let mut body = AuthBody {
            cred: token.clone(),
            noauth: None,
            authvar: None,
        };
        match &self.config.auth_override {
            AuthOverride::Default => {}
            AuthOverride::NoAuth => body.noauth = Some(true),
            AuthOverride::Vars(vars) => body.authvar = Some(vars.clone()),
        }
        let action = if token::is_valid_format(&token) {
            Action::Auth(body)
        } else {
            Action::GAuth(body)
        };
        self.send_request(action, Some(PendingResponse::Auth { token }));
    }

    fn reduce_reconnect_delay_if_admin(&mut self, credential: &str) {
        if token::is_legacy_secret(credential) || token::is_admin(credential) {
            debug!(conn = self.id, "admin credential detected, reducing max reconnect time");
            self.backoff.use_admin_max();
        }
    }

    fn on_data_message(&mut self, message: Value) -> Result<()> {
        match ServerMessage::from_value(message) {
            Ok(ServerMessage::Response { id, body }) => {
                debug!(conn = self.id, request = id, %body, "from server");
                if let Some(pending) = self.requests.take(id) {
                    self.on_response(pending, Response::from_body(&body));
                }
            }
            Ok(ServerMessage::Push(push)) => self.on_data_push(push),
            Ok(ServerMessage::Error(message)) => {
                error!(conn = self.id, "a server-side error has occurred: {}", message);
                return Err(ConnError::ServerError(message));
            }
            Err(e) => error!(conn = self.id, "{}", e),
        }
        Ok(())
    }

    fn on_response(&mut self, pending: PendingResponse, response: Response) {
        let Response { status, data } = response;
        match pending {
            PendingResponse::Listen { key, spec } => {
                self.warn_on_listen_warnings(&spec.query, data.as_ref());
                if self.listens.is_current(&key, &spec) {
                    debug!(conn = self.id, listen = %key, %status, "listen response");
                    if !status.is_ok() {
                        self.listens.remove(&key);
                    }
                    let on_complete = Arc::clone(&spec.on_complete);
                    self.defer(move || on_complete(status, data));
                }
            }
            PendingResponse::Write(id) => {
                debug!(conn = self.id, write = %id, %status, "put response");
                if let Some(on_complete) = self.writes.complete(id).and_then(|w| w.on_complete) {
                    self.defer(move || on_complete(status, data));
                }
            }
            PendingResponse::OnDisconnect(on_complete) => {
                if let Some(on_complete) = on_complete {
                    self.defer(move || on_complete(status, data));
                }
            }
            PendingResponse::Auth { token } => {
                if self.auth_token.as_deref() == Some(token.as_str()) {
                    if status.is_ok() {
                        self.invalid_auth_token_count = 0;
                    } else {
                        let explanation = data
                            .as_ref()
                            .and_then(Value::as_str)
                            .unwrap_or("error")
                            .to_string();
                        self.on_auth_revoked(status, &explanation);
                    }
                }
            }
            PendingResponse::Stats => {
                if !status.is_ok() {
                    debug!(conn = self.id, "error sending stats: {:?}", data);
                }
            }
        }
    }

    fn warn_on_listen_warnings(&mut self, query: &Query, data: Option<&Value>) {
        let no_index = data
            .and_then(|d| d.get("w"))
            .and_then(Value::as_array)
            .is_some_and(|w| w.iter().any(|v| v.as_str() == Some("no_index")));
        if !no_index {
            return;
        }
        let path = query.path.to_string();
        let index = query.params.index.to_string();
        if self.index_warnings.insert((path.clone(), index.clone())) {
            warn!(
                "Using an unspecified index. Your data will be downloaded and filtered on the \
                 client. Consider adding \".indexOn\": \"{}\" at {} to your security rules for \
                 better performance.",
                index, path
            );
        }
    }

    fn on_data_push(&mut self, push: Push) {
        match push {
            Push::Data { path, data, tag } => {
                self.notify(move |o| o.on_data_update(&path, &data, false, tag));
            }
            Push::Merge { path, data, tag } => {
                self.notify(move |o| o.on_data_update(&path, &data, true, tag));
            }
            Push::ListenRevoked { path, query } => self.on_listen_revoked(&path, query.as_ref()),
            Push::AuthRevoked { status, explanation } => {
                self.on_auth_revoked(status, explanation.as_deref().unwrap_or_default());
            }
            Push::SecurityDebug(body) => self.notify(move |o| o.on_security_debug(&body)),
            Push::Unknown { action, body } => {
                error!(
                    conn = self.id,
                    "unrecognized action received from server: {} {}; are you using the latest client?",
                    action,
                    body
                );
            }
        }
    }

    fn on_listen_revoked(&mut self, path: &str, query: Option<&Value>) {
        let key = ListenKey::new(path, QueryId::from_wire(query));
        debug!(conn = self.id, listen = %key, "listen revoked");
        if let Some(spec) = self.listens.remove(&key) {
            let on_complete = Arc::clone(&spec.on_complete);
            self.defer(move || on_complete(Status::PermissionDenied, None));
        }
    }

    fn on_auth_revoked(&mut self, status: Status, explanation: &str) {
        info!(conn = self.id, "auth token revoked: {}/{}", status, explanation);
        self.auth_token = None;
        self.force_token_refresh = true;
        self.close_realtime();
        if status.is_credential_rejection() {
            self.invalid_auth_token_count += 1;
            if self.invalid_auth_token_count >= self.backoff.policy().invalid_token_threshold {
                self.backoff.force_admin_max();
                let auth = Arc::clone(&self.auth);
                self.defer(move || auth.notify_for_invalid_token());
            }
        }
    }

    fn defer(&mut self, f: impl FnOnce() + Send + 'static) {
        self.dispatch.push(Box::new(f));
    }

    fn notify(&mut self, f: impl FnOnce(&dyn ConnectionObserver) + Send + 'static) {
        let observer = Arc::clone(&self.observer);
        self.defer(move || f(observer.as_ref()));
    }
}

fn check_query(query: &Query) -> Result<()> {
    if !query.params.is_default() && query.params.loads_all_data() {
        return Err(ConnError::InvalidQuery {
            path: query.path.to_string(),
            query_id: query.query_identifier().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
