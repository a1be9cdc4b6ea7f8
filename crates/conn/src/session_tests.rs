// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use super::*;
use crate::test_helpers::{full_jitter, ManualClock, MockTokenProvider, MockTransport, Observed, RecordingObserver};
use serde_json::json;
use std::sync::Mutex;
use tw_core::{Index, QueryParams};

/// Claims `{"iat":1,"admin":true}`.
fn admin_jwt() -> String {
    "eyJhbGciOiJub25lIn0.eyJpYXQiOjEsImFkbWluIjp0cnVlfQ.sig".to_string()
}

const START_MS: u64 = 1_000_000;

struct Harness {
    session: Session,
    transport: Arc<MockTransport>,
    auth: Arc<MockTokenProvider>,
    clock: Arc<ManualClock>,
    observer: Arc<RecordingObserver>,
    _events: mpsc::UnboundedReceiver<(ConnectionId, TransportEvent)>,
}

impl Harness {
    fn new() -> Self {
        Self::build(ConnectionConfig::default(), None)
    }

    fn with_token(token: &str) -> Self {
        Self::build(ConnectionConfig::default(), Some(token))
    }

    fn build(config: ConnectionConfig, token: Option<&str>) -> Self {
        let transport = MockTransport::new();
        let auth = MockTokenProvider::new(token);
        let clock = ManualClock::new(START_MS);
        let observer = RecordingObserver::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut session = Session::new(
            config,
            SessionDeps {
                transport: transport.clone(),
                auth: auth.clone(),
                observer: observer.clone(),
                clock: clock.clone(),
                jitter: full_jitter(),
                events: tx,
            },
        );
        session.on_visible(true);
        let mut harness = Harness {
            session,
            transport,
            auth,
            clock,
            observer,
            _events: rx,
        };
        harness.run();
        harness
    }

    fn run(&mut self) {
        for deferred in self.session.take_dispatch() {
            deferred();
        }
    }

    fn fire_timer(&mut self) {
        let (generation, _) = self.session.scheduled_connect().expect("no connect scheduled");
        self.session.on_connect_timer(generation);
    }

    /// Resolves the pending credential fetch; returns the attempt id.
    fn deliver_token(&mut self) -> ConnectionId {
        let request = self.session.take_token_request().expect("no token request");
        let result = self.auth.resolve(request.force_refresh);
        self.session.on_token(request.id, result);
        self.run();
        request.id
    }

    fn ready(&mut self, id: ConnectionId) {
        let timestamp = self.clock.now_ms();
        let session_id = format!("sess{}", id.attempt);
        self.event(id, TransportEvent::Ready { timestamp, session_id });
    }

    /// Runs a full connection cycle up to the ready signal.
    fn connect(&mut self) -> ConnectionId {
        self.fire_timer();
        let id = self.deliver_token();
        self.ready(id);
        id
    }

    fn event(&mut self, id: ConnectionId, event: TransportEvent) {
        self.session.on_transport_event(id, event).unwrap();
        self.run();
    }

    fn respond(&mut self, id: ConnectionId, request: &Request, status: Status) {
        self.respond_with(id, request, status, None);
    }

    fn respond_with(&mut self, id: ConnectionId, request: &Request, status: Status, data: Option<Value>) {
        let message = Response::new(status, data).to_message(request.id);
        self.event(id, TransportEvent::Message(message));
    }

    fn push(&mut self, id: ConnectionId, message: Value) {
        self.event(id, TransportEvent::Message(message));
    }
}

type Calls = Arc<Mutex<Vec<(Status, Option<Value>)>>>;

fn listen_recorder() -> (Calls, ListenCallback) {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    (calls, Arc::new(move |status, data| sink.lock().unwrap().push((status, data))))
}

fn write_recorder(calls: &Calls) -> Option<WriteCallback> {
    let sink = Arc::clone(calls);
    Some(Box::new(move |status, data| sink.lock().unwrap().push((status, data))))
}

fn hash(value: &str) -> HashFn {
    let value = value.to_string();
    Arc::new(move || value.clone())
}

#[test]
fn starts_with_an_immediate_connect() {
    let h = Harness::new();
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert_eq!(h.session.scheduled_connect().map(|(_, d)| d), Some(0));
}

#[test]
fn connection_lifecycle_states() {
    let mut h = Harness::new();
    h.fire_timer();
    assert_eq!(h.session.state(), ConnectionState::Connecting);
    let id = h.deliver_token();
    assert_eq!(h.session.state(), ConnectionState::Connecting);
    h.ready(id);
    assert_eq!(h.session.state(), ConnectionState::Connected);
    assert_eq!(h.session.last_session_id(), Some("sess0"));
    assert_eq!(h.observer.statuses(), vec![true]);

    h.event(id, TransportEvent::Disconnected);
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert_eq!(h.observer.statuses(), vec![true, false]);
}

#[test]
fn duplicate_listen_fails_fast() {
    let mut h = Harness::new();
    let (_, cb) = listen_recorder();
    h.session.listen(Query::at("/a"), hash(""), None, Arc::clone(&cb)).unwrap();
    let err = h.session.listen(Query::at("a/"), hash(""), None, cb).unwrap_err();
    assert!(matches!(err, ConnError::DuplicateListen { .. }));
}

#[test]
fn non_default_complete_query_is_rejected() {
    let mut h = Harness::new();
    let (_, cb) = listen_recorder();
    let query = Query::new("/a", QueryParams::default().order_by(Index::Key));
    let err = h.session.listen(query.clone(), hash(""), Some(1), cb).unwrap_err();
    assert!(matches!(err, ConnError::InvalidQuery { .. }));
    assert!(matches!(h.session.unlisten(&query, Some(1)), Err(ConnError::InvalidQuery { .. })));
}

#[test]
fn listen_survives_reconnection() {
    let mut h = Harness::new();
    let (calls, cb) = listen_recorder();
    h.session.listen(Query::at("/users"), hash("h1"), None, cb).unwrap();
    assert!(h.transport.sent().is_empty());

    let id = h.connect();
    let listens: Vec<Request> = h.transport.sent().into_iter().filter(|r| r.action.code() == "q").collect();
    assert_eq!(listens.len(), 1);
    assert_eq!(
        listens[0].action,
        Action::Listen(ListenBody { path: "/users".into(), query: None, tag: None, hash: "h1".into() })
    );

    h.respond(id, &listens[0], Status::Ok);
    assert_eq!(*calls.lock().unwrap(), vec![(Status::Ok, None)]);

    h.event(id, TransportEvent::Disconnected);
    h.transport.clear_sent();
    h.connect();
    assert_eq!(h.transport.sent_codes(), vec!["q"]);
}

#[test]
fn tagged_listen_sends_query_object() {
    let mut h = Harness::new();
    h.connect();
    let (_, cb) = listen_recorder();
    let query = Query::new("/scores", QueryParams::default().order_by(Index::Value).limit_to_last(3));
    h.session.listen(query, hash(""), Some(7), cb).unwrap();

    let Action::Listen(body) = h.transport.last_sent("q").unwrap().action else {
        panic!("expected a listen");
    };
    assert_eq!(body.tag, Some(7));
    assert_eq!(serde_json::to_value(body.query).unwrap(), json!({"i": ".value", "l": 3, "vf": "r"}));
}

#[test]
fn missing_index_warning_is_logged_once_per_index() {
    let mut h = Harness::new();
    let id = h.connect();
    let query = Query::new("/scores", QueryParams::default().order_by(Index::Value).limit_to_last(3));

    for _ in 0..2 {
        let (_, cb) = listen_recorder();
        h.session.listen(query.clone(), hash(""), Some(1), cb).unwrap();
        let request = h.transport.last_sent("q").unwrap();
        h.respond_with(id, &request, Status::Ok, Some(json!({"w": ["no_index"]})));
        h.session.unlisten(&query, Some(1)).unwrap();
    }

    let expected: HashSet<(String, String)> = [("/scores".to_string(), ".value".to_string())].into();
    assert_eq!(h.session.index_warnings, expected);
}

#[test]
fn merge_carries_the_pre_image_hash() {
    let mut h = Harness::new();
    h.connect();
    h.session.merge("/scores", json!({"ada": 3}), None, Some("prior".into()));

    let Action::Merge(body) = h.transport.last_sent("m").unwrap().action else {
        panic!("expected a merge");
    };
    assert_eq!(body.hash.as_deref(), Some("prior"));
}

#[test]
fn replay_order_is_auth_listens_writes_on_disconnect() {
    let mut h = Harness::with_token("opaque-token");
    let id = h.connect();
    h.event(id, TransportEvent::Disconnected);

    let (_, cb) = listen_recorder();
    h.session.on_disconnect(OnDisconnectKind::Put, "/presence", json!("offline"), None);
    h.session.put("/a", json!(1), None, None);
    h.session.listen(Query::at("/b"), hash(""), None, cb).unwrap();
    h.session.merge("/c", json!({"x": 1}), None, None);
    h.transport.clear_sent();

    h.connect();
    assert_eq!(h.transport.sent_codes(), vec!["gauth", "q", "p", "m", "o"]);
}

#[test]
fn connect_stats_precede_replay_on_first_connection_only() {
    let mut h = Harness::with_token("opaque-token");
    let id = h.connect();
    let codes = h.transport.sent_codes();
    assert_eq!(codes, vec!["s", "gauth"]);
    let Action::Stats(stats) = h.transport.last_sent("s").unwrap().action else {
        panic!("expected stats");
    };
    let key = format!("sdk.rust.{}", env!("CARGO_PKG_VERSION").replace('.', "-"));
    assert_eq!(stats.counters.get(&key), Some(&1));

    h.event(id, TransportEvent::Disconnected);
    h.transport.clear_sent();
    h.connect();
    assert_eq!(h.transport.sent_codes(), vec!["gauth"]);
}

#[test]
fn buffered_put_is_sent_once_and_completes_once() {
    let mut h = Harness::new();
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    h.session.put("/a", json!(1), write_recorder(&calls), None);
    assert!(h.transport.sent().is_empty());

    let id = h.connect();
    let puts: Vec<Request> = h.transport.sent().into_iter().filter(|r| r.action.code() == "p").collect();
    assert_eq!(puts.len(), 1);

    h.respond(id, &puts[0], Status::Ok);
    h.event(id, TransportEvent::Disconnected);
    h.transport.clear_sent();
    h.connect();

    assert!(h.transport.last_sent("p").is_none());
    assert_eq!(*calls.lock().unwrap(), vec![(Status::Ok, None)]);
}

#[test]
fn transmitted_write_is_cancelled_and_buffered_write_survives() {
    let mut h = Harness::new();
    let id = h.connect();
    let sent_calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let buffered_calls: Calls = Arc::new(Mutex::new(Vec::new()));

    h.session.put("/sent", json!(1), write_recorder(&sent_calls), Some("hash".into()));
    h.event(id, TransportEvent::Disconnected);
    h.session.put("/buffered", json!(2), write_recorder(&buffered_calls), None);

    assert_eq!(*sent_calls.lock().unwrap(), vec![(Status::Disconnect, None)]);
    assert!(buffered_calls.lock().unwrap().is_empty());

    h.transport.clear_sent();
    let id = h.connect();
    let puts: Vec<Request> = h.transport.sent().into_iter().filter(|r| r.action.code() == "p").collect();
    assert_eq!(puts.len(), 1);
    let Action::Put(body) = &puts[0].action else {
        panic!("expected a put");
    };
    assert_eq!(body.path, "/buffered");

    h.respond(id, &puts[0], Status::Ok);
    assert_eq!(*buffered_calls.lock().unwrap(), vec![(Status::Ok, None)]);
    assert_eq!(sent_calls.lock().unwrap().len(), 1);
}

#[test]
fn write_during_credential_fetch_is_buffered() {
    let mut h = Harness::new();
    h.fire_timer();
    h.session.put("/a", json!(1), None, None);
    let id = h.deliver_token();
    assert!(h.transport.sent().is_empty());
    h.event(id, TransportEvent::Disconnected);
    h.connect();
    assert_eq!(h.transport.sent_codes(), vec!["s", "p"]);
}

#[test]
fn response_after_disconnect_is_dropped() {
    let mut h = Harness::new();
    let id = h.connect();
    let (calls, cb) = listen_recorder();
    h.session.listen(Query::at("/a"), hash(""), None, cb).unwrap();
    let listen = h.transport.last_sent("q").unwrap();
    h.event(id, TransportEvent::Disconnected);

    let id = h.connect();
    let message = Response::new(Status::Ok, None).to_message(listen.id);
    h.push(id, message);
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn backoff_grows_and_is_capped() {
    let mut h = Harness::new();
    let mut delays = Vec::new();
    for _ in 0..40 {
        h.fire_timer();
        let id = h.deliver_token();
        h.event(id, TransportEvent::Disconnected);
        delays.push(h.session.scheduled_connect().unwrap().1);
    }
    assert_eq!(&delays[..3], &[1000, 1300, 1690]);
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert!(delays.iter().all(|d| *d <= 300_000));
    assert_eq!(*delays.last().unwrap(), 300_000);

    h.session.refresh_auth_token(Some(admin_jwt()));
    assert_eq!(h.session.max_reconnect_delay(), 30_000);
    let mut admin_delays = Vec::new();
    for _ in 0..5 {
        h.fire_timer();
        let id = h.deliver_token();
        h.event(id, TransportEvent::Disconnected);
        admin_delays.push(h.session.scheduled_connect().unwrap().1);
    }
    assert!(admin_delays.iter().all(|d| *d <= 30_000));
}

#[test]
fn legacy_secret_reduces_max_delay() {
    let mut h = Harness::new();
    h.session.refresh_auth_token(Some("s".repeat(40)));
    assert_eq!(h.session.max_reconnect_delay(), 30_000);
}

#[test]
fn admin_client_starts_with_admin_max() {
    let config = ConnectionConfig { client_kind: ClientKind::Admin, ..ConnectionConfig::default() };
    let h = Harness::build(config, None);
    assert_eq!(h.session.max_reconnect_delay(), 30_000);
}

#[test]
fn elapsed_time_is_discounted() {
    let mut h = Harness::new();
    h.fire_timer();
    let id = h.deliver_token();
    h.clock.advance(400);
    h.event(id, TransportEvent::Disconnected);
    assert_eq!(h.session.scheduled_connect().unwrap().1, 600);
}

#[test]
fn long_session_resets_delay() {
    let mut h = Harness::new();
    for _ in 0..5 {
        h.fire_timer();
        let id = h.deliver_token();
        h.event(id, TransportEvent::Disconnected);
    }
    assert!(h.session.reconnect_delay() > 3000);

    let id = h.connect();
    h.clock.advance(31_000);
    h.event(id, TransportEvent::Disconnected);
    assert_eq!(h.session.reconnect_delay(), 1300);
}

#[test]
fn hidden_disconnect_waits_for_max_then_visibility_resets() {
    let mut h = Harness::new();
    let id = h.connect();
    h.session.on_visible(false);
    h.event(id, TransportEvent::Disconnected);
    assert_eq!(h.session.scheduled_connect().unwrap().1, 300_000);

    h.session.on_visible(true);
    assert_eq!(h.session.scheduled_connect().unwrap().1, 0);
    assert_eq!(h.session.reconnect_delay(), 1000);
}

#[test]
fn becoming_visible_resets_a_partly_grown_delay() {
    let mut h = Harness::new();
    let id = h.connect();
    h.event(id, TransportEvent::Disconnected);
    assert_eq!(h.session.reconnect_delay(), 1300);

    h.session.on_visible(false);
    h.session.on_visible(true);
    assert_eq!(h.session.reconnect_delay(), 1000);
    assert_eq!(h.session.scheduled_connect().unwrap().1, 0);
}

#[test]
fn unlisten_unknown_key_is_a_no_op() {
    let mut h = Harness::new();
    h.connect();
    h.transport.clear_sent();
    h.session.unlisten(&Query::at("/nothing"), None).unwrap();
    assert!(h.transport.sent().is_empty());
}

#[test]
fn unlisten_of_buffered_listen_sends_nothing() {
    let mut h = Harness::new();
    let (_, cb) = listen_recorder();
    h.session.listen(Query::at("/a"), hash(""), None, cb).unwrap();
    h.session.unlisten(&Query::at("/a"), None).unwrap();
    h.connect();
    assert_eq!(h.transport.sent_codes(), vec!["s"]);
}

#[test]
fn unlisten_while_connected_sends_n() {
    let mut h = Harness::new();
    h.connect();
    let (_, cb) = listen_recorder();
    let query = Query::new("/a", QueryParams::default().limit_to_first(2));
    h.session.listen(query.clone(), hash(""), Some(3), cb).unwrap();
    h.session.unlisten(&query, Some(3)).unwrap();
    let Action::Unlisten(body) = h.transport.last_sent("n").unwrap().action else {
        panic!("expected an unlisten");
    };
    assert_eq!(body.path, "/a");
    assert_eq!(body.tag, Some(3));
    assert!(body.query.is_some());
}

#[test]
fn failed_listen_is_removed_before_callback() {
    let mut h = Harness::new();
    let id = h.connect();
    let (calls, cb) = listen_recorder();
    h.session.listen(Query::at("/secret"), hash(""), None, Arc::clone(&cb)).unwrap();
    let listen = h.transport.last_sent("q").unwrap();
    h.respond_with(id, &listen, Status::PermissionDenied, Some(json!("no access")));

    assert_eq!(*calls.lock().unwrap(), vec![(Status::PermissionDenied, Some(json!("no access")))]);
    h.session.listen(Query::at("/secret"), hash(""), None, cb).unwrap();
}

#[test]
fn stale_listen_response_is_ignored() {
    let mut h = Harness::new();
    let id = h.connect();
    let (first_calls, first) = listen_recorder();
    let (second_calls, second) = listen_recorder();
    h.session.listen(Query::at("/a"), hash(""), None, first).unwrap();
    let stale = h.transport.last_sent("q").unwrap();
    h.session.unlisten(&Query::at("/a"), None).unwrap();
    h.session.listen(Query::at("/a"), hash(""), None, second).unwrap();

    h.respond(id, &stale, Status::PermissionDenied);

    assert!(first_calls.lock().unwrap().is_empty());
    assert!(second_calls.lock().unwrap().is_empty());
    assert!(matches!(
        h.session.listen(Query::at("/a"), hash(""), None, listen_recorder().1),
        Err(ConnError::DuplicateListen { .. })
    ));
}

#[test]
fn listen_revocation_reports_permission_denied() {
    let mut h = Harness::new();
    let id = h.connect();
    let (calls, cb) = listen_recorder();
    let query = Query::new("/a", QueryParams::default().limit_to_first(1));
    let wire_query = serde_json::Value::Object(query.query_object());
    h.session.listen(query, hash(""), Some(1), cb).unwrap();

    h.push(id, json!({"a": "c", "b": {"p": "a", "q": [wire_query]}}));

    assert_eq!(*calls.lock().unwrap(), vec![(Status::PermissionDenied, None)]);
}

#[test]
fn auth_revocation_circuit_breaker() {
    let mut h = Harness::with_token("opaque-token");
    for round in 1..=3 {
        let id = h.connect();
        let auth = h.transport.last_sent("gauth").unwrap();
        h.respond(id, &auth, Status::InvalidToken);

        assert_eq!(h.session.state(), ConnectionState::Disconnected);
        let expected = if round < 3 { 0 } else { 1 };
        assert_eq!(h.auth.invalid_notices(), expected, "round {}", round);
    }
    assert_eq!(h.session.reconnect_delay(), 30_000);
    assert_eq!(h.auth.requests(), vec![false, true, true]);
}

#[test]
fn successful_auth_resets_invalid_count() {
    fn round(h: &mut Harness, status: Status) {
        let id = h.connect();
        let auth = h.transport.last_sent("gauth").unwrap();
        let ok = status.is_ok();
        h.respond(id, &auth, status);
        if ok {
            h.event(id, TransportEvent::Disconnected);
        }
    }

    let mut h = Harness::with_token("opaque-token");
    round(&mut h, Status::InvalidToken);
    round(&mut h, Status::PermissionDenied);
    round(&mut h, Status::Ok);
    round(&mut h, Status::InvalidToken);
    round(&mut h, Status::InvalidToken);
    assert_eq!(h.auth.invalid_notices(), 0);
}

#[test]
fn stale_auth_response_is_ignored() {
    let mut h = Harness::with_token("first");
    let id = h.connect();
    let first = h.transport.last_sent("gauth").unwrap();
    h.session.refresh_auth_token(Some("second".into()));
    h.respond(id, &first, Status::InvalidToken);
    assert_eq!(h.session.state(), ConnectionState::Connected);
}

#[test]
fn jwt_credentials_use_auth_with_override() {
    let config = ConnectionConfig {
        auth_override: AuthOverride::Vars(json!({"uid": "svc"})),
        ..ConnectionConfig::default()
    };
    let mut h = Harness::build(config, Some(admin_jwt().as_str()));
    h.connect();
    let Action::Auth(body) = h.transport.last_sent("auth").unwrap().action else {
        panic!("expected auth");
    };
    assert_eq!(body.cred, admin_jwt());
    assert_eq!(body.authvar, Some(json!({"uid": "svc"})));
    assert_eq!(body.noauth, None);
}

#[test]
fn noauth_override() {
    let config = ConnectionConfig { auth_override: AuthOverride::NoAuth, ..ConnectionConfig::default() };
    let mut h = Harness::build(config, Some("tok"));
    h.connect();
    let Action::GAuth(body) = h.transport.last_sent("gauth").unwrap().action else {
        panic!("expected gauth");
    };
    assert_eq!(body.noauth, Some(true));
}

#[test]
fn clearing_token_while_connected_sends_unauth() {
    let mut h = Harness::with_token("tok");
    h.connect();
    h.session.refresh_auth_token(None);
    assert_eq!(h.transport.sent_codes().last(), Some(&"unauth"));
}

#[test]
fn refreshing_token_while_disconnected_sends_nothing() {
    let mut h = Harness::new();
    h.session.refresh_auth_token(Some("tok".into()));
    h.session.refresh_auth_token(None);
    assert!(h.transport.sent().is_empty());
}

#[test]
fn interrupt_closes_and_resume_reconnects() {
    let mut h = Harness::new();
    let id = h.connect();
    h.session.interrupt("paused");
    h.run();
    assert!(h.session.is_interrupted("paused"));
    assert_eq!(h.transport.closed(), vec![id]);
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert_eq!(h.session.scheduled_connect(), None);

    h.session.resume("paused");
    assert!(!h.session.is_interrupted("paused"));
    assert_eq!(h.session.scheduled_connect().map(|(_, d)| d), Some(0));
}

#[test]
fn every_interrupt_reason_must_be_resumed() {
    let mut h = Harness::new();
    h.session.interrupt("a");
    h.session.interrupt("b");
    assert_eq!(h.session.scheduled_connect(), None);
    h.session.resume("a");
    assert_eq!(h.session.scheduled_connect(), None);
    h.session.resume("b");
    assert!(h.session.scheduled_connect().is_some());
}

#[test]
fn interrupted_timer_does_not_connect() {
    let mut h = Harness::new();
    let (generation, _) = h.session.scheduled_connect().unwrap();
    h.session.interrupt("paused");
    h.session.on_connect_timer(generation);
    assert_eq!(h.session.take_token_request(), None);
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
}

#[test]
fn interrupt_during_token_fetch_cancels_attempt() {
    let mut h = Harness::new();
    h.fire_timer();
    let request = h.session.take_token_request().unwrap();
    h.session.interrupt("paused");
    assert_eq!(h.session.pending_token_attempt(), None);

    h.session.on_token(request.id, Ok(None));
    assert!(h.transport.opened().is_empty());
}

#[test]
fn token_failure_abandons_attempt_and_retries() {
    let mut h = Harness::new();
    h.auth.set_failing(true);
    h.fire_timer();
    h.deliver_token();
    assert!(h.transport.opened().is_empty());
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert!(h.session.scheduled_connect().is_some());

    h.auth.set_failing(false);
    h.connect();
    assert_eq!(h.transport.opened().len(), 1);
}

#[test]
fn offline_closes_and_online_reconnects() {
    let mut h = Harness::new();
    let id = h.connect();
    h.session.on_online(false);
    h.run();
    assert_eq!(h.transport.closed(), vec![id]);
    assert_eq!(h.session.scheduled_connect(), None);

    h.session.on_online(true);
    assert_eq!(h.session.scheduled_connect().map(|(_, d)| d), Some(0));
}

#[test]
fn server_kill_interrupts() {
    let mut h = Harness::new();
    let id = h.connect();
    h.event(id, TransportEvent::Killed("database disabled".into()));
    assert!(h.session.is_interrupted(SERVER_KILL_INTERRUPT_REASON));
    assert_eq!(h.session.scheduled_connect(), None);
}

#[test]
fn events_from_replaced_transport_are_ignored() {
    let mut h = Harness::new();
    let old = h.connect();
    h.event(old, TransportEvent::Disconnected);
    h.fire_timer();
    let new = h.deliver_token();

    h.event(old, TransportEvent::Ready { timestamp: 0, session_id: "old".into() });
    assert_eq!(h.session.state(), ConnectionState::Connecting);
    h.ready(new);
    h.event(old, TransportEvent::Disconnected);
    assert_eq!(h.session.state(), ConnectionState::Connected);
}

#[test]
fn last_session_id_requests_resumption() {
    let mut h = Harness::new();
    let id = h.connect();
    h.event(id, TransportEvent::Disconnected);
    h.connect();
    let opened = h.transport.opened();
    assert_eq!(opened[0].last_session_id, None);
    assert_eq!(opened[1].last_session_id, Some("sess0".into()));
}

#[test]
fn server_error_is_fatal() {
    let mut h = Harness::new();
    let id = h.connect();
    let result = h.session.on_transport_event(id, TransportEvent::Message(json!({"error": "bad"})));
    assert!(matches!(result, Err(ConnError::ServerError(ref m)) if m == "bad"));
}

#[test]
fn malformed_and_unknown_pushes_are_survivable() {
    let mut h = Harness::new();
    let id = h.connect();
    h.push(id, json!({"a": "d", "b": {}}));
    h.push(id, json!({"a": "zz", "b": {}}));
    assert_eq!(h.session.state(), ConnectionState::Connected);
}

#[test]
fn pushes_reach_the_observer() {
    let mut h = Harness::new();
    let id = h.connect();
    h.push(id, json!({"a": "d", "b": {"p": "/a", "d": 1}}));
    h.push(id, json!({"a": "m", "b": {"p": "/a", "d": {"b": 2}, "t": 4}}));
    h.push(id, json!({"a": "sd", "b": {"msg": "rule trace"}}));

    let events = h.observer.events();
    assert!(events.contains(&Observed::Data { path: "/a".into(), data: json!(1), is_merge: false, tag: None }));
    assert!(events.contains(&Observed::Data { path: "/a".into(), data: json!({"b": 2}), is_merge: true, tag: Some(4) }));
    assert!(events.contains(&Observed::SecurityDebug(json!({"msg": "rule trace"}))));
}

#[test]
fn server_time_offset_is_published() {
    let mut h = Harness::new();
    h.fire_timer();
    let id = h.deliver_token();
    h.event(id, TransportEvent::Ready { timestamp: START_MS + 500, session_id: "s".into() });
    assert!(h
        .observer
        .events()
        .contains(&Observed::ServerInfo(ServerInfo { server_time_offset_ms: 500 })));
}

#[test]
fn on_disconnect_sends_immediately_when_connected() {
    let mut h = Harness::new();
    let id = h.connect();
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    h.session.on_disconnect(OnDisconnectKind::Cancel, "/presence", Value::Null, write_recorder(&calls));
    let request = h.transport.last_sent("oc").unwrap();
    h.respond(id, &request, Status::Ok);
    assert_eq!(*calls.lock().unwrap(), vec![(Status::Ok, None)]);
}

#[test]
fn stats_are_dropped_while_disconnected() {
    let mut h = Harness::new();
    let mut counters = BTreeMap::new();
    counters.insert("c".to_string(), 1);
    h.session.report_stats(counters);
    assert!(h.transport.sent().is_empty());
}

#[test]
fn shutdown_stops_reconnecting() {
    let mut h = Harness::new();
    let id = h.connect();
    h.session.shutdown();
    h.run();
    assert_eq!(h.transport.closed(), vec![id]);
    assert_eq!(h.session.scheduled_connect(), None);
    assert_eq!(h.observer.statuses(), vec![true, false]);
}
