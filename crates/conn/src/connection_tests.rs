// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::error::ConnError;
use crate::test_helpers::{full_jitter, ManualClock, MockTokenProvider, MockTransport, RecordingObserver};
use crate::transport::EventSink;
use serde_json::json;
use tw_core::protocol::WriteBody;
use tw_core::{Action, Response, Status};

struct TestConnection {
    conn: Arc<PersistentConnection>,
    transport: Arc<MockTransport>,
    observer: Arc<RecordingObserver>,
    environment: Environment,
}

fn start(environment: Environment) -> TestConnection {
    let transport = MockTransport::new();
    let observer = RecordingObserver::new();
    let collaborators = Collaborators {
        transport: transport.clone(),
        auth: MockTokenProvider::new(None),
        environment: environment.clone(),
        observer: observer.clone(),
    };
    let conn = PersistentConnection::start_with(
        ConnectionConfig::default(),
        collaborators,
        ManualClock::new(0),
        full_jitter(),
    )
    .unwrap();
    TestConnection {
        conn: Arc::new(conn),
        transport,
        observer,
        environment,
    }
}

/// Lets the driver run until it is idle, advancing paused time by 1ms.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

async fn connect(t: &TestConnection) -> EventSink {
    settle().await;
    let sink = t.transport.last_sink().unwrap();
    sink.send(TransportEvent::Ready {
        timestamp: 0,
        session_id: "s1".into(),
    });
    settle().await;
    sink
}

#[tokio::test(start_paused = true)]
async fn connects_and_sends_registered_listen() {
    let t = start(Environment::default());
    t.conn
        .listen(Query::at("/a"), Arc::new(String::new), None, Arc::new(|_, _| {}))
        .unwrap();

    connect(&t).await;

    assert_eq!(t.conn.state(), ConnectionState::Connected);
    assert_eq!(t.transport.sent_codes(), vec!["s", "q"]);
    assert_eq!(t.observer.statuses(), vec![true]);
}

#[tokio::test(start_paused = true)]
async fn merge_carries_the_pre_image_hash() {
    let t = start(Environment::default());
    connect(&t).await;

    t.conn.merge("/scores", json!({"ada": 3}), None, Some("prior".into()));

    assert_eq!(
        t.transport.last_sent("m").unwrap().action,
        Action::Merge(WriteBody {
            path: "/scores".into(),
            data: json!({"ada": 3}),
            hash: Some("prior".into()),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn reconnects_after_backoff_delay() {
    let t = start(Environment::default());
    let sink = connect(&t).await;

    sink.send(TransportEvent::Disconnected);
    settle().await;
    assert_eq!(t.conn.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_millis(990)).await;
    assert_eq!(t.transport.opened().len(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(t.transport.opened().len(), 2);
    assert_eq!(t.transport.opened()[1].last_session_id, Some("s1".into()));
}

#[tokio::test(start_paused = true)]
async fn follows_online_monitor() {
    let t = start(Environment::default());
    let sink = connect(&t).await;

    t.environment.online.set_online(false);
    settle().await;
    assert_eq!(t.transport.closed(), vec![sink.id()]);
    assert_eq!(t.conn.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(t.transport.opened().len(), 1);

    t.environment.online.set_online(true);
    settle().await;
    assert_eq!(t.transport.opened().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn starts_offline_without_connecting() {
    let t = start(Environment::new(false, true));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(t.transport.opened().is_empty());

    t.environment.online.set_online(true);
    settle().await;
    assert_eq!(t.transport.opened().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn interrupt_and_resume() {
    let t = start(Environment::default());
    let sink = connect(&t).await;

    t.conn.interrupt("paused");
    settle().await;
    assert!(t.conn.is_interrupted("paused"));
    assert_eq!(t.transport.closed(), vec![sink.id()]);

    t.conn.resume("paused");
    settle().await;
    assert_eq!(t.transport.opened().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn callbacks_can_reenter_the_connection() {
    let t = start(Environment::default());
    let sink = connect(&t).await;

    let seen = Arc::new(Mutex::new(None));
    let conn = Arc::clone(&t.conn);
    let record = Arc::clone(&seen);
    t.conn.put(
        "/a",
        json!(1),
        Some(Box::new(move |status, _| {
            *record.lock().unwrap() = Some((status, conn.state()));
        })),
        None,
    );
    let put = t.transport.last_sent("p").unwrap();
    sink.send(TransportEvent::Message(Response::new(Status::Ok, None).to_message(put.id)));
    settle().await;

    assert_eq!(*seen.lock().unwrap(), Some((Status::Ok, ConnectionState::Connected)));
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_driver_and_unsubscribes() {
    let t = start(Environment::default());
    let sink = connect(&t).await;

    t.conn.shutdown();
    t.conn.wait().await.unwrap();

    assert_eq!(t.transport.closed(), vec![sink.id()]);
    assert_eq!(t.environment.online.emitter().listener_count(ONLINE_EVENT), 0);
    assert_eq!(t.environment.visibility.emitter().listener_count(VISIBLE_EVENT), 0);
    assert_eq!(t.observer.statuses(), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn server_error_stops_driver() {
    let t = start(Environment::default());
    let sink = connect(&t).await;

    sink.send(TransportEvent::Message(json!({"error": "boom"})));
    let result = t.conn.wait().await;

    assert!(matches!(result, Err(ConnError::ServerError(ref m)) if m == "boom"));
    assert_eq!(t.transport.closed(), vec![sink.id()]);
}
