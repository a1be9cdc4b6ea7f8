// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The async driver around [`Session`].
//!
//! [`PersistentConnection`] owns a background task that feeds the session
//! its timer firings, credential results and transport events. Application
//! calls lock the session directly and wake the task so it can pick up any
//! new timer or credential fetch the call produced.
//!
//! Callbacks queued by the session (completion callbacks, observer
//! notifications) always run after the session lock is released, so they may
//! call back into the connection.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use tw_core::{ClockSource, Query, SystemClock};

use crate::auth::{AuthTokenProvider, TokenResult};
use crate::backoff::{JitterSource, RandomJitter};
use crate::config::ConnectionConfig;
use crate::emitter::{EventSource, SubscriptionId};
use crate::error::Result;
use crate::listen::{HashFn, ListenCallback};
use crate::monitor::{Environment, ONLINE_EVENT, VISIBLE_EVENT};
use crate::observer::ConnectionObserver;
use crate::session::{ConnectionState, Session, SessionDeps};
use crate::transport::{ConnectionId, Transport, TransportEvent};
use crate::writes::{OnDisconnectKind, WriteCallback};

type TokenFuture = Pin<Box<dyn Future<Output = TokenResult> + Send>>;
type EventReceiver = mpsc::UnboundedReceiver<(ConnectionId, TransportEvent)>;

/// What a connection talks to besides its configuration.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub auth: Arc<dyn AuthTokenProvider>,
    pub environment: Environment,
    pub observer: Arc<dyn ConnectionObserver>,
}

struct Shared {
    session: Mutex<Session>,
    wake: Notify,
}

impl Shared {
    /// Runs `f` under the session lock, then runs whatever it deferred.
    fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let (result, dispatch) = {
            let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
            let result = f(&mut session);
            (result, session.take_dispatch())
        };
        for deferred in dispatch {
            deferred();
        }
        result
    }

    /// Like [`Shared::with`], and wakes the driver afterwards.
    fn call<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let result = self.with(f);
        self.wake.notify_one();
        result
    }
}

/// A long-lived, self-healing connection to one database.
pub struct PersistentConnection {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: tokio::sync::Mutex<Option<JoinHandle<Result<()>>>>,
    environment: Environment,
    subscriptions: Mutex<Option<(SubscriptionId, SubscriptionId)>>,
}

impl PersistentConnection {
    /// Starts a connection on the current tokio runtime. The first attempt
    /// is made right away.
    pub fn start(config: ConnectionConfig, collaborators: Collaborators) -> Result<Self> {
        Self::start_with(
            config,
            collaborators,
            Arc::new(SystemClock),
            Box::new(RandomJitter),
        )
    }

    /// Like [`PersistentConnection::start`] with an explicit clock and jitter.
    pub fn start_with(
        config: ConnectionConfig,
        collaborators: Collaborators,
        clock: Arc<dyn ClockSource>,
        jitter: Box<dyn JitterSource>,
    ) -> Result<Self> {
        let Collaborators {
            transport,
            auth,
            environment,
            observer,
        } = collaborators;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Session::new(
            config,
            SessionDeps {
                transport,
                auth: Arc::clone(&auth),
                observer,
                clock,
                jitter,
                events: events_tx,
            },
        );
        debug!(conn = session.id(), "starting persistent connection");
        let shared = Arc::new(Shared {
            session: Mutex::new(session),
            wake: Notify::new(),
        });

        let subscriptions = subscribe_monitors(&shared, &environment)?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(drive(
            Arc::clone(&shared),
            auth,
            events_rx,
            cancel.clone(),
        ));

        Ok(PersistentConnection {
            shared,
            cancel,
            task: tokio::sync::Mutex::new(Some(task)),
            environment,
            subscriptions: Mutex::new(Some(subscriptions)),
        })
    }

    pub fn listen(
        &self,
        query: Query,
        hash_fn: HashFn,
        tag: Option<u64>,
        on_complete: ListenCallback,
    ) -> Result<()> {
        self.shared.call(|s| s.listen(query, hash_fn, tag, on_complete))
    }

    pub fn unlisten(&self, query: &Query, tag: Option<u64>) -> Result<()> {
        self.shared.call(|s| s.unlisten(query, tag))
    }

    pub fn put(&self, path: &str, data: Value, on_complete: Option<WriteCallback>, hash: Option<String>) {
        self.shared.call(|s| s.put(path, data, on_complete, hash));
    }

    pub fn merge(&self, path: &str, data: Value, on_complete: Option<WriteCallback>, hash: Option<String>) {
        self.shared.call(|s| s.merge(path, data, on_complete, hash));
    }

    pub fn on_disconnect_put(&self, path: &str, data: Value, on_complete: Option<WriteCallback>) {
        self.shared
            .call(|s| s.on_disconnect(OnDisconnectKind::Put, path, data, on_complete));
    }

    pub fn on_disconnect_merge(&self, path: &str, data: Value, on_complete: Option<WriteCallback>) {
        self.shared
            .call(|s| s.on_disconnect(OnDisconnectKind::Merge, path, data, on_complete));
    }

    pub fn on_disconnect_cancel(&self, path: &str, on_complete: Option<WriteCallback>) {
        self.shared
            .call(|s| s.on_disconnect(OnDisconnectKind::Cancel, path, Value::Null, on_complete));
    }

    pub fn refresh_auth_token(&self, token: Option<String>) {
        self.shared.call(|s| s.refresh_auth_token(token));
    }

    pub fn report_stats(&self, counters: BTreeMap<String, u64>) {
        self.shared.call(|s| s.report_stats(counters));
    }

    pub fn interrupt(&self, reason: &str) {
        self.shared.call(|s| s.interrupt(reason));
    }

    pub fn resume(&self, reason: &str) {
        self.shared.call(|s| s.resume(reason));
    }

    pub fn is_interrupted(&self, reason: &str) -> bool {
        self.shared.with(|s| s.is_interrupted(reason))
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.with(|s| s.state())
    }

    /// Closes the transport and stops the driver. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.shared.with(|s| s.shutdown());
        let subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some((online, visible)) = subscriptions {
            let _ = self.environment.online.off(ONLINE_EVENT, online);
            let _ = self.environment.visibility.off(VISIBLE_EVENT, visible);
        }
    }

    /// Waits for the driver to stop, returning the error that stopped it.
    ///
    /// Cancel-safe. The error is reported to the first caller only.
    pub async fn wait(&self) -> Result<()> {
        let mut task = self.task.lock().await;
        let Some(handle) = task.as_mut() else {
            return Ok(());
        };
        let result = handle.await;
        *task = None;
        result?
    }
}

impl Drop for PersistentConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn subscribe_monitors(
    shared: &Arc<Shared>,
    environment: &Environment,
) -> Result<(SubscriptionId, SubscriptionId)> {
    let weak: Weak<Shared> = Arc::downgrade(shared);
    let online = environment.online.on(
        ONLINE_EVENT,
        Arc::new(move |online| {
            if let Some(shared) = weak.upgrade() {
                shared.call(|s| s.on_online(online));
            }
        }),
    )?;

    let weak: Weak<Shared> = Arc::downgrade(shared);
    let visible = environment.visibility.on(
        VISIBLE_EVENT,
        Arc::new(move |visible| {
            if let Some(shared) = weak.upgrade() {
                shared.call(|s| s.on_visible(visible));
            }
        }),
    )?;
    Ok((online, visible))
}

/// The background loop. Each iteration reconciles the timer and credential
/// slots with what the session wants, then waits for the next input.
async fn drive(
    shared: Arc<Shared>,
    auth: Arc<dyn AuthTokenProvider>,
    mut events: EventReceiver,
    cancel: CancellationToken,
) -> Result<()> {
    let mut timer: Option<(u64, Pin<Box<Sleep>>)> = None;
    let mut token: Option<(ConnectionId, TokenFuture)> = None;

    loop {
        let (scheduled, token_request, pending_attempt) = shared.with(|s| {
            (
                s.scheduled_connect(),
                s.take_token_request(),
                s.pending_token_attempt(),
            )
        });

        match scheduled {
            Some((generation, delay_ms)) => {
                if timer.as_ref().map(|(g, _)| *g) != Some(generation) {
                    let sleep = tokio::time::sleep(Duration::from_millis(delay_ms));
                    timer = Some((generation, Box::pin(sleep)));
                }
            }
            None => timer = None,
        }

        if let Some(request) = token_request {
            let auth = Arc::clone(&auth);
            let fetch: TokenFuture = Box::pin(async move { auth.get_token(request.force_refresh).await });
            token = Some((request.id, fetch));
        }
        // Dropping the future abandons a fetch the session no longer wants.
        if token.as_ref().is_some_and(|(id, _)| Some(*id) != pending_attempt) {
            token = None;
        }

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("connection driver cancelled");
                return Ok(());
            }

            Some((id, event)) = events.recv() => {
                if let Err(e) = shared.with(|s| s.on_transport_event(id, event)) {
                    error!("closing connection: {}", e);
                    shared.with(|s| s.shutdown());
                    return Err(e);
                }
            }

            (id, result) = next_token(&mut token) => {
                token = None;
                shared.with(|s| s.on_token(id, result));
            }

            generation = next_timer(&mut timer) => {
                timer = None;
                shared.with(|s| s.on_connect_timer(generation));
            }

            _ = shared.wake.notified() => {}
        }
    }
}

async fn next_token(slot: &mut Option<(ConnectionId, TokenFuture)>) -> (ConnectionId, TokenResult) {
    match slot {
        Some((id, fetch)) => {
            let id = *id;
            (id, fetch.await)
        }
        None => std::future::pending().await,
    }
}

async fn next_timer(slot: &mut Option<(u64, Pin<Box<Sleep>>)>) -> u64 {
    match slot {
        Some((generation, sleep)) => {
            sleep.as_mut().await;
            *generation
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
