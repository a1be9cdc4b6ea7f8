// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal pub/sub over a fixed set of event names.
//!
//! Unknown event names are programming errors and are rejected rather than
//! silently ignored.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{ConnError, Result};

/// A subscriber callback.
pub type Listener<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registration<T> {
    id: SubscriptionId,
    event: &'static str,
    listener: Listener<T>,
}

pub struct EventEmitter<T> {
    allowed: &'static [&'static str],
    listeners: Mutex<Vec<Registration<T>>>,
    next_id: AtomicU64,
}

impl<T: Clone> EventEmitter<T> {
    pub fn new(allowed: &'static [&'static str]) -> Self {
        EventEmitter {
            allowed,
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn validate(&self, event: &str) -> Result<&'static str> {
        self.allowed
            .iter()
            .find(|allowed| **allowed == event)
            .copied()
            .ok_or_else(|| ConnError::UnknownEvent(event.to_string()))
    }

    /// Invokes every listener of `event` with `value`.
    ///
    /// Listeners run outside the internal lock, so they may subscribe or
    /// unsubscribe while being notified.
    pub fn emit(&self, event: &str, value: T) -> Result<()> {
        let event = self.validate(event)?;
        let listeners: Vec<Listener<T>> = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.event == event)
            .map(|r| Arc::clone(&r.listener))
            .collect();
        for listener in listeners {
            listener(value.clone());
        }
        Ok(())
    }

    /// Registers a listener without replaying any state.
    pub fn subscribe(&self, event: &str, listener: Listener<T>) -> Result<SubscriptionId> {
        let event = self.validate(event)?;
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Registration { id, event, listener });
        Ok(id)
    }

    /// Removes a listener. Removing an unknown subscription is a no-op.
    pub fn off(&self, event: &str, id: SubscriptionId) -> Result<()> {
        let event = self.validate(event)?;
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|r| !(r.event == event && r.id == id));
        Ok(())
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.event == event)
            .count()
    }
}

/// A component that publishes state changes through an [`EventEmitter`].
///
/// Subscribing with [`EventSource::on`] immediately delivers the current
/// state, so late subscribers never wait for a transition.
pub trait EventSource<T: Clone> {
    fn emitter(&self) -> &EventEmitter<T>;

    /// The current state for `event`, replayed to new subscribers.
    fn initial_event(&self, event: &str) -> T;

    fn on(&self, event: &str, listener: Listener<T>) -> Result<SubscriptionId> {
        let id = self.emitter().subscribe(event, Arc::clone(&listener))?;
        listener(self.initial_event(event));
        Ok(id)
    }

    fn off(&self, event: &str, id: SubscriptionId) -> Result<()> {
        self.emitter().off(event, id)
    }
}

#[cfg(test)]
#[path = "emitter_tests.rs"]
mod tests;
