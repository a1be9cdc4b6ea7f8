// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Online and visibility monitors.
//!
//! The host application feeds platform transitions in with `set_online` and
//! `set_visible`; the connection subscribes to both and adjusts its
//! reconnection behavior. Monitors are constructed once and injected through
//! an [`Environment`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::emitter::{EventEmitter, EventSource};

pub const ONLINE_EVENT: &str = "online";
pub const VISIBLE_EVENT: &str = "visible";

/// Tracks network reachability.
pub struct OnlineMonitor {
    online: AtomicBool,
    emitter: EventEmitter<bool>,
}

impl OnlineMonitor {
    pub fn new(online: bool) -> Self {
        OnlineMonitor {
            online: AtomicBool::new(online),
            emitter: EventEmitter::new(&[ONLINE_EVENT]),
        }
    }

    pub fn currently_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Records a reachability change, emitting only on transitions.
    pub fn set_online(&self, online: bool) {
        if self.online.swap(online, Ordering::AcqRel) != online {
            debug!(online, "network reachability changed");
            let _ = self.emitter.emit(ONLINE_EVENT, online);
        }
    }
}

impl EventSource<bool> for OnlineMonitor {
    fn emitter(&self) -> &EventEmitter<bool> {
        &self.emitter
    }

    fn initial_event(&self, _event: &str) -> bool {
        self.currently_online()
    }
}

/// Tracks whether the application is in the foreground.
pub struct VisibilityMonitor {
    visible: AtomicBool,
    emitter: EventEmitter<bool>,
}

impl VisibilityMonitor {
    pub fn new(visible: bool) -> Self {
        VisibilityMonitor {
            visible: AtomicBool::new(visible),
            emitter: EventEmitter::new(&[VISIBLE_EVENT]),
        }
    }

    pub fn currently_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub fn set_visible(&self, visible: bool) {
        if self.visible.swap(visible, Ordering::AcqRel) != visible {
            debug!(visible, "visibility changed");
            let _ = self.emitter.emit(VISIBLE_EVENT, visible);
        }
    }
}

impl EventSource<bool> for VisibilityMonitor {
    fn emitter(&self) -> &EventEmitter<bool> {
        &self.emitter
    }

    fn initial_event(&self, _event: &str) -> bool {
        self.currently_visible()
    }
}

/// The platform monitors shared by every connection in the process.
#[derive(Clone)]
pub struct Environment {
    pub online: Arc<OnlineMonitor>,
    pub visibility: Arc<VisibilityMonitor>,
}

impl Environment {
    pub fn new(online: bool, visible: bool) -> Self {
        Environment {
            online: Arc::new(OnlineMonitor::new(online)),
            visibility: Arc::new(VisibilityMonitor::new(visible)),
        }
    }
}

impl Default for Environment {
    /// A headless process: always online and visible until told otherwise.
    fn default() -> Self {
        Environment::new(true, true)
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
