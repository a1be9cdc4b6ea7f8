// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnect delay policy.
//!
//! The delay starts at the policy minimum and grows by the multiplier after
//! every scheduled retry, capped at the current maximum. The maximum drops
//! to the admin ceiling once a privileged credential is seen.

use rand::Rng;

use crate::config::ReconnectPolicy;

/// Source of the uniform factor in `[0, 1]` applied to each delay.
pub trait JitterSource: Send {
    fn next_factor(&mut self) -> f64;
}

/// Jitter from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn next_factor(&mut self) -> f64 {
        rand::thread_rng().gen_range(0.0..=1.0)
    }
}

impl<F: FnMut() -> f64 + Send> JitterSource for F {
    fn next_factor(&mut self) -> f64 {
        self()
    }
}

#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    current_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Backoff {
            current_ms: policy.min_delay_ms,
            max_ms: policy.max_delay_ms,
            policy,
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Base delay for the next retry.
    pub fn current(&self) -> u64 {
        self.current_ms
    }

    pub fn max(&self) -> u64 {
        self.max_ms
    }

    pub fn is_at_max(&self) -> bool {
        self.current_ms == self.max_ms
    }

    pub fn reset(&mut self) {
        self.current_ms = self.policy.min_delay_ms;
    }

    /// Lowers the ceiling for privileged clients. Never raised again.
    pub fn use_admin_max(&mut self) {
        self.max_ms = self.policy.admin_max_delay_ms;
        self.current_ms = self.current_ms.min(self.max_ms);
    }

    pub fn force_max(&mut self) {
        self.current_ms = self.max_ms;
    }

    /// Jumps straight to the admin ceiling, used once a credential looks
    /// permanently invalid.
    pub fn force_admin_max(&mut self) {
        self.current_ms = self.policy.admin_max_delay_ms;
    }

    /// Computes the delay to schedule and grows the base for next time.
    ///
    /// Time already spent since the last attempt is discounted from the base
    /// delay (clamped at zero), and the remainder is scaled by `jitter`.
    pub fn next_delay(&mut self, elapsed_ms: u64, jitter: &mut dyn JitterSource) -> u64 {
        let discounted = self.current_ms.saturating_sub(elapsed_ms);
        let factor = jitter.next_factor().clamp(0.0, 1.0);
        let delay = (discounted as f64 * factor) as u64;

        let grown = (self.current_ms as f64 * self.policy.multiplier) as u64;
        self.current_ms = grown.min(self.max_ms);
        delay
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
