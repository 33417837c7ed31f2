// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polling backoff for cross-process waits
//!
//! Independent processes have no shared condition variable, so waiting
//! means polling. Intervals grow exponentially with jitter so a crowd of
//! waiters does not stampede the registry lock when a slot frees up.

use crate::clock::Clock;
use rand::Rng;
use std::time::{Duration, Instant};

/// Backoff parameters for a polling loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WaitPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: u32,
    /// Randomise each delay within [delay/2, delay]
    pub jitter: bool,
}

impl WaitPolicy {
    /// Short waits for the registry lock
    pub fn lock() -> Self {
        Self {
            initial: Duration::from_millis(5),
            max: Duration::from_millis(100),
            multiplier: 2,
            jitter: true,
        }
    }

    /// Slower polling while all slots are busy
    pub fn queue() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(2),
            multiplier: 2,
            jitter: true,
        }
    }

    pub fn with_initial(mut self, initial: Duration) -> Self {
        self.initial = initial;
        self
    }

    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

/// Process-local state of one polling loop
#[derive(Clone, Debug)]
pub struct QueueWaitState {
    policy: WaitPolicy,
    started: Instant,
    last_probe: Option<Instant>,
    interval: Duration,
    attempts: u32,
}

impl QueueWaitState {
    pub fn start(clock: &impl Clock, policy: WaitPolicy) -> Self {
        Self {
            interval: policy.initial,
            policy,
            started: clock.now(),
            last_probe: None,
            attempts: 0,
        }
    }

    pub fn elapsed(&self, clock: &impl Clock) -> Duration {
        clock.now().saturating_duration_since(self.started)
    }

    /// Failed attempts recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_probe(&self) -> Option<Instant> {
        self.last_probe
    }

    /// Record a failed attempt and return how long to sleep before the next
    /// one, or `None` once `timeout` has elapsed.
    ///
    /// The delay is clipped to the time remaining, so the final attempt
    /// lands at the deadline rather than up to one interval past it.
    pub fn next_delay(&mut self, clock: &impl Clock, timeout: Duration) -> Option<Duration> {
        let now = clock.now();
        self.last_probe = Some(now);
        self.attempts += 1;

        let elapsed = now.saturating_duration_since(self.started);
        if elapsed >= timeout {
            return None;
        }
        let remaining = timeout - elapsed;

        let base = self.interval;
        self.interval = base
            .saturating_mul(self.policy.multiplier.max(1))
            .min(self.policy.max);

        let delay = if self.policy.jitter { jittered(base) } else { base };
        Some(delay.min(remaining))
    }
}

/// Truncate to whole milliseconds for human-readable output
pub fn rounded(duration: Duration) -> Duration {
    Duration::from_millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

fn jittered(base: Duration) -> Duration {
    let half = base / 2;
    let spread = u64::try_from(half.as_micros()).unwrap_or(u64::MAX);
    if spread == 0 {
        return base;
    }
    half + Duration::from_micros(rand::thread_rng().gen_range(0..=spread))
}

#[cfg(test)]
#[path = "wait_tests.rs"]
mod tests;
