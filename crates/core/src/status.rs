// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only status snapshot of a registry
//!
//! Status never takes the registry lock. It may observe a slightly stale
//! view, and it never writes: dead holders are reported as stale, not
//! evicted.

use crate::clock::Clock;
use crate::process::ProcessProbe;
use crate::registry::{RegistryError, RegistryStore, WaiterBoard};
use crate::slot::SlotRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub live_slots: Vec<SlotRecord>,
    /// Slots whose owner is gone but which have not been reaped yet
    pub stale_slots: Vec<SlotRecord>,
    pub max_slots: u32,
    /// Best-effort count of callers waiting for a slot
    pub queue_hint: usize,
    pub generated_at: DateTime<Utc>,
}

impl StatusReport {
    pub fn in_use(&self) -> usize {
        self.live_slots.len()
    }

    pub fn available(&self) -> usize {
        (self.max_slots as usize).saturating_sub(self.in_use())
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Slots: {}/{} in use, {} waiting",
            self.in_use(),
            self.max_slots,
            self.queue_hint
        )?;

        if self.live_slots.is_empty() && self.stale_slots.is_empty() {
            return write!(f, "No slots held");
        }

        writeln!(f)?;
        write!(f, "{:<24} {:<8} {:<12} {:<10} STATE", "HOLDER", "PID", "AGE", "SLOT")?;
        let rows = self
            .live_slots
            .iter()
            .map(|r| (r, "live"))
            .chain(self.stale_slots.iter().map(|r| (r, "stale")));
        for (record, state) in rows {
            let age = humantime::format_duration(std::time::Duration::from_secs(
                record.age(self.generated_at).as_secs(),
            ))
            .to_string();
            write!(
                f,
                "\n{:<24} {:<8} {:<12} {:<10} {}",
                truncate(&record.holder_id, 24),
                record.pid,
                age,
                record.slot_id.short(),
                state
            )?;
        }
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub struct StatusReporter<S: RegistryStore, P: ProcessProbe, C: Clock> {
    store: S,
    probe: P,
    clock: C,
    waiters: Option<WaiterBoard>,
    max_slots_override: Option<u32>,
}

impl<S: RegistryStore, P: ProcessProbe, C: Clock> StatusReporter<S, P, C> {
    pub fn new(store: S, probe: P, clock: C) -> Self {
        Self {
            store,
            probe,
            clock,
            waiters: None,
            max_slots_override: None,
        }
    }

    pub fn with_waiters(mut self, waiters: WaiterBoard) -> Self {
        self.waiters = Some(waiters);
        self
    }

    pub fn with_max_slots(mut self, max_slots: Option<u32>) -> Self {
        self.max_slots_override = max_slots.filter(|&n| n > 0);
        self
    }

    pub fn report(&self) -> Result<StatusReport, RegistryError> {
        let config = self.store.read_config()?.unwrap_or_default();
        let max_slots = self.max_slots_override.unwrap_or(config.max_slots);

        let (live_slots, stale_slots) = self
            .store
            .list_slots()?
            .into_iter()
            .partition(|r| self.probe.is_running(&r.identity()));

        let queue_hint = self
            .waiters
            .as_ref()
            .map_or(0, |board| board.count(&self.probe));

        Ok(StatusReport {
            live_slots,
            stale_slots,
            max_slots,
            queue_hint,
            generated_at: self.clock.wall(),
        })
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
