// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slot allocator: acquire and release policy over the registry
//!
//! Every mutation follows the same shape: take the registry lock, load the
//! slot table, sweep out dead owners, apply one transition, write the table
//! back, drop the lock. Waiting for a full registry happens outside the
//! lock by polling with backoff.

use crate::clock::{Clock, SystemClock};
use crate::config::RegistryConfig;
use crate::id::{IdGen, SlotId, UuidIdGen};
use crate::lock::{FileLock, LockError};
use crate::process::{ProcessIdentity, ProcessProbe, SystemProbe};
use crate::reaper::Reaper;
use crate::registry::{FsRegistry, RegistryError, RegistryStore, WaiterBoard, WaiterMarker};
use crate::slot::{SlotEvent, SlotInput, SlotRecord, SlotTable};
use crate::wait::{rounded, QueueWaitState, WaitPolicy};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Attempts at taking the registry lock before giving up on an operation
pub const LOCK_RETRIES: u32 = 3;

/// Per-attempt wait for the registry lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error(
        "no slot became free for '{holder}' within {}",
        humantime::format_duration(rounded(*waited))
    )]
    Timeout { holder: String, waited: Duration },
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Proof of a held slot. Pass it back to [`Allocator::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotHandle {
    record: SlotRecord,
}

impl SlotHandle {
    pub fn slot_id(&self) -> &SlotId {
        &self.record.slot_id
    }

    pub fn holder_id(&self) -> &str {
        &self.record.holder_id
    }

    pub fn record(&self) -> &SlotRecord {
        &self.record
    }
}

/// Outcome of one reservation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Acquired(SlotHandle),
    Full { in_use: usize, max_slots: u32 },
}

/// Dependencies for an allocator
pub struct AllocatorDeps<S, P: ProcessProbe, C: Clock, I> {
    pub store: S,
    pub lock: FileLock<P, C>,
    pub probe: P,
    pub clock: C,
    pub ids: I,
}

pub struct Allocator<S, P, C, I>
where
    S: RegistryStore,
    P: ProcessProbe,
    C: Clock,
    I: IdGen,
{
    store: S,
    lock: FileLock<P, C>,
    reaper: Reaper<P>,
    probe: P,
    clock: C,
    ids: I,
    owner: ProcessIdentity,
    waiters: Option<WaiterBoard>,
    queue_policy: WaitPolicy,
    lock_timeout: Duration,
    max_slots_override: Option<u32>,
}

/// Allocator wired to the real filesystem, processes and clock
pub type SystemAllocator = Allocator<FsRegistry, SystemProbe, SystemClock, UuidIdGen>;

impl SystemAllocator {
    /// Allocator over the registry directory `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let store = FsRegistry::new(dir);
        let lock = FileLock::new(store.lock_path(), SystemProbe, SystemClock);
        let waiters = store.waiters();
        Allocator::new(AllocatorDeps {
            store,
            lock,
            probe: SystemProbe,
            clock: SystemClock,
            ids: UuidIdGen,
        })
        .with_waiters(waiters)
    }
}

impl<S, P, C, I> Allocator<S, P, C, I>
where
    S: RegistryStore,
    P: ProcessProbe,
    C: Clock,
    I: IdGen,
{
    pub fn new(deps: AllocatorDeps<S, P, C, I>) -> Self {
        let owner = deps.probe.current();
        Self {
            store: deps.store,
            lock: deps.lock,
            reaper: Reaper::new(deps.probe.clone()),
            probe: deps.probe,
            clock: deps.clock,
            ids: deps.ids,
            owner,
            waiters: None,
            queue_policy: WaitPolicy::queue(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            max_slots_override: None,
        }
    }

    pub fn with_waiters(mut self, waiters: WaiterBoard) -> Self {
        self.waiters = Some(waiters);
        self
    }

    pub fn with_queue_policy(mut self, policy: WaitPolicy) -> Self {
        self.queue_policy = policy;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Use this limit instead of the persisted one
    pub fn with_max_slots(mut self, max_slots: Option<u32>) -> Self {
        self.max_slots_override = max_slots.filter(|&n| n > 0);
        self
    }

    /// Record slots as owned by `owner` instead of the calling process
    pub fn with_owner(mut self, owner: ProcessIdentity) -> Self {
        self.owner = owner;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Effective config: persisted values with any override applied
    pub fn config(&self) -> Result<RegistryConfig, AcquireError> {
        Ok(self.effective(self.store.read_config()?))
    }

    fn effective(&self, stored: Option<RegistryConfig>) -> RegistryConfig {
        let config = stored.unwrap_or_default();
        match self.max_slots_override {
            Some(max_slots) => config.with_max_slots(max_slots),
            None => config,
        }
    }

    /// Persist a new config under the registry lock
    pub async fn set_config(&self, config: RegistryConfig) -> Result<(), AcquireError> {
        config.validate().map_err(RegistryError::from)?;
        self.lock
            .with_lock(self.lock_timeout, || self.store.write_config(&config))
            .await??;
        info!(
            max_slots = config.max_slots,
            timeout_secs = config.default_wait_timeout_secs,
            "registry config updated"
        );
        Ok(())
    }

    /// Block until a slot is reserved for `holder_id` or `timeout` passes.
    ///
    /// Dropping the returned future before it resolves leaves nothing
    /// behind: a slot only exists once the in-lock reservation succeeds.
    pub async fn acquire(
        &self,
        holder_id: &str,
        timeout: Duration,
    ) -> Result<SlotHandle, AcquireError> {
        let mut wait = QueueWaitState::start(&self.clock, self.queue_policy.clone());
        let mut marker: Option<WaiterMarker> = None;

        loop {
            match self.reserve(holder_id).await? {
                Attempt::Acquired(handle) => {
                    if wait.attempts() > 0 {
                        info!(
                            holder = holder_id,
                            waited_ms = millis(wait.elapsed(&self.clock)),
                            "slot acquired after waiting"
                        );
                    }
                    return Ok(handle);
                }
                Attempt::Full { in_use, max_slots } => {
                    if wait.attempts() == 0 {
                        info!(
                            holder = holder_id,
                            in_use, max_slots, "all slots busy, waiting"
                        );
                        marker = self.waiters.as_ref().and_then(|board| {
                            board.enter(holder_id, &self.owner, self.clock.wall())
                        });
                    }
                    match wait.next_delay(&self.clock, timeout) {
                        Some(delay) => {
                            debug!(
                                holder = holder_id,
                                delay_ms = millis(delay),
                                "polling for a free slot"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            drop(marker);
                            return Err(AcquireError::Timeout {
                                holder: holder_id.to_string(),
                                waited: wait.elapsed(&self.clock),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Single reservation attempt; `None` when every slot is busy
    pub async fn try_acquire(&self, holder_id: &str) -> Result<Option<SlotHandle>, AcquireError> {
        Ok(match self.reserve(holder_id).await? {
            Attempt::Acquired(handle) => Some(handle),
            Attempt::Full { .. } => None,
        })
    }

    /// Give a slot back. Returns whether a record was removed; a slot that
    /// is already gone (released or reaped) is not an error.
    pub async fn release(&self, handle: &SlotHandle) -> Result<bool, AcquireError> {
        let slot_id = handle.slot_id().clone();
        self.locked(|| {
            let table = SlotTable::from_records(self.store.list_slots()?);
            let (table, events) = table.transition(SlotInput::Release {
                slot_id: slot_id.clone(),
            });
            if events.is_empty() {
                debug!(%slot_id, "slot already gone, nothing to release");
                return Ok(false);
            }
            self.store.write_slots(table.records())?;
            events.iter().for_each(SlotEvent::trace);
            Ok(true)
        })
        .await
    }

    /// Force a sweep and persist the evictions. Returns the evicted records.
    pub async fn cleanup(&self) -> Result<Vec<SlotRecord>, AcquireError> {
        let evicted = self
            .locked(|| {
                let table = SlotTable::from_records(self.store.list_slots()?);
                let mut events = Vec::new();
                let (table, evicted) = self.evict_dead(table, &mut events);
                if !evicted.is_empty() {
                    self.store.write_slots(table.records())?;
                    events.iter().for_each(SlotEvent::trace);
                }
                let orphans = self.store.remove_orphans()?;
                if orphans > 0 {
                    info!(orphans, "removed temp files of interrupted writes");
                }
                Ok(evicted)
            })
            .await?;

        if let Some(board) = &self.waiters {
            let pruned = board.prune(&self.probe);
            if pruned > 0 {
                debug!(pruned, "removed markers of dead waiters");
            }
        }
        Ok(evicted)
    }

    /// A live slot already held under `holder_id`, if any.
    ///
    /// Reads without the lock; callers use it for a best-effort
    /// one-process-per-holder check before acquiring.
    pub fn active_slot(&self, holder_id: &str) -> Result<Option<SlotRecord>, AcquireError> {
        Ok(self
            .store
            .list_slots()?
            .into_iter()
            .find(|r| r.holder_id == holder_id && self.probe.is_running(&r.identity())))
    }

    async fn reserve(&self, holder_id: &str) -> Result<Attempt, AcquireError> {
        self.locked(|| {
            let stored = self.store.read_config()?;
            let config = self.effective(stored.clone());
            if stored.is_none() {
                self.store.write_config(&config)?;
                debug!(max_slots = config.max_slots, "initialised registry config");
            }

            let mut events = Vec::new();
            let table = SlotTable::from_records(self.store.list_slots()?);
            let (table, evicted) = self.evict_dead(table, &mut events);

            let record = SlotRecord::new(
                SlotId::new(self.ids.next()),
                holder_id,
                &self.owner,
                self.clock.wall(),
            );
            let (table, reserved) = table.transition(SlotInput::Reserve {
                record: record.clone(),
                max_slots: config.max_slots,
            });
            let acquired = reserved
                .iter()
                .any(|e| matches!(e, SlotEvent::Acquired { .. }));
            events.extend(reserved);

            if acquired || !evicted.is_empty() {
                self.store.write_slots(table.records())?;
            }
            events.iter().for_each(SlotEvent::trace);

            Ok(if acquired {
                Attempt::Acquired(SlotHandle { record })
            } else {
                Attempt::Full {
                    in_use: table.len(),
                    max_slots: config.max_slots,
                }
            })
        })
        .await
    }

    fn evict_dead(
        &self,
        table: SlotTable,
        events: &mut Vec<SlotEvent>,
    ) -> (SlotTable, Vec<SlotRecord>) {
        let sweep = self.reaper.sweep(table.records().to_vec());
        if sweep.evicted.is_empty() {
            return (table, Vec::new());
        }
        let (table, reclaimed) = table.transition(SlotInput::Evict {
            slot_ids: sweep.evicted.iter().map(|r| r.slot_id.clone()).collect(),
        });
        events.extend(reclaimed);
        (table, sweep.evicted)
    }

    /// Run `f` under the registry lock, retrying lock timeouts a few times
    async fn locked<T>(
        &self,
        f: impl FnOnce() -> Result<T, AcquireError>,
    ) -> Result<T, AcquireError> {
        let mut attempt = 1;
        loop {
            match self.lock.acquire(self.lock_timeout).await {
                Ok(_guard) => return f(),
                Err(e @ LockError::Timeout { .. }) if attempt < LOCK_RETRIES => {
                    warn!(attempt, error = %e, "registry lock busy, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "allocator_tests.rs"]
mod tests;
