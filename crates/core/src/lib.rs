// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tq-core: host-wide slot coordinator for resource-heavy test runs
//!
//! Independent processes with no common parent agree, through a shared
//! directory alone, to run at most `max_slots` test runners at a time.
//!
//! This crate provides:
//! - A registry store of held slots (JSON files, atomic whole-file writes)
//! - A registry lock with dead-owner detection
//! - A reaper that reclaims slots of crashed processes
//! - The allocator (acquire with timeout, idempotent release, cleanup)
//! - A lock-free status reporter

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod clock;
pub mod config;
pub mod id;
pub mod process;
pub mod wait;

pub mod allocator;
pub mod lock;
pub mod reaper;
pub mod registry;
pub mod slot;
pub mod status;

pub use allocator::{
    AcquireError, Allocator, AllocatorDeps, Attempt, SlotHandle, SystemAllocator, LOCK_RETRIES,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{default_registry_dir, ConfigError, RegistryConfig};
pub use id::{IdGen, SequentialIdGen, SlotId, UuidIdGen};
pub use lock::{FileLock, LockError, LockGuard};
#[cfg(test)]
pub use process::FakeProbe;
pub use process::{ProcessIdentity, ProcessProbe, SystemProbe};
pub use reaper::{Reaper, Sweep};
pub use registry::{FsRegistry, RegistryError, RegistryStore, WaiterBoard};
pub use slot::{SlotEvent, SlotInput, SlotRecord, SlotTable};
pub use status::{StatusReport, StatusReporter};
pub use wait::{QueueWaitState, WaitPolicy};
