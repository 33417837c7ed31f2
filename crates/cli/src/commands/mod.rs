// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod cleanup;
pub mod config;
pub mod run;
pub mod status;

use std::path::PathBuf;
use tq_core::{FsRegistry, StatusReporter, SystemAllocator, SystemClock, SystemProbe};

/// Options shared by every command
pub struct Context {
    pub dir: PathBuf,
    /// Per-invocation override of the persisted slot limit
    pub max_slots: Option<u32>,
}

impl Context {
    pub fn allocator(&self) -> SystemAllocator {
        SystemAllocator::open(&self.dir).with_max_slots(self.max_slots)
    }

    pub fn reporter(&self) -> StatusReporter<FsRegistry, SystemProbe, SystemClock> {
        let store = FsRegistry::new(&self.dir);
        let waiters = store.waiters();
        StatusReporter::new(store, SystemProbe, SystemClock)
            .with_waiters(waiters)
            .with_max_slots(self.max_slots)
    }
}
