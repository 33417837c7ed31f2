// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reaper: finds slots whose owning process has gone away
//!
//! Eviction errs on the side of reclaiming. A leaked slot wastes capacity
//! for every agent on the host until someone notices; a live holder that
//! gets evicted only loses its place in the count.

use crate::process::ProcessProbe;
use crate::slot::SlotRecord;

/// Result of a sweep: every input record lands in exactly one side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sweep {
    pub live: Vec<SlotRecord>,
    pub evicted: Vec<SlotRecord>,
}

#[derive(Clone)]
pub struct Reaper<P: ProcessProbe> {
    probe: P,
}

impl<P: ProcessProbe> Reaper<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }

    /// Partition `records` by owner liveness. Touches no storage; one probe
    /// per record.
    pub fn sweep(&self, records: Vec<SlotRecord>) -> Sweep {
        let (live, evicted) = records
            .into_iter()
            .partition(|record| self.probe.is_running(&record.identity()));
        Sweep { live, evicted }
    }
}
