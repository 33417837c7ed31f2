// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slot records and the pure slot table
//!
//! [`SlotTable`] is the counting-semaphore state machine: it knows nothing
//! about files, locks or processes. The allocator loads a table from the
//! registry, feeds it inputs under the registry lock, and persists the
//! resulting table.

use crate::id::SlotId;
use crate::process::ProcessIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One held slot. Immutable once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub slot_id: SlotId,
    /// Caller-supplied label; not unique
    pub holder_id: String,
    /// Process occupying the slot
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    /// Start-time token guarding against pid reuse
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_token: Option<String>,
}

impl SlotRecord {
    pub fn new(
        slot_id: SlotId,
        holder_id: impl Into<String>,
        owner: &ProcessIdentity,
        acquired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            slot_id,
            holder_id: holder_id.into(),
            pid: owner.pid,
            acquired_at,
            start_token: owner.start_token.clone(),
        }
    }

    pub fn identity(&self) -> ProcessIdentity {
        ProcessIdentity {
            pid: self.pid,
            start_token: self.start_token.clone(),
        }
    }

    /// How long the slot has been held as of `now` (zero if the clock went backwards)
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.acquired_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Inputs that drive slot table transitions
#[derive(Clone, Debug)]
pub enum SlotInput {
    /// Take a slot if fewer than `max_slots` are held
    Reserve {
        record: SlotRecord,
        max_slots: u32,
    },
    /// Give back a slot; unknown ids are a no-op
    Release { slot_id: SlotId },
    /// Drop records whose owners were found dead
    Evict { slot_ids: Vec<SlotId> },
}

/// Observable outcomes of a transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotEvent {
    Acquired {
        slot_id: SlotId,
        holder_id: String,
        pid: u32,
        in_use: usize,
        max_slots: u32,
    },
    Denied {
        holder_id: String,
        in_use: usize,
        max_slots: u32,
    },
    Released {
        slot_id: SlotId,
        holder_id: String,
    },
    Reclaimed {
        slot_id: SlotId,
        holder_id: String,
        pid: u32,
    },
}

impl SlotEvent {
    /// Emit the event through `tracing`
    pub fn trace(&self) {
        match self {
            SlotEvent::Acquired {
                slot_id,
                holder_id,
                pid,
                in_use,
                max_slots,
            } => info!(%slot_id, holder = %holder_id, pid, in_use, max_slots, "slot acquired"),
            SlotEvent::Denied {
                holder_id,
                in_use,
                max_slots,
            } => debug!(holder = %holder_id, in_use, max_slots, "all slots busy"),
            SlotEvent::Released { slot_id, holder_id } => {
                info!(%slot_id, holder = %holder_id, "slot released")
            }
            SlotEvent::Reclaimed {
                slot_id,
                holder_id,
                pid,
            } => warn!(%slot_id, holder = %holder_id, pid, "reclaimed slot from dead process"),
        }
    }
}

/// The set of held slots
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotTable {
    slots: Vec<SlotRecord>,
}

impl SlotTable {
    pub fn from_records(slots: Vec<SlotRecord>) -> Self {
        Self { slots }
    }

    pub fn records(&self) -> &[SlotRecord] {
        &self.slots
    }

    pub fn into_records(self) -> Vec<SlotRecord> {
        self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot_id: &SlotId) -> Option<&SlotRecord> {
        self.slots.iter().find(|s| &s.slot_id == slot_id)
    }

    /// Check if there's room for one more holder
    pub fn can_reserve(&self, max_slots: u32) -> bool {
        self.slots.len() < max_slots as usize
    }

    /// Pure state transition function
    pub fn transition(&self, input: SlotInput) -> (SlotTable, Vec<SlotEvent>) {
        let mut table = self.clone();
        let mut events = Vec::new();

        match input {
            SlotInput::Reserve { record, max_slots } => {
                if table.can_reserve(max_slots) && table.get(&record.slot_id).is_none() {
                    events.push(SlotEvent::Acquired {
                        slot_id: record.slot_id.clone(),
                        holder_id: record.holder_id.clone(),
                        pid: record.pid,
                        in_use: table.len() + 1,
                        max_slots,
                    });
                    table.slots.push(record);
                } else {
                    events.push(SlotEvent::Denied {
                        holder_id: record.holder_id,
                        in_use: table.len(),
                        max_slots,
                    });
                }
            }

            SlotInput::Release { slot_id } => {
                if let Some(pos) = table.slots.iter().position(|s| s.slot_id == slot_id) {
                    let removed = table.slots.remove(pos);
                    events.push(SlotEvent::Released {
                        slot_id,
                        holder_id: removed.holder_id,
                    });
                }
            }

            SlotInput::Evict { slot_ids } => {
                table.slots.retain(|s| {
                    if slot_ids.contains(&s.slot_id) {
                        events.push(SlotEvent::Reclaimed {
                            slot_id: s.slot_id.clone(),
                            holder_id: s.holder_id.clone(),
                            pid: s.pid,
                        });
                        false
                    } else {
                        true
                    }
                });
            }
        }

        (table, events)
    }
}

#[cfg(test)]
#[path = "slot_tests.rs"]
mod tests;
