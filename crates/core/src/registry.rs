// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry store: the on-disk source of truth for held slots
//!
//! Layout of a registry directory:
//!
//! ```text
//! <dir>/slots.json     {"version": 1, "slots": [SlotRecord, ...]}
//! <dir>/config.json    RegistryConfig
//! <dir>/lock           registry lock (see crate::lock)
//! <dir>/waiters/*.json one marker per waiting process, observability only
//! ```
//!
//! Every write replaces a whole file via write-to-temp and rename, so a
//! reader sees either the old or the new snapshot. Decoding is tolerant:
//! an unreadable record is skipped, never fatal.

use crate::config::{ConfigError, RegistryConfig};
use crate::process::{ProcessIdentity, ProcessProbe};
use crate::slot::SlotRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const SLOTS_FILE: &str = "slots.json";
pub const CONFIG_FILE: &str = "config.json";
pub const LOCK_FILE: &str = "lock";
pub const WAITERS_DIR: &str = "waiters";

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode registry data: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl RegistryError {
    fn io(path: &Path, source: io::Error) -> Self {
        RegistryError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Data access for the slot registry. No policy lives here.
pub trait RegistryStore: Send + Sync {
    /// All decodable slot records; unreadable entries are skipped
    fn list_slots(&self) -> Result<Vec<SlotRecord>, RegistryError>;

    /// Replace the whole slot set
    fn write_slots(&self, slots: &[SlotRecord]) -> Result<(), RegistryError>;

    /// The persisted config, or `None` if none has been written yet
    fn read_config(&self) -> Result<Option<RegistryConfig>, RegistryError>;

    fn write_config(&self, config: &RegistryConfig) -> Result<(), RegistryError>;

    /// The persisted config, falling back to defaults
    fn config_or_default(&self) -> Result<RegistryConfig, RegistryError> {
        Ok(self.read_config()?.unwrap_or_default())
    }

    /// Delete leftovers of writes that never completed. Only safe while
    /// holding the registry lock, since every writer holds it too.
    /// Returns how many were removed.
    fn remove_orphans(&self) -> Result<usize, RegistryError> {
        Ok(0)
    }
}

#[derive(Serialize)]
struct SlotsFileOut<'a> {
    version: u32,
    slots: &'a [SlotRecord],
}

/// Registry kept as plain JSON files in one directory
#[derive(Clone, Debug)]
pub struct FsRegistry {
    dir: PathBuf,
}

impl FsRegistry {
    /// Open a registry rooted at `dir`. The directory is created lazily on
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn slots_path(&self) -> PathBuf {
        self.dir.join(SLOTS_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    pub fn waiters(&self) -> WaiterBoard {
        WaiterBoard::new(self.dir.join(WAITERS_DIR))
    }

    fn ensure_dir(&self) -> Result<(), RegistryError> {
        fs::create_dir_all(&self.dir).map_err(|e| RegistryError::io(&self.dir, e))
    }

    fn read_optional(&self, path: &Path) -> Result<Option<String>, RegistryError> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RegistryError::io(path, e)),
        }
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<(), RegistryError> {
        self.ensure_dir()?;
        let target = self.dir.join(name);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()));

        let result = write_and_sync(&tmp, bytes).and_then(|()| fs::rename(&tmp, &target));
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result.map_err(|e| RegistryError::io(&target, e))
    }
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

impl RegistryStore for FsRegistry {
    fn list_slots(&self) -> Result<Vec<SlotRecord>, RegistryError> {
        let path = self.slots_path();
        Ok(self
            .read_optional(&path)?
            .map(|content| decode_slots(&content, &path))
            .unwrap_or_default())
    }

    fn write_slots(&self, slots: &[SlotRecord]) -> Result<(), RegistryError> {
        let json = serde_json::to_vec_pretty(&SlotsFileOut {
            version: FORMAT_VERSION,
            slots,
        })?;
        self.write_atomic(SLOTS_FILE, &json)
    }

    fn read_config(&self) -> Result<Option<RegistryConfig>, RegistryError> {
        let path = self.config_path();
        let Some(content) = self.read_optional(&path)? else {
            return Ok(None);
        };
        match serde_json::from_str::<RegistryConfig>(&content) {
            Ok(config) if config.validate().is_ok() => Ok(Some(config)),
            Ok(config) => {
                warn!(
                    path = %path.display(),
                    max_slots = config.max_slots,
                    "ignoring invalid registry config"
                );
                Ok(Some(RegistryConfig::default()))
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "unreadable registry config, using defaults"
                );
                Ok(Some(RegistryConfig::default()))
            }
        }
    }

    fn write_config(&self, config: &RegistryConfig) -> Result<(), RegistryError> {
        config.validate()?;
        let json = serde_json::to_vec_pretty(config)?;
        self.write_atomic(CONFIG_FILE, &json)
    }

    fn remove_orphans(&self) -> Result<usize, RegistryError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(RegistryError::io(&self.dir, e)),
        };

        let mut removed = 0;
        for path in entries.flatten().map(|entry| entry.path()) {
            if !is_temp_file(&path) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "removed abandoned temp file");
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(RegistryError::io(&path, e)),
            }
        }
        Ok(removed)
    }
}

/// Names produced by `write_atomic`: `.<file>.<uuid>.tmp`
fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') && name.ends_with(".tmp"))
}

/// Decode a slots file, skipping anything that does not parse.
///
/// Accepts the versioned object form and a bare array of records.
pub fn decode_slots(content: &str, path: &Path) -> Vec<SlotRecord> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let value: serde_json::Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable slots file, treating as empty");
            return Vec::new();
        }
    };

    let entries: &[serde_json::Value] = match &value {
        serde_json::Value::Array(entries) => entries.as_slice(),
        serde_json::Value::Object(map) => match map.get("slots") {
            Some(serde_json::Value::Array(entries)) => entries.as_slice(),
            _ => &[],
        },
        _ => {
            warn!(path = %path.display(), "slots file has unexpected shape, treating as empty");
            &[]
        }
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match SlotRecord::deserialize(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    index,
                    error = %e,
                    "skipping corrupt slot record"
                );
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WaiterEntry {
    holder_id: String,
    #[serde(flatten)]
    owner: ProcessIdentity,
    since: DateTime<Utc>,
}

/// Markers left by callers waiting for a slot.
///
/// Purely informational: it feeds the status queue hint and nothing in the
/// acquire or release path ever reads it.
#[derive(Clone, Debug)]
pub struct WaiterBoard {
    dir: PathBuf,
}

impl WaiterBoard {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Leave a marker; it is removed when the returned guard drops.
    /// Failures are logged and otherwise ignored.
    pub fn enter(
        &self,
        holder_id: &str,
        owner: &ProcessIdentity,
        since: DateTime<Utc>,
    ) -> Option<WaiterMarker> {
        let entry = WaiterEntry {
            holder_id: holder_id.to_string(),
            owner: owner.clone(),
            since,
        };
        let path = self
            .dir
            .join(format!("{}-{}.json", owner.pid, uuid::Uuid::new_v4()));

        let written = fs::create_dir_all(&self.dir)
            .and_then(|()| serde_json::to_vec(&entry).map_err(io::Error::other))
            .and_then(|bytes| fs::write(&path, bytes));
        match written {
            Ok(()) => Some(WaiterMarker { path }),
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "could not record waiter");
                None
            }
        }
    }

    /// Number of markers whose owner is still running
    pub fn count(&self, probe: &impl ProcessProbe) -> usize {
        self.entries()
            .filter(|(_, entry)| probe.is_running(&entry.owner))
            .count()
    }

    /// Remove markers left behind by dead processes; returns how many
    pub fn prune(&self, probe: &impl ProcessProbe) -> usize {
        let mut pruned = 0;
        for (path, entry) in self.entries() {
            if !probe.is_running(&entry.owner) && fs::remove_file(&path).is_ok() {
                pruned += 1;
            }
        }
        pruned
    }

    fn entries(&self) -> impl Iterator<Item = (PathBuf, WaiterEntry)> {
        fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "json"))
            .filter_map(|path| {
                let content = fs::read_to_string(&path).ok()?;
                let entry = serde_json::from_str(&content).ok()?;
                Some((path, entry))
            })
    }
}

/// Removes its waiter marker on drop
#[derive(Debug)]
pub struct WaiterMarker {
    path: PathBuf,
}

impl Drop for WaiterMarker {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
