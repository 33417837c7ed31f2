// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry lock: serializes read-modify-write cycles across processes
//!
//! The lock is an exclusive `flock` on a file in the registry directory,
//! taken with a non-blocking try and polled with backoff. The kernel drops
//! the lock when its owner exits, so a crashed holder never wedges the
//! registry. The file itself is never removed; while held it carries an
//! owner record used only to name the holder in diagnostics.

use crate::clock::Clock;
use crate::process::{ProcessIdentity, ProcessProbe};
use crate::wait::{rounded, QueueWaitState, WaitPolicy};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LockError {
    #[error(
        "timed out after {} waiting for registry lock {} (held by {})",
        humantime::format_duration(rounded(*waited)),
        path.display(),
        holder.map_or_else(|| "an unknown process".to_string(), |pid| format!("pid {}", pid))
    )]
    Timeout {
        path: PathBuf,
        waited: Duration,
        holder: Option<u32>,
    },
    #[error("registry lock io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Diagnostic contents of the lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockOwner {
    #[serde(flatten)]
    owner: ProcessIdentity,
    acquired_at: DateTime<Utc>,
}

/// Advisory lock over one registry directory
#[derive(Clone)]
pub struct FileLock<P: ProcessProbe, C: Clock> {
    path: PathBuf,
    probe: P,
    clock: C,
    me: ProcessIdentity,
    backoff: WaitPolicy,
}

impl<P: ProcessProbe, C: Clock> FileLock<P, C> {
    pub fn new(path: impl Into<PathBuf>, probe: P, clock: C) -> Self {
        let me = probe.current();
        Self {
            path: path.into(),
            probe,
            clock,
            me,
            backoff: WaitPolicy::lock(),
        }
    }

    pub fn with_backoff(mut self, backoff: WaitPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` while holding the lock. The lock is released on every exit
    /// path, including a panic inside `f`.
    pub async fn with_lock<T>(
        &self,
        timeout: Duration,
        f: impl FnOnce() -> T,
    ) -> Result<T, LockError> {
        let _guard = self.acquire(timeout).await?;
        Ok(f())
    }

    /// Poll until the lock is ours or `timeout` passes
    pub async fn acquire(&self, timeout: Duration) -> Result<LockGuard, LockError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let mut wait = QueueWaitState::start(&self.clock, self.backoff.clone());
        loop {
            if let Some(guard) = self.try_acquire()? {
                if wait.attempts() > 0 {
                    debug!(
                        path = %self.path.display(),
                        attempts = wait.attempts(),
                        "registry lock acquired after contention"
                    );
                }
                return Ok(guard);
            }

            match wait.next_delay(&self.clock, timeout) {
                Some(delay) => tokio::time::sleep(delay).await,
                None => {
                    return Err(LockError::Timeout {
                        path: self.path.clone(),
                        waited: wait.elapsed(&self.clock),
                        holder: self.holder(),
                    })
                }
            }
        }
    }

    /// Single non-blocking attempt
    pub fn try_acquire(&self) -> Result<Option<LockGuard>, LockError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Ok(None);
            }
            return Err(self.io_err(e));
        }

        let owner = LockOwner {
            owner: self.me.clone(),
            acquired_at: self.clock.wall(),
        };
        // The record is informational; failing to write it does not lose the lock.
        let recorded = serde_json::to_vec(&owner)
            .map_err(io::Error::other)
            .and_then(|bytes| {
                file.set_len(0)?;
                file.write_all(&bytes)
            });
        if let Err(e) = recorded {
            debug!(path = %self.path.display(), error = %e, "could not record lock owner");
        }

        Ok(Some(LockGuard { file }))
    }

    /// Pid named by the lock file, if it still names a running process
    fn holder(&self) -> Option<u32> {
        let content = fs::read(&self.path).ok()?;
        let owner = serde_json::from_slice::<LockOwner>(&content).ok()?;
        self.probe
            .is_running(&owner.owner)
            .then_some(owner.owner.pid)
    }

    fn io_err(&self, source: io::Error) -> LockError {
        LockError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Held registry lock; released on drop or when the owning process dies
#[derive(Debug)]
pub struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(error = %e, "explicit unlock failed, released on close");
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
