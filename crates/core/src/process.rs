// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process liveness probing
//!
//! A pid on its own is a weak identity: the OS recycles them. Where the
//! platform exposes a process start time we record it as a start token and
//! compare it on every probe, so a recycled pid reads as a different process.

use serde::{Deserialize, Serialize};

/// Who a slot or lock belongs to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessIdentity {
    pub pid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_token: Option<String>,
}

/// Liveness queries against the host OS
pub trait ProcessProbe: Clone + Send + Sync {
    /// Whether `pid` currently names a running (non-zombie) process
    fn is_alive(&self, pid: u32) -> bool;

    /// Opaque start-time token for `pid`, if the platform provides one
    fn start_token(&self, pid: u32) -> Option<String>;

    /// Identity of the calling process
    fn current(&self) -> ProcessIdentity {
        let pid = std::process::id();
        ProcessIdentity {
            pid,
            start_token: self.start_token(pid),
        }
    }

    /// Whether the process recorded as `identity` is still the one running.
    ///
    /// A token mismatch means the pid was recycled. A missing token on
    /// either side falls back to the bare pid check.
    fn is_running(&self, identity: &ProcessIdentity) -> bool {
        if !self.is_alive(identity.pid) {
            return false;
        }
        match (&identity.start_token, self.start_token(identity.pid)) {
            (Some(expected), Some(actual)) => *expected == actual,
            _ => true,
        }
    }
}

/// Probe backed by `kill(pid, 0)` and, on Linux, `/proc/<pid>/stat`
#[derive(Clone, Default)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    fn is_alive(&self, pid: u32) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let raw = match i32::try_from(pid) {
            Ok(raw) if raw > 0 => raw,
            _ => return false,
        };
        let signalled = match kill(Pid::from_raw(raw), None) {
            Ok(()) => true,
            // Exists but owned by another user
            Err(Errno::EPERM) => true,
            Err(_) => false,
        };
        signalled && !is_zombie(pid)
    }

    fn start_token(&self, pid: u32) -> Option<String> {
        read_stat(pid).map(|stat| stat.start_time.to_string())
    }
}

/// The fields of `/proc/<pid>/stat` we care about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProcStat {
    pub state: char,
    /// Field 22: start time in clock ticks since boot
    pub start_time: u64,
}

/// Parse a `/proc/<pid>/stat` line.
///
/// The command name (field 2) may contain spaces and parentheses, so fields
/// are counted from the last `)`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn parse_stat(content: &str) -> Option<ProcStat> {
    let rest = &content[content.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    let state = fields.next()?.chars().next()?;
    let start_time = fields.nth(18)?.parse().ok()?;
    Some(ProcStat { state, start_time })
}

#[cfg(target_os = "linux")]
fn read_stat(pid: u32) -> Option<ProcStat> {
    let content = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    parse_stat(&content)
}

#[cfg(not(target_os = "linux"))]
fn read_stat(_pid: u32) -> Option<ProcStat> {
    None
}

fn is_zombie(pid: u32) -> bool {
    read_stat(pid).is_some_and(|stat| matches!(stat.state, 'Z' | 'X'))
}

#[cfg(test)]
pub use fake::FakeProbe;


#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
