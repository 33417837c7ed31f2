// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exit codes reserved by `tq`
//!
//! Everything below 123 belongs to the wrapped command. `tq run` passes the
//! child's own code through untouched.

use std::process::ExitStatus;

pub const SUCCESS: u8 = 0;
/// Holder already has a live slot and duplicates were not allowed
pub const DUPLICATE_HOLDER: u8 = 123;
/// No slot became free before the timeout
pub const ACQUIRE_TIMEOUT: u8 = 124;
/// Registry or lock failure; the command was not run
pub const COORDINATOR_FAILURE: u8 = 125;
pub const NOT_EXECUTABLE: u8 = 126;
pub const NOT_FOUND: u8 = 127;
const SIGNAL_BASE: u8 = 128;

/// Shell convention for "terminated by signal `signo`"
pub fn signaled(signo: i32) -> u8 {
    u8::try_from(signo)
        .ok()
        .and_then(|s| SIGNAL_BASE.checked_add(s))
        .unwrap_or(u8::MAX)
}

/// Exit code mirroring how a child process ended
pub fn of_status(status: ExitStatus) -> u8 {
    use std::os::unix::process::ExitStatusExt;

    if let Some(code) = status.code() {
        return u8::try_from(code & 0xff).unwrap_or(u8::MAX);
    }
    status.signal().map_or(u8::MAX, signaled)
}
