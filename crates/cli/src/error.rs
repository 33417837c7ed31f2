// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.
//!
//! Every failure `tq` reports itself carries:
//! - What went wrong (message)
//! - Why it might have happened (context)
//! - How to fix it (suggestions)
//! - The exit code it maps to

use crate::exit;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tq_core::{AcquireError, LockError, SlotRecord};

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct TqError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
    /// Process exit code for this failure
    pub code: u8,
    /// Original error if any
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TqError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            code: exit::COORDINATOR_FAILURE,
            source: None,
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_code(mut self, code: u8) -> Self {
        self.code = code;
        self
    }

    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for TqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for TqError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Builders for the failures `tq` knows how to explain.
impl TqError {
    /// No slot freed up in time.
    pub fn acquire_timeout(holder: &str, waited: Duration, dir: &Path) -> Self {
        let waited = humantime::format_duration(Duration::from_secs(waited.as_secs()));
        TqError::new(format!("Timed out waiting for a slot for '{}'", holder))
            .with_context(format!("Every slot stayed busy for {}", waited))
            .with_suggestion(format!("See who holds them: tq --dir {} status", dir.display()))
            .with_suggestion("Wait longer: tq run --timeout <SECS> ...")
            .with_code(exit::ACQUIRE_TIMEOUT)
    }

    /// The holder already runs something under a live slot.
    pub fn duplicate_holder(holder: &str, existing: &SlotRecord) -> Self {
        TqError::new(format!("'{}' already holds a slot", holder))
            .with_context(format!(
                "Slot {} is held by pid {}",
                existing.slot_id.short(),
                existing.pid
            ))
            .with_suggestion("Wait for the earlier run to finish")
            .with_suggestion("Run anyway: tq run --allow-duplicate ...")
            .with_code(exit::DUPLICATE_HOLDER)
    }

    /// The registry lock stayed held by a live process.
    pub fn lock_busy(dir: &Path, waited: Duration, holder: Option<u32>) -> Self {
        let err = TqError::new("Could not take the registry lock").with_context(format!(
            "Waited {} on {}",
            humantime::format_duration(Duration::from_millis(
                u64::try_from(waited.as_millis()).unwrap_or(u64::MAX)
            )),
            dir.display()
        ));
        match holder {
            Some(pid) => err
                .with_context(format!("Lock is held by pid {}", pid))
                .with_suggestion(format!("Check whether pid {} is stuck", pid)),
            None => err.with_suggestion("Try again in a moment"),
        }
    }

    /// Reading or writing the registry failed.
    pub fn registry(dir: &Path, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        TqError::new(format!("Registry failure: {}", source))
            .with_context(format!("Registry directory: {}", dir.display()))
            .with_suggestion("Check that the directory is writable")
            .with_suggestion("Use a different registry: tq --dir <PATH> ... or TQ_DIR")
            .with_source(source)
    }

    /// Map an allocator failure onto its user-facing form.
    pub fn from_acquire(err: AcquireError, dir: &Path) -> Self {
        match err {
            AcquireError::Timeout { holder, waited } => Self::acquire_timeout(&holder, waited, dir),
            AcquireError::Lock(LockError::Timeout { waited, holder, .. }) => {
                Self::lock_busy(dir, waited, holder)
            }
            AcquireError::Lock(err) => Self::registry(dir, err),
            AcquireError::Registry(err) => Self::registry(dir, err),
        }
    }

    /// The wrapped command could not be started.
    pub fn spawn_failed(program: &str, source: std::io::Error) -> Self {
        let (code, context) = match source.kind() {
            std::io::ErrorKind::NotFound => (exit::NOT_FOUND, "No such command on PATH"),
            std::io::ErrorKind::PermissionDenied => {
                (exit::NOT_EXECUTABLE, "The file is not executable")
            }
            _ => (exit::NOT_EXECUTABLE, "The command could not be started"),
        };
        TqError::new(format!("Failed to run '{}': {}", program, source))
            .with_context(context)
            .with_code(code)
            .with_source(source)
    }
}
