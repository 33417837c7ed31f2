// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Slots available when nothing has been configured
pub const DEFAULT_MAX_SLOTS: u32 = 4;

/// Acquire timeout when nothing has been configured
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 300;

/// Directory name under the system temp dir shared by every agent on the host
pub const DEFAULT_DIR_NAME: &str = "tq-queue";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_slots must be at least 1")]
    ZeroSlots,
}

/// Persisted coordinator settings.
///
/// Missing fields take their defaults so older and newer config files can
/// be read by any version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub max_slots: u32,
    pub default_wait_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_slots: DEFAULT_MAX_SLOTS,
            default_wait_timeout_secs: DEFAULT_WAIT_TIMEOUT_SECS,
        }
    }
}

impl RegistryConfig {
    pub fn new(max_slots: u32) -> Self {
        Self {
            max_slots,
            ..Self::default()
        }
    }

    pub fn with_max_slots(mut self, max_slots: u32) -> Self {
        self.max_slots = max_slots;
        self
    }

    pub fn with_default_wait_timeout(mut self, timeout: Duration) -> Self {
        self.default_wait_timeout_secs = timeout.as_secs();
        self
    }

    pub fn default_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.default_wait_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_slots == 0 {
            return Err(ConfigError::ZeroSlots);
        }
        Ok(())
    }
}

/// Well-known registry location used when no directory is given
pub fn default_registry_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_DIR_NAME)
}
