// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tq config` - Show or change the persisted registry settings

use super::Context;
use crate::error::TqError;
use crate::output::{self, OutputFormat};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tq_core::{RegistryConfig, RegistryStore};

#[derive(clap::Args)]
pub struct ConfigArgs {
    /// Persist a new slot limit
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_slots: Option<u32>,

    /// Persist a new default wait timeout (seconds)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Serialize)]
struct ConfigView {
    dir: PathBuf,
    #[serde(flatten)]
    config: RegistryConfig,
}

impl fmt::Display for ConfigView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Registry: {}", self.dir.display())?;
        writeln!(f, "Max slots: {}", self.config.max_slots)?;
        write!(
            f,
            "Default timeout: {}",
            humantime::format_duration(self.config.default_wait_timeout())
        )
    }
}

pub async fn handle(ctx: &Context, args: ConfigArgs) -> Result<u8, TqError> {
    let allocator = ctx.allocator();

    let config = if args.max_slots.is_none() && args.timeout.is_none() {
        allocator
            .config()
            .map_err(|e| TqError::from_acquire(e, &ctx.dir))?
    } else {
        let mut config = allocator
            .store()
            .config_or_default()
            .map_err(|e| TqError::registry(&ctx.dir, e))?;
        if let Some(max_slots) = args.max_slots {
            config = config.with_max_slots(max_slots);
        }
        if let Some(secs) = args.timeout {
            config = config.with_default_wait_timeout(Duration::from_secs(secs));
        }
        allocator
            .set_config(config.clone())
            .await
            .map_err(|e| TqError::from_acquire(e, &ctx.dir))?;
        config
    };

    output::print(
        &ConfigView {
            dir: ctx.dir.clone(),
            config,
        },
        args.format,
    );
    Ok(crate::exit::SUCCESS)
}
