// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tq cleanup` - Evict slots whose owners are gone

use super::Context;
use crate::error::TqError;
use crate::exit;

/// Never fails the caller: problems are printed and the exit code stays 0.
pub async fn handle(ctx: &Context) -> u8 {
    match ctx.allocator().cleanup().await {
        Ok(evicted) => {
            println!("Evicted {} stale slot(s)", evicted.len());
            for record in &evicted {
                println!(
                    "  {} (holder {}, pid {})",
                    record.slot_id.short(),
                    record.holder_id,
                    record.pid
                );
            }
        }
        Err(e) => eprint!("{}", TqError::from_acquire(e, &ctx.dir)),
    }
    exit::SUCCESS
}
