// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tq status` - Show who holds the slots

use super::Context;
use crate::error::TqError;
use crate::exit;
use crate::output::{self, OutputFormat};

#[derive(clap::Args)]
pub struct StatusArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Never fails the caller: problems are printed and the exit code stays 0.
pub fn handle(ctx: &Context, args: StatusArgs) -> u8 {
    match ctx.reporter().report() {
        Ok(report) => output::print(&report, args.format),
        Err(e) => eprint!("{}", TqError::registry(&ctx.dir, e)),
    }
    exit::SUCCESS
}
