// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tq - host-wide queue for resource-heavy test runs

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod error;
mod exit;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{cleanup, config, run, status, Context};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::error::TqError;

#[derive(Parser)]
#[command(
    name = "tq",
    version,
    about = "tq - cap how many heavy test runs execute at once on this host"
)]
struct Cli {
    /// Registry directory shared by every caller on the host
    #[arg(long, env = "TQ_DIR")]
    dir: Option<PathBuf>,

    /// Slot limit for this invocation (overrides the persisted one)
    #[arg(long, env = "TQ_MAX_SLOTS", value_parser = clap::value_parser!(u32).range(1..))]
    max_slots: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show held slots and how many callers are waiting
    Status(status::StatusArgs),
    /// Evict slots whose owning process is gone
    Cleanup,
    /// Run a command once a slot is free
    Run(run::RunArgs),
    /// Show or change the persisted settings
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let code = match e.downcast_ref::<TqError>() {
                Some(err) => {
                    eprint!("{}", err);
                    err.code
                }
                None => {
                    eprintln!("error: {:#}", e);
                    exit::COORDINATOR_FAILURE
                }
            };
            ExitCode::from(code)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<u8> {
    let ctx = Context {
        dir: cli.dir.unwrap_or_else(tq_core::default_registry_dir),
        max_slots: cli.max_slots,
    };

    let code = match cli.command {
        Commands::Status(args) => status::handle(&ctx, args),
        Commands::Cleanup => cleanup::handle(&ctx).await,
        Commands::Run(args) => run::handle(&ctx, args).await?,
        Commands::Config(args) => config::handle(&ctx, args).await?,
    };
    Ok(code)
}

/// Logs go to stderr so they never mix with command output.
fn init_logging() {
    let filter = EnvFilter::try_from_env("TQ_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}
