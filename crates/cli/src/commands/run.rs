// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tq run <holder> -- <command...>` - Run a command while holding a slot

use super::Context;
use crate::error::TqError;
use crate::exit;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, SignalKind};
use tq_core::SlotHandle;
use tracing::{debug, info, warn};

#[derive(clap::Args)]
pub struct RunArgs {
    /// Seconds to wait for a free slot (default: registry config)
    #[arg(long, env = "TQ_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Let this holder run more than one command at a time
    #[arg(long)]
    pub allow_duplicate: bool,

    /// Who is asking for the slot (e.g. an agent name)
    pub holder: String,

    /// Command to run once a slot is held
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Termination signals, installed once so none are missed between phases.
///
/// Any of them left at its default action would kill `tq` and orphan the
/// command while its slot is reclaimed, so all are caught and forwarded.
struct Interrupts {
    int: tokio::signal::unix::Signal,
    term: tokio::signal::unix::Signal,
    hup: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

impl Interrupts {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            int: signal(SignalKind::interrupt())?,
            term: signal(SignalKind::terminate())?,
            hup: signal(SignalKind::hangup())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    async fn recv(&mut self) -> Signal {
        tokio::select! {
            _ = self.int.recv() => Signal::SIGINT,
            _ = self.term.recv() => Signal::SIGTERM,
            _ = self.hup.recv() => Signal::SIGHUP,
            _ = self.quit.recv() => Signal::SIGQUIT,
        }
    }
}

pub async fn handle(ctx: &Context, args: RunArgs) -> Result<u8, TqError> {
    let allocator = ctx.allocator();
    let mut interrupts = Interrupts::install()
        .map_err(|e| TqError::new("Failed to install signal handlers").with_source(e))?;

    let timeout = match args.timeout {
        Some(secs) => Duration::from_secs(secs),
        None => allocator
            .config()
            .map_err(|e| TqError::from_acquire(e, &ctx.dir))?
            .default_wait_timeout(),
    };

    if !args.allow_duplicate {
        let existing = allocator
            .active_slot(&args.holder)
            .map_err(|e| TqError::from_acquire(e, &ctx.dir))?;
        if let Some(existing) = existing {
            return Err(TqError::duplicate_holder(&args.holder, &existing));
        }
    }

    // Dropping the acquire future on a signal abandons the wait; any
    // waiter marker is removed with it.
    let handle = tokio::select! {
        acquired = allocator.acquire(&args.holder, timeout) => {
            acquired.map_err(|e| TqError::from_acquire(e, &ctx.dir))?
        }
        sig = interrupts.recv() => {
            info!(holder = %args.holder, signal = %sig, "interrupted while waiting for a slot");
            eprintln!("tq: interrupted while waiting for a slot");
            return Ok(exit::signaled(sig as i32));
        }
    };

    let outcome = supervise(&args.command, &handle, &mut interrupts).await;

    match allocator.release(&handle).await {
        Ok(true) => {}
        Ok(false) => debug!(slot_id = %handle.slot_id(), "slot was already reclaimed"),
        // The reaper frees the slot once this process is gone.
        Err(e) => warn!(slot_id = %handle.slot_id(), error = %e, "failed to release slot"),
    }

    outcome
}

/// Run the command to completion, passing interrupts through to it.
async fn supervise(
    command: &[String],
    handle: &SlotHandle,
    interrupts: &mut Interrupts,
) -> Result<u8, TqError> {
    let mut child = spawn(command, handle)?;

    loop {
        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| {
                    TqError::new("Lost track of the running command").with_source(e)
                })?;
                let code = exit::of_status(status);
                info!(slot_id = %handle.slot_id(), code, "command finished");
                return Ok(code);
            }
            sig = interrupts.recv() => forward(&child, sig),
        }
    }
}

fn spawn(command: &[String], handle: &SlotHandle) -> Result<Child, TqError> {
    let Some((program, args)) = command.split_first() else {
        return Err(TqError::new("No command given").with_code(exit::NOT_FOUND));
    };

    let child = Command::new(program)
        .args(args)
        .env("TQ_SLOT_ID", handle.slot_id().to_string())
        .env("TQ_HOLDER", handle.holder_id())
        .spawn()
        .map_err(|e| TqError::spawn_failed(program, e))?;

    info!(
        slot_id = %handle.slot_id(),
        holder = handle.holder_id(),
        pid = child.id(),
        program = %program,
        "command started"
    );
    Ok(child)
}

fn forward(child: &Child, sig: Signal) {
    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    debug!(pid, signal = %sig, "forwarding signal to command");
    if let Err(e) = kill(Pid::from_raw(pid), sig) {
        debug!(pid, error = %e, "signal not delivered");
    }
}
