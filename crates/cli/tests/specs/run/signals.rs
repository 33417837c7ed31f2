//! `tq run` signal handling specs

use crate::prelude::*;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::Child;

fn signal(child: &Child, sig: Signal) {
    kill(Pid::from_raw(child.id() as i32), sig).unwrap();
}

fn waiter_markers(registry: &Registry) -> usize {
    std::fs::read_dir(registry.dir().join("waiters"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[test]
fn sigterm_while_waiting_exits_143_and_leaves_nothing_behind() {
    let registry = Registry::empty();
    registry.seed_slots(&[("agent-busy", live_pid())]);

    let mut waiter = registry.spawn(&[
        "--max-slots", "1", "run", "--timeout", "60", "agent-2", "--", "true",
    ]);
    assert!(wait_for(SPEC_WAIT_MAX_MS, || waiter_markers(&registry) == 1));

    signal(&waiter, Signal::SIGTERM);
    let status = waiter.wait().unwrap();

    assert_eq!(status.code(), Some(143));
    assert_eq!(registry.holders(), ["agent-busy"]);
    assert_eq!(waiter_markers(&registry), 0);
}

#[test]
fn sigint_while_waiting_exits_130() {
    let registry = Registry::empty();
    registry.seed_slots(&[("agent-busy", live_pid())]);

    let mut waiter = registry.spawn(&[
        "--max-slots", "1", "run", "--timeout", "60", "agent-2", "--", "true",
    ]);
    assert!(wait_for(SPEC_WAIT_MAX_MS, || waiter_markers(&registry) == 1));

    signal(&waiter, Signal::SIGINT);
    assert_eq!(waiter.wait().unwrap().code(), Some(130));
    assert_eq!(registry.holders(), ["agent-busy"]);
}

#[test]
fn sigterm_is_forwarded_to_the_command_and_the_slot_released() {
    let registry = Registry::empty();

    let mut run = registry.spawn(&["run", "agent-1", "--", "sleep", "30"]);
    assert!(wait_for(SPEC_WAIT_MAX_MS, || registry.holders() == ["agent-1"]));
    // Give tq a moment to start the child after recording the slot.
    std::thread::sleep(std::time::Duration::from_millis(200));

    signal(&run, Signal::SIGTERM);
    let status = run.wait().unwrap();

    assert_eq!(status.code(), Some(143));
    assert!(registry.holders().is_empty());
}

#[test]
fn sighup_does_not_orphan_the_command_or_drop_its_slot() {
    let registry = Registry::empty();

    let mut run = registry.spawn(&[
        "run", "agent-1", "--", "sh", "-c", "trap '' HUP; sleep 2",
    ]);
    assert!(wait_for(SPEC_WAIT_MAX_MS, || registry.holders() == ["agent-1"]));
    std::thread::sleep(std::time::Duration::from_millis(200));

    signal(&run, Signal::SIGHUP);
    std::thread::sleep(std::time::Duration::from_millis(300));

    assert!(run.try_wait().unwrap().is_none(), "tq exited before its command");
    assert_eq!(registry.holders(), ["agent-1"]);
    registry
        .tq()
        .args(&["status"])
        .passes()
        .stdout_has("Slots: 1/4 in use");

    assert_eq!(run.wait().unwrap().code(), Some(0));
    assert!(registry.holders().is_empty());
}

#[test]
fn sigquit_while_waiting_exits_131() {
    let registry = Registry::empty();
    registry.seed_slots(&[("agent-busy", live_pid())]);

    let mut waiter = registry.spawn(&[
        "--max-slots", "1", "run", "--timeout", "60", "agent-2", "--", "true",
    ]);
    assert!(wait_for(SPEC_WAIT_MAX_MS, || waiter_markers(&registry) == 1));

    signal(&waiter, Signal::SIGQUIT);
    assert_eq!(waiter.wait().unwrap().code(), Some(131));
    assert_eq!(waiter_markers(&registry), 0);
}
