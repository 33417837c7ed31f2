//! `tq run` queueing specs
//!
//! Independent `tq` processes share one registry directory and never run
//! more than the slot limit at once.

use crate::prelude::*;
use std::time::{Duration, Instant};

#[test]
fn three_runs_with_two_slots_queue_the_third() {
    let registry = Registry::empty();
    let started = Instant::now();

    let mut runs: Vec<_> = (1..=3)
        .map(|i| {
            let holder = format!("agent-{i}");
            registry.spawn(&["--max-slots", "2", "run", &holder, "--", "sleep", "2"])
        })
        .collect();

    let saw_queue = wait_for(SPEC_WAIT_MAX_MS, || {
        registry
            .tq()
            .args(&["--max-slots", "2", "status"])
            .passes()
            .stdout()
            .contains("Slots: 2/2 in use, 1 waiting")
    });
    assert!(saw_queue, "never observed two holders and one waiter");

    for run in &mut runs {
        assert!(run.wait().unwrap().success());
    }

    // The third run could only start after one of the first two finished.
    assert!(started.elapsed() >= Duration::from_millis(3800));
    assert!(registry.holders().is_empty());
}

#[test]
fn waiter_takes_the_slot_of_a_finished_run() {
    let registry = Registry::empty();

    let mut first = registry.spawn(&["--max-slots", "1", "run", "agent-1", "--", "sleep", "1"]);
    assert!(wait_for(SPEC_WAIT_MAX_MS, || registry.holders() == ["agent-1"]));

    registry
        .tq()
        .args(&["--max-slots", "1", "run", "--timeout", "30", "agent-2", "--", "true"])
        .passes();

    assert!(first.wait().unwrap().success());
    assert!(registry.holders().is_empty());
}

#[test]
fn slot_of_a_crashed_holder_is_reclaimed() {
    let registry = Registry::empty();
    registry.seed_slots(&[("agent-crashed", dead_pid())]);

    registry
        .tq()
        .args(&["--max-slots", "1", "run", "--timeout", "5", "agent-2", "--", "true"])
        .passes();

    assert!(registry.holders().is_empty());
}

#[test]
fn lock_left_by_a_dead_process_is_broken() {
    let registry = Registry::empty();
    let lock = serde_json::json!({
        "pid": dead_pid(),
        "token": "left-behind",
        "acquired_at": "2026-01-01T00:00:00Z",
    });
    registry.file("lock", &lock.to_string());

    let started = Instant::now();
    registry
        .tq()
        .args(&["run", "agent-1", "--", "true"])
        .passes();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(registry.holders().is_empty());
}

#[test]
fn first_run_persists_the_effective_config() {
    let registry = Registry::empty();

    registry
        .tq()
        .args(&["--max-slots", "2", "run", "agent-1", "--", "true"])
        .passes();

    registry
        .tq()
        .args(&["config"])
        .passes()
        .stdout_has("Max slots: 2");
}
