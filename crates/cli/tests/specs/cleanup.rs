//! `tq cleanup` specs

use crate::prelude::*;

#[test]
fn cleanup_on_empty_registry_evicts_nothing() {
    let registry = Registry::empty();

    registry
        .tq()
        .args(&["cleanup"])
        .passes()
        .stdout_eq("Evicted 0 stale slot(s)\n");
}

#[test]
fn cleanup_evicts_exactly_the_dead_holders() {
    let registry = Registry::empty();
    registry.seed_slots(&[
        ("agent-gone", dead_pid()),
        ("agent-live", live_pid()),
        ("agent-also-gone", dead_pid()),
    ]);

    registry
        .tq()
        .args(&["cleanup"])
        .passes()
        .stdout_has("Evicted 2 stale slot(s)")
        .stdout_has("agent-gone")
        .stdout_has("agent-also-gone");

    assert_eq!(registry.holders(), ["agent-live"]);
}

#[test]
fn cleanup_is_idempotent() {
    let registry = Registry::empty();
    registry.seed_slots(&[("agent-gone", dead_pid())]);

    registry.tq().args(&["cleanup"]).passes().stdout_has("Evicted 1");
    registry.tq().args(&["cleanup"]).passes().stdout_has("Evicted 0");
}

#[test]
fn cleanup_never_fails_the_caller() {
    let registry = Registry::empty();
    let not_a_dir = registry.scratch().join("plain-file");
    std::fs::write(&not_a_dir, "x").unwrap();

    registry
        .tq()
        .env("TQ_DIR", not_a_dir.to_str().unwrap())
        .args(&["cleanup"])
        .passes()
        .stderr_has("error:");
}

#[test]
fn cleanup_removes_temp_files_left_by_interrupted_writes() {
    let registry = Registry::empty();
    registry.seed_slots(&[("agent-live", live_pid())]);
    registry.file(".slots.json.5d1a.tmp", "{\"version\":1,");

    registry.tq().args(&["cleanup"]).passes().stdout_has("Evicted 0");

    assert!(!registry.dir().join(".slots.json.5d1a.tmp").exists());
    assert_eq!(registry.holders(), ["agent-live"]);
}
