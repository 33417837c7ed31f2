//! `tq status` specs
//!
//! Status is read-only and always exits 0.

use crate::prelude::*;

#[test]
fn status_on_a_fresh_registry_shows_defaults() {
    let registry = Registry::empty();

    registry
        .tq()
        .args(&["status"])
        .passes()
        .stdout_eq("Slots: 0/4 in use, 0 waiting\nNo slots held\n");
}

#[test]
fn status_honours_max_slots_override() {
    let registry = Registry::empty();

    registry
        .tq()
        .args(&["--max-slots", "2", "status"])
        .passes()
        .stdout_has("Slots: 0/2 in use");

    registry
        .tq()
        .env("TQ_MAX_SLOTS", "3")
        .args(&["status"])
        .passes()
        .stdout_has("Slots: 0/3 in use");
}

#[test]
fn status_tolerates_corrupt_registry() {
    let registry = Registry::empty();
    registry.file("slots.json", "{not json");
    registry.file("config.json", "[]");

    registry
        .tq()
        .args(&["status"])
        .passes()
        .stdout_has("Slots: 0/4 in use");
}

#[test]
fn status_lists_live_and_stale_holders_without_evicting() {
    let registry = Registry::empty();
    registry.seed_slots(&[("agent-live", live_pid()), ("agent-gone", dead_pid())]);

    registry
        .tq()
        .args(&["status"])
        .passes()
        .stdout_has("Slots: 1/4 in use")
        .stdout_has("agent-live")
        .stdout_has("agent-gone")
        .stdout_has("stale");

    assert_eq!(registry.holders(), ["agent-live", "agent-gone"]);
}

#[test]
fn status_json_is_machine_readable() {
    let registry = Registry::empty();
    registry.seed_slots(&[("agent-live", live_pid()), ("agent-gone", dead_pid())]);

    let json = registry
        .tq()
        .args(&["status", "--format", "json"])
        .passes()
        .json();

    assert_eq!(json["max_slots"], 4);
    assert_eq!(json["queue_hint"], 0);
    assert_eq!(json["live_slots"].as_array().unwrap().len(), 1);
    assert_eq!(json["live_slots"][0]["holder_id"], "agent-live");
    assert_eq!(json["stale_slots"][0]["holder_id"], "agent-gone");
}

#[test]
fn status_survives_an_unusable_directory() {
    let registry = Registry::empty();
    let not_a_dir = registry.scratch().join("plain-file");
    std::fs::write(&not_a_dir, "x").unwrap();

    registry
        .tq()
        .env("TQ_DIR", not_a_dir.to_str().unwrap())
        .args(&["status"])
        .passes()
        .stderr_has("error:");
}
