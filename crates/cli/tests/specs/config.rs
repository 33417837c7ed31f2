//! `tq config` specs

use crate::prelude::*;

#[test]
fn config_shows_defaults() {
    let registry = Registry::empty();

    registry
        .tq()
        .args(&["config"])
        .passes()
        .stdout_has("Max slots: 4")
        .stdout_has("Default timeout: 5m");
}

#[test]
fn config_persists_new_values() {
    let registry = Registry::empty();

    registry
        .tq()
        .args(&["config", "--max-slots", "3", "--timeout", "60"])
        .passes()
        .stdout_has("Max slots: 3");

    let json = registry
        .tq()
        .args(&["config", "--format", "json"])
        .passes()
        .json();
    assert_eq!(json["max_slots"], 3);
    assert_eq!(json["default_wait_timeout_secs"], 60);

    registry
        .tq()
        .args(&["status"])
        .passes()
        .stdout_has("Slots: 0/3 in use");
}

#[test]
fn config_update_keeps_unspecified_fields() {
    let registry = Registry::empty();
    registry.tq().args(&["config", "--timeout", "90"]).passes();
    registry.tq().args(&["config", "--max-slots", "6"]).passes();

    registry
        .tq()
        .args(&["config"])
        .passes()
        .stdout_has("Max slots: 6")
        .stdout_has("Default timeout: 1m 30s");
}

#[test]
fn config_rejects_zero_slots() {
    let registry = Registry::empty();

    registry.tq().args(&["config", "--max-slots", "0"]).exits(2);
    registry
        .tq()
        .args(&["config"])
        .passes()
        .stdout_has("Max slots: 4");
}
