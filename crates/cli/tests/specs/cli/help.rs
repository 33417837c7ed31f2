//! Help and argument parsing specs

use crate::prelude::*;
use predicates::prelude::*;

#[test]
fn help_lists_every_command() {
    let registry = Registry::empty();

    registry
        .tq()
        .args(&["--help"])
        .passes()
        .stdout_has("status")
        .stdout_has("cleanup")
        .stdout_has("run")
        .stdout_has("config");
}

#[test]
fn run_help_documents_timeout_env() {
    let mut cmd = assert_cmd::Command::cargo_bin("tq").unwrap();
    cmd.args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--timeout"))
        .stdout(predicate::str::contains("TQ_TIMEOUT"))
        .stdout(predicate::str::contains("--allow-duplicate"));
}

#[test]
fn zero_slot_limit_is_a_usage_error() {
    let registry = Registry::empty();

    registry
        .tq()
        .args(&["--max-slots", "0", "status"])
        .exits(2)
        .stderr_has("--max-slots");
}

#[test]
fn run_without_a_command_is_a_usage_error() {
    let registry = Registry::empty();

    registry.tq().args(&["run", "agent-1"]).exits(2);
    assert!(registry.holders().is_empty());
}
