//! Shared helpers for the black-box specs.

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::process::{Child, Output, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Upper bound for polling on background state in specs
pub const SPEC_WAIT_MAX_MS: u64 = 10_000;

/// Environment that would leak the developer's setup into a test
const SCRUBBED_ENV: &[&str] = &["TQ_DIR", "TQ_MAX_SLOTS", "TQ_TIMEOUT", "TQ_LOG", "RUST_LOG"];

/// A fresh registry directory per test
pub struct Registry {
    temp: TempDir,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    /// Registry directory (created lazily by `tq` itself)
    pub fn dir(&self) -> PathBuf {
        self.temp.path().join("queue")
    }

    /// Scratch directory next to the registry
    pub fn scratch(&self) -> &Path {
        self.temp.path()
    }

    pub fn tq(&self) -> CliBuilder {
        let mut cmd = Command::cargo_bin("tq").unwrap();
        for var in SCRUBBED_ENV {
            cmd.env_remove(var);
        }
        cmd.env("TQ_DIR", self.dir());
        CliBuilder { cmd }
    }

    /// Start `tq` with `args` in the background
    pub fn spawn(&self, args: &[&str]) -> Child {
        let mut cmd = std::process::Command::new(assert_cmd::cargo::cargo_bin("tq"));
        for var in SCRUBBED_ENV {
            cmd.env_remove(var);
        }
        cmd.env("TQ_DIR", self.dir())
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap()
    }

    pub fn file(&self, name: &str, content: &str) {
        std::fs::create_dir_all(self.dir()).unwrap();
        std::fs::write(self.dir().join(name), content).unwrap();
    }

    /// Write `slots.json` holding one slot per `(holder, pid)`
    pub fn seed_slots(&self, slots: &[(&str, u32)]) {
        let slots: Vec<_> = slots
            .iter()
            .enumerate()
            .map(|(i, (holder, pid))| {
                serde_json::json!({
                    "slot_id": format!("seed-{i}"),
                    "holder_id": holder,
                    "pid": pid,
                    "acquired_at": "2026-01-01T00:00:00Z",
                })
            })
            .collect();
        let doc = serde_json::json!({ "version": 1, "slots": slots });
        self.file("slots.json", &doc.to_string());
    }

    /// Holder ids currently recorded in `slots.json`
    pub fn holders(&self) -> Vec<String> {
        let Ok(content) = std::fs::read_to_string(self.dir().join("slots.json")) else {
            return Vec::new();
        };
        let doc: serde_json::Value = serde_json::from_str(&content).unwrap();
        doc["slots"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["holder_id"].as_str().unwrap().to_string())
            .collect()
    }
}

/// A pid that is guaranteed not to be running
pub fn dead_pid() -> u32 {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

/// This test process, alive for the whole test
pub fn live_pid() -> u32 {
    std::process::id()
}

pub fn wait_for(max_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    check()
}

pub struct CliBuilder {
    cmd: Command,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.cmd.env(key, value);
        self
    }

    /// Expect exit code 0
    pub fn passes(self) -> RunAssert {
        self.exits(0)
    }

    /// Expect a non-zero exit code
    pub fn fails(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        assert!(
            !output.status.success(),
            "expected failure, got success\nstdout: {}",
            String::from_utf8_lossy(&output.stdout)
        );
        RunAssert { output }
    }

    pub fn exits(mut self, code: i32) -> RunAssert {
        let output = self.cmd.output().unwrap();
        assert_eq!(
            output.status.code(),
            Some(code),
            "unexpected exit status\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout missing {:?}\nstdout: {}",
            expected,
            stdout
        );
        self
    }

    pub fn stdout_eq(self, expected: &str) -> Self {
        similar_asserts::assert_eq!(self.stdout(), expected);
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            stderr.contains(expected),
            "stderr missing {:?}\nstderr: {}",
            expected,
            stderr
        );
        self
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout()).unwrap()
    }
}
