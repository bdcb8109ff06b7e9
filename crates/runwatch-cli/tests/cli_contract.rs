#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const RUN_JSON: &str = r#"{
    "test_name": "VtsKernelLtp",
    "start_timestamp": 1760551200000000,
    "devices": [{"branch": "main", "build_flavor": "walleye-userdebug", "build_id": "4523931"}],
    "test_cases": [
        {"name": "syscalls.open01", "result": "pass"},
        {"name": "syscalls.read02", "result": "fail"}
    ]
}"#;

fn runwatch(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("runwatch").unwrap();
    cmd.current_dir(dir)
        .env_remove("RUNWATCH_DB")
        .env_remove("RUNWATCH_CONFIG")
        .env_remove("RUNWATCH_SPOOL")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn version_prints_package_version() {
    let dir = TempDir::new().unwrap();
    runwatch(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn ingest_then_status_task_spools_alert() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("run.json"), RUN_JSON).unwrap();

    runwatch(dir.path())
        .args(["subscribe", "VtsKernelLtp", "owner@example.com"])
        .assert()
        .success();

    runwatch(dir.path())
        .args(["ingest", "run.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("test_status:VtsKernelLtp"));

    runwatch(dir.path())
        .args([
            "task",
            "status",
            "test_status:VtsKernelLtp",
            "--now-us",
            "1760554800000000",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("committed"));

    let spool = std::fs::read_to_string(dir.path().join(".runwatch/outbox.jsonl")).unwrap();
    assert_eq!(spool.lines().count(), 1);
    assert!(spool.contains("New test failures in VtsKernelLtp"));
    assert!(spool.contains("owner@example.com"));

    // Same upload again stores nothing.
    runwatch(dir.path())
        .args(["ingest", "run.json"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn invalid_key_has_its_own_exit_code() {
    let dir = TempDir::new().unwrap();
    runwatch(dir.path())
        .args(["task", "coverage", "test:VtsKernelLtp"])
        .assert()
        .code(3);
}

#[test]
fn malformed_upload_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("bad.json"), r#"{"test_name": ""}"#).unwrap();
    runwatch(dir.path())
        .args(["ingest", "bad.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("rejected upload"));
}

#[test]
fn acknowledgments_round_trip() {
    let dir = TempDir::new().unwrap();
    runwatch(dir.path())
        .args([
            "ack",
            "add",
            "--test",
            "VtsKernelLtp",
            "--user",
            "oncall",
            "--case",
            "syscalls.read02",
        ])
        .assert()
        .success()
        .stdout(predicate::str::diff("1\n"));

    runwatch(dir.path())
        .args(["ack", "list", "--test", "VtsKernelLtp"])
        .assert()
        .success()
        .stdout(predicate::str::contains("syscalls.read02"));

    runwatch(dir.path()).args(["ack", "remove", "1"]).assert().success();
    runwatch(dir.path()).args(["ack", "remove", "1"]).assert().code(1);
}

#[test]
fn fanout_dry_run_lists_pending_keys() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("run.json"), RUN_JSON).unwrap();
    runwatch(dir.path()).args(["ingest", "run.json"]).assert().success();

    runwatch(dir.path())
        .args(["fanout", "inactivity", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::diff("test:VtsKernelLtp\n"));
}
