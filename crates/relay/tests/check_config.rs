use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn relay() -> Command {
    assert_cmd::cargo::cargo_bin_cmd!("relay")
}

#[test]
fn prints_defaults_without_a_file() {
    relay()
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("increment_ms = 200"))
        .stdout(predicate::str::contains("max_delay_ms = 1600"))
        .stdout(predicate::str::contains("mailbox_capacity = 256"));
}

#[test]
fn merges_file_over_defaults() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("relay.toml");
    fs::write(
        &path,
        "[hub]\nconnection_buffer = 8\n\n[log]\nfilter = \"relay=debug\"\n",
    )
    .expect("write config");

    relay()
        .args(["check-config", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("connection_buffer = 8"))
        .stdout(predicate::str::contains("mailbox_capacity = 256"))
        .stdout(predicate::str::contains("relay=debug"));
}

#[test]
fn rejects_unknown_keys() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("relay.toml");
    fs::write(&path, "[hub]\nmailbox = 3\n").expect("write config");

    relay()
        .args(["check-config", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: configuration error"));
}

#[test]
fn reports_missing_file_with_path() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("missing.toml");

    relay()
        .args(["check-config", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.toml"));
}
