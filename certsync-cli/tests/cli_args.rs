use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn certsync_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("certsync"))
}

#[test]
fn help_lists_push_and_pull() {
    certsync_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("push"))
        .stdout(contains("pull"));
}

#[test]
fn config_flag_is_required() {
    certsync_cmd()
        .arg("push")
        .assert()
        .failure()
        .stderr(contains("--config"));
}

#[test]
fn missing_config_file_fails_with_path() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("absent.toml");

    certsync_cmd()
        .args(["pull", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(contains("failed to load config"))
        .stderr(contains("absent.toml"));
}

#[test]
fn malformed_config_is_rejected() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("certsync.toml");
    fs::write(&path, "key_dir = [unterminated").expect("write config");

    certsync_cmd()
        .args(["push", "--dry-run", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(contains("failed to load config"));
}

#[test]
fn config_without_bucket_is_rejected() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("certsync.toml");
    fs::write(
        &path,
        r#"
key_dir = "/var/lib/certsync/keys"
cert_dir = "/etc/ssl/certsync"

[s3]
region = "us-east-1"
"#,
    )
    .expect("write config");

    certsync_cmd()
        .args(["push", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(contains("s3.bucket is required"));
}

#[test]
fn unknown_subcommand_fails() {
    certsync_cmd().arg("sync").assert().failure();
}
