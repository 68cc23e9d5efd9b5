//! End-to-end CLI tests for the waybackdl binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

mod support;
use support::archive::{listing, mount_capture, mount_listing};
use support::socket_guard::start_mock_server_or_skip;

/// Binary with a private config directory so a developer's config file never leaks in.
fn waybackdl(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("waybackdl").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let config_home = TempDir::new().unwrap();
    waybackdl(&config_home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wayback Machine"))
        .stdout(predicate::str::contains("--skip-timestamps"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let config_home = TempDir::new().unwrap();
    waybackdl(&config_home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("waybackdl"));
}

#[test]
fn test_binary_requires_domain() {
    let config_home = TempDir::new().unwrap();
    waybackdl(&config_home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--domain"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let config_home = TempDir::new().unwrap();
    waybackdl(&config_home)
        .args(["-d", "example.com", "--invalid-flag"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_rejects_inverted_range() {
    let config_home = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    waybackdl(&config_home)
        .args(["-d", "example.com", "--from", "2021", "--to", "2020", "-o"])
        .arg(output.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("later than"));
}

#[test]
fn test_binary_rejects_invalid_config_file() {
    let config_home = TempDir::new().unwrap();
    fs::create_dir_all(config_home.path().join("waybackdl")).unwrap();
    fs::write(
        config_home.path().join("waybackdl/config.toml"),
        "retries = many\n",
    )
    .unwrap();
    waybackdl(&config_home)
        .args(["-d", "example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_mirrors_domain_from_archive() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let url = "http://example.com/index.html";
    mount_listing(&mock_server, &listing(&[("20200101000000", url)])).await;
    mount_capture(&mock_server, "20200101000000", url, 200, "<h1>home</h1>").await;
    let config_home = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    waybackdl(&config_home)
        .args(["-d", "example.com", "--delay", "0", "--archive-url"])
        .arg(mock_server.uri())
        .arg("-o")
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "(1/1) 20200101000000 {url} [OK]"
        )));

    assert_eq!(
        fs::read_to_string(output.path().join("20200101000000/example.com/index.html")).unwrap(),
        "<h1>home</h1>"
    );
    assert!(output.path().join("snapshots.json").is_file());
    let log = fs::read_to_string(output.path().join("waybackdl.log")).unwrap();
    assert!(log.contains("[OK]"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_dry_run_writes_nothing() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let url = "http://example.com/";
    mount_listing(&mock_server, &listing(&[("20200101000000", url)])).await;
    let config_home = TempDir::new().unwrap();
    let parent = TempDir::new().unwrap();
    let output = parent.path().join("mirror");

    waybackdl(&config_home)
        .args(["-d", "example.com", "-n", "--delay", "0", "--archive-url"])
        .arg(mock_server.uri())
        .arg("-o")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("[DRY RUN]"));

    assert!(!output.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_exits_nonzero_when_download_aborts() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let url = "http://example.com/broken";
    mount_listing(&mock_server, &listing(&[("20200101000000", url)])).await;
    mount_capture(&mock_server, "20200101000000", url, 404, "").await;
    let config_home = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    waybackdl(&config_home)
        .args(["-d", "example.com", "--delay", "0", "--archive-url"])
        .arg(mock_server.uri())
        .arg("-o")
        .arg(output.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("[Failed to download, aborted]"));
}
