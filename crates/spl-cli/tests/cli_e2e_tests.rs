//! CLI end-to-end tests that invoke the compiled `spl` binary.
//!
//! Every test runs in a temporary working directory so `spl.log` and
//! settings never touch the checkout.

use assert_cmd::Command;
use predicates::prelude::*;
use spl_test_utils::TestSettings;

/// `spl` with the given args in `dir`, global settings layer disabled.
fn spl(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("spl").expect("spl binary");
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join("xdg"))
        .env("HOME", dir)
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let settings = TestSettings::new();
    spl(settings.root())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("connections"))
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("docker"));
}

#[test]
fn test_version_flag() {
    let settings = TestSettings::new();
    spl(settings.root())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("spl "));
}

#[test]
fn test_no_command_prints_hint() {
    let settings = TestSettings::new();
    spl(settings.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("spl --help"));
}

#[test]
fn test_missing_settings_is_an_error() {
    let settings = TestSettings::new();
    spl(settings.root())
        .arg("connections")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("Configuration not found"));
}

#[test]
fn test_connections_lists_configured_names() {
    let settings = TestSettings::minimal();
    spl(settings.root())
        .args(["--interactive", "false", "connections"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Possible connections are: 'local', 'remote'."))
        .stdout(predicate::str::contains("changeme").not());
}

#[test]
fn test_settings_dir_flag() {
    let settings = TestSettings::minimal();
    let workdir = TestSettings::new();
    spl(workdir.root())
        .arg("--settings-dir")
        .arg(settings.root())
        .arg("connections")
        .assert()
        .success()
        .stdout(predicate::str::contains("'local'"));
}

#[test]
fn test_log_file_written_in_working_directory() {
    let settings = TestSettings::minimal();
    spl(settings.root())
        .args(["--level", "DEBUG", "connections"])
        .assert()
        .success();
    assert!(settings.root().join("spl.log").is_file());
}

#[test]
fn test_invalid_level_is_rejected() {
    let settings = TestSettings::minimal();
    spl(settings.root())
        .args(["--level", "chatty", "connections"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid log level 'chatty'"));
}

#[test]
fn test_sync_requires_source_and_destination() {
    let settings = TestSettings::minimal();
    spl(settings.root())
        .args(["--src", "local", "sync", "roles"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--src and --dest"));
}

#[test]
fn test_sync_confs_requires_conf_name() {
    let settings = TestSettings::minimal();
    spl(settings.root())
        .args(["--src", "local", "--dest", "remote", "sync", "confs"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--conf"));
}

#[test]
fn test_sync_unknown_kind() {
    let settings = TestSettings::minimal();
    spl(settings.root())
        .args(["--src", "local", "--dest", "remote", "sync", "dashboards"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown object kind 'dashboards'"));
}

#[test]
fn test_manager_unknown_connection() {
    let settings = TestSettings::minimal();
    spl(settings.root())
        .args(["--interactive", "false", "manager", "--conn", "prod", "info"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown connection 'prod'"))
        .stderr(predicate::str::contains("local, remote"));
}

#[test]
fn test_samples_list() {
    let settings = TestSettings::minimal();
    spl(settings.root())
        .args(["samples", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("errors"))
        .stdout(predicate::str::contains("index=_internal log_level=ERROR"));
}

#[test]
fn test_samples_download_needs_a_connection() {
    let settings = TestSettings::minimal();
    spl(settings.root())
        .args(["--interactive", "false", "samples", "download", "--name", "errors"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No connection given"));
}

#[test]
fn test_apps_list_and_csv() {
    let settings = TestSettings::minimal();
    settings.write(
        "apps/TA-demo/default/app.conf",
        "[package]\nid = TA-demo\n\n[ui]\nlabel = Demo Add-on\n\n[launcher]\nversion = 1.2.0\n",
    );
    let csv = settings.root().join("apps.csv");

    spl(settings.root())
        .args(["--interactive", "false", "apps", "--path", "apps", "list", "--csv"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("Local Splunk Applications"))
        .stdout(predicate::str::contains("Demo Add-on"));

    let written = std::fs::read_to_string(csv).unwrap();
    assert!(written.starts_with("ID,Name,Version\n"));
    assert!(written.contains("TA-demo,Demo Add-on,1.2.0"));
}

#[test]
fn test_apps_missing_path() {
    let settings = TestSettings::minimal();
    spl(settings.root())
        .args(["apps", "--path", "nowhere", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Path does not exist"));
}
