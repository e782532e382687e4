//! CLI integration tests for metacrawl.
//!
//! These tests verify CLI behavior without requiring source databases.
//! Only the SQLite catalog is touched, always inside a temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;

fn cmd() -> Command {
    Command::cargo_bin("metacrawl").unwrap()
}

/// Write a config whose catalog lives in `dir` and whose only datasource
/// points at a port nothing listens on.
fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"catalog:
  url: "sqlite://{}"
extraction:
  connect_timeout_secs: 2
datasources:
  - id: 1
    name: shop
    kind: mysql
    host: 127.0.0.1
    port: 1
    username: reader
    password: secret
    database: shop
tasks:
  - id: 10
    name: nightly-shop
    datasource_id: 1
    task_type: incremental
"#,
        dir.join("catalog.db").display()
    )
    .unwrap();
    path
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_lists_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("health-check"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("validate-config"));
}

#[test]
fn test_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("metacrawl"));
}

#[test]
fn test_global_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_run_help_shows_mode_default() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--mode"))
        .stdout(predicate::str::contains("[default: full]"))
        .stdout(predicate::str::contains("--last-sync-time"));
}

#[test]
fn test_no_subcommand_shows_usage() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_io_code() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "validate-config"])
        .assert()
        .code(5);
}

#[test]
fn test_invalid_yaml_exits_with_config_code() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate-config"])
        .assert()
        .code(2);
}

#[test]
fn test_unknown_dialect_exits_with_config_code() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "datasources:\n  - id: 1\n    name: x\n    kind: db2\n    host: h\n    username: u\n    password: p\n    database: d"
    )
    .unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate-config"])
        .assert()
        .code(2);
}

#[test]
fn test_invalid_log_format_exits_with_config_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    cmd()
        .args(["--config", config.to_str().unwrap(), "--log-format", "xml", "validate-config"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid log format"));
}

// =============================================================================
// Command Tests
// =============================================================================

#[test]
fn test_validate_config_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    cmd()
        .args(["--config", config.to_str().unwrap(), "validate-config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 datasource(s), 1 task(s)"));
}

#[test]
fn test_validate_config_json() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    cmd()
        .args(["--config", config.to_str().unwrap(), "--output-json", "validate-config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\": true"));
}

#[test]
fn test_history_on_empty_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    cmd()
        .args(["--config", config.to_str().unwrap(), "history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No extraction runs recorded"));

    assert!(dir.path().join("catalog.db").exists());
}

#[test]
fn test_history_unknown_datasource() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    cmd()
        .args(["--config", config.to_str().unwrap(), "history", "--datasource", "nope"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown datasource"));
}

#[test]
fn test_run_rejects_unknown_mode() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    cmd()
        .args(["--config", config.to_str().unwrap(), "run", "--datasource", "shop", "--mode", "partial"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid extraction mode"));
}

#[test]
fn test_run_requires_datasource_or_task() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    cmd()
        .args(["--config", config.to_str().unwrap(), "run"])
        .assert()
        .code(2);
}

#[test]
fn test_run_unreachable_datasource_exits_with_connection_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    cmd()
        .args(["--config", config.to_str().unwrap(), "run", "--datasource", "1"])
        .assert()
        .code(3);
}

#[test]
fn test_health_check_reports_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    cmd()
        .args(["--config", config.to_str().unwrap(), "health-check"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("shop (mysql): FAILED"))
        .stdout(predicate::str::contains("UNHEALTHY"));
}
