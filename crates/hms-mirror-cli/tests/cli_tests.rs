//! CLI integration tests for hms-mirror.
//!
//! These tests verify command-line argument parsing, help output,
//! exit codes, and a dry run against a recorded snapshot.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a command for the hms-mirror binary.
fn cmd() -> Command {
    Command::cargo_bin("hms-mirror").unwrap()
}

const CONFIG: &str = r#"
data_strategy: SCHEMA_ONLY
databases: [sales]
clusters:
  left:
    hcfs_namespace: hdfs://LEFT
  right:
    hcfs_namespace: hdfs://RIGHT
"#;

const SNAPSHOT: &str = r#"
left:
  databases:
    sales:
      tables:
        orders:
          definition:
            - "CREATE EXTERNAL TABLE `orders`("
            - "  `id` int)"
            - "ROW FORMAT SERDE"
            - "  'org.apache.hadoop.hive.ql.io.orc.OrcSerde'"
            - "LOCATION"
            - "  'hdfs://LEFT/warehouse/external/sales.db/orders'"
            - "TBLPROPERTIES ("
            - "  'transient_lastDdlTime'='1674052906')"
"#;

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Config and snapshot files in a fresh directory.
fn workspace(config: &str, snapshot: &str) -> (TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file(dir.path(), "config.yaml", config);
    let snapshot = write_file(dir.path(), "snapshot.yaml", snapshot);
    (dir, config, snapshot)
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--snapshot"))
        .stdout(predicate::str::contains("--execute"))
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--output-dir"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hms-mirror"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flag_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("[default: default.yaml]"));
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_1() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "validate"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(1);
}

#[test]
fn test_contradictory_config_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "{}",
        CONFIG.replace("SCHEMA_ONLY", "LINKED")
            + "transfer:\n  common_storage: s3a://shared\n"
    )
    .unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("CommonStorageWithLinked"));
}

#[test]
fn test_validate_without_databases_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", CONFIG.replace("databases: [sales]", "databases: []")).unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(2);
}

#[test]
fn test_validate_reports_warnings() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}align_locations: true", CONFIG).unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid (SCHEMA_ONLY)"))
        .stdout(predicate::str::contains(
            "ResetToDefaultLocationWithoutWarehouseDirs",
        ));
}

// =============================================================================
// Run Tests
// =============================================================================

#[test]
fn test_dry_run_writes_reports() {
    let (dir, config, snapshot) = workspace(CONFIG, SNAPSHOT);
    let output = dir.path().join("reports");

    cmd()
        .args(["--config", config.to_str().unwrap()])
        .args(["run", "--snapshot", snapshot.to_str().unwrap()])
        .args(["--output-dir", output.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run completed!"))
        .stdout(predicate::str::contains("Tables: 1/1"));

    assert!(output.join("sales_hms-mirror.yaml").exists());
    assert!(output.join("run-status.yaml").exists());
}

#[test]
fn test_run_output_json() {
    let (_dir, config, snapshot) = workspace(CONFIG, SNAPSHOT);

    let assert = cmd()
        .args(["--config", config.to_str().unwrap(), "--output-json"])
        .args(["run", "--snapshot", snapshot.to_str().unwrap(), "--concurrency", "2"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let status: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["tables_total"], 1);
    assert_eq!(status["tables_success"], 1);
    assert_eq!(status["dry_run"], true);
    assert_eq!(status["concurrency"], 2);
    assert_eq!(status["state"], "completed");
}

#[test]
fn test_failed_statement_exits_with_failure() {
    let snapshot = format!("{}fail_on:\n  - \"CREATE EXTERNAL TABLE `orders`\"\n", SNAPSHOT);
    let (_dir, config, snapshot) = workspace(CONFIG, &snapshot);

    cmd()
        .args(["--config", config.to_str().unwrap()])
        .args(["run", "--snapshot", snapshot.to_str().unwrap(), "--execute"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Run finished with failures."));
}

#[test]
fn test_missing_snapshot_exits_with_code_1() {
    let (dir, config, _snapshot) = workspace(CONFIG, SNAPSHOT);
    let missing = dir.path().join("missing.yaml");

    cmd()
        .args(["--config", config.to_str().unwrap()])
        .args(["run", "--snapshot", missing.to_str().unwrap()])
        .assert()
        .code(1);
}
