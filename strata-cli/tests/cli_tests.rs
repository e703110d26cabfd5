//! Integration tests for the Strata CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get the strata binary
#[allow(deprecated)]
fn strata_cmd() -> Command {
    let mut cmd = Command::cargo_bin("strata").unwrap();
    cmd.env_remove("STRATA_CONFIG").env_remove("RUST_LOG");
    cmd
}

/// A project with a config file and a small script tree.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::write(
        root.join("strata.toml"),
        "[scripts]\nlocations = [\"db\"]\n\n[history]\nfile = \"history.toml\"\n",
    )
    .unwrap();

    write_script(root, "db/01_tables.sql", "CREATE TABLE users (id INT);\n");
    write_script(
        root,
        "db/02_data.sql",
        "INSERT INTO users VALUES (1);\nINSERT INTO users VALUES (2);\n",
    );
    write_script(root, "db/views/users_view.sql", "CREATE VIEW v AS SELECT * FROM users;\n");

    dir
}

fn write_script(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_help_command() {
    strata_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Strata CLI"))
        .stdout(predicate::str::contains("Usage: strata"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("mark-up-to-date"))
        .stdout(predicate::str::contains("split"));
}

#[test]
fn test_version_command() {
    strata_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Version"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")))
        .stdout(predicate::str::contains("oracle"));
}

#[test]
fn test_update_help() {
    strata_cmd()
        .args(["update", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--output"));
}

#[test]
fn test_missing_config() {
    let dir = TempDir::new().unwrap();

    strata_cmd()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("strata.toml"));
}

#[test]
fn test_update_writes_delta_to_stdout() {
    let dir = project();

    strata_cmd()
        .current_dir(dir.path())
        .arg("update")
        .assert()
        .success()
        .stdout(predicate::str::contains("-- script: 01_tables.sql"))
        .stdout(predicate::str::contains("CREATE TABLE users (id INT);"))
        .stdout(predicate::str::contains("INSERT INTO users VALUES (2);"))
        .stdout(predicate::str::contains("-- script: views/users_view.sql"));

    let history = fs::read_to_string(dir.path().join("history.toml")).unwrap();
    assert!(history.contains("01_tables.sql"));
    assert!(history.contains("views/users_view.sql"));

    strata_cmd()
        .current_dir(dir.path())
        .arg("update")
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("up to date"));
}

#[test]
fn test_update_to_output_file() {
    let dir = project();
    let delta = dir.path().join("delta.sql");

    strata_cmd()
        .current_dir(dir.path())
        .args(["update", "--output"])
        .arg(&delta)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 executed"));

    let content = fs::read_to_string(&delta).unwrap();
    let tables = content.find("01_tables.sql").unwrap();
    let data = content.find("02_data.sql").unwrap();
    let view = content.find("views/users_view.sql").unwrap();
    assert!(tables < data && data < view);
}

#[test]
fn test_dry_run_records_nothing() {
    let dir = project();

    strata_cmd()
        .current_dir(dir.path())
        .args(["update", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("01_tables.sql"))
        .stdout(predicate::str::contains("Dry run"));

    assert!(!dir.path().join("history.toml").exists());
}

#[test]
fn test_status_lists_pending_updates() {
    let dir = project();

    strata_cmd()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Regular updates"))
        .stdout(predicate::str::contains("02_data.sql"));
}

#[test]
fn test_modified_indexed_script_blocks_update() {
    let dir = project();

    strata_cmd()
        .current_dir(dir.path())
        .arg("mark-up-to-date")
        .assert()
        .success()
        .stdout(predicate::str::contains("Recorded 3 scripts"));

    write_script(dir.path(), "db/01_tables.sql", "CREATE TABLE users (id BIGINT);\n");

    strata_cmd()
        .current_dir(dir.path())
        .arg("update")
        .assert()
        .failure()
        .stderr(predicate::str::contains("01_tables.sql"));

    strata_cmd()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Irregular updates"));
}

#[test]
fn test_mark_error_without_failures() {
    let dir = project();

    strata_cmd()
        .current_dir(dir.path())
        .arg("mark-error-reverted")
        .assert()
        .success()
        .stdout(predicate::str::contains("No failed scripts"));
}

#[test]
fn test_split_command() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("proc.sql");
    fs::write(
        &script,
        "-- header\nCREATE TABLE t (v VARCHAR(10));\nCREATE PROCEDURE p IS\nBEGIN\n  NULL;\nEND;\n/\n",
    )
    .unwrap();

    strata_cmd()
        .current_dir(dir.path())
        .args(["split", "--dialect", "oracle"])
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE TABLE t (v VARCHAR(10));"))
        .stdout(predicate::str::contains("END;\n/"))
        .stderr(predicate::str::contains("2 statement(s)"));
}

#[test]
fn test_split_unknown_dialect() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("a.sql");
    fs::write(&script, "select 1;\n").unwrap();

    strata_cmd()
        .current_dir(dir.path())
        .args(["split", "--dialect", "cobol"])
        .arg(&script)
        .assert()
        .failure();
}
