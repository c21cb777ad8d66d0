//! Integration tests for the adamod binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Run the CLI in `dir` with isolated configuration; returns (stdout, stderr, success).
fn run_cli(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_adamod"))
        .args(args)
        .current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join("xdg"))
        .env("HOME", dir)
        .env_remove("RUST_LOG")
        .env_remove("ADAMOD_DATABASE_IMAGE")
        .env_remove("ADAMOD_PAGE_CAPACITY")
        .env_remove("ADAMOD_TRACE_FILE")
        .output()
        .expect("Failed to execute adamod");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// A temp directory holding `db.json`: database 12, file 5, four employees.
fn workspace() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let image = serde_json::json!({
        "database": 12,
        "files": [{
            "number": 5,
            "name": "EMPLOYEES",
            "fields": [
                { "name": "AA", "type": "A", "length": 8, "descriptor": true },
                { "name": "AB", "type": "U", "length": 3 }
            ],
            "records": [
                { "isn": 1, "fields": { "AA": "SMITH", "AB": "001" } },
                { "isn": 2, "fields": { "AA": "JONES", "AB": "001" } },
                { "isn": 3, "fields": { "AA": "SMITH", "AB": "001" } },
                { "isn": 4, "fields": { "AA": "SMITH", "AB": "001" } }
            ]
        }]
    });
    let path = dir.path().join("db.json");
    std::fs::write(&path, serde_json::to_string_pretty(&image).unwrap()).unwrap();
    (dir, path)
}

fn record(image: &Path, isn: u64) -> Option<serde_json::Value> {
    let text = std::fs::read_to_string(image).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    value["files"][0]["records"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["isn"] == isn)
        .map(|r| r["fields"].clone())
}

#[test]
fn test_help() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, success) = run_cli(dir.path(), &["--help"]);
    assert!(success);
    assert!(stdout.contains("--dry-run"));
    assert!(stdout.contains("--page-size"));
}

#[test]
fn test_update_single_isn() {
    let (dir, image) = workspace();
    let (_, stderr, success) = run_cli(
        dir.path(),
        &["-t", "12,5", "-i", "3", "-m", "AB,3.002", "--database", "db.json"],
    );
    assert!(success, "stderr: {stderr}");
    assert!(stderr.ends_with("Records processed: 1 [0].\n"));
    assert_eq!(record(&image, 3).unwrap()["AB"], "002");
    assert_eq!(record(&image, 1).unwrap()["AB"], "001");
}

#[test]
fn test_delete_by_search() {
    let (dir, image) = workspace();
    let (_, stderr, success) = run_cli(
        dir.path(),
        &["-v", "-t", "12,5", "-s", "AA.SMITH   ", "-d", "-p", "2", "--database", "db.json"],
    );
    assert!(success, "stderr: {stderr}");
    assert!(stderr.contains("Found records: 3\n"));
    assert!(stderr.contains("Processed records: 3\n"));
    assert!(stderr.contains("Done in 0:00:"));
    assert!(stderr.ends_with("Records processed: 3 [0].\n"));
    assert!(record(&image, 1).is_none());
    assert!(record(&image, 2).is_some());
}

#[test]
fn test_dry_run_leaves_image_untouched() {
    let (dir, image) = workspace();
    let before = std::fs::read_to_string(&image).unwrap();
    let (stdout, stderr, success) = run_cli(
        dir.path(),
        &["-vvv", "-n", "-t", "12,5", "-d", "--database", "db.json"],
    );
    assert!(success, "stderr: {stderr}");
    assert_eq!(stdout, "1\n2\n3\n4\n");
    assert!(stderr.ends_with("Records processed: 4 [0].\n"));
    assert_eq!(std::fs::read_to_string(&image).unwrap(), before);
}

#[test]
fn test_isn_log_file() {
    let (dir, _) = workspace();
    let (stdout, _, success) = run_cli(
        dir.path(),
        &["-vvv", "-t", "12,5", "-s", "AA.SMITH   ", "-m", "AB,3.009", "-l", "isns.txt", "--database", "db.json"],
    );
    assert!(success);
    assert!(stdout.is_empty());
    let log = std::fs::read_to_string(dir.path().join("isns.txt")).unwrap();
    assert_eq!(log, "1\n3\n4\n");
}

#[test]
fn test_config_file_supplies_defaults() {
    let (dir, image) = workspace();
    std::fs::write(
        dir.path().join("adamod.toml"),
        "[target]\ndatabase = 12\nfile = 5\n\n[database]\nimage = \"db.json\"\n",
    )
    .unwrap();
    let (_, stderr, success) = run_cli(dir.path(), &["-i", "2", "-d"]);
    assert!(success, "stderr: {stderr}");
    assert!(record(&image, 2).is_none());
}

#[test]
fn test_missing_database_id() {
    let (dir, _) = workspace();
    let (_, stderr, success) = run_cli(dir.path(), &["-i", "2", "-d", "--database", "db.json"]);
    assert!(!success);
    assert_eq!(stderr, "Error: Adabas database must be specified [7].\n");
}

#[test]
fn test_invalid_search_argument() {
    let (dir, _) = workspace();
    let (_, stderr, success) = run_cli(
        dir.path(),
        &["-t", "12,5", "-s", "AA", "-d", "--database", "db.json"],
    );
    assert!(!success);
    assert_eq!(stderr, "Error: invalid search or value buffer specified [5].\n");
}

#[test]
fn test_wrong_database_cannot_open() {
    let (dir, image) = workspace();
    let before = std::fs::read_to_string(&image).unwrap();
    let (_, stderr, success) = run_cli(
        dir.path(),
        &["-t", "13,5", "-i", "1", "-d", "--database", "db.json"],
    );
    assert!(!success);
    assert!(stderr.ends_with("Error: can't open Adabas database [11].\n"));
    assert_eq!(std::fs::read_to_string(&image).unwrap(), before);
}

#[test]
fn test_conflicting_selection_arguments() {
    let (dir, _) = workspace();
    let (_, stderr, success) = run_cli(
        dir.path(),
        &["-t", "12,5", "-i", "1", "-s", "AA.SMITH   ", "-d", "--database", "db.json"],
    );
    assert!(!success);
    assert!(stderr.contains("cannot be used with"));
}

#[test]
fn test_trace_log_written() {
    let (dir, _) = workspace();
    let (_, _, success) = run_cli(
        dir.path(),
        &["-t", "12,5", "-i", "1", "-d", "--database", "db.json", "--trace-log", "trace.log"],
    );
    assert!(success);
    let log = std::fs::read_to_string(dir.path().join("trace.log")).unwrap();
    assert!(log.contains("session opened"));
    assert!(!log.contains("\u{1b}["));
}
