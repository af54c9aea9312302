//! CLI integration tests
//!
//! These tests verify that the CLI works correctly with various options.

mod fixtures;

use assert_cmd::Command;
use predicates::prelude::*;
use reschiper::Archive;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Write the sample bundle into a fresh directory
fn bundle_in_tempdir() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.aab");
    fs::write(&path, fixtures::sample_bundle()).unwrap();
    (dir, path)
}

fn reschiper() -> Command {
    Command::cargo_bin("reschiper").unwrap()
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_help() {
    reschiper()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--keep"))
        .stdout(predicate::str::contains("--mapping"));
}

#[test]
fn test_missing_bundle_fails() {
    reschiper()
        .arg("/nonexistent/app.aab")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read bundle"));
}

#[test]
fn test_default_output_paths() {
    let (dir, bundle) = bundle_in_tempdir();

    reschiper()
        .arg(&bundle)
        .args(["-k", "app_name"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Renamed"));

    let output = dir.path().join("app-obfuscated.aab");
    let mapping = dir.path().join("app-obfuscated.aab.mapping.txt");
    assert!(output.exists());

    let archive = Archive::load(&fs::read(&output).unwrap()).unwrap();
    assert!(archive.contains("base/res/drawable/a.png"));

    let text = fs::read_to_string(&mapping).unwrap();
    assert!(text.starts_with("res id mapping:"));
    assert!(text.contains("com.example.R.drawable.ic_launcher -> com.example.R.drawable.a"));
    assert!(text.contains("string/app_name (keep rule app_name)"));
}

#[test]
fn test_explicit_outputs_and_json_report() {
    let (dir, bundle) = bundle_in_tempdir();
    let output = dir.path().join("out.aab");
    let mapping = dir.path().join("names.txt");
    let json = dir.path().join("report.json");

    reschiper()
        .arg(&bundle)
        .arg("-o")
        .arg(&output)
        .arg("--mapping-out")
        .arg(&mapping)
        .arg("--json-report")
        .arg(&json)
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert!(output.exists());
    assert!(mapping.exists());
    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert!(report["renamed"].as_array().unwrap().len() >= 4);
}

#[test]
fn test_previous_mapping_from_file() {
    let (dir, bundle) = bundle_in_tempdir();
    let previous = dir.path().join("previous.txt");
    fs::write(
        &previous,
        "res id mapping:\n\t0x7f010001 : com.example.R.drawable.ic_launcher -> com.example.R.drawable.k\n",
    )
    .unwrap();

    reschiper()
        .arg(&bundle)
        .arg("--mapping")
        .arg(&previous)
        .assert()
        .success();

    let archive = Archive::load(&fs::read(dir.path().join("app-obfuscated.aab")).unwrap()).unwrap();
    assert!(archive.contains("base/res/drawable/k.png"));
}

#[test]
fn test_config_file_next_to_bundle() {
    let (dir, bundle) = bundle_in_tempdir();
    fs::write(
        dir.path().join("reschiper.yml"),
        "keep:\n  - \"drawable/*\"\noutput_name: shipped.aab\n",
    )
    .unwrap();

    reschiper().arg(&bundle).assert().success();

    let archive = Archive::load(&fs::read(dir.path().join("shipped.aab")).unwrap()).unwrap();
    assert!(archive.contains("base/res/mipmap/ic_launcher.png"));
}

#[test]
fn test_no_obfuscate() {
    let (dir, bundle) = bundle_in_tempdir();

    reschiper()
        .arg(&bundle)
        .arg("--no-obfuscate")
        .arg("--file-filter")
        .arg("base/root/*")
        .assert()
        .success();

    let archive = Archive::load(&fs::read(dir.path().join("app-obfuscated.aab")).unwrap()).unwrap();
    assert!(archive.contains("base/res/mipmap/ic_launcher.png"));
    assert!(!archive.contains("base/root/orphan.bin"));
}

#[test]
fn test_conflict_reports_error() {
    let dir = TempDir::new().unwrap();
    let bundle = dir.path().join("app.aab");
    let mut entries = fixtures::sample_entries();
    entries.push(("base/res/drawable/a.png".to_string(), b"static".to_vec()));
    fs::write(&bundle, fixtures::zip_entries(&entries)).unwrap();

    reschiper()
        .arg(&bundle)
        .assert()
        .failure()
        .stderr(predicate::str::contains("base/res/drawable/a.png"));

    assert!(!dir.path().join("app-obfuscated.aab").exists());
}
