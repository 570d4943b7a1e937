//! Integration tests for the dosetrack binary.
//!
//! These tests verify end-to-end behavior including:
//! - Adding, listing and removing medications
//! - Planning and logging doses
//! - Adherence reports and CSV export
//! - Recovery from damaged data files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use std::path::Path;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("dosetrack"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Run `add` and return the new medication id
fn add_medication(data_dir: &Path, args: &[&str]) -> String {
    let output = cli()
        .arg("--data-dir")
        .arg(data_dir)
        .arg("add")
        .args(args)
        .output()
        .expect("Failed to run add");
    assert!(
        output.status.success(),
        "add failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).unwrap();
    stdout
        .trim()
        .strip_prefix("✓ Added medication ")
        .expect("unexpected add output")
        .to_string()
}

fn daily_metformin(data_dir: &Path) -> String {
    add_medication(
        data_dir,
        &[
            "Metformin",
            "--time",
            "08:00,20:00",
            "--start",
            "2024-01-01",
            "--end",
            "2024-12-31",
            "--dose",
            "500",
            "--unit",
            "mg",
        ],
    )
}

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Medication dosing schedule tracker"));
}

#[test]
fn test_add_and_list() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let id = daily_metformin(data_dir);

    assert!(data_dir.join("medications.json").exists());
    assert!(data_dir.join("wal").exists());

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()))
        .stdout(predicate::str::contains("Metformin"))
        .stdout(predicate::str::contains("daily"));
}

#[test]
fn test_list_empty() {
    let temp_dir = setup_test_dir();

    cli()
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No medications."));
}

#[test]
fn test_invalid_schedules_rejected() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    // Weekly without weekdays
    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["add", "Vitamin D", "--type", "weekly", "--time", "09:00"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("days_of_week"));

    // Weekdays on a daily schedule
    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["add", "Aspirin", "--time", "09:00", "--days", "1,3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("days_of_week"));

    // Cyclical without a cycle count
    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args([
            "add",
            "Prednisolone",
            "--type",
            "cyclical",
            "--time",
            "09:00",
            "--active-days",
            "14",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("total_cycles"));

    // Malformed time of day
    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["add", "Aspirin", "--time", "25:00"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("specific_times"));

    // Nothing was persisted
    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No medications."));
}

#[test]
fn test_plan_is_idempotent() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let id = daily_metformin(data_dir);

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["plan", "--medication", &id, "--from", "2024-01-01", "--days", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Planned 6 doses"));

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["plan", "--medication", &id, "--from", "2024-01-01", "--days", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Planned 0 doses"));

    let wal = fs::read_to_string(data_dir.join("wal/medication_logs.wal")).unwrap();
    assert_eq!(wal.lines().count(), 6);
    assert!(wal.contains("\"scheduled\""));
}

#[test]
fn test_plan_past_calendar_range_is_rejected() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let id = daily_metformin(data_dir);

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["plan", "--medication", &id, "--from", "2024-01-01", "--days", "4000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("days"))
        .stderr(predicate::str::contains("panicked").not());
}

#[test]
fn test_export_without_logs_writes_headers() {
    let temp_dir = setup_test_dir();
    let csv_path = temp_dir.path().join("empty.csv");

    cli()
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("export")
        .arg("--out")
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 0 logs"));

    let csv_content = fs::read_to_string(&csv_path).unwrap();
    assert!(csv_content.starts_with("id,medication_id,medication,scheduled_time"));
    assert_eq!(csv_content.lines().count(), 1);
}

#[test]
fn test_log_and_report() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let id = daily_metformin(data_dir);

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["log", "--medication", &id, "--at", "2024-01-01T08:00", "--rating", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged taken dose"));

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["log", "--medication", &id, "--at", "2024-01-01T20:00"])
        .args(["--status", "partial", "--taken-at", "2024-01-01T20:30"])
        .assert()
        .success();

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["log", "--medication", &id, "--at", "2024-01-02T08:00", "--status", "skipped"])
        .assert()
        .success();

    let output = cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["report", "--medication", &id, "--from", "2024-01-01", "--to", "2024-01-02"])
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let counts = &report["counts"];
    assert_eq!(counts["taken"], 1);
    assert_eq!(counts["partial"], 1);
    assert_eq!(counts["skipped"], 1);
    assert_eq!(counts["missed"], 1);
    assert_eq!(report["doses"].as_array().unwrap().len(), 4);

    let rate = report["adherence_rate"].as_f64().unwrap();
    assert!((rate - 1.5 / 4.0).abs() < 1e-9);

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["report", "--medication", &id, "--from", "2024-01-01", "--to", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Adherence: 37.5%"));
}

#[test]
fn test_partial_weight_from_config() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let config_path = data_dir.join("config.toml");
    fs::write(&config_path, "[reconcile]\npartial_weight = 1.0\n").unwrap();
    let id = daily_metformin(data_dir);

    for at in ["2024-01-01T08:00", "2024-01-01T20:00"] {
        cli()
            .arg("--data-dir")
            .arg(data_dir)
            .args(["log", "--medication", &id, "--at", at, "--status", "partial"])
            .assert()
            .success();
    }

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--config")
        .arg(&config_path)
        .args(["report", "--medication", &id, "--from", "2024-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Adherence: 100.0%"));
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[reconcile]\npartial_weight = 2.0\n").unwrap();

    cli()
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("partial_weight"));
}

#[test]
fn test_inconsistent_log_rejected() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let id = daily_metformin(data_dir);

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["log", "--medication", &id, "--at", "2024-01-01T08:00"])
        .args(["--status", "skipped", "--taken-at", "2024-01-01T08:05"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Consistency"));

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["log", "--medication", &id, "--at", "2024-01-01T08:00", "--rating", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("effectiveness_rating"));
}

#[test]
fn test_log_unknown_medication() {
    let temp_dir = setup_test_dir();

    cli()
        .arg("--data-dir")
        .arg(temp_dir.path())
        .args([
            "log",
            "--medication",
            "6f1c2f9e-3b1a-4c59-9d55-0c1f2b3a4d5e",
            "--at",
            "2024-01-01T08:00",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NotFound"));
}

#[test]
fn test_flagged_side_effect_is_reported() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let id = daily_metformin(data_dir);

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["log", "--medication", &id, "--at", "2024-01-01T08:00"])
        .args(["--side-effect", "Headache", "--side-effect", "shortness of breath"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Shortness of breath"))
        .stdout(predicate::str::contains("requires medical attention"))
        .stdout(predicate::str::contains("Headache").not());
}

#[test]
fn test_side_effect_catalog() {
    cli()
        .args(["side-effects"])
        .arg("--data-dir")
        .arg(setup_test_dir().path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Headache"))
        .stdout(predicate::str::contains("Anaphylaxis"));

    cli()
        .args(["side-effects", "--attention"])
        .arg("--data-dir")
        .arg(setup_test_dir().path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Anaphylaxis"))
        .stdout(predicate::str::contains("Headache").not());
}

#[test]
fn test_today_lists_doses_across_medications() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let id = daily_metformin(data_dir);
    add_medication(
        data_dir,
        &["Vitamin D", "--type", "weekly", "--days", "1", "--time", "09:00", "--start", "2024-01-01"],
    );

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["log", "--medication", &id, "--at", "2024-01-01T08:00"])
        .assert()
        .success();

    // 2024-01-01 is a Monday
    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["today", "--date", "2024-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::is_match("08:00 +Metformin .*taken").unwrap())
        .stdout(predicate::str::is_match("09:00 +Vitamin D .*missed").unwrap())
        .stdout(predicate::str::is_match("20:00 +Metformin .*missed").unwrap());

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["today", "--date", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Vitamin D").not());
}

#[test]
fn test_deactivate_and_delete() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let id = daily_metformin(data_dir);

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["log", "--medication", &id, "--at", "2024-01-01T08:00"])
        .assert()
        .success();

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["deactivate", &id])
        .assert()
        .success();

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No medications."));

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["list", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("inactive"));

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["delete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted Metformin and 1 logs"));

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["report", "--medication", &id, "--from", "2024-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NotFound"));
}

#[test]
fn test_export_csv() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let id = daily_metformin(data_dir);
    let csv_path = data_dir.join("exports").join("logs.csv");

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["plan", "--medication", &id, "--from", "2024-01-01", "--days", "1"])
        .assert()
        .success();
    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["log", "--medication", &id, "--at", "2024-01-01T08:00"])
        .assert()
        .success();

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .arg("export")
        .arg("--out")
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 logs"));

    let csv_content = fs::read_to_string(&csv_path).unwrap();
    let mut lines = csv_content.lines();
    assert!(lines.next().unwrap().starts_with("id,medication_id,medication"));
    assert_eq!(lines.clone().count(), 2);
    assert!(csv_content.contains("Metformin"));
    assert!(csv_content.contains("2024-01-01T08:00:00"));
    assert!(csv_content.contains(",taken,"));
}

#[test]
fn test_compact_drops_superseded_records() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let id = daily_metformin(data_dir);

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["plan", "--medication", &id, "--from", "2024-01-01", "--days", "1"])
        .assert()
        .success();
    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["log", "--medication", &id, "--at", "2024-01-01T08:00"])
        .assert()
        .success();

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .arg("compact")
        .assert()
        .success()
        .stdout(predicate::str::contains("dropped 1 superseded"));

    let wal = fs::read_to_string(data_dir.join("wal/medication_logs.wal")).unwrap();
    assert_eq!(wal.lines().count(), 2);
}

#[test]
fn test_corrupt_wal_line_is_skipped() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let id = daily_metformin(data_dir);

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["log", "--medication", &id, "--at", "2024-01-01T08:00"])
        .assert()
        .success();

    let mut wal = fs::OpenOptions::new()
        .append(true)
        .open(data_dir.join("wal/medication_logs.wal"))
        .unwrap();
    writeln!(wal, "{{\"id\": \"truncated").unwrap();

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .args(["report", "--medication", &id, "--from", "2024-01-01", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"taken\": 1"));
}

#[test]
fn test_corrupt_state_file_is_an_error() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    fs::write(data_dir.join("medications.json"), "{ not json").unwrap();

    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Json"));
}
