//! Concurrency tests for medtrack.
//!
//! Several CLI processes sharing one local data directory must not lose or
//! corrupt each other's writes when they touch different days.

use assert_cmd::Command;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("medtrack"));
    cmd.arg("--local")
        .arg("--data-dir")
        .arg(dir)
        .arg("--config")
        .arg(dir.join("config.toml"))
        .arg("--user")
        .arg("test");
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn export_rows(dir: &Path) -> Vec<String> {
    let export = dir.join("export.csv");
    cli(dir).arg("export").arg(&export).assert().success();
    let csv = std::fs::read_to_string(&export).expect("Failed to read export");
    csv.lines().skip(1).map(str::to_string).collect()
}

#[test]
fn test_concurrent_doses_on_different_days() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    cli(&data_dir)
        .args(["add", "--name", "Aspirin", "--id", "asp"])
        .assert()
        .success();

    let handles: Vec<_> = (1..=10u64)
        .map(|day| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                // Small stagger to reduce thundering herd
                thread::sleep(Duration::from_millis(day * 5));
                cli(&data_dir)
                    .arg("take")
                    .arg("asp")
                    .arg("--date")
                    .arg(format!("2024-03-{:02}", day))
                    .timeout(Duration::from_secs(10))
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let rows = export_rows(&data_dir);
    assert_eq!(rows.len(), 10, "Expected one dose per day, got {:?}", rows);
    for day in 1..=10 {
        let date = format!("2024-03-{:02},asp,", day);
        assert!(rows.iter().any(|r| r.starts_with(&date)), "Missing {}", date);
    }
}

#[test]
fn test_readers_alongside_writers() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    cli(&data_dir)
        .args(["add", "--name", "Aspirin", "--id", "asp"])
        .assert()
        .success();

    let writer_dir = data_dir.clone();
    let writer = thread::spawn(move || {
        for day in 1..=5 {
            cli(&writer_dir)
                .arg("take")
                .arg("asp")
                .arg("--date")
                .arg(format!("2024-04-{:02}", day))
                .assert()
                .success();
        }
    });

    // Readers never see a half-written file
    for _ in 0..5 {
        cli(&data_dir)
            .args(["month", "--month", "2024-04"])
            .assert()
            .success();
        thread::sleep(Duration::from_millis(5));
    }

    writer.join().expect("Writer thread panicked");
    assert_eq!(export_rows(&data_dir).len(), 5);
}

#[test]
fn test_stored_files_stay_valid_json() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    cli(&data_dir)
        .args(["add", "--name", "Aspirin", "--id", "asp", "--times-per-day", "3"])
        .assert()
        .success();

    let handles: Vec<_> = (1..=3u32)
        .map(|dose| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                cli(&data_dir)
                    .arg("take")
                    .arg("asp")
                    .arg("--date")
                    .arg(format!("2024-05-0{}", dose))
                    .arg("--dose")
                    .arg(dose.to_string())
                    .timeout(Duration::from_secs(10))
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let kv_dir = data_dir.join("kv");
    let mut files = 0;
    for entry in std::fs::read_dir(&kv_dir).expect("Failed to read store") {
        let path = entry.expect("dir entry").path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let content = std::fs::read_to_string(&path).expect("Failed to read value");
        let parsed: Result<serde_json::Value, _> = serde_json::from_str(&content);
        assert!(parsed.is_ok(), "{:?} contains invalid JSON", path);
        files += 1;
    }

    // Medications plus one file per day
    assert_eq!(files, 4);
}
