use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn cli_shows_help() {
    let mut cmd = Command::cargo_bin("wbi-health").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("wbi-health"))
        .stdout(predicate::str::contains("--from-raw"));
}

#[test]
fn cli_rejects_inverted_year_range() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("wbi-health").unwrap();
    cmd.args(["--start-year", "2021", "--end-year", "2019", "--from-raw"])
        .arg("--raw-dir")
        .arg(dir.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn cli_from_missing_raw_files_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("wbi-health").unwrap();
    cmd.arg("--from-raw")
        .arg("--raw-dir")
        .arg(dir.path().join("raw"))
        .arg("--processed-dir")
        .arg(dir.path().join("processed"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("fetching life_expectancy failed"));
    assert!(!dir.path().join("processed").exists());
}

// Live test (opt-in): cargo test --features online
#[cfg(feature = "online")]
#[test]
fn run_online_usa() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("wbi-health").unwrap();
    cmd.args(["--countries", "USA", "--start-year", "2019", "--end-year", "2021", "--stats"])
        .arg("--raw-dir")
        .arg(dir.path().join("raw"))
        .arg("--processed-dir")
        .arg(dir.path().join("processed"));
    cmd.assert().success();
    assert!(dir.path().join("processed/features.csv").exists());
}
