//! Command-line tests for the sightclip binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn sightclip() -> Command {
    let mut cmd = Command::cargo_bin("sightclip").unwrap();
    cmd.env_remove("SIGHTCLIP_CONFIG")
        .env_remove("SIGHTCLIP_OUTPUT_DIR")
        .env_remove("SIGHTCLIP_MAX_JOBS")
        .env("RUST_LOG", "error");
    cmd
}

#[test]
fn test_check_config_prints_defaults_without_file() {
    let dir = TempDir::new().unwrap();
    sightclip()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("frame_check_interval = 5"))
        .stdout(predicate::str::contains("max_concurrent_jobs = 4"));
}

#[test]
fn test_check_config_applies_overrides() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("sightclip.toml");
    std::fs::write(&config, "[inference]\ngrace_period = 3\n").unwrap();

    sightclip()
        .arg("--config")
        .arg(&config)
        .args(["--max-jobs", "2", "check-config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("grace_period = 3"))
        .stdout(predicate::str::contains("max_concurrent_jobs = 2"));
}

#[test]
fn test_check_config_rejects_invalid_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("sightclip.toml");
    std::fs::write(&config, "[inference]\nmin_detect_percent = 1.5\n").unwrap();

    sightclip()
        .arg("--config")
        .arg(&config)
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("min_detect_percent"));
}

#[test]
fn test_max_jobs_from_environment_is_validated() {
    let dir = TempDir::new().unwrap();
    sightclip()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .env("SIGHTCLIP_MAX_JOBS", "0")
        .arg("check-config")
        .assert()
        .failure();
}

#[test]
fn test_folder_requires_directory_argument() {
    sightclip().arg("folder").assert().failure();
}
