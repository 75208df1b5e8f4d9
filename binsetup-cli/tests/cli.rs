//! End-to-end tests for the `binsetup` binary.
//!
//! Only offline commands are exercised here.

use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn binsetup() -> Command {
    Command::new(env!("CARGO_BIN_EXE_binsetup"))
}

#[test]
fn test_help_lists_subcommands() {
    let output = binsetup().arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("install"));
    assert!(stdout.contains("status"));
}

#[test]
fn test_status_reports_missing_and_partial() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.ini");
    fs::write(&config, "[general]\nplatform = linux\n").unwrap();
    let bins = temp.path().join("bins");
    fs::create_dir_all(&bins).unwrap();
    fs::write(bins.join("yt-dlp.part"), vec![0u8; 1024 * 1024]).unwrap();

    let output = binsetup()
        .arg("status")
        .arg("--config")
        .arg(&config)
        .arg("--install-dir")
        .arg(&bins)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Platform:          linux"));
    assert!(stdout.contains("partial download (1.0 MB)"));
    assert!(stdout.contains("not installed"));
}

#[test]
fn test_unknown_platform_exits_with_config_code() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.ini");
    fs::write(&config, "").unwrap();

    let output = binsetup()
        .args(["status", "--platform", "beos", "--config"])
        .arg(&config)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown platform"));
}
