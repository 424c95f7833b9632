//! Integration tests for the otaflash command line
//!
//! These run the real binary with an isolated config directory and never
//! reach a board: every case stops before the flashing tool would be used
//! for writing.

mod common;

use assert_fs::prelude::*;
use common::TestProject;
use predicates::prelude::*;
use std::process::{Command, Output};

/// Run otaflash with `args`, using `project` as the config directory
fn run_otaflash(project: &TestProject, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_otaflash"))
        .current_dir(project.path())
        .env("OTAFLASH_CONFIG_DIR", project.path())
        .args(args)
        .output()
        .expect("Failed to execute otaflash")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_flash_requires_firmware_argument() {
    let project = TestProject::new();
    let output = run_otaflash(&project, &["flash", "--port", "/dev/ttyUSB0"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("--firmware"));
}

#[test]
fn test_flash_reports_unreadable_firmware() {
    let project = TestProject::new();
    let output = run_otaflash(
        &project,
        &["flash", "--port", "/dev/ttyUSB0", "--firmware", "missing.bin", "--yes"],
    );

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Cannot build flash plan"), "{err}");
    assert!(err.contains("missing.bin"), "{err}");
}

#[test]
fn test_flash_refuses_without_confirmation_when_not_interactive() {
    let project = TestProject::new();
    let firmware = project.create_image("firmware.bin", 200_000);
    let output = run_otaflash(
        &project,
        &[
            "flash",
            "--port",
            "/dev/ttyUSB0",
            "--firmware",
            firmware.to_str().unwrap(),
        ],
    );

    assert!(!output.status.success());
    assert!(stderr(&output).contains("--yes"));
}

#[test]
fn test_erase_refuses_without_confirmation_when_not_interactive() {
    let project = TestProject::new();
    let output = run_otaflash(&project, &["erase", "--port", "/dev/ttyUSB0"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("non-interactive"));
}

#[test]
fn test_invalid_settings_stop_flash() {
    let project = TestProject::new();
    project.create_file("config.toml", "[flash\nbaud = ");
    let firmware = project.create_image("firmware.bin", 200_000);
    let output = run_otaflash(
        &project,
        &[
            "flash",
            "--port",
            "/dev/ttyUSB0",
            "--firmware",
            firmware.to_str().unwrap(),
            "--yes",
        ],
    );

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to load settings"));
}

#[test]
fn test_doctor_json_reports_missing_tool() {
    let project = TestProject::new();
    project.create_file(
        "config.toml",
        "[tool]\nprogram = \"otaflash-definitely-missing-tool\"\nargs = []\n",
    );
    let output = run_otaflash(&project, &["--json", "doctor"]);

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("doctor prints JSON");
    assert_eq!(json["status"], "error");
    assert_eq!(json["config_issues"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_help_lists_commands() {
    let project = TestProject::new();
    let output = run_otaflash(&project, &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["flash", "erase", "info", "doctor"] {
        assert!(stdout.contains(command), "missing {command}");
    }
}

#[test]
fn test_oversized_firmware_warns_before_confirmation() {
    let temp = assert_fs::TempDir::new().unwrap();
    let firmware = temp.child("firmware.bin");
    firmware.write_binary(&vec![0u8; 3_500_000]).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_otaflash"))
        .env("OTAFLASH_CONFIG_DIR", temp.path())
        .args(["flash", "--port", "COM4", "--firmware"])
        .arg(firmware.path())
        .output()
        .expect("Failed to execute otaflash");

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(predicate::str::contains("looks too large").eval(&err), "{err}");
    assert!(predicate::str::contains("--yes").eval(&err), "{err}");
    temp.child("config.toml").assert(predicate::path::missing());
}

#[test]
fn test_version_includes_build_details() {
    let project = TestProject::new();
    let output = run_otaflash(&project, &["--version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let expected = predicate::str::contains(env!("CARGO_PKG_VERSION"))
        .and(predicate::str::contains("built"));
    assert!(expected.eval(&stdout), "{stdout}");
}
