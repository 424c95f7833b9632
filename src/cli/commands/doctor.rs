//! CLI command for `otaflash doctor`
//!
//! Checks the flashing tool and settings and reports issues with suggestions.

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::cli::output::{
    is_json, is_quiet, print_detail, print_info, print_success, print_warning, status,
};
use crate::core::doctor::{run_doctor, CheckResult, DoctorReport};
use crate::core::flasher::Flasher;
use crate::core::settings::Settings;
use crate::infra::dirs::OtaflashDirs;

/// Execute the doctor command
pub async fn execute() -> Result<()> {
    let dirs = OtaflashDirs::new();
    // A broken settings file is one of the reported issues, so probe with defaults
    let settings = Settings::load(&dirs).unwrap_or_default();
    let flasher = Flasher::from_settings(settings);

    let report = run_doctor(&flasher, &dirs).await;

    let config_path = dirs.settings_path();
    if is_json() {
        print_json(&report, &config_path);
    } else if is_quiet() {
        for check in report.failed_required() {
            eprintln!("{} Failed: {}", status::ERROR, check.name);
        }
    } else {
        print_report(&report, &config_path);
    }

    if report.all_required_passed() {
        Ok(())
    } else {
        Err(anyhow!(
            "Flashing tool is not usable. Install esptool with 'pip install esptool'."
        ))
    }
}

fn overall_status(report: &DoctorReport) -> &'static str {
    if report.all_passed() {
        "success"
    } else if report.all_required_passed() {
        "warning"
    } else {
        "error"
    }
}

fn print_json(report: &DoctorReport, config_path: &Path) {
    let json = serde_json::json!({
        "status": overall_status(report),
        "config_path": config_path,
        "checks": report.checks,
        "config_issues": report.config_issues,
        "passed_count": report.passed_count(),
        "total_count": report.checks.len(),
    });
    println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
}

fn print_check(check: &CheckResult) {
    if check.passed {
        let version = check
            .version
            .as_deref()
            .map(|v| format!(" (v{v})"))
            .unwrap_or_default();
        println!("  {} {}{version}", status::SUCCESS, check.name);
        return;
    }

    println!("  {} {}", status::ERROR, check.name);
    if let Some(error) = &check.error {
        print_detail(&format!("Error: {error}"));
    }
    if let Some(suggestion) = &check.suggestion {
        print_detail(&format!("Suggestion: {suggestion}"));
    }
}

fn print_report(report: &DoctorReport, config_path: &Path) {
    print_info(&format!("Settings file: {}", config_path.display()));
    print_info("Checking flashing tool...");
    println!();
    report.checks.iter().for_each(print_check);

    if !report.config_issues.is_empty() {
        println!();
        print_warning("Configuration issues:");
        for issue in &report.config_issues {
            print_detail(&format!("• {issue}"));
        }
    }

    println!();
    let (passed, total) = (report.passed_count(), report.checks.len());
    if report.all_required_passed() {
        print_success(&format!("{passed}/{total} checks passed, ready to flash"));
    } else {
        println!("{} {passed}/{total} checks passed", status::ERROR);
    }
}
