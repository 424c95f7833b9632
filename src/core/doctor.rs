//! Doctor command logic
//!
//! Checks that the flashing tool can be run and that the settings file is
//! valid, and reports issues with suggestions.

use serde::Serialize;

use super::flasher::Flasher;
use super::settings::Settings;
use crate::infra::dirs::OtaflashDirs;
use crate::infra::process::ToolRunner;

/// Result of a single dependency check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Name of the dependency being checked
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Version if available
    pub version: Option<String>,
    /// Error message if check failed
    pub error: Option<String>,
    /// Suggestion for fixing the issue
    pub suggestion: Option<String>,
    /// Whether this is a required or optional dependency
    pub required: bool,
}

impl CheckResult {
    /// Create a passing check result
    pub fn pass(name: &str, version: Option<String>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            version,
            error: None,
            suggestion: None,
            required,
        }
    }

    /// Create a failing check result
    pub fn fail(name: &str, error: &str, suggestion: Option<&str>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            version: None,
            error: Some(error.to_string()),
            suggestion: suggestion.map(String::from),
            required,
        }
    }
}

/// Overall doctor report
#[derive(Debug, Default, Serialize)]
pub struct DoctorReport {
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Configuration issues found
    pub config_issues: Vec<String>,
}

impl DoctorReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a check result
    pub fn add_check(&mut self, result: CheckResult) {
        self.checks.push(result);
    }

    /// Add a configuration issue
    pub fn add_config_issue(&mut self, issue: String) {
        self.config_issues.push(issue);
    }

    /// Check if all required checks passed
    pub fn all_required_passed(&self) -> bool {
        self.checks
            .iter()
            .filter(|c| c.required)
            .all(|c| c.passed)
    }

    /// Check if all checks passed (including optional)
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed) && self.config_issues.is_empty()
    }

    /// Count passed checks
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Get all failed required checks
    pub fn failed_required(&self) -> Vec<&CheckResult> {
        self.checks
            .iter()
            .filter(|c| c.required && !c.passed)
            .collect()
    }
}

/// Check that the tool's program can be found in PATH
pub fn check_program(settings: &Settings) -> CheckResult {
    let program = settings.program();
    match which::which(program) {
        Ok(path) => CheckResult::pass(&format!("{program} ({})", path.display()), None, true),
        Err(_) => CheckResult::fail(
            program,
            &format!("'{program}' not found in PATH"),
            Some("Install it or set [tool] program in config.toml"),
            true,
        ),
    }
}

/// Check that the flashing tool answers `version`
pub async fn check_flashing_tool<R: ToolRunner>(flasher: &Flasher<R>) -> CheckResult {
    let probe = flasher.probe().await;
    if probe.available {
        CheckResult::pass("esptool", probe.version, true)
    } else {
        CheckResult::fail(
            "esptool",
            "The flashing tool did not answer the version check",
            Some("Install esptool with 'pip install esptool'"),
            true,
        )
    }
}

/// Check that the settings file parses
pub fn check_settings(dirs: &OtaflashDirs) -> Vec<String> {
    match Settings::load(dirs) {
        Ok(_) => Vec::new(),
        Err(e) => vec![e.to_string()],
    }
}

/// Run all doctor checks
pub async fn run_doctor<R: ToolRunner>(flasher: &Flasher<R>, dirs: &OtaflashDirs) -> DoctorReport {
    let mut report = DoctorReport::new();

    report.add_check(check_program(flasher.settings()));
    report.add_check(check_flashing_tool(flasher).await);

    for issue in check_settings(dirs) {
        report.add_config_issue(issue);
    }

    report
}
