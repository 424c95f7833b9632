//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying progress bars,
//! status messages and session updates to the user.

use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::core::observer::SessionUpdate;
use crate::core::session::SessionResult;

static QUIET: AtomicBool = AtomicBool::new(false);
static JSON: AtomicBool = AtomicBool::new(false);

/// Global output preferences taken from the command line
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    pub quiet: bool,
    pub json: bool,
    pub verbose: u8,
}

impl OutputConfig {
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Make these preferences visible to every command
    pub fn apply_global(&self) {
        QUIET.store(self.quiet, Ordering::Relaxed);
        JSON.store(self.json, Ordering::Relaxed);
    }
}

/// Whether only errors should be printed
pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Whether results should be printed as JSON
pub fn is_json() -> bool {
    JSON.load(Ordering::Relaxed)
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}

pub fn print_success(message: &str) {
    if !is_quiet() && !is_json() {
        println!("{} {message}", status::SUCCESS);
    }
}

pub fn print_info(message: &str) {
    if !is_quiet() && !is_json() {
        println!("{} {message}", status::INFO);
    }
}

pub fn print_warning(message: &str) {
    if !is_json() {
        eprintln!("{} {message}", status::WARNING);
    }
}

/// Indented detail line under a status message
pub fn print_detail(message: &str) {
    if !is_quiet() && !is_json() {
        println!("    {message}");
    }
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} Error: {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("    Caused by: {cause}");
    }
}

/// Create a progress bar for a flash session (0-100 %)
pub fn create_flash_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .expect("Invalid progress bar template")
            .progress_chars("█▓▒░"),
    );
    pb
}

/// Print a session result as JSON
pub fn print_result_json(result: &SessionResult) {
    println!("{}", serde_json::to_string_pretty(result).unwrap_or_default());
}

/// Drain session updates until the session drops its observer
///
/// With a bar, progress moves the bar and log lines print above it;
/// without one, only log lines are printed.
pub async fn render_session(
    mut rx: mpsc::UnboundedReceiver<SessionUpdate>,
    bar: Option<ProgressBar>,
) {
    let show_logs = !is_quiet() && !is_json();

    while let Some(update) = rx.recv().await {
        match update {
            SessionUpdate::Progress {
                percent,
                stage,
                detail,
            } => {
                if let Some(bar) = &bar {
                    bar.set_position(u64::from(percent));
                    bar.set_message(if detail.is_empty() {
                        stage
                    } else {
                        format!("{stage} ({detail})")
                    });
                }
            }
            SessionUpdate::Log { line } => {
                if show_logs {
                    match &bar {
                        Some(bar) => bar.println(format!("    {line}")),
                        None => println!("    {line}"),
                    }
                }
            }
            SessionUpdate::Terminal { .. } => {
                if let Some(bar) = &bar {
                    bar.finish_and_clear();
                }
            }
        }
    }
}

/// Print the outcome of a session; failures print the tool output
pub fn report_result(result: &SessionResult, success_message: &str) {
    if is_json() {
        print_result_json(result);
        return;
    }

    match result {
        SessionResult::Success { guidance } => {
            print_success(success_message);
            if let Some(guidance) = guidance {
                print_detail(guidance);
            }
        }
        SessionResult::Failure { reason, raw_output } => {
            eprintln!("{} {reason}", status::ERROR);
            if !raw_output.is_empty() {
                eprintln!();
                eprintln!("Tool output:");
                for line in raw_output.lines() {
                    eprintln!("    {line}");
                }
            }
        }
    }
}
