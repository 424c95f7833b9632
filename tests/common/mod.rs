//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests: a scratch
//! directory for image files, a scripted stand-in for the flashing tool and
//! an observer that records every callback.

#![allow(dead_code)]

use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use otaflash::core::observer::SessionObserver;
use otaflash::core::session::SessionResult;
use otaflash::error::ProcessError;
use otaflash::infra::process::{ProcessOutput, ToolRunner};
use tempfile::TempDir;

/// Scratch directory holding image files for a test
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create an image file of `size` bytes and return its path
    pub fn create_image(&self, name: &str, size: usize) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, vec![0xAB; size]).expect("Failed to write image");
        path
    }

    /// Create a text file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Canned output of one tool invocation
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub lines: Vec<String>,
    pub exit_code: i32,
}

impl Script {
    pub fn new(lines: &[&str], exit_code: i32) -> Self {
        Self {
            lines: lines.iter().map(ToString::to_string).collect(),
            exit_code,
        }
    }
}

/// Flashing tool stand-in answering each subcommand with a fixed script
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    pub version: Script,
    pub write_flash: Script,
    pub erase_flash: Script,
    pub flash_id: Script,
    pub read_mac: Script,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    /// Runner whose `write_flash` prints `lines` and exits with `exit_code`
    pub fn flashing(lines: &[&str], exit_code: i32) -> Self {
        Self {
            version: Script::new(&["esptool.py v4.7.0", "4.7.0"], 0),
            write_flash: Script::new(lines, exit_code),
            ..Self::default()
        }
    }

    /// Every argument list the runner was called with
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls whose arguments contain `subcommand`
    pub fn count(&self, subcommand: &str) -> usize {
        self.calls()
            .iter()
            .filter(|args| args.iter().any(|a| a == subcommand))
            .count()
    }

    fn script_for(&self, args: &[String]) -> Script {
        let has = |name: &str| args.iter().any(|a| a == name);
        if has("write_flash") {
            self.write_flash.clone()
        } else if has("erase_flash") {
            self.erase_flash.clone()
        } else if has("flash_id") {
            self.flash_id.clone()
        } else if has("read_mac") {
            self.read_mac.clone()
        } else {
            self.version.clone()
        }
    }
}

impl ToolRunner for ScriptedRunner {
    fn stream<F>(
        &self,
        args: &[String],
        _timeout: Option<Duration>,
        mut on_line: F,
    ) -> impl Future<Output = Result<ProcessOutput, ProcessError>> + Send
    where
        F: FnMut(&str) + Send,
    {
        self.calls.lock().unwrap().push(args.to_vec());
        let script = self.script_for(args);
        async move {
            for line in &script.lines {
                on_line(line);
            }
            Ok(ProcessOutput {
                exit_code: script.exit_code,
                lines: script.lines,
            })
        }
    }
}

/// Observer recording every callback
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub progress: Mutex<Vec<u8>>,
    pub logs: Mutex<Vec<String>>,
    pub results: Mutex<Vec<SessionResult>>,
}

impl RecordingObserver {
    pub fn percents(&self) -> Vec<u8> {
        self.progress.lock().unwrap().clone()
    }

    pub fn last_percent(&self) -> Option<u8> {
        self.percents().last().copied()
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().unwrap().clone()
    }

    pub fn results(&self) -> Vec<SessionResult> {
        self.results.lock().unwrap().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_progress(&self, percent: u8, _stage: &str, _detail: &str) {
        self.progress.lock().unwrap().push(percent);
    }

    fn on_log(&self, line: &str) {
        self.logs.lock().unwrap().push(line.to_string());
    }

    fn on_terminal(&self, result: &SessionResult) {
        self.results.lock().unwrap().push(result.clone());
    }
}

/// Output of a successful single-image `write_flash`
pub const FIRMWARE_ONLY_OUTPUT: &[&str] = &[
    "esptool.py v4.7.0",
    "Serial port /dev/ttyUSB0",
    "Connecting....",
    "Chip is ESP32-S3 (QFN56) (revision v0.2)",
    "MAC: 34:85:18:00:00:01",
    "Uploading stub...",
    "Stub running...",
    "Changing baud rate to 460800",
    "Compressed 1048576 bytes to 650000...",
    "Writing at 0x00010000... (10 %)",
    "Writing at 0x00090000... (55 %)",
    "Writing at 0x00110000... (100 %)",
    "Wrote 1048576 bytes (650000 compressed) at 0x00010000 in 14.2 seconds",
    "Hash of data verified.",
    "Leaving...",
    "Hard resetting via RTS pin...",
];
