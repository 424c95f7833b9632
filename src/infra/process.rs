//! External flashing tool invocation
//!
//! Runs the flashing tool as a child process. stdout and stderr are merged
//! into one line stream that is handed to the caller as it is produced.
//! Once the process exits, everything is returned as a plain
//! [`ProcessOutput`] value with no reference to the live process.

use std::future::Future;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::error::ProcessError;

/// Exit code reported when the process was killed by a signal
const SIGNALED_EXIT_CODE: i32 = -1;

/// Consecutive read errors after which a pipe is abandoned
const MAX_FAILED_READS: u32 = 8;

/// Captured result of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub lines: Vec<String>,
}

impl ProcessOutput {
    /// Whether the tool exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// All captured lines joined with newlines
    pub fn combined(&self) -> String {
        self.lines.join("\n")
    }

    /// Last captured line, usually the tool's error message
    pub fn last_line(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }
}

/// Something that can run the flashing tool
///
/// `args` never include the program itself; the runner prepends it.
pub trait ToolRunner: Send + Sync {
    /// Run the tool and hand each output line to `on_line` as it arrives
    fn stream<F>(
        &self,
        args: &[String],
        timeout: Option<Duration>,
        on_line: F,
    ) -> impl Future<Output = Result<ProcessOutput, ProcessError>> + Send
    where
        F: FnMut(&str) + Send;

    /// Run the tool to completion, capturing its output
    fn run(
        &self,
        args: &[String],
        timeout: Duration,
    ) -> impl Future<Output = Result<ProcessOutput, ProcessError>> + Send {
        self.stream(args, Some(timeout), |_| {})
    }
}

/// Runs esptool (or a compatible tool) through `tokio::process`
#[derive(Debug, Clone)]
pub struct EsptoolRunner {
    program: String,
    base_args: Vec<String>,
}

impl EsptoolRunner {
    /// Create a runner for `program base_args...`
    pub fn new(program: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }

    async fn stream_inner<F>(
        &self,
        args: &[String],
        mut on_line: F,
    ) -> Result<ProcessOutput, ProcessError>
    where
        F: FnMut(&str) + Send,
    {
        tracing::debug!("Running {} {} {}", self.program, self.base_args.join(" "), args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::Launch {
                program: self.program.clone(),
                error: e.to_string(),
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx.clone());
        }
        drop(tx);

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            on_line(&line);
            lines.push(line);
        }

        let status = child.wait().await.map_err(|e| ProcessError::Io {
            program: self.program.clone(),
            error: e.to_string(),
        })?;

        Ok(ProcessOutput {
            exit_code: status.code().unwrap_or(SIGNALED_EXIT_CODE),
            lines,
        })
    }
}

impl ToolRunner for EsptoolRunner {
    async fn stream<F>(
        &self,
        args: &[String],
        timeout: Option<Duration>,
        on_line: F,
    ) -> Result<ProcessOutput, ProcessError>
    where
        F: FnMut(&str) + Send,
    {
        let run = self.stream_inner(args, on_line);
        match timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| ProcessError::Timeout {
                    program: self.program.clone(),
                    timeout: limit,
                })?,
            None => run.await,
        }
    }
}

// Lines from both pipes end up in one channel, so stdout and stderr interleave
// in arrival order. The pipe is drained to EOF whatever happens to the
// receiver or a read, so the tool never writes into a closed pipe.
fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut failed_reads = 0;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    failed_reads = 0;
                    // Consoles in legacy code pages emit bytes that are not UTF-8
                    let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
                }
                Err(e) => {
                    failed_reads += 1;
                    tracing::debug!("Reading tool output failed: {e}");
                    if failed_reads >= MAX_FAILED_READS {
                        break;
                    }
                }
            }
        }
    });
}

/// Result of checking for the flashing tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolProbe {
    pub available: bool,
    pub version: Option<String>,
}

/// Check that the flashing tool answers `version` within `timeout`
pub async fn probe_tool<R: ToolRunner>(runner: &R, timeout: Duration) -> ToolProbe {
    match runner.run(&["version".to_string()], timeout).await {
        Ok(output) if output.success() => ToolProbe {
            available: true,
            version: output.lines.iter().map(String::as_str).find_map(extract_version),
        },
        Ok(output) => {
            tracing::warn!("Flashing tool probe exited with code {}", output.exit_code);
            ToolProbe {
                available: false,
                version: None,
            }
        }
        Err(e) => {
            tracing::warn!("Flashing tool probe failed: {e}");
            ToolProbe {
                available: false,
                version: None,
            }
        }
    }
}

/// Extract version string from tool output
fn extract_version(output: &str) -> Option<String> {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION
        .get_or_init(|| Regex::new(r"v?(\d+\.\d+(?:\.\d+)?(?:-\w+)?)").expect("valid regex"))
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
