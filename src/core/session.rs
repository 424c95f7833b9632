//! Flash session orchestration
//!
//! A [`FlashSession`] runs one flash, erase or read-info operation against
//! one device, from command assembly to the terminal [`SessionResult`]:
//!
//! ```text
//! Built -> CommandAssembled -> Running -> PostSuccess -> Terminated(success)
//!                                     \-> Terminated(failure)
//! ```
//!
//! A running session cannot be cancelled. Interrupting a write can leave the
//! board unable to boot, so the only way out is the tool exiting.

use serde::Serialize;

use super::boot_selector::BootSelectorFile;
use super::classifier::{ClassifierEvent, ClassifierState, LogFilter, OutputClassifier};
use super::command;
use super::observer::SessionObserver;
use super::plan::FlashPlan;
use super::progress::{HandshakeStage, ProgressModel};
use super::settings::Settings;
use crate::error::FlashError;
use crate::infra::process::{probe_tool, ProcessOutput, ToolRunner};

/// Shown after a successful erase
pub const ERASE_GUIDANCE: &str =
    "The board rebooted. Unplug it and plug it back in before flashing new firmware.";

/// Shown when the reset after a successful flash fails
const RESET_FAILED_HINT: &str =
    "Automatic reset failed (this can be normal), press RESET if the board does not start";

/// Shown after a failed erase
const ERASE_RETRY_HINT: &str = "Unplug the board, plug it back in and try again.";

/// Terminal outcome of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionResult {
    Success {
        /// Follow-up advice for the user, if any
        guidance: Option<String>,
    },
    Failure {
        reason: String,
        /// Everything the tool printed, for diagnosis
        raw_output: String,
    },
}

impl SessionResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success { guidance: None }
    }

    pub fn failure(reason: impl Into<String>, raw_output: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
            raw_output: raw_output.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Operation performed by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Flash,
    Erase,
    ReadInfo,
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Built,
    CommandAssembled,
    Running,
    PostSuccess,
    Terminated { success: bool },
}

/// One flash, erase or read-info run against one device
pub struct FlashSession<'a, R, O>
where
    R: ToolRunner,
    O: SessionObserver + ?Sized,
{
    runner: &'a R,
    settings: &'a Settings,
    observer: &'a O,
    port: String,
    operation: Operation,
    plan: Option<FlashPlan>,
    state: SessionState,
    args: Vec<String>,
    boot_selector: Option<BootSelectorFile>,
}

impl<'a, R, O> FlashSession<'a, R, O>
where
    R: ToolRunner,
    O: SessionObserver + ?Sized,
{
    fn new(
        runner: &'a R,
        settings: &'a Settings,
        observer: &'a O,
        port: &str,
        operation: Operation,
        plan: Option<FlashPlan>,
    ) -> Self {
        Self {
            runner,
            settings,
            observer,
            port: port.to_string(),
            operation,
            plan,
            state: SessionState::Built,
            args: Vec::new(),
            boot_selector: None,
        }
    }

    /// Session writing `plan` to the board on `port`
    pub fn flash(
        runner: &'a R,
        settings: &'a Settings,
        observer: &'a O,
        port: &str,
        plan: FlashPlan,
    ) -> Self {
        Self::new(runner, settings, observer, port, Operation::Flash, Some(plan))
    }

    /// Session erasing the whole flash of the board on `port`
    pub fn erase(runner: &'a R, settings: &'a Settings, observer: &'a O, port: &str) -> Self {
        Self::new(runner, settings, observer, port, Operation::Erase, None)
    }

    /// Session reading chip and flash information from the board on `port`
    pub fn read_info(runner: &'a R, settings: &'a Settings, observer: &'a O, port: &str) -> Self {
        Self::new(runner, settings, observer, port, Operation::ReadInfo, None)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Build the tool arguments, generating the boot selector when the plan needs one
    pub fn assemble_command(&mut self) -> Result<&[String], FlashError> {
        self.args = match self.operation {
            Operation::Flash => {
                let Some(plan) = &self.plan else {
                    return Err(crate::error::PlanError::MissingRequiredArtifact.into());
                };
                if plan.needs_boot_selector() && self.boot_selector.is_none() {
                    self.boot_selector = Some(BootSelectorFile::synthesize()?);
                }
                command::flash_args(
                    self.settings,
                    &self.port,
                    plan,
                    self.boot_selector.as_ref().map(BootSelectorFile::path),
                )
            }
            Operation::Erase => command::erase_args(self.settings, &self.port),
            Operation::ReadInfo => command::read_info_args(self.settings, &self.port),
        };
        self.state = SessionState::CommandAssembled;
        Ok(&self.args)
    }

    /// Run the session to completion and report the result to the observer
    pub async fn run(mut self) -> SessionResult {
        tracing::info!("Starting {:?} session on {}", self.operation, self.port);

        let result = match self.operation {
            Operation::Flash => self.run_flash().await,
            Operation::Erase => self.run_erase().await,
            Operation::ReadInfo => self.run_read_info().await,
        };

        self.state = SessionState::Terminated {
            success: result.is_success(),
        };
        tracing::info!("{:?} session on {} ended: {:?}", self.operation, self.port, self.state);
        self.observer.on_terminal(&result);
        result
        // The boot selector file is removed when `self` drops here
    }

    async fn run_flash(&mut self) -> SessionResult {
        let (file_count, offsets) = match &self.plan {
            Some(plan) => (plan.len(), plan.offset_table()),
            None => (0, Vec::new()),
        };
        let mut model = match ProgressModel::init(file_count) {
            Ok(model) => model,
            Err(e) => return self.fail(None, e.to_string(), String::new()),
        };

        let probe = probe_tool(self.runner, self.settings.probe_timeout()).await;
        if !probe.available {
            self.observer
                .on_log("Flashing tool did not answer the version check, trying anyway");
        }

        if let Err(e) = self.assemble_command() {
            return self.fail(Some(&mut model), e.to_string(), String::new());
        }
        for (offset, kind) in &offsets {
            self.observer.on_log(&format!("{kind} at {offset:#x}"));
        }
        self.observer.on_log(&format!(
            "Port {} at {} baud",
            self.port,
            self.settings.baud()
        ));

        model.set_labels("Connecting to the board...", "Initializing");
        self.report(&model);

        self.state = SessionState::Running;
        let observer = self.observer;
        let chip_label = self.settings.chip_label().to_string();
        let mut classifier = OutputClassifier::new(chip_label.clone(), offsets);

        let output = self
            .runner
            .stream(&self.args, None, |line| {
                let classified = classifier.classify(line);
                if classified.loggable {
                    observer.on_log(line);
                }
                if let Some(event) = classified.event {
                    apply_event(&mut model, &classifier, &chip_label, &event);
                    let state = model.state();
                    observer.on_progress(
                        state.overall_percent,
                        &state.stage_label,
                        &state.detail_label,
                    );
                }
            })
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => return self.fail(Some(&mut model), e.to_string(), String::new()),
        };
        if classifier.finish(output.exit_code) == ClassifierState::Failed {
            return self.fail(Some(&mut model), failure_reason(&output), output.combined());
        }

        self.state = SessionState::PostSuccess;
        self.observer.on_log("Flash completed successfully");
        model.on_resetting();
        model.set_labels("Resetting the board...", "Rebooting into the new firmware");
        self.report(&model);

        tokio::time::sleep(self.settings.settle_delay()).await;
        self.secondary_reset().await;

        self.observer.on_log("Waiting for the board to boot...");
        tokio::time::sleep(self.settings.boot_delay()).await;

        model.on_terminal(true);
        model.set_labels("Flash complete", "Board ready");
        self.report(&model);
        SessionResult::success()
    }

    /// Best effort reboot after a successful flash; failures are only logged
    async fn secondary_reset(&self) {
        self.observer.on_log("Sending reset command...");
        let args = command::reset_args(self.settings, &self.port);
        match self.runner.run(&args, self.settings.reset_timeout()).await {
            Ok(output) if output.success() => self.observer.on_log("Reset sent"),
            Ok(output) => {
                tracing::warn!("Secondary reset exited with code {}", output.exit_code);
                self.observer.on_log(RESET_FAILED_HINT);
            }
            Err(e) => {
                tracing::warn!("Secondary reset failed: {e}");
                self.observer.on_log(RESET_FAILED_HINT);
            }
        }
    }

    async fn run_erase(&mut self) -> SessionResult {
        if let Err(e) = self.assemble_command() {
            return self.fail(None, e.to_string(), String::new());
        }
        self.observer.on_log(&format!("Erasing flash on {}...", self.port));

        self.state = SessionState::Running;
        let observer = self.observer;
        let output = self
            .runner
            .stream(&self.args, None, |line| {
                if LogFilter::Erase.accepts(line) {
                    observer.on_log(line);
                }
            })
            .await;

        match output {
            Ok(output) if output.success() => {
                self.state = SessionState::PostSuccess;
                self.observer.on_log("Flash erased");
                self.observer.on_log(ERASE_GUIDANCE);
                SessionResult::Success {
                    guidance: Some(ERASE_GUIDANCE.to_string()),
                }
            }
            Ok(output) => {
                self.observer.on_log(ERASE_RETRY_HINT);
                self.fail(None, failure_reason(&output), output.combined())
            }
            Err(e) => self.fail(None, e.to_string(), String::new()),
        }
    }

    async fn run_read_info(&mut self) -> SessionResult {
        if let Err(e) = self.assemble_command() {
            return self.fail(None, e.to_string(), String::new());
        }
        self.observer.on_log("Reading board information...");

        self.state = SessionState::Running;
        let observer = self.observer;
        let output = self
            .runner
            .stream(&self.args, Some(self.settings.read_info_timeout()), |line| {
                if LogFilter::ReadInfo.accepts(line) {
                    observer.on_log(line);
                }
            })
            .await;

        match output {
            Ok(output) if output.success() => {
                self.state = SessionState::PostSuccess;
                SessionResult::success()
            }
            Ok(output) => self.fail(None, failure_reason(&output), output.combined()),
            Err(e) => self.fail(None, e.to_string(), String::new()),
        }
    }

    fn report(&self, model: &ProgressModel) {
        let state = model.state();
        self.observer
            .on_progress(state.overall_percent, &state.stage_label, &state.detail_label);
    }

    fn fail(
        &self,
        model: Option<&mut ProgressModel>,
        reason: String,
        raw_output: String,
    ) -> SessionResult {
        tracing::warn!("{:?} session on {} failed: {reason}", self.operation, self.port);
        if let Some(model) = model {
            model.on_terminal(false);
            model.set_labels("Flash failed", reason.clone());
            self.report(model);
        }
        self.observer.on_log(&format!("Error: {reason}"));
        SessionResult::failure(reason, raw_output)
    }
}

/// Update progress and labels for one classified event
fn apply_event(
    model: &mut ProgressModel,
    classifier: &OutputClassifier,
    chip_label: &str,
    event: &ClassifierEvent,
) {
    let name = |index: usize| {
        classifier
            .kind_of(index)
            .map_or_else(|| "File".to_string(), |kind| kind.to_string())
    };

    match event {
        ClassifierEvent::Connecting => {
            model.on_stage(HandshakeStage::Connecting);
            model.set_labels("Connecting...", "Establishing connection");
        }
        ClassifierEvent::ChipIdentified => {
            model.on_stage(HandshakeStage::ChipIdentified);
            model.set_labels(format!("{chip_label} detected"), "Chip recognized");
        }
        ClassifierEvent::StubReady => {
            model.on_stage(HandshakeStage::StubReady);
            model.set_labels("Stub loaded", "Preparing to write");
        }
        ClassifierEvent::ByteProgress {
            artifact_index,
            percent_within_file,
            address,
        } => {
            model.on_file_byte_progress(*artifact_index, *percent_within_file);
            let name = name(*artifact_index);
            model.set_labels(
                format!("Writing {name}..."),
                format!("{name} at {address}: {}%", percent_within_file.floor() as u8),
            );
        }
        ClassifierEvent::FileVerified { artifact_index } => {
            model.on_file_complete(*artifact_index);
            let count = model.state().file_count;
            model.set_labels(
                format!("{} written", name(*artifact_index)),
                format!("File {}/{count} done", artifact_index + 1),
            );
        }
    }
}

/// Short reason for a failed run, taken from the tool's last words
fn failure_reason(output: &ProcessOutput) -> String {
    match output.last_line() {
        Some(line) => format!("flashing tool exited with code {}: {line}", output.exit_code),
        None => format!("flashing tool exited with code {}", output.exit_code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::observer::NullObserver;
    use crate::core::plan::ArtifactPaths;
    use crate::error::ProcessError;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Runner that records calls and replays nothing
    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ToolRunner for RecordingRunner {
        async fn stream<F>(
            &self,
            args: &[String],
            _timeout: Option<Duration>,
            _on_line: F,
        ) -> Result<ProcessOutput, ProcessError>
        where
            F: FnMut(&str) + Send,
        {
            self.calls.lock().unwrap().push(args.to_vec());
            Ok(ProcessOutput {
                exit_code: 0,
                lines: Vec::new(),
            })
        }
    }

    fn plan_with_partitions() -> FlashPlan {
        let paths = ArtifactPaths {
            partition_table: Some(PathBuf::from("partitions.bin")),
            firmware: Some(PathBuf::from("firmware.bin")),
            ..Default::default()
        };
        FlashPlan::build_with(&paths, |_| Ok(200_000)).unwrap().plan
    }

    #[test]
    fn test_assemble_synthesizes_boot_selector() {
        let runner = RecordingRunner::default();
        let settings = Settings::without_delays();
        let mut session = FlashSession::flash(
            &runner,
            &settings,
            &NullObserver,
            "COM3",
            plan_with_partitions(),
        );
        assert_eq!(session.state(), SessionState::Built);

        let args = session.assemble_command().unwrap().to_vec();
        assert_eq!(session.state(), SessionState::CommandAssembled);

        let position = args.iter().position(|a| a == "0xe000").unwrap();
        let selector = PathBuf::from(&args[position + 1]);
        assert_eq!(std::fs::read(&selector).unwrap().len(), 4096);

        drop(session);
        assert!(!selector.exists());
    }

    #[tokio::test]
    async fn test_flash_call_sequence() {
        let runner = RecordingRunner::default();
        let settings = Settings::without_delays();
        let result = FlashSession::flash(
            &runner,
            &settings,
            &NullObserver,
            "COM3",
            plan_with_partitions(),
        )
        .run()
        .await;
        assert!(result.is_success());

        let calls = runner.calls.lock().unwrap();
        let commands: Vec<_> = calls.iter().filter_map(|c| c.last().cloned()).collect();
        // probe, write, reset; the write ends with the last image path
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], ["version"]);
        assert!(calls[1].contains(&"write_flash".to_string()));
        assert_eq!(commands[1], "firmware.bin");
        assert_eq!(commands[2], "read_mac");
    }

    #[tokio::test]
    async fn test_read_info_uses_no_reset() {
        let runner = RecordingRunner::default();
        let settings = Settings::without_delays();
        let result = FlashSession::read_info(&runner, &settings, &NullObserver, "COM3")
            .run()
            .await;
        assert!(result.is_success());

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains(&"no_reset".to_string()));
        assert_eq!(calls[0].last().map(String::as_str), Some("flash_id"));
    }

    #[test]
    fn test_failure_reason() {
        let output = ProcessOutput {
            exit_code: 2,
            lines: vec!["A fatal error occurred: Failed to connect".to_string()],
        };
        assert_eq!(
            failure_reason(&output),
            "flashing tool exited with code 2: A fatal error occurred: Failed to connect"
        );
        let silent = ProcessOutput {
            exit_code: 1,
            lines: Vec::new(),
        };
        assert_eq!(failure_reason(&silent), "flashing tool exited with code 1");
    }
}
