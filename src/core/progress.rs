//! Overall progress aggregation
//!
//! Maps per-file progress reported by the flashing tool onto a single
//! 0-100 percentage. The band layout follows the tool's own phases:
//!
//! - `0..10`  connection and handshake
//! - `10..95` file writes, split evenly between the planned files
//! - `95..100` reset and settle
//!
//! Within one session the percentage never goes down, except for the
//! explicit reset to 0 on failure.

use serde::Serialize;

use crate::error::ProgressError;

/// Start of the file write band
pub const BASE_PERCENT: u8 = 10;

/// End of the file write band
pub const WRITE_END_PERCENT: u8 = 95;

/// Reported while the post-flash reset runs
pub const RESETTING_PERCENT: u8 = 98;

/// Handshake milestones reported before any file is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeStage {
    Connecting,
    ChipIdentified,
    StubReady,
}

impl HandshakeStage {
    fn percent(self) -> u8 {
        match self {
            HandshakeStage::Connecting => 4,
            HandshakeStage::ChipIdentified => 7,
            HandshakeStage::StubReady => BASE_PERCENT,
        }
    }
}

/// Snapshot of a session's progress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressState {
    pub file_index: usize,
    pub file_count: usize,
    pub base_percent: u8,
    pub per_file_weight: f64,
    pub overall_percent: u8,
    pub stage_label: String,
    pub detail_label: String,
}

/// Progress aggregation for one session
#[derive(Debug, Clone)]
pub struct ProgressModel {
    state: ProgressState,
}

impl ProgressModel {
    /// Start a model for `file_count` files
    pub fn init(file_count: usize) -> Result<Self, ProgressError> {
        if file_count == 0 {
            return Err(ProgressError::InvalidState {
                reason: "no files to write".to_string(),
            });
        }

        Ok(Self {
            state: ProgressState {
                file_index: 0,
                file_count,
                base_percent: BASE_PERCENT,
                per_file_weight: Self::write_span() / file_count as f64,
                overall_percent: 0,
                stage_label: String::new(),
                detail_label: String::new(),
            },
        })
    }

    fn write_span() -> f64 {
        f64::from(WRITE_END_PERCENT - BASE_PERCENT)
    }

    /// Current snapshot
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Overall percentage
    pub fn percent(&self) -> u8 {
        self.state.overall_percent
    }

    /// Replace the stage and detail labels
    pub fn set_labels(&mut self, stage: impl Into<String>, detail: impl Into<String>) {
        self.state.stage_label = stage.into();
        self.state.detail_label = detail.into();
    }

    /// Handshake milestone reached
    pub fn on_stage(&mut self, stage: HandshakeStage) -> &ProgressState {
        self.raise(f64::from(stage.percent()), BASE_PERCENT);
        &self.state
    }

    /// Byte progress within file `file_index`
    pub fn on_file_byte_progress(
        &mut self,
        file_index: usize,
        percent_within_file: f64,
    ) -> &ProgressState {
        let index = file_index.min(self.state.file_count - 1);
        let fraction = percent_within_file.clamp(0.0, 100.0) / 100.0;
        self.state.file_index = self.state.file_index.max(index);
        self.raise(self.boundary(index as f64 + fraction), WRITE_END_PERCENT);
        &self.state
    }

    /// File `file_index` written and verified
    pub fn on_file_complete(&mut self, file_index: usize) -> &ProgressState {
        let completed = (file_index + 1).min(self.state.file_count);
        self.state.file_index = self.state.file_index.max(completed);
        self.raise(self.boundary(completed as f64), WRITE_END_PERCENT);
        &self.state
    }

    /// Post-flash reset started
    pub fn on_resetting(&mut self) -> &ProgressState {
        self.raise(f64::from(RESETTING_PERCENT), RESETTING_PERCENT);
        &self.state
    }

    /// Session finished
    pub fn on_terminal(&mut self, success: bool) -> &ProgressState {
        self.state.overall_percent = if success { 100 } else { 0 };
        &self.state
    }

    // Computed from the file count each time so the last boundary lands exactly on 95.
    fn boundary(&self, files: f64) -> f64 {
        f64::from(self.state.base_percent)
            + Self::write_span() * files / self.state.file_count as f64
    }

    fn raise(&mut self, value: f64, cap: u8) {
        let value = value.min(f64::from(cap)).floor() as u8;
        self.state.overall_percent = self.state.overall_percent.max(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_files_is_invalid() {
        assert!(matches!(
            ProgressModel::init(0),
            Err(ProgressError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_init_layout() {
        let model = ProgressModel::init(5).unwrap();
        let state = model.state();
        assert_eq!(state.base_percent, 10);
        assert!((state.per_file_weight - 17.0).abs() < f64::EPSILON);
        assert_eq!(state.overall_percent, 0);
    }

    #[test]
    fn test_three_completions_reach_95() {
        let mut model = ProgressModel::init(3).unwrap();
        assert_eq!(model.on_file_complete(0).overall_percent, 38);
        assert_eq!(model.on_file_complete(1).overall_percent, 66);
        assert_eq!(model.on_file_complete(2).overall_percent, 95);
    }

    #[test]
    fn test_byte_progress_single_file() {
        let mut model = ProgressModel::init(1).unwrap();
        assert_eq!(model.on_file_byte_progress(0, 0.0).overall_percent, 10);
        assert_eq!(model.on_file_byte_progress(0, 50.0).overall_percent, 52);
        assert_eq!(model.on_file_byte_progress(0, 100.0).overall_percent, 95);
    }

    #[test]
    fn test_byte_progress_never_goes_back() {
        let mut model = ProgressModel::init(2).unwrap();
        model.on_file_byte_progress(1, 50.0);
        let high = model.percent();
        model.on_file_byte_progress(0, 10.0);
        assert_eq!(model.percent(), high);
    }

    #[test]
    fn test_handshake_stays_below_write_band() {
        let mut model = ProgressModel::init(2).unwrap();
        assert_eq!(model.on_stage(HandshakeStage::Connecting).overall_percent, 4);
        assert_eq!(model.on_stage(HandshakeStage::ChipIdentified).overall_percent, 7);
        assert_eq!(model.on_stage(HandshakeStage::StubReady).overall_percent, 10);
        // A repeated "Connecting" line must not pull progress back
        assert_eq!(model.on_stage(HandshakeStage::Connecting).overall_percent, 10);
    }

    #[test]
    fn test_terminal_values() {
        let mut model = ProgressModel::init(1).unwrap();
        model.on_file_complete(0);
        assert_eq!(model.on_resetting().overall_percent, 98);
        assert_eq!(model.on_terminal(true).overall_percent, 100);

        let mut failed = ProgressModel::init(1).unwrap();
        failed.on_file_byte_progress(0, 70.0);
        assert_eq!(failed.on_terminal(false).overall_percent, 0);
    }

    #[test]
    fn test_out_of_range_index_is_clamped() {
        let mut model = ProgressModel::init(2).unwrap();
        assert_eq!(model.on_file_byte_progress(7, 100.0).overall_percent, 95);
        assert_eq!(model.on_file_complete(9).overall_percent, 95);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Bytes(usize, f64),
        Complete(usize),
        Stage(HandshakeStage),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0usize..6, 0.0f64..=100.0).prop_map(|(i, p)| Step::Bytes(i, p)),
            (0usize..6).prop_map(Step::Complete),
            prop_oneof![
                Just(HandshakeStage::Connecting),
                Just(HandshakeStage::ChipIdentified),
                Just(HandshakeStage::StubReady),
            ]
            .prop_map(Step::Stage),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_progress_is_monotonic(
            files in 1usize..6,
            steps in prop::collection::vec(step(), 0..40),
            success in any::<bool>(),
        ) {
            let mut model = ProgressModel::init(files).unwrap();
            let mut last = model.percent();
            for step in steps {
                let now = match step {
                    Step::Bytes(i, p) => model.on_file_byte_progress(i, p).overall_percent,
                    Step::Complete(i) => model.on_file_complete(i).overall_percent,
                    Step::Stage(s) => model.on_stage(s).overall_percent,
                };
                prop_assert!(now >= last);
                prop_assert!(now <= WRITE_END_PERCENT);
                last = now;
            }
            let end = model.on_terminal(success).overall_percent;
            prop_assert_eq!(end, if success { 100 } else { 0 });
        }
    }
}
