//! Flashing tool output classification
//!
//! The tool's output has no grammar, so every rule here is a tolerant
//! substring match. A line that matches nothing is ignored for state but can
//! still be logged.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::plan::ArtifactKind;

/// Lines worth showing while writing flash
const FLASH_LOG_KEYWORDS: &[&str] = &[
    "Writing",
    "Wrote",
    "Hash",
    "Compressed",
    "Connecting",
    "Chip is",
    "MAC",
    "Stub",
    "Changing",
    "Leaving",
    "Hard resetting",
];

/// Lines worth showing while erasing flash
const ERASE_LOG_KEYWORDS: &[&str] = &[
    "Connecting",
    "Chip is",
    "Erasing",
    "Stub",
    "MAC",
    "Changing",
];

/// Banner prefix dropped from read-info output
const TOOL_BANNER_PREFIX: &str = "esptool";

/// Prefixes that announce the identified chip, followed by its label
const CHIP_MARKERS: &[&str] = &["Chip is ", "Detecting chip type... "];

/// Digits of an address compared against an artifact offset
const ADDRESS_PREFIX_DIGITS: usize = 4;

/// Which output lines are forwarded to the log sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFilter {
    /// Progress and handshake lines of `write_flash`
    Flash,
    /// Handshake and erase lines of `erase_flash`
    Erase,
    /// Everything except the tool banner
    ReadInfo,
}

impl LogFilter {
    /// Whether `line` should reach the log sink
    pub fn accepts(self, line: &str) -> bool {
        if line.trim().is_empty() {
            return false;
        }
        match self {
            LogFilter::Flash => FLASH_LOG_KEYWORDS.iter().any(|k| line.contains(k)),
            LogFilter::Erase => ERASE_LOG_KEYWORDS.iter().any(|k| line.contains(k)),
            LogFilter::ReadInfo => !line.starts_with(TOOL_BANNER_PREFIX),
        }
    }
}

/// Semantic event found in one line of output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClassifierEvent {
    Connecting,
    ChipIdentified,
    StubReady,
    ByteProgress {
        artifact_index: usize,
        percent_within_file: f64,
        address: String,
    },
    FileVerified {
        artifact_index: usize,
    },
}

/// Where the tool is in its run, as far as its output tells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierState {
    Idle,
    Connecting,
    ChipIdentified,
    StubReady,
    Writing(usize),
    Verifying(usize),
    Done,
    Failed,
}

/// Result of classifying one line
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedLine {
    pub event: Option<ClassifierEvent>,
    pub loggable: bool,
}

/// Line-oriented state machine over `write_flash` output
#[derive(Debug, Clone)]
pub struct OutputClassifier {
    chip_announcements: Vec<String>,
    offsets: Vec<(u32, ArtifactKind)>,
    open_index: usize,
    state: ClassifierState,
}

impl OutputClassifier {
    /// Create a classifier for a plan's offset table
    pub fn new(chip_label: impl Into<String>, offsets: Vec<(u32, ArtifactKind)>) -> Self {
        let chip_label = chip_label.into();
        let chip_announcements = if chip_label.is_empty() {
            Vec::new()
        } else {
            CHIP_MARKERS
                .iter()
                .map(|marker| format!("{marker}{chip_label}"))
                .collect()
        };
        Self {
            chip_announcements,
            offsets,
            open_index: 0,
            state: ClassifierState::Idle,
        }
    }

    /// Current state
    pub fn state(&self) -> ClassifierState {
        self.state
    }

    /// Index of the artifact currently being written
    pub fn open_index(&self) -> usize {
        self.open_index
    }

    /// Kind of the artifact at `index`
    pub fn kind_of(&self, index: usize) -> Option<ArtifactKind> {
        self.offsets.get(index).map(|(_, kind)| *kind)
    }

    /// Classify one line of output
    pub fn classify(&mut self, line: &str) -> ClassifiedLine {
        let event = self.transition(line);
        ClassifiedLine {
            event,
            loggable: LogFilter::Flash.accepts(line),
        }
    }

    /// Classify the process exit; a non-zero code always fails
    pub fn finish(&mut self, exit_code: i32) -> ClassifierState {
        self.state = if exit_code == 0 {
            ClassifierState::Done
        } else {
            ClassifierState::Failed
        };
        self.state
    }

    fn transition(&mut self, line: &str) -> Option<ClassifierEvent> {
        if line.contains("Connecting") {
            self.state = ClassifierState::Connecting;
            return Some(ClassifierEvent::Connecting);
        }
        if self
            .chip_announcements
            .iter()
            .any(|announcement| line.contains(announcement.as_str()))
        {
            self.state = ClassifierState::ChipIdentified;
            return Some(ClassifierEvent::ChipIdentified);
        }
        if line.contains("Stub running") {
            self.state = ClassifierState::StubReady;
            return Some(ClassifierEvent::StubReady);
        }
        if let Some((_, rest)) = line.split_once("Writing at") {
            return self.byte_progress(rest);
        }
        if line.contains("Hash of data verified") {
            return self.file_verified();
        }
        None
    }

    fn byte_progress(&mut self, rest: &str) -> Option<ClassifierEvent> {
        let address = rest
            .split("...")
            .next()
            .unwrap_or_default()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        let percent = parse_percent(rest)?;
        let artifact_index = self.resolve(&address);

        self.state = ClassifierState::Writing(artifact_index);
        Some(ClassifierEvent::ByteProgress {
            artifact_index,
            percent_within_file: percent,
            address,
        })
    }

    fn file_verified(&mut self) -> Option<ClassifierEvent> {
        let artifact_index = self.open_index;
        if artifact_index >= self.offsets.len() {
            return None;
        }

        self.open_index += 1;
        self.state = if self.open_index == self.offsets.len() {
            ClassifierState::Done
        } else {
            ClassifierState::Verifying(artifact_index)
        };
        Some(ClassifierEvent::FileVerified { artifact_index })
    }

    /// Match an address against the offset table by its leading hex digits.
    ///
    /// The open artifact wins when several offsets share the prefix; an
    /// address that matches nothing is charged to the open artifact.
    fn resolve(&self, address: &str) -> usize {
        let fallback = self.open_index.min(self.offsets.len().saturating_sub(1));
        let Some(prefix) = address_prefix(address) else {
            return fallback;
        };

        let mut matches = self
            .offsets
            .iter()
            .enumerate()
            .filter(|(_, (offset, _))| offset_prefix(*offset) == prefix)
            .map(|(index, _)| index)
            .peekable();

        let first = matches.peek().copied();
        if matches.any(|index| index == self.open_index) {
            return self.open_index;
        }
        first.unwrap_or(fallback)
    }
}

fn offset_prefix(offset: u32) -> String {
    format!("{offset:08X}")[..ADDRESS_PREFIX_DIGITS].to_string()
}

fn address_prefix(address: &str) -> Option<String> {
    let digits = address
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let padded = format!("{:0>8}", digits.to_ascii_uppercase());
    Some(padded[..ADDRESS_PREFIX_DIGITS].to_string())
}

/// Percentage inside `(NN %)`, or any `NN%` token as a fallback
fn parse_percent(text: &str) -> Option<f64> {
    static PARENTHESIZED: OnceLock<Regex> = OnceLock::new();
    static BARE: OnceLock<Regex> = OnceLock::new();

    let parenthesized = PARENTHESIZED
        .get_or_init(|| Regex::new(r"\(\s*(\d+(?:\.\d+)?)\s*%\s*\)").expect("valid regex"));
    let bare = BARE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("valid regex"));

    parenthesized
        .captures(text)
        .or_else(|| bare.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|p| p.clamp(0.0, 100.0))
}
