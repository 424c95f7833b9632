//! Error types for otaflash
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Flash plan validation errors
#[derive(Error, Debug)]
pub enum PlanError {
    /// No firmware image was given
    #[error("A firmware image is required (no firmware path given)")]
    MissingRequiredArtifact,

    /// Artifact could not be inspected
    #[error("Cannot read artifact '{path}': {error}")]
    ArtifactUnreadable { path: PathBuf, error: String },
}

/// Progress aggregation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgressError {
    /// Progress model used without any file to write
    #[error("Invalid progress state: {reason}")]
    InvalidState { reason: String },
}

/// External flashing tool errors
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The tool could not be started
    #[error("Failed to launch '{program}': {error}")]
    Launch { program: String, error: String },

    /// Reading the tool output or waiting on it failed
    #[error("I/O error while running '{program}': {error}")]
    Io { program: String, error: String },

    /// The tool did not finish in time
    #[error("'{program}' did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// Settings loading errors
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    Read { path: String, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    Parse { path: String, error: String },
}

/// Top-level otaflash error type
#[derive(Error, Debug)]
pub enum FlashError {
    /// Plan validation error
    #[error("Validation error: {0}")]
    Plan(#[from] PlanError),

    /// Another session already owns the serial port
    #[error("Serial port '{port}' is busy: another flash, erase or info session is running on it")]
    PortBusy { port: String },

    /// Local I/O error (temporary files)
    #[error("IO error while {context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl FlashError {
    /// Wrap an I/O error with a short description of the failed action
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
