//! User settings
//!
//! Reads tool and timing settings from `config.toml` in the config directory.
//! Every value is optional; unset values fall back to the defaults in
//! [`crate::config::defaults`]. The flash offset table is not configurable.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::defaults;
use crate::error::SettingsError;
use crate::infra::dirs::OtaflashDirs;

/// Settings for otaflash
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Flashing tool invocation
    #[serde(default)]
    pub tool: ToolConfig,

    /// Flash parameters passed to `write_flash`
    #[serde(default)]
    pub flash: FlashConfig,

    /// Delays and timeouts, in milliseconds
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Flashing tool invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Program to run (default `python`)
    pub program: Option<String>,

    /// Arguments placed before every command (default `-m esptool`)
    pub args: Option<Vec<String>>,

    /// Value of `--chip`
    pub chip: Option<String>,

    /// Chip name printed by the tool once the device is identified
    pub chip_label: Option<String>,
}

/// Flash parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlashConfig {
    pub baud: Option<u32>,
    pub mode: Option<String>,
    pub freq: Option<String>,
    pub size: Option<String>,
}

/// Delays and timeouts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingConfig {
    pub settle_ms: Option<u64>,
    pub boot_ms: Option<u64>,
    pub reset_timeout_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
    pub read_info_timeout_ms: Option<u64>,
}

impl Settings {
    /// Load settings from the config directory
    pub fn load(dirs: &OtaflashDirs) -> Result<Self, SettingsError> {
        Self::load_from_path(&dirs.settings_path())
    }

    /// Load settings from a specific path
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| SettingsError::Parse {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Settings with every delay set to zero, for tests and dry runs
    #[must_use]
    pub fn without_delays() -> Self {
        Self {
            timing: TimingConfig {
                settle_ms: Some(0),
                boot_ms: Some(0),
                ..TimingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Program used to run the flashing tool
    #[must_use]
    pub fn program(&self) -> &str {
        self.tool.program.as_deref().unwrap_or("python")
    }

    /// Arguments placed before every tool command
    #[must_use]
    pub fn program_args(&self) -> Vec<String> {
        self.tool
            .args
            .clone()
            .unwrap_or_else(|| vec!["-m".to_string(), "esptool".to_string()])
    }

    #[must_use]
    pub fn chip(&self) -> &str {
        self.tool.chip.as_deref().unwrap_or(defaults::DEFAULT_CHIP)
    }

    #[must_use]
    pub fn chip_label(&self) -> &str {
        self.tool
            .chip_label
            .as_deref()
            .unwrap_or(defaults::DEFAULT_CHIP_LABEL)
    }

    #[must_use]
    pub fn baud(&self) -> u32 {
        self.flash.baud.unwrap_or(defaults::FLASH_BAUD)
    }

    #[must_use]
    pub fn flash_mode(&self) -> &str {
        self.flash.mode.as_deref().unwrap_or(defaults::DEFAULT_FLASH_MODE)
    }

    #[must_use]
    pub fn flash_freq(&self) -> &str {
        self.flash.freq.as_deref().unwrap_or(defaults::DEFAULT_FLASH_FREQ)
    }

    #[must_use]
    pub fn flash_size(&self) -> &str {
        self.flash.size.as_deref().unwrap_or(defaults::DEFAULT_FLASH_SIZE)
    }

    /// Wait before the secondary reset
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.timing.settle_ms.unwrap_or(defaults::SETTLE_DELAY_MS))
    }

    /// Wait for the device to boot after the secondary reset
    #[must_use]
    pub fn boot_delay(&self) -> Duration {
        Duration::from_millis(self.timing.boot_ms.unwrap_or(defaults::BOOT_DELAY_MS))
    }

    #[must_use]
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(
            self.timing
                .reset_timeout_ms
                .unwrap_or(defaults::RESET_TIMEOUT_MS),
        )
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(
            self.timing
                .probe_timeout_ms
                .unwrap_or(defaults::PROBE_TIMEOUT_MS),
        )
    }

    #[must_use]
    pub fn read_info_timeout(&self) -> Duration {
        Duration::from_millis(
            self.timing
                .read_info_timeout_ms
                .unwrap_or(defaults::READ_INFO_TIMEOUT_MS),
        )
    }
}
