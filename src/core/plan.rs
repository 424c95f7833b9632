//! Flash plan construction
//!
//! Turns the set of image paths picked by the user into the ordered list of
//! artifacts written by one session, and flags images whose size looks wrong.
//! Size checks are advisory: they never stop a plan from being built.

use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::defaults::{
    BOOTLOADER_OFFSET, BOOTLOADER_SIZE, BOOT_SELECTOR_OFFSET, FILESYSTEM_MIN_SIZE,
    FILESYSTEM_OFFSET, FIRMWARE_OFFSET, FIRMWARE_SIZE, PARTITION_TABLE_OFFSET,
    PARTITION_TABLE_SIZE,
};
use crate::error::PlanError;

/// Kind of image written to flash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Bootloader,
    PartitionTable,
    BootSelector,
    Firmware,
    Filesystem,
}

impl ArtifactKind {
    /// All kinds in ascending offset order
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Bootloader,
        ArtifactKind::PartitionTable,
        ArtifactKind::BootSelector,
        ArtifactKind::Firmware,
        ArtifactKind::Filesystem,
    ];

    /// Fixed flash offset for this kind
    pub fn offset(self) -> u32 {
        match self {
            ArtifactKind::Bootloader => BOOTLOADER_OFFSET,
            ArtifactKind::PartitionTable => PARTITION_TABLE_OFFSET,
            ArtifactKind::BootSelector => BOOT_SELECTOR_OFFSET,
            ArtifactKind::Firmware => FIRMWARE_OFFSET,
            ArtifactKind::Filesystem => FILESYSTEM_OFFSET,
        }
    }

    /// Plausible size range, `None` for the synthesized boot selector
    pub fn size_bounds(self) -> Option<SizeBounds> {
        match self {
            ArtifactKind::Bootloader => Some(SizeBounds::within(BOOTLOADER_SIZE)),
            ArtifactKind::PartitionTable => Some(SizeBounds::within(PARTITION_TABLE_SIZE)),
            ArtifactKind::BootSelector => None,
            ArtifactKind::Firmware => Some(SizeBounds::within(FIRMWARE_SIZE)),
            ArtifactKind::Filesystem => Some(SizeBounds::at_least(FILESYSTEM_MIN_SIZE)),
        }
    }

    /// Whether a plan is invalid without this kind
    pub fn is_required(self) -> bool {
        self == ArtifactKind::Firmware
    }

    /// Human readable name
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Bootloader => "Bootloader",
            ArtifactKind::PartitionTable => "Partition table",
            ArtifactKind::BootSelector => "Boot selector",
            ArtifactKind::Firmware => "Firmware",
            ArtifactKind::Filesystem => "Filesystem",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Heuristic size range of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeBounds {
    pub min: u64,
    pub max: Option<u64>,
}

impl SizeBounds {
    fn within(range: RangeInclusive<u64>) -> Self {
        Self {
            min: *range.start(),
            max: Some(*range.end()),
        }
    }

    fn at_least(min: u64) -> Self {
        Self { min, max: None }
    }

    /// Whether `size` falls inside the range
    pub fn contains(&self, size: u64) -> bool {
        size >= self.min && self.max.map_or(true, |max| size <= max)
    }
}

/// Where the bytes of an artifact come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactSource {
    /// Image file supplied by the user
    File { path: PathBuf, size: u64 },
    /// Sector generated by the session right before the write
    Synthesized,
}

/// One image destined for a fixed flash offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub source: ArtifactSource,
}

impl Artifact {
    /// Flash offset of this artifact
    pub fn offset(&self) -> u32 {
        self.kind.offset()
    }

    /// Offset formatted the way the flashing tool expects it (`0xe000`)
    pub fn offset_arg(&self) -> String {
        format!("{:#x}", self.offset())
    }

    /// Path of a user supplied image
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            ArtifactSource::File { path, .. } => Some(path),
            ArtifactSource::Synthesized => None,
        }
    }
}

/// Image paths selected for a flash session
#[derive(Debug, Clone, Default)]
pub struct ArtifactPaths {
    pub bootloader: Option<PathBuf>,
    pub partition_table: Option<PathBuf>,
    pub firmware: Option<PathBuf>,
    pub filesystem: Option<PathBuf>,
}

/// Non-fatal warning about an artifact that needs confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvisoryIssue {
    pub kind: ArtifactKind,
    pub size: u64,
    pub message: String,
}

impl AdvisoryIssue {
    fn for_size(kind: ArtifactKind, size: u64, bounds: SizeBounds) -> Self {
        let message = match bounds.max {
            Some(max) if size > max => {
                format!("{kind} looks too large ({size} bytes, expected at most {max})")
            }
            Some(max) => format!(
                "{kind} has an unusual size ({size} bytes, expected {}..={max})",
                bounds.min
            ),
            None => format!(
                "{kind} looks small ({size} bytes, expected at least {})",
                bounds.min
            ),
        };
        Self {
            kind,
            size,
            message,
        }
    }
}

impl fmt::Display for AdvisoryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Ordered, immutable list of artifacts written by one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashPlan {
    artifacts: Vec<Artifact>,
}

/// A plan together with the advisory issues found while building it
#[derive(Debug, Clone)]
pub struct PlanReport {
    pub plan: FlashPlan,
    pub issues: Vec<AdvisoryIssue>,
}

impl FlashPlan {
    /// Build a plan, reading each image's size from disk
    pub fn build(paths: &ArtifactPaths) -> Result<PlanReport, PlanError> {
        Self::build_with(paths, |path| {
            std::fs::metadata(path)
                .map(|m| m.len())
                .map_err(|e| PlanError::ArtifactUnreadable {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                })
        })
    }

    /// Build a plan with a caller supplied size lookup
    pub fn build_with<F>(paths: &ArtifactPaths, mut size_of: F) -> Result<PlanReport, PlanError>
    where
        F: FnMut(&Path) -> Result<u64, PlanError>,
    {
        if paths.firmware.is_none() {
            return Err(PlanError::MissingRequiredArtifact);
        }

        let mut artifacts = Vec::new();
        let mut issues = Vec::new();

        for kind in ArtifactKind::ALL {
            let path = match kind {
                ArtifactKind::Bootloader => paths.bootloader.as_ref(),
                ArtifactKind::PartitionTable => paths.partition_table.as_ref(),
                ArtifactKind::Firmware => paths.firmware.as_ref(),
                ArtifactKind::Filesystem => paths.filesystem.as_ref(),
                ArtifactKind::BootSelector => {
                    if paths.partition_table.is_some() {
                        artifacts.push(Artifact {
                            kind,
                            source: ArtifactSource::Synthesized,
                        });
                    }
                    continue;
                }
            };
            let Some(path) = path else { continue };

            let size = size_of(path)?;
            if let Some(bounds) = kind.size_bounds() {
                if !bounds.contains(size) {
                    issues.push(AdvisoryIssue::for_size(kind, size, bounds));
                }
            }
            tracing::debug!(
                "Planned {} at {:#x}: {} ({size} bytes)",
                kind,
                kind.offset(),
                path.display()
            );
            artifacts.push(Artifact {
                kind,
                source: ArtifactSource::File {
                    path: path.clone(),
                    size,
                },
            });
        }

        Ok(PlanReport {
            plan: Self { artifacts },
            issues,
        })
    }

    /// Artifacts in ascending offset order
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Number of artifacts written
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether the plan writes nothing
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Whether a boot selector sector has to be generated for this plan
    pub fn needs_boot_selector(&self) -> bool {
        self.artifacts
            .iter()
            .any(|a| a.kind == ArtifactKind::BootSelector)
    }

    /// `(offset, kind)` table used to attribute tool output to artifacts
    pub fn offset_table(&self) -> Vec<(u32, ArtifactKind)> {
        self.artifacts.iter().map(|a| (a.offset(), a.kind)).collect()
    }
}
