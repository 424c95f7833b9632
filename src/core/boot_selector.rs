//! OTA boot selector sector
//!
//! The bootloader reads this sector to decide which OTA application slot to
//! start. A freshly written sector selects the first slot.

use std::io::Write;
use std::path::Path;

use tempfile::TempPath;

use crate::config::defaults::BOOT_SELECTOR_SIZE;
use crate::error::FlashError;

/// Magic word at the start of a valid sector
pub const MAGIC: [u8; 4] = [0xEB, 0xEB, 0xFF, 0xFF];

/// OTA sequence number selecting the first application slot
pub const FIRST_SLOT_SEQUENCE: u32 = 0;

/// Bytes of the boot selector sector
pub fn sector_bytes() -> Vec<u8> {
    let mut sector = vec![0xFF; BOOT_SELECTOR_SIZE];
    sector[..4].copy_from_slice(&MAGIC);
    sector[4..8].copy_from_slice(&FIRST_SLOT_SEQUENCE.to_le_bytes());
    sector
}

/// Boot selector written to a temporary file
///
/// The file is removed when this value is dropped, so it lives exactly as
/// long as the session that created it.
#[derive(Debug)]
pub struct BootSelectorFile {
    path: TempPath,
}

impl BootSelectorFile {
    /// Write a fresh sector to temporary storage
    pub fn synthesize() -> Result<Self, FlashError> {
        let mut file = tempfile::Builder::new()
            .prefix("boot_app0-")
            .suffix(".bin")
            .tempfile()
            .map_err(|e| FlashError::io("creating the boot selector file", e))?;

        file.write_all(&sector_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| FlashError::io("writing the boot selector file", e))?;

        let path = file.into_temp_path();
        tracing::debug!("Boot selector written to {}", path.display());
        Ok(Self { path })
    }

    /// Location of the sector file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_layout() {
        let sector = sector_bytes();
        assert_eq!(sector.len(), 4096);
        assert_eq!(&sector[0..4], &[0xEB, 0xEB, 0xFF, 0xFF]);
        assert_eq!(&sector[4..8], &[0x00, 0x00, 0x00, 0x00]);
        assert!(sector[8..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_synthesize_is_deterministic() {
        let first = BootSelectorFile::synthesize().unwrap();
        let second = BootSelectorFile::synthesize().unwrap();
        assert_ne!(first.path(), second.path());

        let a = std::fs::read(first.path()).unwrap();
        let b = std::fs::read(second.path()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, sector_bytes());
    }

    #[test]
    fn test_file_removed_on_drop() {
        let selector = BootSelectorFile::synthesize().unwrap();
        let path = selector.path().to_path_buf();
        assert!(path.exists());
        drop(selector);
        assert!(!path.exists());
    }
}
