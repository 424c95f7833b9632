//! Default configuration values

use std::ops::RangeInclusive;

/// Flash offset of the second stage bootloader
pub const BOOTLOADER_OFFSET: u32 = 0x0;

/// Flash offset of the partition table
pub const PARTITION_TABLE_OFFSET: u32 = 0x8000;

/// Flash offset of the OTA boot selector sector
pub const BOOT_SELECTOR_OFFSET: u32 = 0xE000;

/// Flash offset of the application image
pub const FIRMWARE_OFFSET: u32 = 0x10000;

/// Flash offset of the filesystem image
pub const FILESYSTEM_OFFSET: u32 = 0x0062_0000;

/// Plausible bootloader sizes in bytes
pub const BOOTLOADER_SIZE: RangeInclusive<u64> = 10_000..=50_000;

/// Plausible partition table sizes in bytes
pub const PARTITION_TABLE_SIZE: RangeInclusive<u64> = 100..=10_000;

/// Plausible firmware sizes in bytes
pub const FIRMWARE_SIZE: RangeInclusive<u64> = 100_000..=3_000_000;

/// Smallest plausible filesystem image; there is no upper bound
pub const FILESYSTEM_MIN_SIZE: u64 = 1_000_000;

/// Size of the boot selector sector
pub const BOOT_SELECTOR_SIZE: usize = 4096;

/// Baud rate used by `write_flash`
pub const FLASH_BAUD: u32 = 460_800;

/// Default chip argument passed to the tool
pub const DEFAULT_CHIP: &str = "esp32s3";

/// Chip name the tool prints once the device is identified
pub const DEFAULT_CHIP_LABEL: &str = "ESP32-S3";

/// Default flash mode
pub const DEFAULT_FLASH_MODE: &str = "dio";

/// Default flash frequency
pub const DEFAULT_FLASH_FREQ: &str = "80m";

/// Default flash size
pub const DEFAULT_FLASH_SIZE: &str = "16MB";

/// Delay before the secondary reset (milliseconds)
pub const SETTLE_DELAY_MS: u64 = 2_000;

/// Delay after the secondary reset while the device boots (milliseconds)
pub const BOOT_DELAY_MS: u64 = 5_000;

/// Timeout of the secondary reset command (milliseconds)
pub const RESET_TIMEOUT_MS: u64 = 10_000;

/// Timeout of the tool presence probe (milliseconds)
pub const PROBE_TIMEOUT_MS: u64 = 5_000;

/// Timeout of the read-info command (milliseconds)
pub const READ_INFO_TIMEOUT_MS: u64 = 30_000;
