//! Otaflash - flash OTA-capable firmware onto ESP32 boards
//!
//! This library drives esptool to write a bootloader, partition table,
//! OTA boot selector, application and filesystem image to their fixed
//! flash offsets, and turns the tool's console output into a monotonic
//! progress percentage.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Flash plans, progress, output classification and sessions
//! - [`infra`] - Infrastructure layer (directories, external processes)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
