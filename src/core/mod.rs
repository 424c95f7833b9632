//! Core logic module
//!
//! This module contains the flash orchestration logic for otaflash.
//! Running the external tool lives in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`plan`] - Artifact selection, offsets and size checks
//! - [`boot_selector`] - OTA boot selector sector synthesis
//! - [`progress`] - Weighted, monotonic session progress
//! - [`classifier`] - Classification of flashing tool output
//! - [`command`] - Flashing tool argument assembly
//! - [`session`] - Flash, erase and read-info sessions
//! - [`observer`] - Delivery of session updates
//! - [`ports`] - One session per serial port
//! - [`flasher`] - Entry point for starting sessions
//! - [`settings`] - User settings
//! - [`doctor`] - Flashing tool health checks

pub mod boot_selector;
pub mod classifier;
pub mod command;
pub mod doctor;
pub mod flasher;
pub mod observer;
pub mod plan;
pub mod ports;
pub mod progress;
pub mod session;
pub mod settings;
