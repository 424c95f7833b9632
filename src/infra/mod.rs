//! Infrastructure layer
//!
//! Handles all I/O operations: configuration directories and the external
//! flashing tool process.

pub mod dirs;
pub mod process;
