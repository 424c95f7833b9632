//! Configuration constants
//!
//! Fixed values that are part of the device contract and are never read
//! from user configuration.

pub mod defaults;
