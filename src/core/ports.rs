//! Serial port exclusivity
//!
//! At most one session may talk to a serial port at a time. The registry
//! only tracks sessions started through it; it does not lock the OS device.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::FlashError;

/// Ports with an active session
#[derive(Debug, Clone, Default)]
pub struct PortRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

impl PortRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `port` for one session
    pub fn acquire(&self, port: &str) -> Result<PortGuard, FlashError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(port.to_string()) {
            return Err(FlashError::PortBusy {
                port: port.to_string(),
            });
        }
        Ok(PortGuard {
            port: port.to_string(),
            active: Arc::clone(&self.active),
        })
    }

    /// Whether a session currently owns `port`
    pub fn is_busy(&self, port: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(port)
    }
}

/// Claim on a port, released on drop
#[derive(Debug)]
pub struct PortGuard {
    port: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl PortGuard {
    pub fn port(&self) -> &str {
        &self.port
    }
}

impl Drop for PortGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.port);
    }
}
