//! Session observer interface
//!
//! The session reports progress, log lines and its result through
//! [`SessionObserver`]. It never renders anything itself, and it calls the
//! observer from its own background task, so implementations must return
//! quickly and must not assume they run on the presentation thread.
//! [`ChannelObserver`] hands every update to a channel drained by the
//! presentation side.

use serde::Serialize;
use tokio::sync::mpsc;

use super::session::SessionResult;

/// Receives updates from a running session
pub trait SessionObserver: Send + Sync {
    /// Overall progress changed
    fn on_progress(&self, percent: u8, stage: &str, detail: &str);

    /// A line worth showing to the user
    fn on_log(&self, line: &str);

    /// The session finished
    fn on_terminal(&self, result: &SessionResult);
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SessionObserver for NullObserver {
    fn on_progress(&self, _percent: u8, _stage: &str, _detail: &str) {}

    fn on_log(&self, _line: &str) {}

    fn on_terminal(&self, _result: &SessionResult) {}
}

/// One observer callback, as a value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionUpdate {
    Progress {
        percent: u8,
        stage: String,
        detail: String,
    },
    Log {
        line: String,
    },
    Terminal {
        result: SessionResult,
    },
}

/// Observer that posts updates to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionUpdate>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end for the presentation layer
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn post(&self, update: SessionUpdate) {
        // A closed receiver means nobody is watching anymore
        if self.tx.send(update).is_err() {
            tracing::debug!("Session update dropped: receiver closed");
        }
    }
}

impl SessionObserver for ChannelObserver {
    fn on_progress(&self, percent: u8, stage: &str, detail: &str) {
        self.post(SessionUpdate::Progress {
            percent,
            stage: stage.to_string(),
            detail: detail.to_string(),
        });
    }

    fn on_log(&self, line: &str) {
        self.post(SessionUpdate::Log {
            line: line.to_string(),
        });
    }

    fn on_terminal(&self, result: &SessionResult) {
        self.post(SessionUpdate::Terminal {
            result: result.clone(),
        });
    }
}
