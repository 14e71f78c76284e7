//! Progress reporting between the updater and whatever renders it.
//!
//! Components never talk to a UI directly; they emit [`ProgressEvent`]s to a
//! [`ProgressListener`]. Closures and `tokio` unbounded senders implement the trait,
//! so callers can either observe events inline or consume them as a stream.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

/// Phase an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Start,
    Backup,
    Update,
    Dependencies,
    Rollback,
    Elevated,
    Complete,
    Error,
}

impl ProgressStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Backup => "backup",
            Self::Update => "update",
            Self::Dependencies => "dependencies",
            Self::Rollback => "rollback",
            Self::Elevated => "elevated",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(status: ProgressStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Observer for update progress.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);

    /// Called once before an update starts when a progress view should be shown,
    /// i.e. the update is not silent and will run in-process.
    fn begin(&self) {}
}

impl<F> ProgressListener for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event);
    }
}

impl ProgressListener for UnboundedSender<ProgressEvent> {
    fn on_progress(&self, event: &ProgressEvent) {
        // A dropped receiver just means nobody is watching anymore
        let _ = self.send(event.clone());
    }
}

/// Listener that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl ProgressListener for NoopListener {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
