//! Recording stand-ins for process control and progress reporting.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::updater::{ProcessControl, ProgressEvent, ProgressListener, ProgressStatus};

/// Records every terminal action without performing it.
#[derive(Debug, Default)]
pub struct RecordingProcess {
    launched: Mutex<Vec<PathBuf>>,
    relaunched: Mutex<Vec<PathBuf>>,
    exits: Mutex<Vec<i32>>,
}

impl RecordingProcess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launched(&self) -> Vec<PathBuf> {
        self.launched.lock().unwrap().clone()
    }

    pub fn relaunched(&self) -> Vec<PathBuf> {
        self.relaunched.lock().unwrap().clone()
    }

    pub fn exits(&self) -> Vec<i32> {
        self.exits.lock().unwrap().clone()
    }
}

impl ProcessControl for RecordingProcess {
    fn launch_detached(&self, script: &Path) -> Result<()> {
        self.launched.lock().unwrap().push(script.to_path_buf());
        Ok(())
    }

    fn relaunch(&self, executable: &Path) -> Result<()> {
        self.relaunched.lock().unwrap().push(executable.to_path_buf());
        Ok(())
    }

    fn terminate(&self, code: i32) {
        self.exits.lock().unwrap().push(code);
    }
}

/// Keeps every progress event in order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<ProgressEvent>>,
    begun: AtomicUsize,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<ProgressStatus> {
        self.events().into_iter().map(|e| e.status).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.message).collect()
    }

    pub fn contains(&self, status: ProgressStatus, message: &str) -> bool {
        self.events().iter().any(|e| e.status == status && e.message == message)
    }

    pub fn begin_count(&self) -> usize {
        self.begun.load(Ordering::SeqCst)
    }
}

impl ProgressListener for EventLog {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn begin(&self) {
        self.begun.fetch_add(1, Ordering::SeqCst);
    }
}
