//! Process control for the two terminal actions of an update: handing off to the
//! elevated helper and restarting the application.
//!
//! Both end with the current process exiting. They sit behind [`ProcessControl`]
//! so tests can observe the request without the test runner disappearing.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::core::UpdaterError;

pub trait ProcessControl: Send + Sync {
    /// Start a generated script without waiting for it.
    fn launch_detached(&self, script: &Path) -> Result<()>;

    /// Start a fresh instance of the application without waiting for it.
    fn relaunch(&self, executable: &Path) -> Result<()>;

    /// End the current process. The system implementation does not return.
    fn terminate(&self, code: i32);
}

/// Real process control backed by `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcess;

impl ProcessControl for SystemProcess {
    fn launch_detached(&self, script: &Path) -> Result<()> {
        info!("Launching update script: {}", script.display());
        script_command(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| {
                UpdaterError::ElevationFailed {
                    reason: format!("could not start {}: {}", script.display(), e),
                }
                .into()
            })
    }

    fn relaunch(&self, executable: &Path) -> Result<()> {
        info!("Relaunching {}", executable.display());
        Command::new(executable)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .with_context(|| format!("Failed to relaunch {}", executable.display()))
    }

    fn terminate(&self, code: i32) {
        debug!("Exiting with code {}", code);
        std::process::exit(code);
    }
}

#[cfg(windows)]
fn script_command(script: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    // Empty window title, otherwise `start` treats a quoted script path as the title
    cmd.args(["/C", "start", ""]).arg(script);
    cmd
}

#[cfg(not(windows))]
fn script_command(script: &Path) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg(script);
    cmd
}
