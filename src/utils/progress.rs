//! Terminal rendering of update progress.
//!
//! [`TerminalProgress`] is a [`ProgressListener`] backed by an `indicatif`
//! spinner. It is hidden when stderr is not a terminal, when `--no-progress` is
//! passed or when `SHIPSTATUS_NO_PROGRESS` is set.
//!
//! ```text
//! Updating ⠹ Updating src folder...
//! ✓ Update completed successfully!
//! ```

use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

use crate::updater::{ProgressEvent, ProgressListener, ProgressStatus};

/// Environment variable that disables all progress indicators.
pub const NO_PROGRESS_ENV: &str = "SHIPSTATUS_NO_PROGRESS";

fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some()
}

pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    /// A spinner on stderr, or a hidden one when `enabled` is false or progress is
    /// disabled through the environment.
    pub fn new(enabled: bool) -> Self {
        let bar = if enabled && !is_progress_disabled() {
            let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            bar.set_style(spinner_style());
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.bar.is_hidden()
    }

    pub fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ProgressListener for TerminalProgress {
    fn begin(&self) {
        self.bar.set_prefix("Updating");
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn on_progress(&self, event: &ProgressEvent) {
        match event.status {
            ProgressStatus::Complete => {
                self.bar.finish_with_message(format!("{} {}", "✓".green(), event.message));
            }
            ProgressStatus::Error => {
                self.bar.abandon_with_message(format!("{} {}", "✗".red(), event.message.red()));
            }
            // The elevated helper takes over; close the view
            ProgressStatus::Elevated => {
                self.bar.finish_and_clear();
                if !self.bar.is_hidden() {
                    eprintln!("{}", event.message.yellow());
                }
            }
            _ => {
                self.bar.set_message(event.message.clone());
                self.bar.tick();
            }
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{prefix:.bold} {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_progress_is_hidden() {
        let progress = TerminalProgress::new(false);
        assert!(progress.is_hidden());

        progress.begin();
        progress.on_progress(&ProgressEvent::new(ProgressStatus::Backup, "Backing up src folder..."));
        progress.on_progress(&ProgressEvent::new(ProgressStatus::Complete, "done"));
        progress.finish();
    }
}
