//! Shared pieces of the CLI commands.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::io::IsTerminal;
use std::sync::Arc;

use crate::cli::CliConfig;
use crate::config::UpdaterConfig;
use crate::updater::{
    FileUpdater, NoopListener, ProgressListener, SystemProcess, TerminalPrompt, UpdateOrchestrator,
    UpdateResult,
};
use crate::utils::progress::TerminalProgress;

/// Context every command starts from.
pub struct CommandContext {
    pub cli: CliConfig,
    pub config: UpdaterConfig,
}

impl CommandContext {
    pub async fn load(cli: &CliConfig) -> Result<Self> {
        Ok(Self {
            cli: cli.clone(),
            config: cli.load_updater_config().await?,
        })
    }

    /// Spinner on stderr, hidden for JSON output, `--no-progress` or a non-terminal.
    pub fn progress(&self, json: bool) -> Arc<TerminalProgress> {
        let enabled = !json && !self.cli.no_progress && std::io::stderr().is_terminal();
        Arc::new(TerminalProgress::new(enabled))
    }

    pub fn orchestrator(&self, listener: Arc<dyn ProgressListener>) -> Result<UpdateOrchestrator> {
        UpdateOrchestrator::builder(self.config.clone())
            .listener(listener)
            .build()
            .context("Failed to set up the updater")
    }

    /// File updater for commands that never pull from the shared drive.
    pub fn file_updater(&self) -> Result<FileUpdater> {
        FileUpdater::from_config(
            &self.config,
            Arc::new(NoopListener),
            Arc::new(SystemProcess),
            Arc::new(TerminalPrompt),
        )
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

pub fn print_update_result(result: &UpdateResult) {
    if result.handed_off {
        println!("{}", "Update handed off to the elevated helper".yellow());
    } else if result.success {
        println!("{}", "Update completed successfully!".green());
    } else if let Some(error) = &result.error {
        println!("{} {}", "Update failed:".red().bold(), error);
    }
}
