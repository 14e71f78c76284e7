use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::cli::CliConfig;
use crate::cli::common::CommandContext;

#[derive(Args, Debug)]
pub struct RollbackCommand {
    /// Snapshot to restore [default: the newest one]
    #[arg(long, value_name = "NAME")]
    backup: Option<String>,
}

impl RollbackCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::load(cli).await?;
        let updater = ctx.file_updater()?;

        let snapshot = match &self.backup {
            Some(name) => updater.backup_store().find(name).await?,
            None => match updater.latest_backup().await? {
                Some(snapshot) => snapshot,
                None => bail!(
                    "No backups found in {}",
                    updater.backup_store().root().display()
                ),
            },
        };

        info!("Restoring {} into {}", snapshot.name, updater.app_path().display());
        updater.restore(&snapshot.path).await?;

        let version = snapshot.app_version.as_deref().unwrap_or("unknown");
        println!(
            "{} Restored {} (version {})",
            "✅".green(),
            snapshot.name.bold(),
            version
        );
        Ok(())
    }
}
