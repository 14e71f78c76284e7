use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::cli::CliConfig;
use crate::cli::common::{CommandContext, print_json};

#[derive(Args, Debug)]
pub struct BackupsCommand {
    #[command(subcommand)]
    command: Option<BackupsSubcommands>,
}

#[derive(Subcommand, Debug)]
enum BackupsSubcommands {
    /// List snapshots, newest first (default)
    List {
        #[arg(long)]
        json: bool,
    },

    /// Delete all but the newest snapshots
    Prune {
        /// Number of snapshots to keep [default: keep_backups from the config]
        #[arg(long)]
        keep: Option<usize>,
    },
}

impl BackupsCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::load(cli).await?;
        let updater = ctx.file_updater()?;

        match self.command.unwrap_or(BackupsSubcommands::List {
            json: false,
        }) {
            BackupsSubcommands::List {
                json,
            } => {
                let snapshots = updater.list_backups().await?;
                if json {
                    return print_json(&snapshots);
                }
                if snapshots.is_empty() {
                    println!("No backups in {}", updater.backup_store().root().display());
                    return Ok(());
                }
                for snapshot in &snapshots {
                    println!(
                        "{}  {}  {}",
                        snapshot.name.bold(),
                        snapshot.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                        snapshot.app_version.as_deref().unwrap_or("unknown").cyan()
                    );
                }
            }
            BackupsSubcommands::Prune {
                keep,
            } => {
                let keep = keep.unwrap_or(ctx.config.keep_backups);
                let removed = updater.cleanup_old_backups(keep).await;
                if removed.is_empty() {
                    println!("Nothing to prune (keeping {keep})");
                } else {
                    for path in &removed {
                        println!("{} {}", "Removed".yellow(), path.display());
                    }
                    println!("{} Pruned {} backup(s)", "✅".green(), removed.len());
                }
            }
        }
        Ok(())
    }
}
