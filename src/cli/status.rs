use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::cli::CliConfig;
use crate::cli::common::{CommandContext, print_json};
use crate::updater::VersionChecker;

#[derive(Args, Debug)]
pub struct StatusCommand {
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    app_path: String,
    shared_drive_path: Option<String>,
    local_version: Option<String>,
    remote_version: Option<String>,
    shared_drive_accessible: bool,
    writable: bool,
    backups: usize,
    latest_backup: Option<String>,
}

impl StatusCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::load(cli).await?;
        let updater = ctx.file_updater()?;
        let app_path = ctx.config.app_path()?;

        let mut report = StatusReport {
            app_path: app_path.display().to_string(),
            shared_drive_path: None,
            local_version: None,
            remote_version: None,
            shared_drive_accessible: false,
            writable: updater.has_write_permissions().await,
            backups: 0,
            latest_backup: None,
        };

        if ctx.config.shared_drive_path.is_some() {
            let shared = ctx.config.shared_drive_path()?;
            let checker = VersionChecker::new(&app_path, &shared, &ctx.config.version_file);
            report.shared_drive_path = Some(shared.display().to_string());
            report.shared_drive_accessible = checker.is_shared_drive_accessible().await;
            report.local_version = checker.get_local_version().await.map(|d| d.version);
            report.remote_version = checker.get_remote_version().await.map(|d| d.version);
        }

        let snapshots = updater.list_backups().await?;
        report.backups = snapshots.len();
        report.latest_backup = snapshots.first().map(|s| s.name.clone());

        if self.json {
            return print_json(&report);
        }
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &StatusReport) {
    fn flag(ok: bool) -> colored::ColoredString {
        if ok { "yes".green() } else { "no".red() }
    }
    let unknown = || "unknown".dimmed().to_string();

    println!("{}", "ShipStatus updater status".bold());
    println!("  Application:    {}", report.app_path);
    println!("  Local version:  {}", report.local_version.clone().unwrap_or_else(unknown));
    match &report.shared_drive_path {
        Some(path) => {
            println!("  Shared drive:   {} (accessible: {})", path, flag(report.shared_drive_accessible));
            println!(
                "  Remote version: {}",
                report.remote_version.clone().unwrap_or_else(unknown)
            );
        }
        None => println!("  Shared drive:   {}", "not configured".yellow()),
    }
    println!("  Writable:       {}", flag(report.writable));
    match &report.latest_backup {
        Some(latest) => println!("  Backups:        {} (latest {})", report.backups, latest),
        None => println!("  Backups:        0"),
    }
}
