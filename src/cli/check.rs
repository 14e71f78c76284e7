use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::cli::CliConfig;
use crate::cli::common::{CommandContext, print_json};
use crate::updater::{NoopListener, UpdateCheck, VersionChecker};

#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Print the check result as JSON
    #[arg(long)]
    json: bool,
}

impl CheckCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::load(cli).await?;
        let orchestrator = ctx.orchestrator(std::sync::Arc::new(NoopListener))?;
        let check = orchestrator.check_only().await;

        if self.json {
            return print_json(&check);
        }
        print_check(&check);
        Ok(())
    }
}

pub(crate) fn print_check(check: &UpdateCheck) {
    if let Some(error) = &check.error {
        println!("{} {}", "No update information:".yellow(), error);
        return;
    }

    let current = check.current_version().unwrap_or_default();
    let latest = check.new_version();
    let latest = if check.update_available { latest } else { None };
    println!("{}", VersionChecker::format_version_info(current, latest));

    if let Some(release) = check.release.as_ref().filter(|_| check.update_available) {
        if release.is_required {
            println!("{}", "This update is required".red().bold());
        }
        if !release.update_message.is_empty() {
            println!("{}", release.update_message);
        }
        if !release.changes_url.is_empty() {
            println!("Changes: {}", release.changes_url.cyan());
        }
        println!("Released: {}", release.release_date);
    }
}
