//! `run` and `update`: the two commands that modify the installation.

use anyhow::{Result, bail};
use clap::Args;

use crate::cli::CliConfig;
use crate::cli::check::print_check;
use crate::cli::common::{CommandContext, print_json, print_update_result};
use crate::updater::{UpdateOrchestrator, UpdateResult};

#[derive(Args, Debug)]
pub struct RunCommand {
    /// Print the check and update result as JSON
    #[arg(long)]
    json: bool,

    /// Do not restart the application after a successful update
    #[arg(long)]
    no_restart: bool,
}

impl RunCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::load(cli).await?;
        let progress = ctx.progress(self.json);
        let orchestrator = ctx.orchestrator(progress.clone())?;

        let report = orchestrator.run().await;
        progress.finish();

        if self.json {
            print_json(&report)?;
        } else {
            print_check(&report.check);
            if let Some(result) = &report.update {
                print_update_result(result);
            }
        }

        match &report.update {
            Some(result) => finish(&orchestrator, result, self.no_restart).await,
            None => Ok(()),
        }
    }
}

#[derive(Args, Debug)]
pub struct UpdateCommand {
    /// Print the update result as JSON
    #[arg(long)]
    json: bool,

    /// Do not restart the application after a successful update
    #[arg(long)]
    no_restart: bool,
}

impl UpdateCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let mut ctx = CommandContext::load(cli).await?;
        // An explicit update shows its progress
        ctx.config.silent = self.json;
        let progress = ctx.progress(self.json);
        let orchestrator = ctx.orchestrator(progress.clone())?;

        let result = orchestrator.perform_update().await;
        progress.finish();

        if self.json {
            print_json(&result)?;
        } else {
            print_update_result(&result);
        }
        finish(&orchestrator, &result, self.no_restart).await
    }
}

async fn finish(orchestrator: &UpdateOrchestrator, result: &UpdateResult, no_restart: bool) -> Result<()> {
    if !result.success {
        bail!(result.error.clone().unwrap_or_else(|| "Update failed".to_string()));
    }
    if no_restart {
        orchestrator.cancel_restart();
    } else {
        orchestrator.wait_for_restart().await;
    }
    Ok(())
}
