//! ShipStatus updater entry point
//!
//! Parses the command line, runs the selected command and turns any error into
//! a readable message with a suggestion before exiting with status 1.
//!
//! - `check` - Compare the installed version with the shared drive
//! - `run` - Check and update when a newer release is published
//! - `update` - Apply the published release
//! - `rollback` - Restore a backup snapshot
//! - `backups` - List or prune snapshots
//! - `status` - Versions, drive access, permissions
//! - `config` - Show or create `updater.toml`

use anyhow::Result;
use clap::Parser;
use shipstatus_updater::cli;
use shipstatus_updater::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
