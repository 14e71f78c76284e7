//! Command-line host for the updater.
//!
//! ```bash
//! shipstatus-updater check --json          # compare versions only
//! shipstatus-updater run                   # check, update when newer, restart
//! shipstatus-updater update --no-restart   # apply the published release now
//! shipstatus-updater rollback              # restore the latest snapshot
//! shipstatus-updater backups prune --keep 3
//! shipstatus-updater status
//! shipstatus-updater config show
//! ```
//!
//! Global flags (`--app-dir`, `--shared-dir`, `--backup-dir`, `--app-executable`) override
//! the loaded `updater.toml`; see [`UpdaterConfig::load`] for the lookup order.

mod backups;
mod check;
pub mod common;
mod config;
mod rollback;
mod run;
mod status;


use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::UpdaterConfig;
use crate::utils::progress::NO_PROGRESS_ENV;

/// Settings derived from the global flags before any command runs.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Default tracing filter; `RUST_LOG` still wins when set.
    pub log_level: String,

    pub no_progress: bool,

    /// Explicit config file from `--config`.
    pub config_path: Option<PathBuf>,

    pub app_dir: Option<PathBuf>,
    pub shared_dir: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub app_executable: Option<PathBuf>,
}

impl CliConfig {
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            ..Self::default()
        }
    }

    pub fn apply_to_env(&self) {
        if self.no_progress {
            // SAFETY: called once at startup before any worker threads read the environment
            unsafe {
                std::env::set_var(NO_PROGRESS_ENV, "1");
            }
        }
    }

    /// Install the global tracing subscriber. A second call is a no-op.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("shipstatus_updater={}", self.log_level)));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Load `updater.toml` and apply the directory overrides.
    pub async fn load_updater_config(&self) -> Result<UpdaterConfig> {
        let app_dir = match &self.app_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };

        let mut config = UpdaterConfig::load(self.config_path.as_deref(), &app_dir).await?;
        if self.app_dir.is_some() {
            config.app_path = Some(app_dir);
        }
        if let Some(shared) = &self.shared_dir {
            config.shared_drive_path = Some(shared.clone());
        }
        if let Some(backups) = &self.backup_dir {
            config.backup_dir = Some(backups.clone());
        }
        if let Some(executable) = &self.app_executable {
            config.app_executable = Some(executable.clone());
        }
        Ok(config)
    }
}

#[derive(Parser)]
#[command(
    name = "shipstatus-updater",
    about = "Shared-drive auto-updater for ShipStatus Pro",
    version,
    long_about = "Checks the shared release drive for a newer ShipStatus Pro build, applies it with a \
                  backup and rollback, installs changed dependencies and restarts the dashboard."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug-level logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to an updater.toml (also read from SHIPSTATUS_UPDATER_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Installed application directory [default: current directory]
    #[arg(long, global = true)]
    app_dir: Option<PathBuf>,

    /// Shared drive directory holding the published release
    #[arg(long, global = true)]
    shared_dir: Option<PathBuf>,

    /// Directory holding backup snapshots
    #[arg(long, global = true)]
    backup_dir: Option<PathBuf>,

    /// ShipStatus Pro executable to relaunch after an update
    #[arg(long, global = true)]
    app_executable: Option<PathBuf>,

    /// Disable spinners
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the installed version with the published one
    Check(check::CheckCommand),

    /// Check, and update when a newer version is published
    Run(run::RunCommand),

    /// Apply the published release without comparing versions first
    Update(run::UpdateCommand),

    /// Restore a backup snapshot
    Rollback(rollback::RollbackCommand),

    /// List or prune backup snapshots
    Backups(backups::BackupsCommand),

    /// Show versions, drive access, permissions and backups
    Status(status::StatusCommand),

    /// Show or create the updater configuration
    Config(config::ConfigCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };

        CliConfig {
            log_level: log_level.to_string(),
            no_progress: self.no_progress,
            config_path: self.config.clone(),
            app_dir: self.app_dir.clone(),
            shared_dir: self.shared_dir.clone(),
            backup_dir: self.backup_dir.clone(),
            app_executable: self.app_executable.clone(),
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.apply_to_env();
        config.init_logging();

        match self.command {
            Commands::Check(cmd) => cmd.execute(&config).await,
            Commands::Run(cmd) => cmd.execute(&config).await,
            Commands::Update(cmd) => cmd.execute(&config).await,
            Commands::Rollback(cmd) => cmd.execute(&config).await,
            Commands::Backups(cmd) => cmd.execute(&config).await,
            Commands::Status(cmd) => cmd.execute(&config).await,
            Commands::Config(cmd) => cmd.execute(&config).await,
        }
    }
}
