//! Show or create the `updater.toml` of an installation.
//!
//! ```bash
//! shipstatus-updater config              # same as `config show`
//! shipstatus-updater config path
//! shipstatus-updater config init --shared-drive //fileserver/releases/shipstatus \
//!     --app-executable "C:/Program Files/ShipStatus Pro/ShipStatus Pro.exe"
//! ```

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use crate::cli::CliConfig;
use crate::config::{CONFIG_ENV_VAR, CONFIG_FILE_NAME, UpdaterConfig};

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

#[derive(Subcommand, Debug)]
enum ConfigSubcommands {
    /// Print the effective configuration as TOML (default)
    Show,

    /// Print the config file location in use
    Path,

    /// Write an `updater.toml` with the defaults into the application directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Value for `shared_drive_path`
        #[arg(long)]
        shared_drive: Option<PathBuf>,
    },
}

impl ConfigCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        match self.command.unwrap_or(ConfigSubcommands::Show) {
            ConfigSubcommands::Show => {
                let config = cli.load_updater_config().await?;
                println!("{}", format!("# {}", config_path(cli)?.display()).dimmed());
                print!("{}", config.to_toml()?);
            }
            ConfigSubcommands::Path => {
                let path = config_path(cli)?;
                if path.exists() {
                    println!("{}", path.display());
                } else {
                    println!("{} {}", path.display(), "(not created, defaults in use)".dimmed());
                }
            }
            ConfigSubcommands::Init {
                force,
                shared_drive,
            } => {
                let path = config_path(cli)?;
                if path.exists() && !force {
                    println!(
                        "❌ Configuration already exists at {}\n   Use --force to overwrite",
                        path.display()
                    );
                    return Ok(());
                }

                let mut config = UpdaterConfig::new();
                config.shared_drive_path = shared_drive.or_else(|| cli.shared_dir.clone());
                config.backup_dir = cli.backup_dir.clone();
                config.app_executable = cli.app_executable.clone();
                config.save_to(&path).await?;
                println!("{} Wrote {}", "✅".green(), path.display());
            }
        }
        Ok(())
    }
}

/// The file `UpdaterConfig::load` would read.
fn config_path(cli: &CliConfig) -> Result<PathBuf> {
    if let Some(path) = &cli.config_path {
        return Ok(path.clone());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    let app_dir = match &cli.app_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    Ok(app_dir.join(CONFIG_FILE_NAME))
}
