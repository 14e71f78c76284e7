//! `updater.toml`: where the install, the shared drive and the backups live, and
//! how updates are applied.
//!
//! See [`UpdaterConfig::load`] for the lookup order.

use crate::core::UpdaterError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Environment variable that points at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "SHIPSTATUS_UPDATER_CONFIG";

/// File name looked up in the application directory when no explicit config is given.
pub const CONFIG_FILE_NAME: &str = "updater.toml";

const DATA_DIR_NAME: &str = "shipstatus-pro";

/// How the updater reacts when the install directory is not writable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ElevationMode {
    /// Ask the user on the terminal.
    #[default]
    Prompt,
    /// Hand off to the elevated helper without asking.
    Always,
    /// Treat a missing permission as a cancelled update.
    Never,
}

/// Configuration for one updater installation.
///
/// Every field has a default except `shared_drive_path`, which has no sensible
/// value and must be provided before any check or update runs.
///
/// ## TOML Example
/// ```toml
/// shared_drive_path = "//fileserver/releases/shipstatus"
/// keep_backups = 5
/// install_command = ["npm", "install"]
/// elevation = "prompt"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Root of the installed application. Filled from `--app-dir` or the
    /// working directory when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_path: Option<PathBuf>,

    /// Location the release process publishes new versions to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_drive_path: Option<PathBuf>,

    /// Where backup snapshots are stored. Defaults to `<data dir>/shipstatus-pro/backups`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,

    /// User-writable directory for generated elevation scripts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts_dir: Option<PathBuf>,

    #[serde(default = "default_keep_backups")]
    pub keep_backups: usize,

    /// Trees that are mirror-copied from the shared drive.
    #[serde(default = "default_mirrored_dirs")]
    pub mirrored_dirs: Vec<String>,

    /// Subset of `mirrored_dirs` that must exist on the shared drive.
    #[serde(default = "default_required_dirs")]
    pub required_dirs: Vec<String>,

    #[serde(default = "default_version_file")]
    pub version_file: String,

    #[serde(default = "default_dependency_manifest")]
    pub dependency_manifest: String,

    /// Program and arguments run in the app directory when dependencies changed.
    #[serde(default = "default_install_command")]
    pub install_command: Vec<String>,

    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,

    /// Pause between the `elevated` progress event and process termination.
    #[serde(default = "default_handoff_delay_ms")]
    pub handoff_delay_ms: u64,

    /// When true no progress view is opened during the update.
    #[serde(default = "default_silent")]
    pub silent: bool,

    #[serde(default)]
    pub allow_skip: bool,

    #[serde(default = "default_check_on_startup")]
    pub check_on_startup: bool,

    #[serde(default)]
    pub elevation: ElevationMode,

    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// The ShipStatus Pro executable relaunched after an update. Required before
    /// an update can run; there is no default since the updater binary itself is
    /// never the right target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_executable: Option<PathBuf>,
}

const fn default_keep_backups() -> usize {
    5
}

fn default_mirrored_dirs() -> Vec<String> {
    vec!["src".to_string(), "public".to_string()]
}

fn default_required_dirs() -> Vec<String> {
    vec!["src".to_string()]
}

fn default_version_file() -> String {
    "version.json".to_string()
}

fn default_dependency_manifest() -> String {
    "package.json".to_string()
}

fn default_install_command() -> Vec<String> {
    vec!["npm".to_string(), "install".to_string()]
}

const fn default_restart_delay_ms() -> u64 {
    2000
}

const fn default_handoff_delay_ms() -> u64 {
    3000
}

const fn default_silent() -> bool {
    true
}

const fn default_check_on_startup() -> bool {
    true
}

fn default_app_name() -> String {
    "ShipStatus Pro".to_string()
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            app_path: None,
            shared_drive_path: None,
            backup_dir: None,
            scripts_dir: None,
            keep_backups: default_keep_backups(),
            mirrored_dirs: default_mirrored_dirs(),
            required_dirs: default_required_dirs(),
            version_file: default_version_file(),
            dependency_manifest: default_dependency_manifest(),
            install_command: default_install_command(),
            restart_delay_ms: default_restart_delay_ms(),
            handoff_delay_ms: default_handoff_delay_ms(),
            silent: default_silent(),
            allow_skip: false,
            check_on_startup: default_check_on_startup(),
            elevation: ElevationMode::default(),
            app_name: default_app_name(),
            app_executable: None,
        }
    }
}

impl UpdaterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the effective configuration.
    ///
    /// Lookup order: `explicit`, then [`CONFIG_ENV_VAR`], then
    /// `<app_dir>/updater.toml`, otherwise defaults. `app_path` is filled from
    /// `app_dir` when the file leaves it unset.
    pub async fn load(explicit: Option<&Path>, app_dir: &Path) -> Result<Self> {
        let candidate = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from),
        };

        let mut config = match candidate {
            Some(path) => Self::load_from(&path).await?,
            None => {
                let local = app_dir.join(CONFIG_FILE_NAME);
                if local.exists() {
                    Self::load_from(&local).await?
                } else {
                    debug!("No updater config found, using defaults");
                    Self::default()
                }
            }
        };

        if config.app_path.is_none() {
            config.app_path = Some(app_dir.to_path_buf());
        }
        Ok(config)
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read updater config from {}", path.display()))?;

        debug!("Loaded updater config from {}", path.display());
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse updater config from {}", path.display()))
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = self.to_toml()?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write updater config to {}", path.display()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize updater config")
    }

    pub fn app_path(&self) -> Result<PathBuf> {
        match &self.app_path {
            Some(path) => expand_path(path),
            None => Err(UpdaterError::ConfigError {
                message: "app_path is not set".to_string(),
            }
            .into()),
        }
    }

    pub fn shared_drive_path(&self) -> Result<PathBuf> {
        match &self.shared_drive_path {
            Some(path) => expand_path(path),
            None => Err(UpdaterError::ConfigError {
                message: "shared_drive_path is not set".to_string(),
            }
            .into()),
        }
    }

    pub fn backup_dir(&self) -> Result<PathBuf> {
        match &self.backup_dir {
            Some(path) => expand_path(path),
            None => Ok(data_dir()?.join("backups")),
        }
    }

    pub fn scripts_dir(&self) -> Result<PathBuf> {
        match &self.scripts_dir {
            Some(path) => expand_path(path),
            None => data_dir(),
        }
    }

    pub fn app_executable(&self) -> Result<PathBuf> {
        match &self.app_executable {
            Some(path) => expand_path(path),
            None => Err(UpdaterError::ConfigError {
                message: "app_executable is not set".to_string(),
            }
            .into()),
        }
    }

    pub const fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub const fn handoff_delay(&self) -> Duration {
        Duration::from_millis(self.handoff_delay_ms)
    }
}

fn data_dir() -> Result<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(DATA_DIR_NAME)).ok_or_else(|| {
        UpdaterError::ConfigError {
            message: "Unable to determine local data directory".to_string(),
        }
        .into()
    })
}

/// Expand `~` and environment variables in a configured path.
fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw).map_err(|e| UpdaterError::ConfigError {
        message: format!("Cannot expand path '{raw}': {e}"),
    })?;
    Ok(PathBuf::from(expanded.as_ref()))
}
