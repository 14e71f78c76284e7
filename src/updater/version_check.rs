//! Compare the installed `version.json` with the one published on the shared drive.
//!
//! A missing or unreadable descriptor on either side is not an error: the check
//! reports "no update" with a reason, so a disconnected drive never blocks launch.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::updater::descriptor::VersionDescriptor;

pub const NO_LOCAL_VERSION: &str = "No local version found";
pub const NO_REMOTE_VERSION: &str = "No remote version found or shared drive not accessible";

/// Details of the remote release, relative to what is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    pub current_version: String,
    pub new_version: String,
    pub is_required: bool,
    pub update_message: String,
    pub changes_url: String,
    pub release_date: String,
}

/// Outcome of comparing the local and remote descriptors.
///
/// Serializes to the flat shape the dashboard host consumes:
/// `{"updateAvailable": true, "currentVersion": "1.0.0", "newVersion": "1.1.0", ...}`
/// or `{"updateAvailable": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheck {
    pub update_available: bool,
    #[serde(flatten)]
    pub release: Option<ReleaseInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateCheck {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            update_available: false,
            release: None,
            error: Some(reason.into()),
        }
    }

    pub fn is_required(&self) -> bool {
        self.release.as_ref().is_some_and(|r| r.is_required)
    }

    pub fn current_version(&self) -> Option<&str> {
        self.release.as_ref().map(|r| r.current_version.as_str())
    }

    pub fn new_version(&self) -> Option<&str> {
        self.release.as_ref().map(|r| r.new_version.as_str())
    }
}

/// Compares the installed `version.json` with the one on the shared drive.
pub struct VersionChecker {
    shared_drive_path: PathBuf,
    local_version_path: PathBuf,
    remote_version_path: PathBuf,
}

impl VersionChecker {
    pub fn new(app_path: &Path, shared_drive_path: &Path, version_file: &str) -> Self {
        Self {
            shared_drive_path: shared_drive_path.to_path_buf(),
            local_version_path: app_path.join(version_file),
            remote_version_path: shared_drive_path.join(version_file),
        }
    }

    /// Check the shared drive is reachable before reading from it.
    pub async fn is_shared_drive_accessible(&self) -> bool {
        debug!("Checking if shared drive path exists: {}", self.shared_drive_path.display());
        match fs::metadata(&self.shared_drive_path).await {
            Ok(_) => {
                debug!("Shared drive is accessible");
                match list_entries(&self.shared_drive_path).await {
                    Ok(names) => debug!("Files in shared drive path: {}", names.join(", ")),
                    Err(e) => debug!("Could not list files in shared drive: {}", e),
                }
                true
            }
            Err(e) => {
                warn!("Shared drive not accessible: {}", e);
                false
            }
        }
    }

    /// The installed descriptor, or `None` when it is missing or unreadable.
    pub async fn get_local_version(&self) -> Option<VersionDescriptor> {
        match VersionDescriptor::load(&self.local_version_path).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("Error reading local version: {:#}", e);
                None
            }
        }
    }

    /// The published descriptor, or `None` when the drive or file is unavailable.
    pub async fn get_remote_version(&self) -> Option<VersionDescriptor> {
        if !self.is_shared_drive_accessible().await {
            info!("Shared drive is not accessible, cannot check for remote version");
            return None;
        }

        debug!("Reading remote version file at: {}", self.remote_version_path.display());
        match VersionDescriptor::load(&self.remote_version_path).await {
            Ok(Some(descriptor)) => {
                debug!("Remote version data: {:?}", descriptor);
                Some(descriptor)
            }
            Ok(None) => {
                info!("Remote version file not found at: {}", self.remote_version_path.display());
                None
            }
            Err(e) => {
                warn!("Error reading remote version: {:#}", e);
                None
            }
        }
    }

    /// Compare both descriptors.
    ///
    /// Missing descriptors produce an [`UpdateCheck::unavailable`] result; an
    /// unparseable version string is an error.
    pub async fn check_for_updates(&self) -> Result<UpdateCheck> {
        let local = self.get_local_version().await;
        let remote = self.get_remote_version().await;

        let Some(local) = local else {
            info!("{}", NO_LOCAL_VERSION);
            return Ok(UpdateCheck::unavailable(NO_LOCAL_VERSION));
        };
        let Some(remote) = remote else {
            info!("No remote version found");
            return Ok(UpdateCheck::unavailable(NO_REMOTE_VERSION));
        };

        Self::compare(&local, &remote)
    }

    /// Decide availability from two descriptors using semver precedence.
    pub fn compare(local: &VersionDescriptor, remote: &VersionDescriptor) -> Result<UpdateCheck> {
        let local_version = local.parsed_version()?;
        let remote_version = remote.parsed_version()?;
        let update_available = remote_version > local_version;

        debug!(
            "Local version {} vs remote version {}: update available = {}",
            local_version, remote_version, update_available
        );

        Ok(UpdateCheck {
            update_available,
            release: Some(ReleaseInfo {
                current_version: local.version.clone(),
                new_version: remote.version.clone(),
                is_required: remote.required_update,
                update_message: remote.update_message.clone().unwrap_or_default(),
                changes_url: remote.changes_url.clone().unwrap_or_default(),
                release_date: remote.release_date_or_today(),
            }),
            error: None,
        })
    }

    pub fn format_version_info(current: &str, latest: Option<&str>) -> String {
        match latest {
            Some(v) if v != current => {
                format!("Current version: {}\nLatest version:  {} (update available)", current, v)
            }
            _ => format!("Current version: {} (up to date)", current),
        }
    }
}

async fn list_entries(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}
