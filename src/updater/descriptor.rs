//! The `version.json` document describing one release.

use crate::core::UpdaterError;
use crate::utils::fs::atomic_write;
use anyhow::{Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Release metadata stored next to the application and on the shared drive.
///
/// ```json
/// {
///   "version": "1.2.3",
///   "requiredUpdate": true,
///   "updateMessage": "New classification filters",
///   "changesUrl": "https://intranet/shipstatus/changes",
///   "releaseDate": "2024-05-02"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    pub version: String,

    #[serde(default)]
    pub required_update: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
}

impl VersionDescriptor {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            required_update: false,
            update_message: None,
            changes_url: None,
            release_date: None,
        }
    }

    /// Read a descriptor from disk.
    ///
    /// Returns `Ok(None)` when the file does not exist and an error when it exists
    /// but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read version file {}", path.display()))?;
        let descriptor = serde_json::from_str(&content).map_err(|e| {
            UpdaterError::DescriptorParseError {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Some(descriptor))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize version file")?;
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || atomic_write(&path, content.as_bytes()))
            .await
            .context("Failed to join version file write")?
    }

    pub fn parsed_version(&self) -> Result<Version> {
        parse_version(&self.version)
    }

    /// The release date, or today's UTC date when the publisher left it out.
    pub fn release_date_or_today(&self) -> String {
        self.release_date
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string())
    }
}

/// Parse a release version, tolerating a leading `v` or `=` and surrounding space.
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim().trim_start_matches(['v', '=']);
    Version::parse(trimmed).map_err(|e| {
        UpdaterError::InvalidVersion {
            version: raw.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}
