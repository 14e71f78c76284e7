//! Backup snapshots of the install directory.
//!
//! Each snapshot is a `backup-<timestamp>` directory under the backups root with a
//! `snapshot.json` recording the app version and which entries existed. Restoring
//! uses that record to delete trees that were absent when the snapshot was taken.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::core::UpdaterError;
use crate::utils::fs::{atomic_write, remove_path_async};

/// Prefix shared by every snapshot directory; other entries in the backups root
/// are ignored.
pub const BACKUP_PREFIX: &str = "backup-";

/// Metadata file written inside each snapshot.
pub const SNAPSHOT_METADATA: &str = "snapshot.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Dir,
    File,
}

/// One tracked path of the application directory at backup time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Whether the path existed when the snapshot was taken. Absent entries are
    /// removed again on rollback.
    pub present: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default)]
    pub entries: Vec<SnapshotEntry>,
}

impl SnapshotMetadata {
    pub fn new(app_version: Option<String>) -> Self {
        Self {
            created_at: Utc::now(),
            app_version,
            entries: Vec::new(),
        }
    }

    pub fn entry(&self, name: &str) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Read the metadata of a snapshot; `None` for snapshots without one.
    pub async fn load(snapshot_dir: &Path) -> Result<Option<Self>> {
        let path = snapshot_dir.join(SNAPSHOT_METADATA);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read snapshot metadata {}", path.display()));
            }
        };
        let metadata = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot metadata {}", path.display()))?;
        Ok(Some(metadata))
    }

    pub async fn save(&self, snapshot_dir: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize snapshot metadata")?;
        let path = snapshot_dir.join(SNAPSHOT_METADATA);
        tokio::task::spawn_blocking(move || atomic_write(&path, content.as_bytes()))
            .await
            .context("Failed to join snapshot metadata write")?
    }
}

/// A snapshot directory found under the backups root.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub name: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub app_version: Option<String>,
}

/// Owns the backups root: allocates snapshot directories, lists them newest first
/// and prunes old ones.
#[derive(Debug, Clone)]
pub struct BackupStore {
    root: PathBuf,
}

impl BackupStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, uniquely named snapshot directory.
    ///
    /// The name is `backup-<UTC timestamp>` with `:` and `.` replaced by `-`; when
    /// two snapshots land in the same millisecond a numeric suffix is appended.
    pub async fn allocate(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create backups root {}", self.root.display()))?;

        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string();
        let mut candidate = self.root.join(format!("{BACKUP_PREFIX}{stamp}"));
        let mut attempt = 0u32;
        loop {
            match fs::create_dir(&candidate).await {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                    candidate = self.root.join(format!("{BACKUP_PREFIX}{stamp}-{attempt}"));
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to create backup directory {}", candidate.display())
                    });
                }
            }
        }
    }

    /// All snapshots, newest first.
    pub async fn list(&self) -> Result<Vec<BackupSnapshot>> {
        let mut snapshots = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(snapshots),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read backups root {}", self.root.display())
                });
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(BACKUP_PREFIX) || !entry.file_type().await?.is_dir() {
                continue;
            }
            snapshots.push(describe(entry.path(), name).await);
        }

        snapshots.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then_with(|| b.name.cmp(&a.name))
        });
        Ok(snapshots)
    }

    pub async fn latest(&self) -> Result<Option<BackupSnapshot>> {
        Ok(self.list().await?.into_iter().next())
    }

    pub async fn find(&self, name: &str) -> Result<BackupSnapshot> {
        self.list().await?.into_iter().find(|s| s.name == name).ok_or_else(|| {
            UpdaterError::BackupNotFound {
                path: self.root.join(name).display().to_string(),
            }
            .into()
        })
    }

    /// Delete every snapshot beyond the `keep` most recent ones.
    ///
    /// Never fails: listing and deletion errors are logged. Returns the removed paths.
    pub async fn prune(&self, keep: usize) -> Vec<PathBuf> {
        let snapshots = match self.list().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!("Error cleaning up old backups: {:#}", e);
                return Vec::new();
            }
        };

        let mut removed = Vec::new();
        for snapshot in snapshots.into_iter().skip(keep) {
            info!("Removing old backup: {}", snapshot.name);
            match remove_path_async(&snapshot.path).await {
                Ok(()) => removed.push(snapshot.path),
                Err(e) => warn!("Failed to remove backup {}: {:#}", snapshot.name, e),
            }
        }
        removed
    }
}

async fn describe(path: PathBuf, name: String) -> BackupSnapshot {
    let metadata = match SnapshotMetadata::load(&path).await {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!("Ignoring unreadable snapshot metadata in {}: {:#}", path.display(), e);
            None
        }
    };

    let (created_at, app_version) = match metadata {
        Some(m) => (m.created_at, m.app_version),
        None => (filesystem_time(&path).await, None),
    };

    BackupSnapshot {
        name,
        path,
        created_at,
        app_version,
    }
}

/// Creation time when the platform records it, modification time otherwise.
async fn filesystem_time(path: &Path) -> DateTime<Utc> {
    let time = match fs::metadata(path).await {
        Ok(meta) => meta.created().or_else(|_| meta.modified()).unwrap_or(SystemTime::UNIX_EPOCH),
        Err(_) => SystemTime::UNIX_EPOCH,
    };
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn snapshot_at(store: &BackupStore, name: &str, offset_minutes: i64) -> PathBuf {
        let path = store.root().join(name);
        fs::create_dir_all(&path).await.unwrap();
        let mut metadata = SnapshotMetadata::new(Some("1.0.0".to_string()));
        metadata.created_at = Utc::now() - Duration::minutes(offset_minutes);
        metadata.save(&path).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_allocate_unique_names() {
        let temp = TempDir::new().unwrap();
        let store = BackupStore::new(temp.path().join("backups"));

        let first = store.allocate().await.unwrap();
        let second = store.allocate().await.unwrap();
        assert_ne!(first, second);
        assert!(first.is_dir() && second.is_dir());

        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(BACKUP_PREFIX));
        assert!(!name.contains(':') && !name.contains('.'));
    }

    #[tokio::test]
    async fn test_list_newest_first_ignores_foreign_entries() {
        let temp = TempDir::new().unwrap();
        let store = BackupStore::new(temp.path().to_path_buf());
        snapshot_at(&store, "backup-old", 30).await;
        snapshot_at(&store, "backup-new", 1).await;
        snapshot_at(&store, "backup-mid", 10).await;
        fs::create_dir_all(temp.path().join("not-a-backup")).await.unwrap();
        fs::write(temp.path().join("backup-file"), "x").await.unwrap();

        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["backup-new", "backup-mid", "backup-old"]);
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = BackupStore::new(temp.path().join("nope"));
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.prune(5).await.is_empty());
    }

    #[tokio::test]
    async fn test_prune_keeps_most_recent_and_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = BackupStore::new(temp.path().to_path_buf());
        for i in 0..8 {
            snapshot_at(&store, &format!("backup-{i}"), 100 - i).await;
        }

        let removed = store.prune(5).await;
        assert_eq!(removed.len(), 3);
        let after_first: Vec<String> =
            store.list().await.unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(after_first, vec!["backup-7", "backup-6", "backup-5", "backup-4", "backup-3"]);

        assert!(store.prune(5).await.is_empty());
        let after_second: Vec<String> =
            store.list().await.unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_find_unknown_snapshot() {
        let temp = TempDir::new().unwrap();
        let store = BackupStore::new(temp.path().to_path_buf());
        let err = store.find("backup-missing").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UpdaterError>(),
            Some(UpdaterError::BackupNotFound { .. })
        ));
    }
}
