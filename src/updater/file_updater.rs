//! Backup, mirror-copy and rollback of the application's mutable files.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::config::{ElevationMode, UpdaterConfig};
use crate::core::UpdaterError;
use crate::updater::backup::{BackupSnapshot, BackupStore, EntryKind, SnapshotEntry, SnapshotMetadata};
use crate::updater::descriptor::VersionDescriptor;
use crate::updater::elevation::{
    ElevationChoice, ElevationPrompt, ElevationRequest, ElevationScripts, ScriptContext,
    ScriptFlavor,
};
use crate::updater::process::ProcessControl;
use crate::updater::progress::{ProgressEvent, ProgressListener, ProgressStatus};
use crate::utils::fs::{copy_dir_async, mirror_dir_async, remove_path_async, tree_digest_async};

/// Sentinel written to test write access to the application directory.
pub const WRITE_TEST_FILE: &str = ".write-test";

/// How `update_files` finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Files were copied in-process.
    Applied,
    /// The elevated helper was launched and the process asked to terminate.
    HandedOff,
}

pub struct FileUpdater {
    app_path: PathBuf,
    shared_drive_path: Option<PathBuf>,
    store: BackupStore,
    scripts_dir: PathBuf,
    mirrored_dirs: Vec<String>,
    required_dirs: Vec<String>,
    dependency_manifest: String,
    version_file: String,
    app_name: String,
    app_executable: Option<PathBuf>,
    elevation: ElevationMode,
    handoff_delay: Duration,
    restart_delay: Duration,
    listener: Arc<dyn ProgressListener>,
    process: Arc<dyn ProcessControl>,
    prompt: Arc<dyn ElevationPrompt>,
}

impl FileUpdater {
    /// Build from configuration. A missing `shared_drive_path` is only an error
    /// once files are actually pulled from it.
    pub fn from_config(
        config: &UpdaterConfig,
        listener: Arc<dyn ProgressListener>,
        process: Arc<dyn ProcessControl>,
        prompt: Arc<dyn ElevationPrompt>,
    ) -> Result<Self> {
        let shared_drive_path = match config.shared_drive_path {
            Some(_) => Some(config.shared_drive_path()?),
            None => None,
        };

        Ok(Self {
            app_path: config.app_path()?,
            shared_drive_path,
            store: BackupStore::new(config.backup_dir()?),
            scripts_dir: config.scripts_dir()?,
            mirrored_dirs: config.mirrored_dirs.clone(),
            required_dirs: config.required_dirs.clone(),
            dependency_manifest: config.dependency_manifest.clone(),
            version_file: config.version_file.clone(),
            app_name: config.app_name.clone(),
            app_executable: config.app_executable.as_ref().map(|_| config.app_executable()).transpose()?,
            elevation: config.elevation,
            handoff_delay: config.handoff_delay(),
            restart_delay: config.restart_delay(),
            listener,
            process,
            prompt,
        })
    }

    pub fn app_path(&self) -> &Path {
        &self.app_path
    }

    pub fn backup_store(&self) -> &BackupStore {
        &self.store
    }

    /// Manifest files copied after the trees, dependency manifest first.
    fn manifest_files(&self) -> [&str; 2] {
        [self.dependency_manifest.as_str(), self.version_file.as_str()]
    }

    fn shared_drive_path(&self) -> Result<&Path> {
        self.shared_drive_path.as_deref().ok_or_else(|| {
            UpdaterError::ConfigError {
                message: "shared_drive_path is not set".to_string(),
            }
            .into()
        })
    }

    fn emit(&self, status: ProgressStatus, message: impl Into<String>) {
        self.listener.on_progress(&ProgressEvent::new(status, message));
    }

    /// Snapshot the current trees and manifests into a new backup directory.
    ///
    /// Sources that do not exist are recorded as absent and skipped. A failed
    /// backup leaves nothing behind.
    pub async fn backup_current_files(&self) -> Result<PathBuf> {
        let backup_dir = self.store.allocate().await.map_err(|e| UpdaterError::BackupFailed {
            reason: format!("{e:#}"),
        })?;

        info!("Creating backup at: {}", backup_dir.display());
        self.emit(ProgressStatus::Backup, "Creating backup of current files...");

        match self.write_snapshot(&backup_dir).await {
            Ok(()) => {
                info!("Backup completed successfully");
                Ok(backup_dir)
            }
            Err(e) => {
                error!("Backup failed: {:#}", e);
                if let Err(cleanup) = remove_path_async(&backup_dir).await {
                    warn!("Failed to remove partial backup {}: {:#}", backup_dir.display(), cleanup);
                }
                Err(UpdaterError::BackupFailed {
                    reason: format!("{e:#}"),
                }
                .into())
            }
        }
    }

    async fn write_snapshot(&self, backup_dir: &Path) -> Result<()> {
        let local_version = VersionDescriptor::load(&self.app_path.join(&self.version_file))
            .await
            .ok()
            .flatten()
            .map(|d| d.version);
        let mut metadata = SnapshotMetadata::new(local_version);

        for dir in &self.mirrored_dirs {
            let source = self.app_path.join(dir);
            let entry = if source.is_dir() {
                self.emit(ProgressStatus::Backup, format!("Backing up {dir} folder..."));
                let target = backup_dir.join(dir);
                copy_dir_async(&source, &target).await?;
                snapshot_entry(dir, EntryKind::Dir, Some(tree_digest_async(&target).await?))
            } else {
                snapshot_entry(dir, EntryKind::Dir, None)
            };
            metadata.entries.push(entry);
        }

        for file in self.manifest_files() {
            let source = self.app_path.join(file);
            let entry = if source.is_file() {
                let target = backup_dir.join(file);
                fs::copy(&source, &target).await.with_context(|| {
                    format!("Failed to copy {} to {}", source.display(), target.display())
                })?;
                snapshot_entry(file, EntryKind::File, Some(tree_digest_async(&target).await?))
            } else {
                snapshot_entry(file, EntryKind::File, None)
            };
            metadata.entries.push(entry);
        }

        metadata.save(backup_dir).await
    }

    /// Test write access by creating and deleting a sentinel file. Never errors.
    pub async fn has_write_permissions(&self) -> bool {
        debug!("Checking write permissions for {}", self.app_path.display());
        let sentinel = self.app_path.join(WRITE_TEST_FILE);
        let result = async {
            fs::write(&sentinel, "test").await?;
            fs::remove_file(&sentinel).await
        }
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                info!("No write permissions to app directory: {}", e);
                false
            }
        }
    }

    /// Replace local files with the published ones.
    ///
    /// Without write access this goes through the elevated path, which either
    /// hands off to the helper or fails with [`UpdaterError::ElevationCancelled`].
    /// A failed in-process copy is rolled back from `backup_dir` before the
    /// [`UpdaterError::SyncFailed`] error is returned.
    pub async fn update_files(&self, backup_dir: &Path) -> Result<SyncOutcome> {
        info!("Starting file update process");

        if !self.has_write_permissions().await {
            return self.elevated_update().await;
        }

        match self.apply_remote_files().await {
            Ok(()) => {
                info!("File update completed successfully");
                Ok(SyncOutcome::Applied)
            }
            Err(e) => {
                error!("File update failed: {:#}", e);
                self.rollback(backup_dir).await;
                Err(UpdaterError::SyncFailed {
                    reason: format!("{e:#}"),
                }
                .into())
            }
        }
    }

    async fn apply_remote_files(&self) -> Result<()> {
        let shared = self.shared_drive_path()?;

        for dir in &self.mirrored_dirs {
            let remote = shared.join(dir);
            if remote.is_dir() {
                self.emit(ProgressStatus::Update, format!("Updating {dir} folder..."));
                mirror_dir_async(&remote, &self.app_path.join(dir)).await?;
            } else if self.required_dirs.contains(dir) {
                warn!("Remote {} folder not found", dir);
                return Err(UpdaterError::RemoteFolderMissing {
                    name: dir.clone(),
                }
                .into());
            } else {
                debug!("Remote {} folder not present, skipping", dir);
            }
        }

        for file in self.manifest_files() {
            let remote = shared.join(file);
            if !remote.is_file() {
                continue;
            }
            let message = if file == self.version_file {
                "Updating version information...".to_string()
            } else {
                format!("Updating {file}...")
            };
            self.emit(ProgressStatus::Update, message);

            let local = self.app_path.join(file);
            fs::copy(&remote, &local).await.with_context(|| {
                format!("Failed to copy {} to {}", remote.display(), local.display())
            })?;
        }

        Ok(())
    }

    async fn elevated_update(&self) -> Result<SyncOutcome> {
        info!("Showing elevated update prompt");

        if self.elevation == ElevationMode::Never {
            info!("Elevation is disabled by configuration");
            return Err(UpdaterError::ElevationCancelled.into());
        }

        let shared = self.shared_drive_path()?.to_path_buf();
        let app_executable = self.app_executable.clone().ok_or_else(|| UpdaterError::ConfigError {
            message: "app_executable is not set".to_string(),
        })?;
        let current_version = self.descriptor_version(&self.app_path).await;
        let new_version = self.descriptor_version(&shared).await;

        let context = ScriptContext {
            app_name: self.app_name.clone(),
            current_version: current_version.clone(),
            new_version: new_version.clone(),
            source_path: shared,
            dest_path: self.app_path.clone(),
            mirrored_dirs: self.mirrored_dirs.clone(),
            required_dirs: self.required_dirs.clone(),
            manifest_files: self.manifest_files().iter().map(|f| f.to_string()).collect(),
            app_executable,
            restart_delay_secs: self.restart_delay.as_secs().max(1),
            helper_path: PathBuf::new(),
        };
        let scripts_dir = self.scripts_dir.clone();
        let scripts = tokio::task::spawn_blocking(move || {
            ElevationScripts::write(&scripts_dir, ScriptFlavor::native(), &context)
        })
        .await
        .context("Failed to join script generation task")?
        .map_err(|e| UpdaterError::ElevationFailed {
            reason: format!("{e:#}"),
        })?;

        let request = ElevationRequest {
            app_name: self.app_name.clone(),
            current_version,
            new_version,
            launcher: scripts.launcher.clone(),
        };

        let choice = match self.elevation {
            ElevationMode::Always => ElevationChoice::Proceed,
            _ => {
                let prompt = Arc::clone(&self.prompt);
                tokio::task::spawn_blocking(move || prompt.confirm(&request))
                    .await
                    .context("Failed to join elevation prompt")?
            }
        };

        if choice == ElevationChoice::Cancel {
            info!("Update cancelled by user");
            return Err(UpdaterError::ElevationCancelled.into());
        }

        self.emit(
            ProgressStatus::Elevated,
            "Update will be performed with administrator privileges.",
        );
        self.process.launch_detached(&scripts.launcher)?;
        tokio::time::sleep(self.handoff_delay).await;
        self.process.terminate(0);
        Ok(SyncOutcome::HandedOff)
    }

    async fn descriptor_version(&self, root: &Path) -> String {
        match VersionDescriptor::load(&root.join(&self.version_file)).await {
            Ok(Some(descriptor)) => descriptor.version,
            Ok(None) => "unknown".to_string(),
            Err(e) => {
                warn!("Error reading version information: {:#}", e);
                "unknown".to_string()
            }
        }
    }

    /// Restore from `backup_dir`, reporting instead of raising on failure.
    pub async fn rollback(&self, backup_dir: &Path) -> bool {
        info!("Rolling back to backup: {}", backup_dir.display());
        self.emit(ProgressStatus::Rollback, "Update failed. Rolling back to previous version...");

        match self.restore(backup_dir).await {
            Ok(()) => {
                info!("Rollback completed successfully");
                true
            }
            Err(e) => {
                error!("Rollback failed: {:#}", e);
                self.emit(
                    ProgressStatus::Error,
                    "Critical error: Rollback failed. Application may be in an inconsistent state.",
                );
                false
            }
        }
    }

    /// Copy every captured tree and manifest from `backup_dir` back into place.
    ///
    /// Paths the snapshot recorded as absent are removed so the application
    /// directory matches the backed-up state exactly.
    pub async fn restore(&self, backup_dir: &Path) -> Result<()> {
        if !backup_dir.is_dir() {
            return Err(UpdaterError::BackupNotFound {
                path: backup_dir.display().to_string(),
            }
            .into());
        }

        let metadata = SnapshotMetadata::load(backup_dir).await?;
        let names = self
            .mirrored_dirs
            .iter()
            .map(|d| (d.as_str(), EntryKind::Dir))
            .chain(self.manifest_files().into_iter().map(|f| (f, EntryKind::File)));

        for (name, kind) in names {
            let saved = backup_dir.join(name);
            let local = self.app_path.join(name);
            let entry = metadata.as_ref().and_then(|m| m.entry(name));

            if saved.exists() {
                match kind {
                    EntryKind::Dir => mirror_dir_async(&saved, &local).await?,
                    EntryKind::File => {
                        fs::copy(&saved, &local).await.with_context(|| {
                            format!("Failed to restore {}", local.display())
                        })?;
                    }
                }
                if let Some(expected) = entry.and_then(|e| e.digest.as_deref()) {
                    let actual = tree_digest_async(&local).await?;
                    if actual != expected {
                        warn!("Restored {} does not match its backup digest", name);
                    }
                }
            } else if entry.is_some_and(|e| !e.present) {
                debug!("Removing {} which did not exist at backup time", name);
                remove_path_async(&local).await?;
            }
        }

        Ok(())
    }

    /// Keep the `keep_count` most recent snapshots. Never errors.
    pub async fn cleanup_old_backups(&self, keep_count: usize) -> Vec<PathBuf> {
        self.store.prune(keep_count).await
    }

    pub async fn list_backups(&self) -> Result<Vec<BackupSnapshot>> {
        self.store.list().await
    }

    pub async fn latest_backup(&self) -> Result<Option<BackupSnapshot>> {
        self.store.latest().await
    }
}

fn snapshot_entry(name: &str, kind: EntryKind, digest: Option<String>) -> SnapshotEntry {
    SnapshotEntry {
        name: name.to_string(),
        kind,
        present: digest.is_some(),
        digest,
    }
}
