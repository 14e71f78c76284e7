//! End-to-end update sequence.
//!
//! ```text
//! check ──► no update ──► done
//!   │
//!   └─► backup ──► sync files ──► (not writable: elevated hand-off, process exits)
//!                       │
//!                       └─► dependencies ──► prune backups ──► complete ──► restart
//! ```
//!
//! [`UpdateOrchestrator`] owns one instance of every component. At most one
//! [`UpdateOrchestrator::perform_update`] runs at a time; a concurrent call returns
//! immediately with [`UpdaterError::UpdateInProgress`] as its error.

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{ElevationMode, UpdaterConfig};
use crate::core::UpdaterError;
use crate::updater::dependencies::DependencyManager;
use crate::updater::elevation::{ElevationChoice, ElevationPrompt, FixedChoice, TerminalPrompt};
use crate::updater::file_updater::{FileUpdater, SyncOutcome};
use crate::updater::process::{ProcessControl, SystemProcess};
use crate::updater::progress::{NoopListener, ProgressEvent, ProgressListener, ProgressStatus};
use crate::updater::version_check::{UpdateCheck, VersionChecker};

/// Terminal outcome of one `perform_update` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Control was handed to the elevated helper.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub handed_off: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub restart_scheduled: bool,
}

impl UpdateResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Result of [`UpdateOrchestrator::run`]: the check and, if one ran, the update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub check: UpdateCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateResult>,
}

/// Whether the host application should continue with its normal launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupDecision {
    pub proceed: bool,
    pub update_available: bool,
    pub is_required: bool,
}

impl StartupDecision {
    /// Proceed when no update is available, or when it is optional and skipping
    /// is allowed.
    pub fn from_check(check: &UpdateCheck, allow_skip: bool) -> Self {
        let update_available = check.update_available;
        let is_required = check.is_required();
        Self {
            proceed: !update_available || (!is_required && allow_skip),
            update_available,
            is_required,
        }
    }
}

/// Logs every event before forwarding it.
struct LoggingListener {
    inner: Arc<dyn ProgressListener>,
}

impl ProgressListener for LoggingListener {
    fn on_progress(&self, event: &ProgressEvent) {
        info!("Progress: {} - {}", event.status, event.message);
        self.inner.on_progress(event);
    }

    fn begin(&self) {
        self.inner.begin();
    }
}

/// Clears the in-progress flag when dropped.
struct UpdateGuard<'a>(&'a AtomicBool);

impl<'a> UpdateGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok().map(|_| Self(flag))
    }
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct UpdateOrchestratorBuilder {
    config: UpdaterConfig,
    listener: Option<Arc<dyn ProgressListener>>,
    process: Option<Arc<dyn ProcessControl>>,
    prompt: Option<Arc<dyn ElevationPrompt>>,
}

impl UpdateOrchestratorBuilder {
    pub fn listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn process(mut self, process: Arc<dyn ProcessControl>) -> Self {
        self.process = Some(process);
        self
    }

    pub fn prompt(mut self, prompt: Arc<dyn ElevationPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Fails with a configuration error when no shared drive is configured.
    pub fn build(self) -> Result<UpdateOrchestrator> {
        let config = self.config;
        let app_path = config.app_path()?;
        let shared_drive_path = config.shared_drive_path()?;

        let inner: Arc<dyn ProgressListener> = match self.listener {
            Some(listener) => listener,
            None => Arc::new(NoopListener),
        };
        let listener: Arc<dyn ProgressListener> = Arc::new(LoggingListener {
            inner,
        });
        let process: Arc<dyn ProcessControl> = match self.process {
            Some(process) => process,
            None => Arc::new(SystemProcess),
        };
        let prompt: Arc<dyn ElevationPrompt> = match (self.prompt, config.elevation) {
            (Some(prompt), _) => prompt,
            (None, ElevationMode::Prompt) => Arc::new(TerminalPrompt),
            (None, ElevationMode::Always) => Arc::new(FixedChoice(ElevationChoice::Proceed)),
            (None, ElevationMode::Never) => Arc::new(FixedChoice(ElevationChoice::Cancel)),
        };

        let checker = VersionChecker::new(&app_path, &shared_drive_path, &config.version_file);
        let files =
            FileUpdater::from_config(&config, listener.clone(), process.clone(), prompt)?;
        let dependencies = DependencyManager::new(
            app_path.clone(),
            config.install_command.clone(),
            listener.clone(),
        );

        Ok(UpdateOrchestrator {
            app_path,
            app_executable: config.app_executable.as_ref().map(|_| config.app_executable()).transpose()?,
            config,
            checker,
            files,
            dependencies,
            listener,
            process,
            in_progress: AtomicBool::new(false),
            restart: Mutex::new(None),
        })
    }
}

pub struct UpdateOrchestrator {
    config: UpdaterConfig,
    app_path: PathBuf,
    app_executable: Option<PathBuf>,
    checker: VersionChecker,
    files: FileUpdater,
    dependencies: DependencyManager,
    listener: Arc<dyn ProgressListener>,
    process: Arc<dyn ProcessControl>,
    in_progress: AtomicBool,
    restart: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateOrchestrator {
    pub fn builder(config: UpdaterConfig) -> UpdateOrchestratorBuilder {
        UpdateOrchestratorBuilder {
            config,
            listener: None,
            process: None,
            prompt: None,
        }
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn checker(&self) -> &VersionChecker {
        &self.checker
    }

    pub fn file_updater(&self) -> &FileUpdater {
        &self.files
    }

    pub fn dependency_manager(&self) -> &DependencyManager {
        &self.dependencies
    }

    pub fn is_update_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    fn emit(&self, status: ProgressStatus, message: impl Into<String>) {
        self.listener.on_progress(&ProgressEvent::new(status, message));
    }

    /// Compare versions without touching any files. Errors are folded into the
    /// result.
    pub async fn check_only(&self) -> UpdateCheck {
        info!("Checking for updates...");
        match self.checker.check_for_updates().await {
            Ok(check) => check,
            Err(e) => {
                error!("Error checking for updates: {:#}", e);
                UpdateCheck::unavailable(format!("{e:#}"))
            }
        }
    }

    /// Check and, when a newer version is published, update right away.
    pub async fn run(&self) -> RunReport {
        let check = self.check_only().await;

        let update = if check.update_available {
            info!(
                "Update available: {} -> {}",
                check.current_version().unwrap_or_default(),
                check.new_version().unwrap_or_default()
            );
            info!("Starting silent update in the background");
            Some(self.perform_update().await)
        } else {
            info!("No updates available");
            None
        };

        RunReport {
            check,
            update,
        }
    }

    /// Same as [`run`](Self::run), returning only the check.
    pub async fn check_for_updates(&self) -> UpdateCheck {
        self.run().await.check
    }

    /// Startup gate for the host application.
    pub async fn startup(&self) -> StartupDecision {
        if !self.config.check_on_startup {
            debug!("Update check on startup disabled");
            return StartupDecision::from_check(
                &UpdateCheck::unavailable("Update check disabled"),
                self.config.allow_skip,
            );
        }
        let check = self.check_for_updates().await;
        self.proceed_to_launch(&check)
    }

    pub fn proceed_to_launch(&self, check: &UpdateCheck) -> StartupDecision {
        StartupDecision::from_check(check, self.config.allow_skip)
    }

    /// Apply the published version.
    ///
    /// Never returns an error: failures are reported as an `error` event and in
    /// the returned [`UpdateResult`].
    pub async fn perform_update(&self) -> UpdateResult {
        let Some(_guard) = UpdateGuard::acquire(&self.in_progress) else {
            info!("Update already in progress");
            return UpdateResult::failure(UpdaterError::UpdateInProgress.to_string());
        };

        match self.apply_update().await {
            Ok(SyncOutcome::Applied) => UpdateResult {
                success: true,
                restart_scheduled: true,
                ..UpdateResult::default()
            },
            Ok(SyncOutcome::HandedOff) => UpdateResult {
                success: true,
                handed_off: true,
                ..UpdateResult::default()
            },
            Err(e) => {
                let message = format!("{e:#}");
                error!("Update failed: {}", message);
                self.emit(ProgressStatus::Error, format!("Update failed: {message}"));
                UpdateResult::failure(message)
            }
        }
    }

    async fn apply_update(&self) -> Result<SyncOutcome> {
        let executable = self.require_executable()?;
        let writable = self.files.has_write_permissions().await;
        if !self.config.silent && writable {
            self.listener.begin();
        }

        info!("Starting update process");
        self.emit(ProgressStatus::Start, "Starting update process...");

        let backup_dir = self.files.backup_current_files().await?;

        if self.files.update_files(&backup_dir).await? == SyncOutcome::HandedOff {
            return Ok(SyncOutcome::HandedOff);
        }

        let manifest = &self.config.dependency_manifest;
        let old_manifest = backup_dir.join(manifest);
        let new_manifest = self.app_path.join(manifest);
        if self.dependencies.dependencies_need_update(&old_manifest, &new_manifest).await {
            self.dependencies.install_dependencies().await?;
        } else {
            info!("No dependency changes detected");
            self.emit(ProgressStatus::Dependencies, "No dependency changes detected");
        }

        self.files.cleanup_old_backups(self.config.keep_backups).await;

        info!("Update completed successfully");
        self.emit(ProgressStatus::Complete, "Update completed successfully!");

        info!("Restarting app to apply updates...");
        self.spawn_restart(executable, self.config.restart_delay());
        Ok(SyncOutcome::Applied)
    }

    fn require_executable(&self) -> Result<PathBuf> {
        self.app_executable.clone().ok_or_else(|| {
            UpdaterError::ConfigError {
                message: "app_executable is not set".to_string(),
            }
            .into()
        })
    }

    /// Relaunch the application, then end this process.
    pub fn restart_app(&self) -> Result<()> {
        let executable = self.require_executable()?;
        restart(self.process.as_ref(), &executable)
    }

    /// Restart after `delay` on a background task.
    pub fn schedule_restart(&self, delay: Duration) -> Result<()> {
        let executable = self.require_executable()?;
        self.spawn_restart(executable, delay);
        Ok(())
    }

    fn spawn_restart(&self, executable: PathBuf, delay: Duration) {
        let process = Arc::clone(&self.process);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = restart(process.as_ref(), &executable) {
                error!("{:#}", e);
            }
        });

        match self.restart.lock() {
            Ok(mut slot) => {
                if let Some(previous) = slot.replace(handle) {
                    previous.abort();
                }
            }
            Err(_) => warn!("Restart handle lock poisoned, restart will not be awaited"),
        }
    }

    /// Drop a pending restart. Returns whether one was pending.
    pub fn cancel_restart(&self) -> bool {
        let handle = match self.restart.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        match handle {
            Some(handle) => {
                handle.abort();
                info!("Scheduled restart cancelled");
                true
            }
            None => false,
        }
    }

    /// Wait for a scheduled restart to fire. Returns immediately when none is pending.
    pub async fn wait_for_restart(&self) {
        let handle = match self.restart.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Restart task ended abnormally: {}", e);
            }
        }
    }
}

fn restart(process: &dyn ProcessControl, executable: &std::path::Path) -> Result<()> {
    info!("Restarting application...");
    process.relaunch(executable).map_err(|e| UpdaterError::RestartFailed {
        reason: format!("{e:#}"),
    })?;
    process.terminate(0);
    Ok(())
}
