//! Error handling for the ShipStatus updater
//!
//! The error system follows two rules:
//! 1. **Strongly-typed errors** ([`UpdaterError`]) for the failures callers need to
//!    tell apart, such as a cancelled elevation or an update that is already running
//! 2. **User-friendly messages** ([`ErrorContext`]) with suggestions for the CLI host
//!
//! Most internal functions return [`anyhow::Result`] and attach context as they
//! propagate. Where a specific failure matters to the caller, the root of the chain
//! is an [`UpdaterError`] that can be recovered with `downcast_ref`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use shipstatus_updater::core::{UpdaterError, user_friendly_error};
//!
//! let err = anyhow::Error::from(UpdaterError::ElevationCancelled);
//! let ctx = user_friendly_error(err);
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Every failure the updater distinguishes by type.
///
/// The `Display` strings of several variants are part of the observable contract:
/// they end up verbatim in `UpdateResult::error` and in `error` progress events.
#[derive(Error, Debug, Clone)]
pub enum UpdaterError {
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
    },

    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion {
        version: String,
        reason: String,
    },

    #[error("Invalid version descriptor in {path}: {reason}")]
    DescriptorParseError {
        path: String,
        reason: String,
    },

    #[error("Backup failed: {reason}")]
    BackupFailed {
        reason: String,
    },

    #[error("No backup found at {path}")]
    BackupNotFound {
        path: String,
    },

    #[error("Remote {name} folder not found")]
    RemoteFolderMissing {
        name: String,
    },

    /// Raised by `update_files` after the rollback attempt; `reason` carries the
    /// full cause chain of the copy failure.
    #[error("File update failed: {reason}")]
    SyncFailed {
        reason: String,
    },

    #[error("Update cancelled: Administrator privileges are required")]
    ElevationCancelled,

    #[error("Failed to prepare elevated update: {reason}")]
    ElevationFailed {
        reason: String,
    },

    #[error("Error running {command}: {reason}")]
    InstallLaunchFailed {
        command: String,
        reason: String,
    },

    #[error("{command} failed with code {code}: {stderr}")]
    InstallFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Update already in progress")]
    UpdateInProgress,

    #[error("Failed to restart application: {reason}")]
    RestartFailed {
        reason: String,
    },

    #[error("{message}")]
    Other {
        message: String,
    },
}

/// An [`UpdaterError`] decorated with a suggestion and details for terminal display.
#[derive(Debug)]
pub struct ErrorContext {
    pub error: UpdaterError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: UpdaterError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(updater_error) = error.downcast_ref::<UpdaterError>() {
        return create_error_context(updater_error.clone());
    }

    let permission_denied = error
        .downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::PermissionDenied);
    if permission_denied {
        return ErrorContext::new(UpdaterError::Other {
            message: format!("{error:#}"),
        })
        .with_suggestion(
            "Run the updater from an account that can write to the install directory, or let it request administrator privileges",
        );
    }

    ErrorContext::new(UpdaterError::Other {
        message: format_error_chain(&error),
    })
}

fn format_error_chain(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    message
}

fn create_error_context(error: UpdaterError) -> ErrorContext {
    match &error {
        UpdaterError::ConfigError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion(
                "Set shared_drive_path and app_executable in updater.toml, or pass --shared-dir and --app-executable",
            )
            .with_details("The updater looks for --config, then SHIPSTATUS_UPDATER_CONFIG, then <app>/updater.toml"),
        UpdaterError::InvalidVersion {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Use a major.minor.patch version such as \"1.2.3\" in version.json"),
        UpdaterError::RemoteFolderMissing {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check that the release was published completely to the shared drive"),
        UpdaterError::ElevationCancelled => ErrorContext::new(error)
            .with_details("The install directory is not writable by the current user"),
        UpdaterError::InstallLaunchFailed {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Make sure the install command from install_command is on PATH"),
        UpdaterError::BackupNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run `shipstatus-updater backups list` to see available snapshots"),
        UpdaterError::SyncFailed {
            ..
        } => ErrorContext::new(error)
            .with_details("The previous files were restored from the backup taken before the update"),
        _ => ErrorContext::new(error),
    }
}
