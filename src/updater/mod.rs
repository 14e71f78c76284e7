//! Self-update for the ShipStatus Pro dashboard.
//!
//! Releases are published to a shared drive as a plain directory: the
//! application's mutable trees (`src`, `public`), its `package.json` and a
//! `version.json` descriptor. This module pulls a newer release into the local
//! installation with a backup taken first and a rollback on failure.
//!
//! # Architecture Overview
//!
//! - **[`VersionChecker`]**: compares the local and remote `version.json` by semver
//! - **[`FileUpdater`]**: snapshots, mirror-copies and rolls back files; detects a
//!   read-only install directory and hands off to an elevated helper script
//! - **[`DependencyManager`]**: diffs `package.json` and runs the install command
//! - **[`UpdateOrchestrator`]**: drives the sequence and reports [`ProgressEvent`]s
//!
//! ## Update Process Flow
//!
//! ```text
//! 1. Version Check
//!    ├── Check the shared drive is reachable
//!    └── Compare local and remote descriptors
//!
//! 2. Backup
//!    └── Copy src/public/manifests into backups/backup-<timestamp>/
//!
//! 3. File Sync
//!    ├── Writable: mirror remote trees over local ones, copy manifests
//!    ├── Not writable: generate launcher + helper scripts, ask, hand off, exit
//!    └── Copy failure: restore the backup, report the cause
//!
//! 4. Post-Update
//!    ├── Install dependencies when package.json gained or changed entries
//!    ├── Prune old backups
//!    └── Restart the application
//! ```
//!
//! # Progress
//!
//! Every step is reported to a [`ProgressListener`] as `{status, message}`. The
//! orchestrator also logs each event at info level.

/// Snapshot directories and retention.
pub mod backup;
/// `package.json` diff and the install subprocess.
pub mod dependencies;
/// The `version.json` release descriptor.
pub mod descriptor;
/// Elevation prompt and generated launcher/helper scripts.
pub mod elevation;
/// Backup, mirror copy and rollback of application files.
pub mod file_updater;
/// Update sequence, re-entrancy guard and restart scheduling.
pub mod orchestrator;
/// Hand-off and restart as explicit terminal actions.
pub mod process;
/// Progress events and listeners.
pub mod progress;
/// Local vs remote version comparison.
pub mod version_check;


pub use backup::{BackupSnapshot, BackupStore};
pub use dependencies::DependencyManager;
pub use descriptor::VersionDescriptor;
pub use elevation::{ElevationChoice, ElevationPrompt, FixedChoice, TerminalPrompt};
pub use file_updater::{FileUpdater, SyncOutcome};
pub use orchestrator::{RunReport, StartupDecision, UpdateOrchestrator, UpdateResult};
pub use process::{ProcessControl, SystemProcess};
pub use progress::{NoopListener, ProgressEvent, ProgressListener, ProgressStatus};
pub use version_check::{UpdateCheck, VersionChecker};
