//! Shared-drive auto-updater for the ShipStatus Pro dashboard.
//!
//! Releases are published to a folder on a shared network drive: a
//! `version.json` descriptor, the `package.json` manifest, and the `src/` and
//! `public/` trees. On startup (or on demand) the updater compares the installed
//! descriptor with the published one and, when the shared drive has a newer
//! release, applies it:
//!
//! 1. Snapshot the mutable files into a timestamped backup
//! 2. Mirror the published trees into the application directory, handing off to
//!    an elevated helper script when the directory is not writable
//! 3. Re-run the dependency install when `package.json` dependencies changed
//! 4. Prune old backups and schedule an application restart
//!
//! Any failure while copying restores the snapshot.
//!
//! # Modules
//!
//! - [`updater`] - version check, backups, file sync, dependencies, orchestration
//! - [`config`] - `updater.toml` loading and defaults
//! - [`core`] - error types and user-facing error formatting
//! - [`utils`] - filesystem helpers and the terminal progress view
//! - [`cli`] - the `shipstatus-updater` command line
//!
//! # Example
//!
//! ```rust,no_run
//! use shipstatus_updater::config::UpdaterConfig;
//! use shipstatus_updater::updater::UpdateOrchestrator;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdaterConfig::load(None, std::path::Path::new("/opt/shipstatus")).await?;
//! let orchestrator = UpdateOrchestrator::builder(config).build()?;
//! let report = orchestrator.run().await;
//! println!("update available: {}", report.check.update_available);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod updater;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
