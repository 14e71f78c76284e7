//! Integration test suite for the ShipStatus updater
//!
//! End-to-end tests against temporary install and shared-drive directories.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **version_check**: descriptor comparison against real files
//! - **file_sync**: backup, mirror copy, rollback and pruning
//! - **dependencies**: manifest diff and the install command
//! - **orchestrator**: the check / update / elevation scenarios
//! - **cli**: the `shipstatus-updater` binary

mod cli;
mod dependencies;
mod file_sync;
mod orchestrator;
mod version_check;
