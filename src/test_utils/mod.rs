//! Test utilities for the updater
//!
//! - [`UpdateFixture`]: a temporary install directory, shared drive, backups root
//!   and scripts directory, plus helpers to populate them
//! - [`RecordingProcess`]: a [`ProcessControl`](crate::updater::ProcessControl)
//!   that records launches, relaunches and exits instead of performing them
//! - [`EventLog`]: a progress listener that keeps every event
//!
//! # Example
//!
//! ```rust,no_run
//! use shipstatus_updater::test_utils::UpdateFixture;
//!
//! let fixture = UpdateFixture::new();
//! fixture.set_local_version("1.0.0");
//! fixture.set_remote_version("1.1.0", false);
//! fixture.write_shared("src/app.js", "v2");
//! let config = fixture.config();
//! ```

pub mod doubles;
pub mod fixtures;

pub use doubles::{EventLog, RecordingProcess};
pub use fixtures::UpdateFixture;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=shipstatus_updater=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
