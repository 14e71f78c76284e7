//! Configuration management for the ShipStatus updater
//!
//! One TOML file describes an installation: where the application lives, which
//! shared-drive folder releases are published to, which trees get mirrored, and
//! how the updater behaves around elevation, dependency installs and restarts.
//!
//! # Lookup Order
//!
//! 1. `--config <path>` on the command line
//! 2. `SHIPSTATUS_UPDATER_CONFIG` environment variable
//! 3. `updater.toml` in the application directory
//! 4. Built-in defaults
//!
//! Paths may use `~` and `$VAR` / `${VAR}`; they are expanded when resolved.
//!
//! ```toml
//! shared_drive_path = "//fileserver/releases/shipstatus"
//! backup_dir = "~/.local/share/shipstatus-pro/backups"
//! keep_backups = 5
//! mirrored_dirs = ["src", "public"]
//! install_command = ["npm", "install"]
//! ```

pub mod updater;

pub use updater::{CONFIG_ENV_VAR, CONFIG_FILE_NAME, ElevationMode, UpdaterConfig};
