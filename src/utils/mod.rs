//! Cross-platform helpers shared by the updater and the CLI.
//!
//! - [`fs`]: tree copy, mirror, removal and digests
//! - [`progress`]: terminal progress rendering

pub mod fs;
pub mod progress;

pub use fs::{atomic_write, copy_dir, ensure_dir, mirror_dir, remove_path, tree_digest};
pub use progress::TerminalProgress;
