//! Core types shared by every updater component.
//!
//! Currently this is the error module: [`UpdaterError`] for typed failures and
//! [`ErrorContext`] / [`user_friendly_error`] for presenting them in the CLI.

pub mod error;

pub use error::{ErrorContext, UpdaterError, user_friendly_error};
