//! CLI error type.

use dackbox_core::CoreError;
use dackbox_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// No store path was given.
    #[error("store path required for {command} (use --path)")]
    MissingPath {
        /// The command that needed it.
        command: &'static str,
    },

    /// No store exists at the given path.
    #[error("no store found at {}", path.display())]
    NoStore {
        /// The path that was checked.
        path: PathBuf,
    },

    /// A key argument could not be parsed.
    #[error("invalid key {input:?}: {reason}")]
    InvalidKey {
        /// The raw argument.
        input: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Verification found problems.
    #[error("verification failed with {issues} issue(s)")]
    VerificationFailed {
        /// Number of problems found.
        issues: usize,
    },

    /// Engine error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Store error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// JSON output error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
