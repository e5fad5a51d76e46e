//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store's on-disk data is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A write was attempted through a read-only transaction.
    #[error("cannot {operation} in a read-only transaction")]
    ReadOnly {
        /// The rejected operation.
        operation: &'static str,
    },

    /// Another process holds the store's lock file.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// The store does not exist and was not allowed to be created.
    #[error("store not found at {0}")]
    NotFound(String),

    /// A key or value is too large for the on-disk record format.
    #[error("entry too large: {len} bytes exceeds maximum of {max} bytes")]
    EntryTooLarge {
        /// Size of the rejected entry.
        len: usize,
        /// Maximum size supported.
        max: usize,
    },
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
