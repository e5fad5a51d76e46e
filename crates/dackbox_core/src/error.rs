//! Error types for DackBox core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in DackBox core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] dackbox_storage::StorageError),

    /// Persisted data could not be decoded.
    #[error("decode error: {message}")]
    Decode {
        /// Description of the malformed input.
        message: String,
    },

    /// A key cannot be stored in an edge list.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Why the key was rejected.
        message: String,
    },

    /// The transaction was already committed or discarded.
    #[error("transaction is closed")]
    TransactionClosed,

    /// A write was attempted through a read-only transaction.
    #[error("cannot {operation} in a read-only transaction")]
    ReadOnly {
        /// The rejected operation.
        operation: &'static str,
    },

    /// A typed message could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dackbox_storage::StorageError;

    #[test]
    fn storage_errors_convert() {
        let err: CoreError = StorageError::Locked.into();
        assert!(matches!(err, CoreError::Storage(StorageError::Locked)));
    }

    #[test]
    fn messages_are_readable() {
        assert_eq!(
            CoreError::decode("truncated header").to_string(),
            "decode error: truncated header"
        );
        assert_eq!(
            CoreError::ReadOnly {
                operation: "mark_dirty"
            }
            .to_string(),
            "cannot mark_dirty in a read-only transaction"
        );
    }
}
