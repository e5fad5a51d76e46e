//! # DackBox Storage
//!
//! Ordered key/value store traits and backends for DackBox.
//!
//! This crate provides the lowest-level storage abstraction for DackBox.
//! Stores are **opaque byte stores** - they do not interpret the keys and
//! values they hold.
//!
//! ## Design Principles
//!
//! - Stores order keys by byte comparison and support prefix scans
//! - Transactions are snapshot-isolated and commit atomically
//! - No knowledge of graphs, buckets or messages
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral storage
//! - [`FileStore`] - For persistent storage in an append-only log
//!
//! ## Example
//!
//! ```rust
//! use dackbox_storage::{InMemoryStore, KvStore};
//!
//! let store = InMemoryStore::new();
//! let mut txn = store.new_transaction().unwrap();
//! txn.set(b"img\0a", b"hello").unwrap();
//! txn.commit().unwrap();
//!
//! let txn = store.new_read_only_transaction().unwrap();
//! let keys = txn.bucket_keys(b"img\0", true).unwrap();
//! assert_eq!(keys, vec![b"a".to_vec()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod kv;
mod memory;
mod record;
mod snapshot;

pub use error::{StorageError, StorageResult};
pub use file::{FileStore, FileStoreOptions, LOCK_FILE, LOG_FILE};
pub use kv::{KvStore, KvTransaction};
pub use memory::InMemoryStore;
pub use record::compute_crc32;
