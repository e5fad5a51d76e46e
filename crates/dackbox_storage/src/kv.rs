//! Ordered key/value store traits.

use crate::error::StorageResult;

/// A factory for key/value transactions over one ordered byte store.
///
/// Stores are **opaque byte stores**. They order keys by lexicographic byte
/// comparison and know nothing about buckets, graphs or messages layered on
/// top of them.
///
/// # Invariants
///
/// - A transaction reads the version of the store that was current when it
///   was opened, overlaid with its own uncommitted writes
/// - `commit` applies all buffered writes atomically or not at all
/// - Concurrent commits are applied in commit order; the last writer of a key
///   wins, there is no conflict detection
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing and ephemeral stores
/// - [`super::FileStore`] - Append-only log on disk
pub trait KvStore: Send + Sync {
    /// Opens a read-write transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unable to start a transaction.
    fn new_transaction(&self) -> StorageResult<Box<dyn KvTransaction>>;

    /// Opens a read-only transaction.
    ///
    /// Writes through the returned transaction fail with
    /// [`crate::StorageError::ReadOnly`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unable to start a transaction.
    fn new_read_only_transaction(&self) -> StorageResult<Box<dyn KvTransaction>>;
}

/// A single snapshot-isolated transaction over a [`KvStore`].
pub trait KvTransaction: Send {
    /// Returns true if writes are rejected.
    fn is_read_only(&self) -> bool;

    /// Reads the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Buffers a write of `value` under `key`.
    fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Buffers a deletion of `key`. Deleting an absent key is not an error.
    fn delete(&mut self, key: &[u8]) -> StorageResult<()>;

    /// Returns every entry whose key starts with `prefix`, in key order.
    ///
    /// When `strip_prefix` is set the returned keys have `prefix` removed.
    fn bucket_entries(
        &self,
        prefix: &[u8],
        strip_prefix: bool,
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Returns every key starting with `prefix`, in key order.
    fn bucket_keys(&self, prefix: &[u8], strip_prefix: bool) -> StorageResult<Vec<Vec<u8>>>;

    /// Counts the keys starting with `prefix`.
    fn bucket_key_count(&self, prefix: &[u8]) -> StorageResult<usize>;

    /// Applies all buffered writes atomically.
    ///
    /// Committing a read-only transaction only releases its snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the writes could not be made durable. In that case
    /// none of them are visible to later transactions.
    fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Drops all buffered writes.
    fn discard(self: Box<Self>);
}

/// Strips `prefix` from `key` when requested.
pub(crate) fn maybe_strip(key: &[u8], prefix: &[u8], strip_prefix: bool) -> Vec<u8> {
    if strip_prefix {
        key[prefix.len()..].to_vec()
    } else {
        key.to_vec()
    }
}
