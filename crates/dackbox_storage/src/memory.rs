//! In-memory key/value store for testing.

use crate::error::StorageResult;
use crate::kv::{KvStore, KvTransaction};
use crate::snapshot::{apply_batch, Batch, Committer, SnapshotTransaction, Version};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An in-memory ordered key/value store.
///
/// This store keeps all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// Cloning the store returns another handle to the same data, which lets
/// tests "reopen" an engine over contents written by a previous instance.
///
/// # Example
///
/// ```rust
/// use dackbox_storage::{InMemoryStore, KvStore};
///
/// let store = InMemoryStore::new();
/// let mut txn = store.new_transaction().unwrap();
/// txn.set(b"key", b"value").unwrap();
/// txn.commit().unwrap();
///
/// let txn = store.new_read_only_transaction().unwrap();
/// assert_eq!(txn.get(b"key").unwrap(), Some(b"value".to_vec()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    current: RwLock<Version>,
}

impl Committer for MemoryInner {
    fn apply(&self, batch: Batch) -> StorageResult<()> {
        let mut current = self.current.write();
        apply_batch(Arc::make_mut(&mut *current), batch);
        Ok(())
    }
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with pre-existing entries.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>) -> Self {
        let map: BTreeMap<Vec<u8>, Vec<u8>> = entries.into_iter().collect();
        Self {
            inner: Arc::new(MemoryInner {
                current: RwLock::new(Arc::new(map)),
            }),
        }
    }

    /// Returns the number of keys currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.current.read().len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn begin(&self, read_only: bool) -> Box<dyn KvTransaction> {
        let snapshot: Version = self.inner.current.read().clone();
        let committer: Arc<dyn Committer> = self.inner.clone();
        Box::new(SnapshotTransaction::new(snapshot, read_only, committer))
    }
}

impl KvStore for InMemoryStore {
    fn new_transaction(&self) -> StorageResult<Box<dyn KvTransaction>> {
        Ok(self.begin(false))
    }

    fn new_read_only_transaction(&self) -> StorageResult<Box<dyn KvTransaction>> {
        Ok(self.begin(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    fn put(store: &InMemoryStore, key: &[u8], value: &[u8]) {
        let mut txn = store.new_transaction().unwrap();
        txn.set(key, value).unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        let txn = store.new_read_only_transaction().unwrap();
        assert_eq!(txn.get(b"missing").unwrap(), None);
    }

    #[test]
    fn memory_committed_write_is_visible() {
        let store = InMemoryStore::new();
        put(&store, b"a", b"1");

        let txn = store.new_read_only_transaction().unwrap();
        assert_eq!(txn.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn memory_discarded_write_is_invisible() {
        let store = InMemoryStore::new();
        let mut txn = store.new_transaction().unwrap();
        txn.set(b"a", b"1").unwrap();
        txn.discard();

        assert!(store.is_empty());
    }

    #[test]
    fn memory_transaction_sees_own_writes() {
        let store = InMemoryStore::new();
        put(&store, b"a", b"old");

        let mut txn = store.new_transaction().unwrap();
        txn.set(b"a", b"new").unwrap();
        txn.delete(b"b").unwrap();
        assert_eq!(txn.get(b"a").unwrap(), Some(b"new".to_vec()));
        assert_eq!(txn.get(b"b").unwrap(), None);
    }

    #[test]
    fn memory_snapshot_isolation() {
        let store = InMemoryStore::new();
        put(&store, b"a", b"1");

        let reader = store.new_read_only_transaction().unwrap();
        put(&store, b"a", b"2");
        put(&store, b"b", b"3");

        assert_eq!(reader.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(reader.get(b"b").unwrap(), None);

        let fresh = store.new_read_only_transaction().unwrap();
        assert_eq!(fresh.get(b"a").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn memory_read_only_rejects_writes() {
        let store = InMemoryStore::new();
        let mut txn = store.new_read_only_transaction().unwrap();
        assert!(txn.is_read_only());
        assert!(matches!(
            txn.set(b"a", b"1"),
            Err(StorageError::ReadOnly { operation: "set" })
        ));
        assert!(matches!(
            txn.delete(b"a"),
            Err(StorageError::ReadOnly { operation: "delete" })
        ));
    }

    #[test]
    fn memory_bucket_scan_is_ordered_and_stripped() {
        let store = InMemoryStore::with_entries(vec![
            (b"img\0b".to_vec(), b"2".to_vec()),
            (b"img\0a".to_vec(), b"1".to_vec()),
            (b"imh\0z".to_vec(), b"x".to_vec()),
            (b"cve\0a".to_vec(), b"y".to_vec()),
        ]);
        let txn = store.new_read_only_transaction().unwrap();

        let entries = txn.bucket_entries(b"img\0", true).unwrap();
        assert_eq!(
            entries,
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec())
            ]
        );

        let keys = txn.bucket_keys(b"img\0", false).unwrap();
        assert_eq!(keys, vec![b"img\0a".to_vec(), b"img\0b".to_vec()]);
        assert_eq!(txn.bucket_key_count(b"img\0").unwrap(), 2);
        assert_eq!(txn.bucket_key_count(b"nope").unwrap(), 0);
    }

    #[test]
    fn memory_bucket_scan_merges_pending_writes() {
        let store = InMemoryStore::with_entries(vec![
            (b"p:a".to_vec(), b"1".to_vec()),
            (b"p:b".to_vec(), b"2".to_vec()),
        ]);
        let mut txn = store.new_transaction().unwrap();
        txn.delete(b"p:a").unwrap();
        txn.set(b"p:c", b"3").unwrap();

        let keys = txn.bucket_keys(b"p:", true).unwrap();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(txn.bucket_key_count(b"p:").unwrap(), 2);
    }

    #[test]
    fn memory_last_committer_wins() {
        let store = InMemoryStore::new();
        let mut first = store.new_transaction().unwrap();
        let mut second = store.new_transaction().unwrap();
        first.set(b"k", b"first").unwrap();
        second.set(b"k", b"second").unwrap();
        second.commit().unwrap();
        first.commit().unwrap();

        let txn = store.new_read_only_transaction().unwrap();
        assert_eq!(txn.get(b"k").unwrap(), Some(b"first".to_vec()));
    }

    #[test]
    fn memory_clones_share_data() {
        let store = InMemoryStore::new();
        let other = store.clone();
        put(&store, b"shared", b"yes");
        assert_eq!(other.len(), 1);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn op() -> impl Strategy<Value = (Vec<u8>, Option<Vec<u8>>)> {
            (
                prop::collection::vec(0u8..4, 1..3),
                prop::option::of(prop::collection::vec(any::<u8>(), 0..4)),
            )
        }

        proptest! {
            #[test]
            fn committed_batches_match_model(
                batches in prop::collection::vec(prop::collection::vec(op(), 0..6), 0..6)
            ) {
                let store = InMemoryStore::new();
                let mut model = BTreeMap::new();
                for batch in batches {
                    let mut txn = store.new_transaction().unwrap();
                    for (key, value) in batch {
                        match value {
                            Some(value) => {
                                txn.set(&key, &value).unwrap();
                                model.insert(key, value);
                            }
                            None => {
                                txn.delete(&key).unwrap();
                                model.remove(&key);
                            }
                        }
                    }
                    txn.commit().unwrap();
                }

                let txn = store.new_read_only_transaction().unwrap();
                let entries = txn.bucket_entries(b"", false).unwrap();
                let expected: Vec<_> = model.into_iter().collect();
                prop_assert_eq!(entries, expected);
            }
        }
    }
}
