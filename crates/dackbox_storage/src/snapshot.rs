//! Snapshot-isolated transaction shared by the bundled stores.

use crate::error::{StorageError, StorageResult};
use crate::kv::{maybe_strip, KvTransaction};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// One immutable version of the store's contents.
pub(crate) type Version = Arc<BTreeMap<Vec<u8>, Vec<u8>>>;

/// Buffered writes: `Some` is a set, `None` a deletion.
pub(crate) type Batch = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Applies a committed batch to the newest version of a store.
pub(crate) trait Committer: Send + Sync {
    fn apply(&self, batch: Batch) -> StorageResult<()>;
}

/// Applies `batch` onto `map` in place.
pub(crate) fn apply_batch(map: &mut BTreeMap<Vec<u8>, Vec<u8>>, batch: Batch) {
    for (key, value) in batch {
        match value {
            Some(value) => {
                map.insert(key, value);
            }
            None => {
                map.remove(&key);
            }
        }
    }
}

/// Iterates the entries of `map` whose key starts with `prefix`.
pub(crate) fn prefix_range<'a, V>(
    map: &'a BTreeMap<Vec<u8>, V>,
    prefix: &'a [u8],
) -> impl Iterator<Item = (&'a Vec<u8>, &'a V)> + 'a {
    map.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(move |(k, _)| k.starts_with(prefix))
}

/// A transaction reading a pinned [`Version`] and buffering its writes.
pub(crate) struct SnapshotTransaction {
    snapshot: Version,
    pending: Batch,
    read_only: bool,
    committer: Arc<dyn Committer>,
}

impl SnapshotTransaction {
    pub(crate) fn new(snapshot: Version, read_only: bool, committer: Arc<dyn Committer>) -> Self {
        Self {
            snapshot,
            pending: Batch::new(),
            read_only,
            committer,
        }
    }

    fn ensure_writable(&self, operation: &'static str) -> StorageResult<()> {
        if self.read_only {
            Err(StorageError::ReadOnly { operation })
        } else {
            Ok(())
        }
    }

    /// Merges the snapshot and the pending writes under `prefix`.
    fn merged(&self, prefix: &[u8]) -> BTreeMap<Vec<u8>, Vec<u8>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = prefix_range(&self.snapshot, prefix)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in prefix_range(&self.pending, prefix) {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged
    }
}

impl KvTransaction for SnapshotTransaction {
    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        if let Some(pending) = self.pending.get(key) {
            return Ok(pending.clone());
        }
        Ok(self.snapshot.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.ensure_writable("set")?;
        self.pending.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StorageResult<()> {
        self.ensure_writable("delete")?;
        self.pending.insert(key.to_vec(), None);
        Ok(())
    }

    fn bucket_entries(
        &self,
        prefix: &[u8],
        strip_prefix: bool,
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        if self.pending.is_empty() {
            return Ok(prefix_range(&self.snapshot, prefix)
                .map(|(k, v)| (maybe_strip(k, prefix, strip_prefix), v.clone()))
                .collect());
        }
        Ok(self
            .merged(prefix)
            .into_iter()
            .map(|(k, v)| (maybe_strip(&k, prefix, strip_prefix), v))
            .collect())
    }

    fn bucket_keys(&self, prefix: &[u8], strip_prefix: bool) -> StorageResult<Vec<Vec<u8>>> {
        if self.pending.is_empty() {
            return Ok(prefix_range(&self.snapshot, prefix)
                .map(|(k, _)| maybe_strip(k, prefix, strip_prefix))
                .collect());
        }
        Ok(self
            .merged(prefix)
            .into_keys()
            .map(|k| maybe_strip(&k, prefix, strip_prefix))
            .collect())
    }

    fn bucket_key_count(&self, prefix: &[u8]) -> StorageResult<usize> {
        if self.pending.is_empty() {
            return Ok(prefix_range(&self.snapshot, prefix).count());
        }
        Ok(self.merged(prefix).len())
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        if self.read_only || self.pending.is_empty() {
            return Ok(());
        }
        let Self {
            pending, committer, ..
        } = *self;
        committer.apply(pending)
    }

    fn discard(self: Box<Self>) {}
}
