//! Forward-edge rows in the key/value store.
//!
//! Only forward edges are persisted: one row per `from` key, stored in the
//! graph bucket (`prefix | 0x00 | from`), holding the encoded
//! [`SortedKeys`] of its targets. Backward edges are rebuilt when the rows
//! are loaded.

use crate::bucket::BucketHandler;
use crate::error::CoreResult;
use crate::graph::{Graph, ModifiedGraph, RWGraph};
use crate::sortedkeys::SortedKeys;
use dackbox_storage::KvTransaction;

/// Writes and loads graph rows in one bucket.
#[derive(Debug, Clone)]
pub struct Persistor {
    bucket: BucketHandler,
}

impl Persistor {
    /// Creates a persistor for rows in the bucket named `prefix`.
    #[must_use]
    pub fn new(prefix: impl AsRef<[u8]>) -> Self {
        Self {
            bucket: BucketHandler::new(prefix),
        }
    }

    /// Returns the row key prefix, separator included.
    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        self.bucket.prefix()
    }

    /// Returns the row key for `from`.
    #[must_use]
    pub fn row_key(&self, from: &[u8]) -> Vec<u8> {
        self.bucket.get_key(from)
    }

    /// Writes the row of every forward key `diff` touched.
    ///
    /// A key with a (possibly empty) forward entry is written; a key whose
    /// entry was removed has its row deleted. Returns the number of rows
    /// written or deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if a row cannot be encoded or written.
    pub fn persist(&self, diff: &ModifiedGraph, txn: &mut dyn KvTransaction) -> CoreResult<usize> {
        let graph = diff.graph();
        let mut rows = 0;
        for from in diff.changes().modified_from().iter() {
            let key = self.row_key(from);
            match graph.refs_from(from) {
                Some(tos) => txn.set(&key, &tos.marshal()?)?,
                None => txn.delete(&key)?,
            }
            rows += 1;
        }
        Ok(rows)
    }

    /// Rebuilds a graph from every row under the prefix.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Decode`] if a row is malformed, or a
    /// storage error if the scan fails.
    pub fn load(&self, txn: &dyn KvTransaction) -> CoreResult<Graph> {
        let mut graph = Graph::new();
        for (from, value) in txn.bucket_entries(self.bucket.prefix(), true)? {
            let tos = SortedKeys::unmarshal(&value)?;
            graph.set_refs(&from, tos.into_vec());
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::graph::testutil::{keys, refs};
    use crate::graph::RGraph;
    use dackbox_storage::{InMemoryStore, KvStore};

    #[test]
    fn persist_then_load_rebuilds_backward_edges() {
        let store = InMemoryStore::new();
        let persistor = Persistor::new("graph");

        let mut diff = ModifiedGraph::new();
        diff.set_refs(b"a", refs(&["x", "y"]));
        diff.set_refs(b"b", Vec::new());
        let mut txn = store.new_transaction().unwrap();
        assert_eq!(persistor.persist(&diff, txn.as_mut()).unwrap(), 2);
        txn.commit().unwrap();

        let txn = store.new_read_only_transaction().unwrap();
        assert_eq!(txn.get(b"graph\0b").unwrap(), Some(vec![0, 0]));
        let graph = persistor.load(txn.as_ref()).unwrap();
        assert_eq!(graph.get_refs_to(b"y"), keys(&["a"]));
        assert!(graph.has_refs_from(b"b"));
        assert_eq!(graph.count_refs_from(b"b"), 0);
    }

    #[test]
    fn removed_entries_delete_rows() {
        let store = InMemoryStore::with_entries(vec![(b"graph\0x".to_vec(), vec![0, 1, b'a'])]);
        let persistor = Persistor::new("graph");

        let mut base = Graph::new();
        base.set_refs(b"x", refs(&["a"]));
        let mut diff = ModifiedGraph::from_graph(base);
        diff.delete_refs_from(b"x");

        let mut txn = store.new_transaction().unwrap();
        persistor.persist(&diff, txn.as_mut()).unwrap();
        txn.commit().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn malformed_row_fails_load() {
        let store = InMemoryStore::with_entries(vec![(b"graph\0x".to_vec(), vec![0, 9, b'a'])]);
        let txn = store.new_read_only_transaction().unwrap();
        assert!(matches!(
            Persistor::new("graph").load(txn.as_ref()),
            Err(CoreError::Decode { .. })
        ));
    }

    #[test]
    fn buckets_sharing_the_prefix_are_not_rows() {
        let store = InMemoryStore::with_entries(vec![
            (b"graphics\0g1".to_vec(), b"not a row".to_vec()),
            (b"graph\0a".to_vec(), vec![0, 1, b'x']),
        ]);
        let txn = store.new_read_only_transaction().unwrap();
        let graph = Persistor::new("graph").load(txn.as_ref()).unwrap();
        assert_eq!(graph.from_count(), 1);
        assert_eq!(graph.get_refs_to(b"x"), keys(&["a"]));
    }
}
