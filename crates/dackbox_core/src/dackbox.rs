//! Engine entry point.

use crate::config::Config;
use crate::error::CoreResult;
use crate::graph::{Graph, ModifiedGraph, RGraph, RemoteGraph, RemoteReadable};
use crate::history::History;
use crate::persistor::Persistor;
use crate::queue::IndexQueue;
use crate::transaction::Transaction;
use crate::view::GraphView;
use dackbox_storage::{KvStore, KvTransaction};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// State shared by a [`DackBox`] and every transaction it opened.
pub(crate) struct Shared {
    /// The top-level lock. Opening a transaction takes it shared; commit and
    /// release take it exclusively.
    pub(crate) history: RwLock<History>,
    pub(crate) store: Arc<dyn KvStore>,
    pub(crate) persistor: Persistor,
    pub(crate) config: Config,
    pub(crate) to_index: Option<Arc<dyn IndexQueue>>,
}

impl Shared {
    /// Builds the callback reading the history view pinned at `ts`.
    pub(crate) fn remote_view(self: &Arc<Self>, ts: u64) -> RemoteReadable {
        let shared = Arc::clone(self);
        Arc::new(move |reader: &mut dyn FnMut(&dyn RGraph)| {
            let history = shared.history.read();
            reader(&history.view(ts));
        })
    }

    /// Releases a hold taken by a transaction or view.
    pub(crate) fn release(&self, ts: u64) {
        self.history.write().release(ts);
    }
}

/// A graph-indexed key/value engine.
///
/// DackBox layers a versioned reference graph over an ordered key/value
/// store. Every transaction pairs a store transaction with a graph overlay
/// pinned at one history time-step. Commits persist the changed forward
/// edges next to the transaction's own writes and then make the graph
/// change visible to transactions opened afterwards.
///
/// Handles are cheap to clone and share one engine.
///
/// # Example
///
/// ```rust
/// use dackbox_core::{Config, DackBox, RGraph};
/// use dackbox_storage::InMemoryStore;
/// use std::sync::Arc;
///
/// let dackbox = DackBox::open(Arc::new(InMemoryStore::new()), None, Config::default()).unwrap();
///
/// let mut txn = dackbox.new_transaction().unwrap();
/// txn.set(b"img\0a", b"payload").unwrap();
/// txn.graph_mut().set_refs(b"img\0a", vec![b"cmp\0x".to_vec()]);
/// txn.commit().unwrap();
///
/// let view = dackbox.new_graph_view();
/// assert_eq!(view.count_refs_to(b"cmp\0x"), 1);
/// ```
#[derive(Clone)]
pub struct DackBox {
    shared: Arc<Shared>,
}

impl DackBox {
    /// Opens an engine over `store` and loads the persisted graph.
    ///
    /// Committed dirty keys are pushed to `to_index` when one is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph rows cannot be read or decoded.
    pub fn open(
        store: Arc<dyn KvStore>,
        to_index: Option<Arc<dyn IndexQueue>>,
        config: Config,
    ) -> CoreResult<Self> {
        let persistor = Persistor::new(&config.graph_prefix);
        let master = load_graph_into_mem(&persistor, store.as_ref())?;
        info!(
            from_keys = master.from_count(),
            edges = master.edge_count(),
            "loaded graph into memory"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                history: RwLock::new(History::new(master)),
                store,
                persistor,
                config,
                to_index,
            }),
        })
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Opens a read-write transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot start a transaction.
    pub fn new_transaction(&self) -> CoreResult<Transaction> {
        let ts = self.shared.history.read().hold();
        let kv = self.open_kv(ts, false)?;
        let graph = RemoteGraph::new(ModifiedGraph::new(), self.shared.remote_view(ts));
        debug!(ts, "opened read-write transaction");
        Ok(Transaction::read_write(Arc::clone(&self.shared), ts, kv, graph))
    }

    /// Opens a read-only transaction.
    ///
    /// Graph mutations through the returned transaction stay local and are
    /// dropped at commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot start a transaction.
    pub fn new_read_only_transaction(&self) -> CoreResult<Transaction> {
        let ts = self.shared.history.read().hold();
        let kv = self.open_kv(ts, true)?;
        let graph = RemoteGraph::new(Graph::new(), self.shared.remote_view(ts));
        debug!(ts, "opened read-only transaction");
        Ok(Transaction::read_only(Arc::clone(&self.shared), ts, kv, graph))
    }

    /// Opens a read-only view of the graph without a store transaction.
    ///
    /// The view pins a time-step until it is discarded or dropped.
    #[must_use]
    pub fn new_graph_view(&self) -> GraphView {
        let ts = self.shared.history.read().hold();
        GraphView::new(Arc::clone(&self.shared), ts)
    }

    /// Lists keys marked dirty by committed transactions and not yet
    /// acknowledged by the indexer.
    ///
    /// # Errors
    ///
    /// Returns an error if the dirty bucket cannot be scanned.
    pub fn keys_to_index(&self) -> CoreResult<Vec<Vec<u8>>> {
        let txn = self.shared.store.new_read_only_transaction()?;
        let keys = txn.bucket_keys(self.shared.config.dirty_bucket().prefix(), true)?;
        txn.discard();
        if !keys.is_empty() {
            info!(count = keys.len(), "found keys pending indexing");
        }
        Ok(keys)
    }

    /// Removes the dirty markers of `keys` once they have been indexed.
    ///
    /// # Errors
    ///
    /// Returns an error if the markers cannot be deleted.
    pub fn ack_indexed<K: AsRef<[u8]>>(&self, keys: &[K]) -> CoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut txn = self.shared.store.new_transaction()?;
        for key in keys {
            txn.delete(&self.shared.config.dirty_key(key.as_ref()))?;
        }
        txn.commit()?;
        debug!(count = keys.len(), "acknowledged indexed keys");
        Ok(())
    }

    /// Returns the current history time-step.
    #[must_use]
    pub fn current_step(&self) -> u64 {
        self.shared.history.read().current_step()
    }

    /// Returns the number of distinct time-steps pinned by open transactions
    /// and views.
    #[must_use]
    pub fn held_steps(&self) -> usize {
        self.shared.history.read().held()
    }

    /// Returns the number of committed modifications not yet folded.
    #[must_use]
    pub fn pending_modifications(&self) -> usize {
        self.shared.history.read().pending()
    }

    fn open_kv(&self, ts: u64, read_only: bool) -> CoreResult<Box<dyn KvTransaction>> {
        let opened = if read_only {
            self.shared.store.new_read_only_transaction()
        } else {
            self.shared.store.new_transaction()
        };
        opened.map_err(|err| {
            self.shared.release(ts);
            err.into()
        })
    }
}

impl fmt::Debug for DackBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let history = self.shared.history.read();
        f.debug_struct("DackBox")
            .field("config", &self.shared.config)
            .field("step", &history.current_step())
            .field("pending", &history.pending())
            .field("held", &history.held())
            .finish_non_exhaustive()
    }
}

/// Rebuilds the master graph from the persisted forward-edge rows.
fn load_graph_into_mem(persistor: &Persistor, store: &dyn KvStore) -> CoreResult<Graph> {
    let txn = store.new_read_only_transaction()?;
    let graph = persistor.load(txn.as_ref());
    txn.discard();
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::graph::RWGraph;
    use crate::queue::WaitableQueue;
    use dackbox_storage::{InMemoryStore, StorageError, StorageResult};

    fn open(store: &InMemoryStore) -> DackBox {
        DackBox::open(Arc::new(store.clone()), None, Config::default()).unwrap()
    }

    fn to_vecs(list: &[&str]) -> Vec<Vec<u8>> {
        list.iter().map(|k| k.as_bytes().to_vec()).collect()
    }

    #[test]
    fn commit_persists_forward_rows() {
        let store = InMemoryStore::new();
        let dackbox = open(&store);

        let mut txn = dackbox.new_transaction().unwrap();
        txn.graph_mut().set_refs(b"a", to_vecs(&["x", "y"]));
        txn.commit().unwrap();

        let kv = store.new_read_only_transaction().unwrap();
        assert_eq!(
            kv.get(b"graph\0a").unwrap(),
            Some(vec![0, 1, b'x', 0, 1, b'y'])
        );
        assert_eq!(kv.bucket_key_count(b"graph\0").unwrap(), 1);
    }

    #[test]
    fn reopen_loads_graph() {
        let store = InMemoryStore::new();
        {
            let dackbox = open(&store);
            let mut txn = dackbox.new_transaction().unwrap();
            txn.graph_mut().set_refs(b"a", to_vecs(&["x"]));
            txn.graph_mut().set_refs(b"empty", Vec::new());
            txn.commit().unwrap();
        }

        let dackbox = open(&store);
        let view = dackbox.new_graph_view();
        assert_eq!(view.count_refs_to(b"x"), 1);
        assert!(view.has_refs_from(b"empty"));
        assert_eq!(view.count_refs_from(b"empty"), 0);
    }

    #[test]
    fn corrupted_row_fails_open() {
        let store = InMemoryStore::with_entries(vec![(b"graph\0bad".to_vec(), vec![0, 4, 1])]);
        assert!(matches!(
            DackBox::open(Arc::new(store), None, Config::default()),
            Err(CoreError::Decode { .. })
        ));
    }

    #[test]
    fn values_in_a_bucket_named_like_the_graph_survive_reopen() {
        let store = InMemoryStore::new();
        let graphics = crate::bucket::BucketHandler::new("graphics");
        {
            let dackbox = open(&store);
            let mut txn = dackbox.new_transaction().unwrap();
            txn.set(&graphics.get_key("g1"), b"{\"id\":\"g1\"}").unwrap();
            txn.graph_mut().set_refs(&graphics.get_key("g1"), to_vecs(&["x"]));
            txn.mark_dirty(&graphics.get_key("g1"), None).unwrap();
            txn.commit().unwrap();
        }

        let dackbox = open(&store);
        let view = dackbox.new_graph_view();
        assert_eq!(view.get_refs_to(b"x").len(), 1);
        assert_eq!(view.get_refs_to(b"x").as_slice(), &[graphics.get_key("g1")]);
        assert_eq!(dackbox.keys_to_index().unwrap(), vec![graphics.get_key("g1")]);
    }

    #[test]
    fn dirty_keys_are_marked_queued_and_acked() {
        let store = InMemoryStore::new();
        let queue = Arc::new(WaitableQueue::new());
        let dackbox = DackBox::open(
            Arc::new(store.clone()),
            Some(queue.clone() as Arc<dyn IndexQueue>),
            Config::default(),
        )
        .unwrap();

        let mut txn = dackbox.new_transaction().unwrap();
        txn.set(b"img\0a", b"v1").unwrap();
        txn.mark_dirty(b"img\0a", Some(b"v1".to_vec())).unwrap();
        txn.mark_dirty(b"img\0b", None).unwrap();
        assert!(queue.is_empty());
        txn.commit().unwrap();

        let items = queue.drain();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].key, b"img\0a");
        assert_eq!(items[0].value, Some(b"v1".to_vec()));
        assert_eq!(items[1].value, None);

        assert_eq!(
            dackbox.keys_to_index().unwrap(),
            to_vecs(&["img\0a", "img\0b"])
        );
        dackbox.ack_indexed(&[b"img\0a".to_vec()]).unwrap();
        assert_eq!(dackbox.keys_to_index().unwrap(), to_vecs(&["img\0b"]));
    }

    struct BrokenStore;

    impl KvStore for BrokenStore {
        fn new_transaction(&self) -> StorageResult<Box<dyn KvTransaction>> {
            Err(StorageError::Locked)
        }

        fn new_read_only_transaction(&self) -> StorageResult<Box<dyn KvTransaction>> {
            InMemoryStore::new().new_read_only_transaction()
        }
    }

    #[test]
    fn failed_open_releases_hold() {
        let dackbox = DackBox::open(Arc::new(BrokenStore), None, Config::default()).unwrap();
        assert!(dackbox.new_transaction().is_err());
        assert_eq!(dackbox.held_steps(), 0);
    }

    #[test]
    fn commits_advance_steps_and_fold() {
        let store = InMemoryStore::new();
        let dackbox = open(&store);
        let view = dackbox.new_graph_view();

        let mut txn = dackbox.new_transaction().unwrap();
        txn.graph_mut().add_refs(b"a", to_vecs(&["x"]));
        txn.commit().unwrap();
        assert_eq!(dackbox.current_step(), 1);
        assert_eq!(dackbox.pending_modifications(), 1);
        assert!(!view.has_refs_from(b"a"));

        drop(view);
        assert_eq!(dackbox.pending_modifications(), 0);
        assert!(dackbox.new_graph_view().has_refs_from(b"a"));
    }
}
