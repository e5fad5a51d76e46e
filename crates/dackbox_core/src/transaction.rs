//! Transactions coupling a store transaction with a graph overlay.

use crate::dackbox::Shared;
use crate::error::{CoreError, CoreResult};
use crate::graph::{Graph, ModifiedGraph, RGraph, RWGraph, RemoteGraph};
use dackbox_storage::KvTransaction;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sentinel value stored in dirty rows.
const DIRTY_MARKER: [u8; 1] = [0];

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been discarded.
    Discarded,
}

enum TxnGraph {
    ReadOnly(RemoteGraph<Graph>),
    ReadWrite(RemoteGraph<ModifiedGraph>),
    /// Left behind once the transaction is closed; reads see nothing.
    Closed(Graph),
}

/// A transaction over a [`crate::DackBox`].
///
/// A transaction owns one store transaction and one graph overlay pinned at
/// the history time-step that was current when it was opened. It ends
/// exactly once, through [`Transaction::commit`] or
/// [`Transaction::discard`]. Dropping an active transaction discards it.
///
/// # Concurrency
///
/// Transactions never conflict. When two transactions write the same key or
/// the same edge list, the one that commits last wins. Callers that need
/// read-modify-write atomicity must serialize those transactions
/// themselves.
pub struct Transaction {
    shared: Arc<Shared>,
    ts: u64,
    kv: Option<Box<dyn KvTransaction>>,
    graph: TxnGraph,
    dirty: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    state: TransactionState,
}

impl Transaction {
    pub(crate) fn read_write(
        shared: Arc<Shared>,
        ts: u64,
        kv: Box<dyn KvTransaction>,
        graph: RemoteGraph<ModifiedGraph>,
    ) -> Self {
        Self::new(shared, ts, kv, TxnGraph::ReadWrite(graph))
    }

    pub(crate) fn read_only(
        shared: Arc<Shared>,
        ts: u64,
        kv: Box<dyn KvTransaction>,
        graph: RemoteGraph<Graph>,
    ) -> Self {
        Self::new(shared, ts, kv, TxnGraph::ReadOnly(graph))
    }

    fn new(shared: Arc<Shared>, ts: u64, kv: Box<dyn KvTransaction>, graph: TxnGraph) -> Self {
        Self {
            shared,
            ts,
            kv: Some(kv),
            graph,
            dirty: BTreeMap::new(),
            state: TransactionState::Active,
        }
    }

    /// Returns the history time-step this transaction reads at.
    #[must_use]
    pub fn base_ts(&self) -> u64 {
        self.ts
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true if the transaction cannot persist anything.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        matches!(self.graph, TxnGraph::ReadOnly(_))
            || self.kv.as_ref().is_some_and(|kv| kv.is_read_only())
    }

    /// Returns the graph as seen by this transaction.
    ///
    /// Reads reflect the pinned time-step overlaid with this transaction's
    /// own changes. A closed transaction reads as an empty graph.
    #[must_use]
    pub fn graph(&self) -> &dyn RGraph {
        match &self.graph {
            TxnGraph::ReadOnly(g) => g,
            TxnGraph::ReadWrite(g) => g,
            TxnGraph::Closed(g) => g,
        }
    }

    /// Returns the graph for modification.
    ///
    /// Changes made through a read-only transaction stay local and are
    /// dropped when it ends. After commit or discard this returns a scratch
    /// graph: mutations land there, are visible only through [`Self::graph`]
    /// on this handle, and are never persisted.
    pub fn graph_mut(&mut self) -> &mut dyn RWGraph {
        match &mut self.graph {
            TxnGraph::ReadOnly(g) => g,
            TxnGraph::ReadWrite(g) => g,
            TxnGraph::Closed(g) => {
                warn!(
                    ts = self.ts,
                    state = ?self.state,
                    "graph mutation on a closed transaction is dropped"
                );
                g
            }
        }
    }

    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is closed or the read fails.
    pub fn get(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.kv()?.get(key)?)
    }

    /// Writes `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is closed or read-only.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        Ok(self.kv_mut()?.set(key, value)?)
    }

    /// Deletes `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is closed or read-only.
    pub fn delete(&mut self, key: &[u8]) -> CoreResult<()> {
        Ok(self.kv_mut()?.delete(key)?)
    }

    /// Calls `f` with every entry under `prefix`, in key order.
    ///
    /// Stops at and returns the first error `f` returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails or `f` fails.
    pub fn bucket_for_each<F>(
        &self,
        prefix: &[u8],
        strip_prefix: bool,
        mut f: F,
    ) -> CoreResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> CoreResult<()>,
    {
        for (key, value) in self.kv()?.bucket_entries(prefix, strip_prefix)? {
            f(&key, &value)?;
        }
        Ok(())
    }

    /// Calls `f` with every key under `prefix`, in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails or `f` fails.
    pub fn bucket_key_for_each<F>(
        &self,
        prefix: &[u8],
        strip_prefix: bool,
        mut f: F,
    ) -> CoreResult<()>
    where
        F: FnMut(&[u8]) -> CoreResult<()>,
    {
        for key in self.kv()?.bucket_keys(prefix, strip_prefix)? {
            f(&key)?;
        }
        Ok(())
    }

    /// Counts the keys under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is closed or the scan fails.
    pub fn bucket_key_count(&self, prefix: &[u8]) -> CoreResult<usize> {
        Ok(self.kv()?.bucket_key_count(prefix)?)
    }

    /// Marks `key` for secondary indexing once this transaction commits.
    ///
    /// `value` is the new encoded value, or `None` if the key was removed.
    /// Marking the same key twice keeps the last value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ReadOnly`] on a read-only transaction.
    pub fn mark_dirty(&mut self, key: &[u8], value: Option<Vec<u8>>) -> CoreResult<()> {
        self.ensure_active()?;
        if self.is_read_only() {
            return Err(CoreError::ReadOnly {
                operation: "mark_dirty",
            });
        }
        self.dirty.insert(key.to_vec(), value);
        Ok(())
    }

    /// Commits the transaction.
    ///
    /// For a read-write transaction this persists every changed forward
    /// edge list and dirty marker together with the transaction's own
    /// writes, and then publishes the graph change to transactions opened
    /// afterwards. If the store commit fails, the graph change is dropped
    /// and history is left as it was.
    ///
    /// The transaction is closed afterwards whether or not the commit
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TransactionClosed`] if the transaction was
    /// already committed or discarded, or the store error that failed the
    /// commit.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        self.state = TransactionState::Committed;
        let graph = std::mem::replace(&mut self.graph, TxnGraph::Closed(Graph::new()));
        let kv = self.kv.take().ok_or(CoreError::TransactionClosed)?;
        let dirty = std::mem::take(&mut self.dirty);

        let shared = Arc::clone(&self.shared);
        let mut history = shared.history.write();
        history.release(self.ts);

        let diff = match graph {
            TxnGraph::ReadWrite(remote) => remote.into_local(),
            TxnGraph::ReadOnly(_) | TxnGraph::Closed(_) => {
                kv.discard();
                debug!(ts = self.ts, "committed read-only transaction");
                return Ok(());
            }
        };

        let mut kv = kv;
        let rows = shared.persistor.persist(&diff, kv.as_mut())?;
        for key in dirty.keys() {
            kv.set(&shared.config.dirty_key(key), &DIRTY_MARKER)?;
        }
        kv.commit()?;

        if let Some(queue) = &shared.to_index {
            for (key, value) in dirty {
                queue.push(key, value);
            }
        }

        let step = history.step_forward();
        if !diff.changes().is_empty() {
            history.apply(diff);
        }
        debug!(ts = self.ts, step, rows, "committed transaction");
        Ok(())
    }

    /// Discards the transaction without persisting anything.
    ///
    /// Discarding a closed transaction does nothing.
    pub fn discard(&mut self) {
        if self.state != TransactionState::Active {
            return;
        }
        self.state = TransactionState::Discarded;
        self.graph = TxnGraph::Closed(Graph::new());
        self.dirty.clear();
        if let Some(kv) = self.kv.take() {
            kv.discard();
        }
        self.shared.release(self.ts);
        debug!(ts = self.ts, "discarded transaction");
    }

    fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed | TransactionState::Discarded => {
                Err(CoreError::TransactionClosed)
            }
        }
    }

    fn kv(&self) -> CoreResult<&dyn KvTransaction> {
        self.kv.as_deref().ok_or(CoreError::TransactionClosed)
    }

    fn kv_mut(&mut self) -> CoreResult<&mut (dyn KvTransaction + 'static)> {
        self.kv.as_deref_mut().ok_or(CoreError::TransactionClosed)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            warn!(ts = self.ts, "transaction dropped without commit or discard");
            self.discard();
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("ts", &self.ts)
            .field("state", &self.state)
            .field("read_only", &self.is_read_only())
            .field("dirty", &self.dirty.len())
            .finish_non_exhaustive()
    }
}
