//! Read-only graph views without a store transaction.

use crate::dackbox::Shared;
use crate::graph::{Graph, RGraph, RemoteGraph};
use crate::sortedkeys::SortedKeys;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A discardable read-only view of the graph.
///
/// The view pins the history time-step that was current when it was opened
/// and reads edges lazily from it. It must be discarded, or dropped, to let
/// history fold past that step. A discarded view reads as an empty graph.
pub struct GraphView {
    shared: Arc<Shared>,
    ts: u64,
    graph: Option<RemoteGraph<Graph>>,
    empty: Graph,
}

impl GraphView {
    pub(crate) fn new(shared: Arc<Shared>, ts: u64) -> Self {
        let graph = RemoteGraph::new(Graph::new(), shared.remote_view(ts));
        Self {
            shared,
            ts,
            graph: Some(graph),
            empty: Graph::new(),
        }
    }

    /// Returns the pinned time-step.
    #[must_use]
    pub fn ts(&self) -> u64 {
        self.ts
    }

    /// Returns true until the view is discarded.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.graph.is_some()
    }

    /// Releases the pinned time-step. Discarding twice does nothing.
    pub fn discard(&mut self) {
        if self.graph.take().is_some() {
            self.shared.release(self.ts);
            trace!(ts = self.ts, "discarded graph view");
        }
    }

    fn inner(&self) -> &dyn RGraph {
        match &self.graph {
            Some(graph) => graph,
            None => &self.empty,
        }
    }
}

impl Drop for GraphView {
    fn drop(&mut self) {
        self.discard();
    }
}

impl fmt::Debug for GraphView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphView")
            .field("ts", &self.ts)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl RGraph for GraphView {
    fn has_refs_from(&self, from: &[u8]) -> bool {
        self.inner().has_refs_from(from)
    }

    fn has_refs_to(&self, to: &[u8]) -> bool {
        self.inner().has_refs_to(to)
    }

    fn count_refs_from(&self, from: &[u8]) -> usize {
        self.inner().count_refs_from(from)
    }

    fn count_refs_to(&self, to: &[u8]) -> usize {
        self.inner().count_refs_to(to)
    }

    fn get_refs_from(&self, from: &[u8]) -> SortedKeys {
        self.inner().get_refs_from(from)
    }

    fn get_refs_to(&self, to: &[u8]) -> SortedKeys {
        self.inner().get_refs_to(to)
    }

    fn get_refs_from_prefix(&self, from: &[u8], prefix: &[u8]) -> SortedKeys {
        self.inner().get_refs_from_prefix(from, prefix)
    }

    fn get_refs_to_prefix(&self, to: &[u8], prefix: &[u8]) -> SortedKeys {
        self.inner().get_refs_to_prefix(to, prefix)
    }
}
