//! Local graph overlay backed by a remote view.

use super::{Overlay, RGraph, RWGraph};
use crate::sortedkeys::SortedKeys;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Runs a reader against the authoritative graph a [`RemoteGraph`] pulls
/// from.
///
/// The callback is invoked with a reader closure and must call it exactly
/// once with the graph to read, for example a pinned history view.
pub type RemoteReadable = Arc<dyn Fn(&mut dyn FnMut(&dyn RGraph)) + Send + Sync>;

/// A local graph overlay that lazily copies state from a remote graph.
///
/// The overlay starts empty. The first time any operation touches a key,
/// that key's edges are pulled from the remote graph into the overlay, and
/// only then is the operation applied locally. Mutations pull every key
/// they could affect, so local changes never sit on top of partial state.
///
/// Reads take `&self`; the overlay is filled behind a mutex.
pub struct RemoteGraph<G> {
    state: Mutex<RemoteState<G>>,
    remote: RemoteReadable,
}

struct RemoteState<G> {
    local: G,
    read_forward: HashSet<Vec<u8>>,
    read_backward: HashSet<Vec<u8>>,
}

impl<G: Overlay> RemoteState<G> {
    fn ensure_from_all<'k>(
        &mut self,
        remote: &RemoteReadable,
        keys: impl IntoIterator<Item = &'k [u8]>,
    ) {
        let missing: Vec<&[u8]> = keys
            .into_iter()
            .filter(|k| self.read_forward.insert(k.to_vec()))
            .collect();
        if missing.is_empty() {
            return;
        }

        let mut fetched: Vec<(&[u8], SortedKeys)> = Vec::new();
        remote(&mut |graph: &dyn RGraph| {
            for key in &missing {
                if graph.has_refs_from(key) {
                    fetched.push((*key, graph.get_refs_from(key)));
                }
            }
        });
        for (key, tos) in fetched {
            self.local.absorb_refs_from(key, &tos);
        }
    }

    fn ensure_to_all<'k>(
        &mut self,
        remote: &RemoteReadable,
        keys: impl IntoIterator<Item = &'k [u8]>,
    ) {
        let missing: Vec<&[u8]> = keys
            .into_iter()
            .filter(|k| self.read_backward.insert(k.to_vec()))
            .collect();
        if missing.is_empty() {
            return;
        }

        let mut fetched: Vec<(&[u8], SortedKeys)> = Vec::new();
        remote(&mut |graph: &dyn RGraph| {
            for key in &missing {
                if graph.has_refs_to(key) {
                    fetched.push((*key, graph.get_refs_to(key)));
                }
            }
        });
        for (key, froms) in fetched {
            self.local.absorb_refs_to(key, &froms);
        }
    }

    fn ensure_from(&mut self, remote: &RemoteReadable, key: &[u8]) {
        self.ensure_from_all(remote, [key]);
    }

    fn ensure_to(&mut self, remote: &RemoteReadable, key: &[u8]) {
        self.ensure_to_all(remote, [key]);
    }
}

impl<G: Overlay> RemoteGraph<G> {
    /// Wraps `local`, pulling missing state through `remote`.
    #[must_use]
    pub fn new(local: G, remote: RemoteReadable) -> Self {
        Self {
            state: Mutex::new(RemoteState {
                local,
                read_forward: HashSet::new(),
                read_backward: HashSet::new(),
            }),
            remote,
        }
    }

    /// Consumes the overlay, returning the local graph.
    #[must_use]
    pub fn into_local(self) -> G {
        self.state.into_inner().local
    }

    /// Returns the number of keys pulled so far, forward and backward.
    #[must_use]
    pub fn fetched(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.read_forward.len(), state.read_backward.len())
    }

    fn read<R>(&self, key: &[u8], forward: bool, f: impl FnOnce(&G) -> R) -> R {
        let mut state = self.state.lock();
        if forward {
            state.ensure_from(&self.remote, key);
        } else {
            state.ensure_to(&self.remote, key);
        }
        f(&state.local)
    }
}

impl<G> fmt::Debug for RemoteGraph<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RemoteGraph")
            .field("read_forward", &state.read_forward.len())
            .field("read_backward", &state.read_backward.len())
            .finish_non_exhaustive()
    }
}

impl<G: Overlay> RGraph for RemoteGraph<G> {
    fn has_refs_from(&self, from: &[u8]) -> bool {
        self.read(from, true, |g| g.has_refs_from(from))
    }

    fn has_refs_to(&self, to: &[u8]) -> bool {
        self.read(to, false, |g| g.has_refs_to(to))
    }

    fn count_refs_from(&self, from: &[u8]) -> usize {
        self.read(from, true, |g| g.count_refs_from(from))
    }

    fn count_refs_to(&self, to: &[u8]) -> usize {
        self.read(to, false, |g| g.count_refs_to(to))
    }

    fn get_refs_from(&self, from: &[u8]) -> SortedKeys {
        self.read(from, true, |g| g.get_refs_from(from))
    }

    fn get_refs_to(&self, to: &[u8]) -> SortedKeys {
        self.read(to, false, |g| g.get_refs_to(to))
    }

    fn get_refs_from_prefix(&self, from: &[u8], prefix: &[u8]) -> SortedKeys {
        self.read(from, true, |g| g.get_refs_from_prefix(from, prefix))
    }

    fn get_refs_to_prefix(&self, to: &[u8], prefix: &[u8]) -> SortedKeys {
        self.read(to, false, |g| g.get_refs_to_prefix(to, prefix))
    }
}

impl<G: Overlay> RWGraph for RemoteGraph<G> {
    fn set_refs(&mut self, from: &[u8], to: Vec<Vec<u8>>) {
        let remote = &self.remote;
        let state = self.state.get_mut();
        state.ensure_from(remote, from);
        let old = state.local.get_refs_from(from);
        state.ensure_to_all(remote, old.iter().chain(to.iter().map(Vec::as_slice)));
        state.local.set_refs(from, to);
    }

    fn add_refs(&mut self, from: &[u8], to: Vec<Vec<u8>>) {
        let remote = &self.remote;
        let state = self.state.get_mut();
        state.ensure_from(remote, from);
        let old = state.local.get_refs_from(from);
        state.ensure_to_all(remote, old.iter().chain(to.iter().map(Vec::as_slice)));
        state.local.add_refs(from, to);
    }

    fn delete_refs_from(&mut self, from: &[u8]) {
        let remote = &self.remote;
        let state = self.state.get_mut();
        state.ensure_from(remote, from);
        let old = state.local.get_refs_from(from);
        state.ensure_to_all(remote, old.iter());
        state.local.delete_refs_from(from);
    }

    fn delete_refs_to(&mut self, to: &[u8]) {
        let remote = &self.remote;
        let state = self.state.get_mut();
        state.ensure_to(remote, to);
        let old = state.local.get_refs_to(to);
        state.ensure_from_all(remote, old.iter());
        state.local.delete_refs_to(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testutil::{keys, refs};
    use crate::graph::{Graph, ModifiedGraph};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn backed_by(graph: Graph) -> (RemoteReadable, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let graph = Arc::new(graph);
        let remote: RemoteReadable = Arc::new(move |reader: &mut dyn FnMut(&dyn RGraph)| {
            counter.fetch_add(1, Ordering::SeqCst);
            reader(&*graph);
        });
        (remote, calls)
    }

    fn sample() -> Graph {
        let mut graph = Graph::new();
        graph.set_refs(b"a", refs(&["x", "y"]));
        graph.set_refs(b"b", refs(&["y"]));
        graph
    }

    #[test]
    fn reads_pull_once_per_key() {
        let (remote, calls) = backed_by(sample());
        let overlay = RemoteGraph::new(Graph::new(), remote);

        assert_eq!(overlay.get_refs_from(b"a"), keys(&["x", "y"]));
        assert_eq!(overlay.count_refs_from(b"a"), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(overlay.get_refs_to(b"y"), keys(&["a", "b"]));
        assert!(!overlay.has_refs_from(b"missing"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(overlay.fetched(), (2, 1));
    }

    #[test]
    fn local_changes_sit_on_remote_state() {
        let (remote, _) = backed_by(sample());
        let mut overlay = RemoteGraph::new(ModifiedGraph::new(), remote);

        overlay.set_refs(b"b", refs(&["z"]));
        assert_eq!(overlay.get_refs_to(b"y"), keys(&["a"]));
        assert_eq!(overlay.get_refs_to(b"z"), keys(&["b"]));

        overlay.add_refs(b"a", refs(&["z"]));
        assert_eq!(overlay.get_refs_from(b"a"), keys(&["x", "y", "z"]));
        assert_eq!(overlay.get_refs_to(b"z"), keys(&["a", "b"]));

        let local = overlay.into_local();
        assert_eq!(local.changes().modified_from(), &keys(&["a", "b"]));
        assert_eq!(local.graph().find_asymmetric_edge(), None);
    }

    #[test]
    fn removed_edges_are_not_pulled_back() {
        let (remote, _) = backed_by(sample());
        let mut overlay = RemoteGraph::new(ModifiedGraph::new(), remote);

        overlay.delete_refs_from(b"a");
        // "y" was pulled before the delete, so "a" stays gone.
        assert_eq!(overlay.get_refs_to(b"y"), keys(&["b"]));
        assert!(!overlay.has_refs_to(b"x"));
        assert!(!overlay.has_refs_from(b"a"));
    }

    #[test]
    fn delete_refs_to_prunes_pulled_sources() {
        let (remote, _) = backed_by(sample());
        let mut overlay = RemoteGraph::new(ModifiedGraph::new(), remote);

        overlay.delete_refs_to(b"y");
        assert!(!overlay.has_refs_from(b"b"));
        assert_eq!(overlay.get_refs_from(b"a"), keys(&["x"]));
        assert_eq!(overlay.count_refs_to(b"y"), 0);

        let local = overlay.into_local();
        assert_eq!(local.changes().modified_from(), &keys(&["a", "b"]));
        assert_eq!(local.changes().modified_to(), &keys(&["y"]));
    }

    #[test]
    fn remote_is_never_mutated() {
        let shared = Arc::new(parking_lot::RwLock::new(sample()));
        let source = Arc::clone(&shared);
        let remote: RemoteReadable = Arc::new(move |reader: &mut dyn FnMut(&dyn RGraph)| {
            reader(&*source.read());
        });
        let mut overlay = RemoteGraph::new(Graph::new(), remote);

        overlay.set_refs(b"a", Vec::new());
        assert_eq!(shared.read().get_refs_from(b"a"), keys(&["x", "y"]));
        assert_eq!(overlay.count_refs_from(b"a"), 0);
        assert!(overlay.has_refs_from(b"a"));
    }
}
