//! Graph with a changelog of touched keys.

use super::{Graph, Overlay, RGraph, RWGraph};
use crate::sortedkeys::SortedKeys;
use std::collections::HashMap;

/// The set of keys whose edges were touched.
///
/// A modification holds no edge content itself. The content lives in the
/// graph it was recorded against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modification {
    modified_from: SortedKeys,
    modified_to: SortedKeys,
}

impl Modification {
    /// Creates an empty modification.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys whose forward edges were touched.
    #[must_use]
    pub fn modified_from(&self) -> &SortedKeys {
        &self.modified_from
    }

    /// Keys whose backward edges were touched.
    #[must_use]
    pub fn modified_to(&self) -> &SortedKeys {
        &self.modified_to
    }

    /// Returns true if nothing was touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modified_from.is_empty() && self.modified_to.is_empty()
    }

    fn touch_from(&mut self, key: &[u8]) {
        self.modified_from.insert(key);
    }

    fn touch_to(&mut self, keys: &SortedKeys) {
        self.modified_to = self.modified_to.union(keys);
    }
}

/// A [`Graph`] that records every key its mutations touch.
#[derive(Debug, Clone, Default)]
pub struct ModifiedGraph {
    graph: Graph,
    changes: Modification,
}

impl ModifiedGraph {
    /// Creates an empty graph with an empty changelog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing graph. Its current content is not recorded.
    #[must_use]
    pub fn from_graph(graph: Graph) -> Self {
        Self {
            graph,
            changes: Modification::new(),
        }
    }

    /// Returns the wrapped graph.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Returns the changelog.
    #[must_use]
    pub fn changes(&self) -> &Modification {
        &self.changes
    }

    /// Consumes the wrapper, returning the graph and its changelog.
    #[must_use]
    pub fn into_parts(self) -> (Graph, Modification) {
        (self.graph, self.changes)
    }

    /// Recomputes the backward entries of this change against `head`, the
    /// graph it is about to be layered on.
    ///
    /// The forward entries of the touched `from` keys are kept as recorded.
    /// Every target they gain or lose gets a backward entry built from
    /// `head`, so a lookup answered by this layer agrees with the forward
    /// edges visible through it. Untouched keys are dropped.
    #[must_use]
    pub fn rebase(self, head: &dyn RGraph) -> Self {
        let ModifiedGraph { graph, mut changes } = self;

        let mut forward = HashMap::new();
        let mut targets: Vec<Vec<u8>> = changes.modified_to.iter().map(<[u8]>::to_vec).collect();
        for from in changes.modified_from.iter() {
            targets.extend(head.get_refs_from(from).into_vec());
            if let Some(tos) = graph.refs_from(from) {
                targets.extend(tos.iter().map(<[u8]>::to_vec));
                forward.insert(from.to_vec(), tos.clone());
            }
        }
        let targets = SortedKeys::sort(targets);

        let mut backward: HashMap<Vec<u8>, SortedKeys> = targets
            .iter()
            .map(|to| {
                let kept = head.get_refs_to(to).difference(&changes.modified_from);
                (to.to_vec(), kept)
            })
            .collect();
        for (from, tos) in &forward {
            for to in tos.iter() {
                if let Some(froms) = backward.get_mut(to) {
                    froms.insert(from);
                }
            }
        }
        backward.retain(|_, froms| !froms.is_empty());

        changes.modified_to = targets;
        Self {
            graph: Graph::from_entries(forward, backward),
            changes,
        }
    }
}

impl RGraph for ModifiedGraph {
    fn has_refs_from(&self, from: &[u8]) -> bool {
        self.graph.has_refs_from(from)
    }

    fn has_refs_to(&self, to: &[u8]) -> bool {
        self.graph.has_refs_to(to)
    }

    fn count_refs_from(&self, from: &[u8]) -> usize {
        self.graph.count_refs_from(from)
    }

    fn count_refs_to(&self, to: &[u8]) -> usize {
        self.graph.count_refs_to(to)
    }

    fn get_refs_from(&self, from: &[u8]) -> SortedKeys {
        self.graph.get_refs_from(from)
    }

    fn get_refs_to(&self, to: &[u8]) -> SortedKeys {
        self.graph.get_refs_to(to)
    }

    fn get_refs_from_prefix(&self, from: &[u8], prefix: &[u8]) -> SortedKeys {
        self.graph.get_refs_from_prefix(from, prefix)
    }

    fn get_refs_to_prefix(&self, to: &[u8], prefix: &[u8]) -> SortedKeys {
        self.graph.get_refs_to_prefix(to, prefix)
    }
}

impl RWGraph for ModifiedGraph {
    fn set_refs(&mut self, from: &[u8], to: Vec<Vec<u8>>) {
        let new = SortedKeys::sort(to);
        self.changes.touch_from(from);
        self.changes.touch_to(&new);
        if let Some(old) = self.graph.refs_from(from) {
            self.changes.touch_to(old);
        }
        self.graph.set_refs(from, new.into_vec());
    }

    fn add_refs(&mut self, from: &[u8], to: Vec<Vec<u8>>) {
        let new = SortedKeys::sort(to);
        self.changes.touch_from(from);
        self.changes.touch_to(&new);
        self.graph.add_refs(from, new.into_vec());
    }

    fn delete_refs_from(&mut self, from: &[u8]) {
        self.changes.touch_from(from);
        if let Some(old) = self.graph.refs_from(from) {
            self.changes.touch_to(old);
        }
        self.graph.delete_refs_from(from);
    }

    fn delete_refs_to(&mut self, to: &[u8]) {
        self.changes.modified_to.insert(to);
        if let Some(old) = self.graph.refs_to(to) {
            self.changes.modified_from = self.changes.modified_from.union(old);
        }
        self.graph.delete_refs_to(to);
    }
}

impl Overlay for ModifiedGraph {
    fn absorb_refs_from(&mut self, from: &[u8], to: &SortedKeys) {
        self.graph.absorb_refs_from(from, to);
    }

    fn absorb_refs_to(&mut self, to: &[u8], from: &SortedKeys) {
        self.graph.absorb_refs_to(to, from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testutil::{keys, refs};

    #[test]
    fn set_refs_records_old_and_new_targets() {
        let mut graph = Graph::new();
        graph.set_refs(b"a", refs(&["x", "y"]));
        let mut modified = ModifiedGraph::from_graph(graph);
        assert!(modified.changes().is_empty());

        modified.set_refs(b"a", refs(&["z"]));
        assert_eq!(modified.changes().modified_from(), &keys(&["a"]));
        assert_eq!(modified.changes().modified_to(), &keys(&["x", "y", "z"]));
        assert_eq!(modified.get_refs_from(b"a"), keys(&["z"]));
    }

    #[test]
    fn rebase_takes_backward_edges_from_head() {
        let mut head = Graph::new();
        head.set_refs(b"a", refs(&["y"]));
        head.set_refs(b"b", refs(&["y"]));

        // Recorded against a snapshot where only `a` pointed at `y`.
        let mut stale = Graph::new();
        stale.set_refs(b"a", refs(&["y"]));
        let mut modified = ModifiedGraph::from_graph(stale);
        modified.set_refs(b"a", refs(&["x"]));

        let rebased = modified.rebase(&head);
        assert_eq!(rebased.changes().modified_from(), &keys(&["a"]));
        assert_eq!(rebased.changes().modified_to(), &keys(&["x", "y"]));
        assert_eq!(rebased.get_refs_from(b"a"), keys(&["x"]));
        assert_eq!(rebased.get_refs_to(b"x"), keys(&["a"]));
        assert_eq!(rebased.get_refs_to(b"y"), keys(&["b"]));
        assert!(!rebased.has_refs_from(b"b"));
    }

    #[test]
    fn add_refs_records_new_targets() {
        let mut modified = ModifiedGraph::new();
        modified.add_refs(b"a", refs(&["x"]));
        modified.add_refs(b"b", refs(&["y"]));
        assert_eq!(modified.changes().modified_from(), &keys(&["a", "b"]));
        assert_eq!(modified.changes().modified_to(), &keys(&["x", "y"]));
    }

    #[test]
    fn delete_refs_from_records_former_targets() {
        let mut graph = Graph::new();
        graph.set_refs(b"a", refs(&["x", "y"]));
        let mut modified = ModifiedGraph::from_graph(graph);
        modified.delete_refs_from(b"a");

        assert_eq!(modified.changes().modified_from(), &keys(&["a"]));
        assert_eq!(modified.changes().modified_to(), &keys(&["x", "y"]));
        assert!(!modified.has_refs_from(b"a"));
    }

    #[test]
    fn delete_refs_to_records_former_sources() {
        let mut graph = Graph::new();
        graph.set_refs(b"a", refs(&["x"]));
        graph.set_refs(b"b", refs(&["x", "y"]));
        let mut modified = ModifiedGraph::from_graph(graph);
        modified.delete_refs_to(b"x");

        assert_eq!(modified.changes().modified_from(), &keys(&["a", "b"]));
        assert_eq!(modified.changes().modified_to(), &keys(&["x"]));
    }

    #[test]
    fn absorbed_state_is_not_a_change() {
        let mut modified = ModifiedGraph::new();
        modified.absorb_refs_from(b"a", &keys(&["x"]));
        assert!(modified.changes().is_empty());
        assert_eq!(modified.get_refs_to(b"x"), keys(&["a"]));
    }
}
