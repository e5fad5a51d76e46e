//! Bidirectional adjacency map.

use super::{Overlay, RGraph, RWGraph};
use crate::sortedkeys::SortedKeys;
use std::collections::HashMap;

/// An in-memory reference graph.
///
/// Keeps a forward map (`from -> to*`) and a backward map (`to -> from*`).
/// Entries created by [`RWGraph::set_refs`] or [`RWGraph::add_refs`] may be
/// empty; entries emptied as a side effect of removing a partner's edges are
/// pruned.
///
/// # Example
///
/// ```rust
/// use dackbox_core::{Graph, RGraph, RWGraph};
///
/// let mut graph = Graph::new();
/// graph.set_refs(b"img\0a", vec![b"cmp\0x".to_vec()]);
/// assert_eq!(graph.count_refs_to(b"cmp\0x"), 1);
///
/// graph.delete_refs_to(b"cmp\0x");
/// assert!(!graph.has_refs_from(b"img\0a"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    forward: HashMap<Vec<u8>, SortedKeys>,
    backward: HashMap<Vec<u8>, SortedKeys>,
}

impl Graph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a deep copy of the graph.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Builds a graph from raw entries.
    ///
    /// The caller keeps the two maps transposed for every key it reads back.
    pub(crate) fn from_entries(
        forward: HashMap<Vec<u8>, SortedKeys>,
        backward: HashMap<Vec<u8>, SortedKeys>,
    ) -> Self {
        Self { forward, backward }
    }

    /// Returns the forward entry of `from` without copying it.
    #[must_use]
    pub fn refs_from(&self, from: &[u8]) -> Option<&SortedKeys> {
        self.forward.get(from)
    }

    /// Returns the backward entry of `to` without copying it.
    #[must_use]
    pub fn refs_to(&self, to: &[u8]) -> Option<&SortedKeys> {
        self.backward.get(to)
    }

    /// Iterates every forward entry in arbitrary order.
    pub fn forward_entries(&self) -> impl Iterator<Item = (&[u8], &SortedKeys)> + '_ {
        self.forward.iter().map(|(k, v)| (k.as_slice(), v))
    }

    /// Returns the number of keys with a forward entry.
    #[must_use]
    pub fn from_count(&self) -> usize {
        self.forward.len()
    }

    /// Returns the number of keys with a backward entry.
    #[must_use]
    pub fn to_count(&self) -> usize {
        self.backward.len()
    }

    /// Returns the total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(SortedKeys::len).sum()
    }

    /// Returns true if the graph has no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.backward.is_empty()
    }

    /// Finds an edge recorded on one side only.
    ///
    /// Returns `None` when the backward index is the exact transpose of the
    /// forward index.
    #[must_use]
    pub fn find_asymmetric_edge(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        for (from, tos) in &self.forward {
            for to in tos.iter() {
                if !self.backward.get(to).is_some_and(|f| f.contains(from)) {
                    return Some((from.clone(), to.to_vec()));
                }
            }
        }
        for (to, froms) in &self.backward {
            for from in froms.iter() {
                if !self.forward.get(from).is_some_and(|t| t.contains(to)) {
                    return Some((from.to_vec(), to.clone()));
                }
            }
        }
        None
    }

    fn link_to(&mut self, from: &[u8], to: &[u8]) {
        self.backward.entry(to.to_vec()).or_default().insert(from);
    }

    fn unlink_to(&mut self, from: &[u8], to: &[u8]) {
        if let Some(froms) = self.backward.get_mut(to) {
            froms.remove(from);
            if froms.is_empty() {
                self.backward.remove(to);
            }
        }
    }

    fn unlink_from(&mut self, from: &[u8], to: &[u8]) {
        if let Some(tos) = self.forward.get_mut(from) {
            tos.remove(to);
            if tos.is_empty() {
                self.forward.remove(from);
            }
        }
    }
}

impl RGraph for Graph {
    fn has_refs_from(&self, from: &[u8]) -> bool {
        self.forward.contains_key(from)
    }

    fn has_refs_to(&self, to: &[u8]) -> bool {
        self.backward.contains_key(to)
    }

    fn count_refs_from(&self, from: &[u8]) -> usize {
        self.forward.get(from).map_or(0, SortedKeys::len)
    }

    fn count_refs_to(&self, to: &[u8]) -> usize {
        self.backward.get(to).map_or(0, SortedKeys::len)
    }

    fn get_refs_from(&self, from: &[u8]) -> SortedKeys {
        self.forward.get(from).cloned().unwrap_or_default()
    }

    fn get_refs_to(&self, to: &[u8]) -> SortedKeys {
        self.backward.get(to).cloned().unwrap_or_default()
    }

    fn get_refs_from_prefix(&self, from: &[u8], prefix: &[u8]) -> SortedKeys {
        self.forward
            .get(from)
            .map(|tos| tos.with_prefix(prefix))
            .unwrap_or_default()
    }

    fn get_refs_to_prefix(&self, to: &[u8], prefix: &[u8]) -> SortedKeys {
        self.backward
            .get(to)
            .map(|froms| froms.with_prefix(prefix))
            .unwrap_or_default()
    }
}

impl RWGraph for Graph {
    fn set_refs(&mut self, from: &[u8], to: Vec<Vec<u8>>) {
        let new = SortedKeys::sort(to);
        let old = self
            .forward
            .insert(from.to_vec(), new.clone())
            .unwrap_or_default();

        for gone in old.difference(&new).iter() {
            self.unlink_to(from, gone);
        }
        for added in new.difference(&old).iter() {
            self.link_to(from, added);
        }
    }

    fn add_refs(&mut self, from: &[u8], to: Vec<Vec<u8>>) {
        let incoming = SortedKeys::sort(to);
        let entry = self.forward.entry(from.to_vec()).or_default();
        let added = incoming.difference(entry);
        *entry = entry.union(&added);

        for to in added.iter() {
            self.link_to(from, to);
        }
    }

    fn delete_refs_from(&mut self, from: &[u8]) {
        if let Some(tos) = self.forward.remove(from) {
            for to in tos.iter() {
                self.unlink_to(from, to);
            }
        }
    }

    fn delete_refs_to(&mut self, to: &[u8]) {
        if let Some(froms) = self.backward.remove(to) {
            for from in froms.iter() {
                self.unlink_from(from, to);
            }
        }
    }
}

impl Overlay for Graph {
    fn absorb_refs_from(&mut self, from: &[u8], to: &SortedKeys) {
        let entry = self.forward.entry(from.to_vec()).or_default();
        *entry = entry.union(to);
        for t in to.iter() {
            self.link_to(from, t);
        }
    }

    fn absorb_refs_to(&mut self, to: &[u8], from: &SortedKeys) {
        let entry = self.backward.entry(to.to_vec()).or_default();
        *entry = entry.union(from);
        for f in from.iter() {
            self.forward.entry(f.to_vec()).or_default().insert(to);
        }
    }
}
