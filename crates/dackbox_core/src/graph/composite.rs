//! Read-only stack of modifications over a base graph.

use super::{ModifiedGraph, RGraph};
use crate::sortedkeys::SortedKeys;

/// A read-only graph resolving each key through a stack of layers.
///
/// A forward lookup for `k` answers from the newest modification whose
/// changelog lists `k` as a touched forward key, falling through to the
/// base when none does. Backward lookups work the same way with the touched
/// backward keys.
pub struct CompositeGraph<'a> {
    base: &'a dyn RGraph,
    mods: Vec<&'a ModifiedGraph>,
}

impl<'a> CompositeGraph<'a> {
    /// Creates a view of `base` overlaid by `mods`, ordered oldest first.
    #[must_use]
    pub fn new(base: &'a dyn RGraph, mods: Vec<&'a ModifiedGraph>) -> Self {
        Self { base, mods }
    }

    /// Returns the number of modification layers.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.mods.len()
    }

    fn from_layer(&self, from: &[u8]) -> &'a dyn RGraph {
        self.mods
            .iter()
            .rev()
            .find(|m| m.changes().modified_from().contains(from))
            .copied()
            .map_or(self.base, |m| m.graph() as &dyn RGraph)
    }

    fn to_layer(&self, to: &[u8]) -> &'a dyn RGraph {
        self.mods
            .iter()
            .rev()
            .find(|m| m.changes().modified_to().contains(to))
            .copied()
            .map_or(self.base, |m| m.graph() as &dyn RGraph)
    }
}

impl std::fmt::Debug for CompositeGraph<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeGraph")
            .field("depth", &self.mods.len())
            .finish_non_exhaustive()
    }
}

impl RGraph for CompositeGraph<'_> {
    fn has_refs_from(&self, from: &[u8]) -> bool {
        self.from_layer(from).has_refs_from(from)
    }

    fn has_refs_to(&self, to: &[u8]) -> bool {
        self.to_layer(to).has_refs_to(to)
    }

    fn count_refs_from(&self, from: &[u8]) -> usize {
        self.from_layer(from).count_refs_from(from)
    }

    fn count_refs_to(&self, to: &[u8]) -> usize {
        self.to_layer(to).count_refs_to(to)
    }

    fn get_refs_from(&self, from: &[u8]) -> SortedKeys {
        self.from_layer(from).get_refs_from(from)
    }

    fn get_refs_to(&self, to: &[u8]) -> SortedKeys {
        self.to_layer(to).get_refs_to(to)
    }

    fn get_refs_from_prefix(&self, from: &[u8], prefix: &[u8]) -> SortedKeys {
        self.from_layer(from).get_refs_from_prefix(from, prefix)
    }

    fn get_refs_to_prefix(&self, to: &[u8], prefix: &[u8]) -> SortedKeys {
        self.to_layer(to).get_refs_to_prefix(to, prefix)
    }
}
