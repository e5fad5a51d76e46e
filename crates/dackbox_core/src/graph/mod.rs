//! Directed reference graph between keys.
//!
//! Every graph in this module stores, per key, the sorted set of keys it
//! references (forward edges) and the sorted set of keys referencing it
//! (backward edges). The backward index is always the exact transpose of
//! the forward index.
//!
//! - [`Graph`] - The plain bidirectional adjacency map
//! - [`ModifiedGraph`] - A graph that records which keys were touched
//! - [`RemoteGraph`] - A local overlay that lazily pulls state from a view
//! - [`CompositeGraph`] - A read-only stack of modifications over a base

mod adjacency;
mod composite;
mod modified;
mod remote;

pub use adjacency::Graph;
pub use composite::CompositeGraph;
pub use modified::{Modification, ModifiedGraph};
pub use remote::{RemoteGraph, RemoteReadable};

use crate::sortedkeys::SortedKeys;

/// Read access to a reference graph.
///
/// "Has refs" reports whether an entry exists for the key, which is
/// distinct from the entry having zero edges.
pub trait RGraph {
    /// Returns true if `from` has a forward entry.
    fn has_refs_from(&self, from: &[u8]) -> bool;

    /// Returns true if `to` has a backward entry.
    fn has_refs_to(&self, to: &[u8]) -> bool;

    /// Returns the number of keys `from` references.
    fn count_refs_from(&self, from: &[u8]) -> usize;

    /// Returns the number of keys referencing `to`.
    fn count_refs_to(&self, to: &[u8]) -> usize;

    /// Returns a copy of the keys `from` references.
    fn get_refs_from(&self, from: &[u8]) -> SortedKeys;

    /// Returns a copy of the keys referencing `to`.
    fn get_refs_to(&self, to: &[u8]) -> SortedKeys;

    /// Returns the keys `from` references that start with `prefix`.
    fn get_refs_from_prefix(&self, from: &[u8], prefix: &[u8]) -> SortedKeys {
        self.get_refs_from(from).with_prefix(prefix)
    }

    /// Returns the keys referencing `to` that start with `prefix`.
    fn get_refs_to_prefix(&self, to: &[u8], prefix: &[u8]) -> SortedKeys {
        self.get_refs_to(to).with_prefix(prefix)
    }
}

/// Read-write access to a reference graph.
///
/// Every mutation keeps the forward and backward indexes consistent.
pub trait RWGraph: RGraph {
    /// Replaces the forward edges of `from` with `to`.
    ///
    /// The entry for `from` exists afterwards even if `to` is empty.
    fn set_refs(&mut self, from: &[u8], to: Vec<Vec<u8>>);

    /// Adds `to` to the forward edges of `from`. Never removes edges.
    fn add_refs(&mut self, from: &[u8], to: Vec<Vec<u8>>);

    /// Removes every edge leaving `from`, including its forward entry.
    fn delete_refs_from(&mut self, from: &[u8]);

    /// Removes every edge entering `to`, including its backward entry.
    fn delete_refs_to(&mut self, to: &[u8]);
}

/// A graph that can absorb state read from elsewhere.
///
/// Absorbed edges are merged into both indexes without being treated as a
/// local change.
pub trait Overlay: RWGraph {
    /// Merges `to` into the forward entry of `from`.
    fn absorb_refs_from(&mut self, from: &[u8], to: &SortedKeys);

    /// Merges `from` into the backward entry of `to`.
    fn absorb_refs_to(&mut self, to: &[u8], from: &SortedKeys);
}
