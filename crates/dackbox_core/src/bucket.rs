//! Bucket key prefixes and bucket paths.
//!
//! Keys are grouped into buckets by a `bucket | 0x00 | id` convention. A
//! [`BucketHandler`] converts between ids and keys and filters graph edges
//! down to one bucket.

use crate::graph::RGraph;
use crate::sortedkeys::SortedKeys;

/// Separator between a bucket name and an id.
pub const SEPARATOR: u8 = b'\0';

/// Key helpers for one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketHandler {
    prefix: Vec<u8>,
}

impl BucketHandler {
    /// Creates a handler for the bucket named `bucket`.
    #[must_use]
    pub fn new(bucket: impl AsRef<[u8]>) -> Self {
        let bucket = bucket.as_ref();
        let mut prefix = Vec::with_capacity(bucket.len() + 1);
        prefix.extend_from_slice(bucket);
        prefix.push(SEPARATOR);
        Self { prefix }
    }

    /// Returns the key prefix, separator included.
    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Returns the key of `id` in this bucket.
    #[must_use]
    pub fn get_key(&self, id: impl AsRef<[u8]>) -> Vec<u8> {
        let id = id.as_ref();
        let mut key = Vec::with_capacity(self.prefix.len() + id.len());
        key.extend_from_slice(&self.prefix);
        key.extend_from_slice(id);
        key
    }

    /// Returns the keys of `ids` in this bucket.
    #[must_use]
    pub fn get_keys<I>(&self, ids: I) -> Vec<Vec<u8>>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        ids.into_iter().map(|id| self.get_key(id)).collect()
    }

    /// Returns the id part of `key`, or `None` if it is not in this bucket.
    #[must_use]
    pub fn get_id<'k>(&self, key: &'k [u8]) -> Option<&'k [u8]> {
        key.strip_prefix(self.prefix.as_slice())
    }

    /// Returns true if `key` belongs to this bucket.
    #[must_use]
    pub fn has_prefix(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
    }

    /// Keeps the keys that belong to this bucket.
    #[must_use]
    pub fn filter_keys<'k, I>(&self, keys: I) -> Vec<Vec<u8>>
    where
        I: IntoIterator<Item = &'k [u8]>,
    {
        keys.into_iter()
            .filter(|k| self.has_prefix(k))
            .map(<[u8]>::to_vec)
            .collect()
    }

    /// Returns the keys in this bucket that `key` references.
    #[must_use]
    pub fn get_filtered_refs_from(&self, graph: &dyn RGraph, key: &[u8]) -> SortedKeys {
        graph.get_refs_from_prefix(key, &self.prefix)
    }

    /// Returns the keys in this bucket referencing `key`.
    #[must_use]
    pub fn get_filtered_refs_to(&self, graph: &dyn RGraph, key: &[u8]) -> SortedKeys {
        graph.get_refs_to_prefix(key, &self.prefix)
    }

    /// Counts the keys in this bucket that `key` references.
    #[must_use]
    pub fn count_filtered_refs_from(&self, graph: &dyn RGraph, key: &[u8]) -> usize {
        self.get_filtered_refs_from(graph, key).len()
    }

    /// Counts the keys in this bucket referencing `key`.
    #[must_use]
    pub fn count_filtered_refs_to(&self, graph: &dyn RGraph, key: &[u8]) -> usize {
        self.get_filtered_refs_to(graph, key).len()
    }
}

/// Which edges a hop follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From a key to the keys it references.
    Forward,
    /// From a key to the keys referencing it.
    Backward,
}

/// One hop of a [`BucketPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathElement {
    /// Bucket the hop lands in.
    pub bucket: BucketHandler,
    /// Edges the hop follows.
    pub direction: Direction,
}

impl PathElement {
    /// Creates a hop following forward edges into `bucket`.
    #[must_use]
    pub fn forward(bucket: BucketHandler) -> Self {
        Self {
            bucket,
            direction: Direction::Forward,
        }
    }

    /// Creates a hop following backward edges into `bucket`.
    #[must_use]
    pub fn backward(bucket: BucketHandler) -> Self {
        Self {
            bucket,
            direction: Direction::Backward,
        }
    }

    /// Returns the keys in this hop's bucket adjacent to `key`.
    #[must_use]
    pub fn step(&self, graph: &dyn RGraph, key: &[u8]) -> SortedKeys {
        match self.direction {
            Direction::Forward => self.bucket.get_filtered_refs_from(graph, key),
            Direction::Backward => self.bucket.get_filtered_refs_to(graph, key),
        }
    }
}

/// An ordered sequence of bucket hops.
///
/// The first element names the bucket of the starting id; its direction is
/// not used. Every following element is one hop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketPath {
    elements: Vec<PathElement>,
}

impl BucketPath {
    /// Creates a path from its elements.
    #[must_use]
    pub fn new(elements: Vec<PathElement>) -> Self {
        Self { elements }
    }

    /// Appends a forward hop into `bucket`.
    #[must_use]
    pub fn then_forward(mut self, bucket: BucketHandler) -> Self {
        self.elements.push(PathElement::forward(bucket));
        self
    }

    /// Appends a backward hop into `bucket`.
    #[must_use]
    pub fn then_backward(mut self, bucket: BucketHandler) -> Self {
        self.elements.push(PathElement::backward(bucket));
        self
    }

    /// Returns the elements.
    #[must_use]
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Consumes the path, returning its elements.
    #[must_use]
    pub fn into_elements(self) -> Vec<PathElement> {
        self.elements
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if the path has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
