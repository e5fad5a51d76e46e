//! Sorted, deduplicated key lists.
//!
//! [`SortedKeys`] is the edge-list primitive of the graph. It is kept in
//! lexicographic byte order so membership tests are binary searches and
//! set algebra is a linear merge.
//!
//! # Encoding
//!
//! ```text
//! list  := (len u16 BE | key)* | 0x00 0x00
//! ```
//!
//! Each key is prefixed by its length. An empty list is encoded as a single
//! zero-length header so that "present but empty" survives a round trip
//! through the store.

use crate::error::{CoreError, CoreResult};
use std::cmp::Ordering;

/// Largest key that fits the 2-byte length header.
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// An ordered set of byte keys.
///
/// The set operations assume both operands are sorted and deduplicated,
/// which holds for every value built through this type's API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SortedKeys(Vec<Vec<u8>>);

impl SortedKeys {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Sorts and deduplicates an arbitrary key list.
    #[must_use]
    pub fn sort(mut keys: Vec<Vec<u8>>) -> Self {
        keys.sort();
        keys.dedup();
        Self(keys)
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the position of `key`, if present.
    #[must_use]
    pub fn find(&self, key: &[u8]) -> Option<usize> {
        self.0.binary_search_by(|k| k.as_slice().cmp(key)).ok()
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.find(key).is_some()
    }

    /// Inserts `key`, returning false if it was already present.
    pub fn insert(&mut self, key: &[u8]) -> bool {
        match self.0.binary_search_by(|k| k.as_slice().cmp(key)) {
            Ok(_) => false,
            Err(pos) => {
                self.0.insert(pos, key.to_vec());
                true
            }
        }
    }

    /// Removes `key`, returning false if it was absent.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        match self.find(key) {
            Some(pos) => {
                self.0.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Returns the keys present in either set.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let (a, b) = (&self.0, &other.0);
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => {
                    out.push(a[i].clone());
                    i += 1;
                }
                Ordering::Greater => {
                    out.push(b[j].clone());
                    j += 1;
                }
                Ordering::Equal => {
                    out.push(a[i].clone());
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        Self(out)
    }

    /// Returns the keys of `self` that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let (a, b) = (&self.0, &other.0);
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => {
                    out.push(a[i].clone());
                    i += 1;
                }
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        Self(out)
    }

    /// Returns the keys present in both sets.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let (a, b) = (&self.0, &other.0);
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    out.push(a[i].clone());
                    i += 1;
                    j += 1;
                }
            }
        }
        Self(out)
    }

    /// Returns the keys starting with `prefix`.
    #[must_use]
    pub fn with_prefix(&self, prefix: &[u8]) -> Self {
        let start = self.0.partition_point(|k| k.as_slice() < prefix);
        let len = self.0[start..]
            .iter()
            .take_while(|k| k.starts_with(prefix))
            .count();
        Self(self.0[start..start + len].to_vec())
    }

    /// Iterates the keys in order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.0.iter().map(Vec::as_slice)
    }

    /// Returns the keys as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Vec<u8>] {
        &self.0
    }

    /// Consumes the set, returning the ordered keys.
    #[must_use]
    pub fn into_vec(self) -> Vec<Vec<u8>> {
        self.0
    }

    /// Encodes the set.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidKey`] if a key is empty (it would read
    /// back as the terminator) or longer than [`MAX_KEY_LEN`].
    pub fn marshal(&self) -> CoreResult<Vec<u8>> {
        if self.0.is_empty() {
            return Ok(vec![0, 0]);
        }
        let size: usize = self.0.iter().map(|k| k.len() + 2).sum();
        let mut buf = Vec::with_capacity(size);
        for key in &self.0 {
            if key.is_empty() {
                return Err(CoreError::invalid_key("empty key in edge list"));
            }
            let len = u16::try_from(key.len()).map_err(|_| {
                CoreError::invalid_key(format!(
                    "key of {} bytes exceeds maximum of {MAX_KEY_LEN}",
                    key.len()
                ))
            })?;
            buf.extend_from_slice(&len.to_be_bytes());
            buf.extend_from_slice(key);
        }
        Ok(buf)
    }

    /// Decodes a set produced by [`SortedKeys::marshal`].
    ///
    /// The decoded keys are taken as-is; a well-formed encoding is already
    /// sorted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decode`] on a truncated header, a length running
    /// past the end of `data`, or bytes after the terminating empty entry.
    pub fn unmarshal(data: &[u8]) -> CoreResult<Self> {
        let mut keys = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            if pos + 2 > data.len() {
                return Err(CoreError::decode(format!(
                    "truncated length header at offset {pos}"
                )));
            }
            let len = usize::from(u16::from_be_bytes([data[pos], data[pos + 1]]));
            pos += 2;
            if len == 0 {
                if pos != data.len() {
                    return Err(CoreError::decode(format!(
                        "{} trailing bytes after terminator",
                        data.len() - pos
                    )));
                }
                break;
            }
            if pos + len > data.len() {
                return Err(CoreError::decode(format!(
                    "key of {len} bytes at offset {pos} exceeds remaining {}",
                    data.len() - pos
                )));
            }
            keys.push(data[pos..pos + len].to_vec());
            pos += len;
        }
        Ok(Self(keys))
    }
}

impl From<Vec<Vec<u8>>> for SortedKeys {
    fn from(keys: Vec<Vec<u8>>) -> Self {
        Self::sort(keys)
    }
}

impl FromIterator<Vec<u8>> for SortedKeys {
    fn from_iter<I: IntoIterator<Item = Vec<u8>>>(iter: I) -> Self {
        Self::sort(iter.into_iter().collect())
    }
}

impl IntoIterator for SortedKeys {
    type Item = Vec<u8>;
    type IntoIter = std::vec::IntoIter<Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a SortedKeys {
    type Item = &'a Vec<u8>;
    type IntoIter = std::slice::Iter<'a, Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
