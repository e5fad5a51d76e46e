//! Engine configuration.

use crate::bucket::BucketHandler;

/// Configuration for opening a [`crate::DackBox`].
///
/// The prefixes name the buckets the engine reserves for itself in the
/// underlying store. Rows are keyed `prefix | 0x00 | key`, like any other
/// bucket, so a prefix only collides with an application bucket of the
/// same name.
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix of the persisted forward-edge rows.
    pub graph_prefix: Vec<u8>,

    /// Prefix of the rows marking keys that still need indexing.
    pub dirty_prefix: Vec<u8>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graph_prefix: b"graph".to_vec(),
            dirty_prefix: b"dirty".to_vec(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the graph row prefix.
    #[must_use]
    pub fn graph_prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.graph_prefix = prefix.into();
        self
    }

    /// Sets the dirty row prefix.
    #[must_use]
    pub fn dirty_prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.dirty_prefix = prefix.into();
        self
    }

    /// Returns the bucket holding the persisted forward-edge rows.
    #[must_use]
    pub fn graph_bucket(&self) -> BucketHandler {
        BucketHandler::new(&self.graph_prefix)
    }

    /// Returns the bucket holding the dirty rows.
    #[must_use]
    pub fn dirty_bucket(&self) -> BucketHandler {
        BucketHandler::new(&self.dirty_prefix)
    }

    /// Returns the store key of the dirty row for `key`.
    #[must_use]
    pub fn dirty_key(&self, key: &[u8]) -> Vec<u8> {
        self.dirty_bucket().get_key(key)
    }
}
