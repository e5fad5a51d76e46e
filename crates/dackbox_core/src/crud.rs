//! Typed read, upsert and delete helpers.
//!
//! These wrap a [`Transaction`] with a serde message type so callers never
//! handle encoded bytes or graph bookkeeping directly:
//!
//! - [`Reader`] - Decodes stored values
//! - [`Upserter`] - Stores values, links them to a parent and queues them
//!   for indexing
//! - [`Deleter`] - Removes values and their edges, optionally cascading to
//!   children nothing else references

use crate::bucket::BucketHandler;
use crate::error::{CoreError, CoreResult};
use crate::transaction::Transaction;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

/// A value stored through the CRUD helpers, encoded as CBOR.
///
/// Implemented for every serde type.
pub trait Message: Serialize + DeserializeOwned {
    /// Encodes the message.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Codec`] if serialization fails.
    fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(self, &mut out).map_err(|e| CoreError::codec(e.to_string()))?;
        Ok(out)
    }

    /// Decodes a message.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Codec`] if `bytes` is not a valid encoding.
    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))
    }
}

impl<T: Serialize + DeserializeOwned> Message for T {}

/// Reads typed values.
pub struct Reader<M> {
    _marker: PhantomData<fn() -> M>,
}

impl<M: Message> Reader<M> {
    /// Creates a reader.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    /// Reads and decodes the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the value does not decode.
    pub fn read_in(&self, key: &[u8], txn: &Transaction) -> CoreResult<Option<M>> {
        txn.get(key)?.map(|bytes| M::decode(&bytes)).transpose()
    }

    /// Returns true if a value is stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn exists_in(&self, key: &[u8], txn: &Transaction) -> CoreResult<bool> {
        Ok(txn.get(key)?.is_some())
    }

    /// Counts the values in `bucket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn count_in(&self, bucket: &BucketHandler, txn: &Transaction) -> CoreResult<usize> {
        txn.bucket_key_count(bucket.prefix())
    }

    /// Returns the full keys of every value in `bucket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn read_keys_in(
        &self,
        bucket: &BucketHandler,
        txn: &Transaction,
    ) -> CoreResult<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        txn.bucket_key_for_each(bucket.prefix(), false, |key| {
            keys.push(key.to_vec());
            Ok(())
        })?;
        Ok(keys)
    }

    /// Reads and decodes every value in `bucket`, in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails or a value does not decode.
    pub fn read_all_in(&self, bucket: &BucketHandler, txn: &Transaction) -> CoreResult<Vec<M>> {
        let mut values = Vec::new();
        txn.bucket_for_each(bucket.prefix(), true, |_, value| {
            values.push(M::decode(value)?);
            Ok(())
        })?;
        Ok(values)
    }
}

impl<M: Message> Default for Reader<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for Reader<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader").finish()
    }
}

type KeyFn<M> = Box<dyn Fn(&M) -> Vec<u8> + Send + Sync>;

/// Stores typed values.
///
/// # Example
///
/// ```rust
/// use dackbox_core::{BucketHandler, Config, DackBox, Reader, RGraph, Upserter};
/// use dackbox_storage::InMemoryStore;
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
///
/// #[derive(Serialize, Deserialize, PartialEq, Debug)]
/// struct Image {
///     id: String,
/// }
///
/// let images = BucketHandler::new("images");
/// let upserter = Upserter::new({
///     let images = images.clone();
///     move |image: &Image| images.get_key(&image.id)
/// });
///
/// let dackbox = DackBox::open(Arc::new(InMemoryStore::new()), None, Config::default()).unwrap();
/// let mut txn = dackbox.new_transaction().unwrap();
/// let key = upserter
///     .upsert_in(Some(&b"deployments\0d1"[..]), &Image { id: "i1".into() }, &mut txn)
///     .unwrap();
/// assert_eq!(txn.graph().count_refs_to(&key), 1);
/// txn.commit().unwrap();
///
/// let txn = dackbox.new_read_only_transaction().unwrap();
/// let image: Option<Image> = Reader::new().read_in(&key, &txn).unwrap();
/// assert_eq!(image, Some(Image { id: "i1".into() }));
/// ```
pub struct Upserter<M> {
    key_fn: KeyFn<M>,
    add_to_index: bool,
}

impl<M: Message> Upserter<M> {
    /// Creates an upserter that stores each message under `key_fn(msg)`.
    #[must_use]
    pub fn new<F>(key_fn: F) -> Self
    where
        F: Fn(&M) -> Vec<u8> + Send + Sync + 'static,
    {
        Self {
            key_fn: Box::new(key_fn),
            add_to_index: false,
        }
    }

    /// Sets whether upserted keys are marked for indexing.
    #[must_use]
    pub fn add_to_index(mut self, add_to_index: bool) -> Self {
        self.add_to_index = add_to_index;
        self
    }

    /// Returns the key `msg` is stored under.
    #[must_use]
    pub fn key_of(&self, msg: &M) -> Vec<u8> {
        (self.key_fn)(msg)
    }

    /// Stores `msg`, linking it from `parent_key` when one is given.
    ///
    /// Returns the key the message was stored under.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the transaction rejects the
    /// write.
    pub fn upsert_in(
        &self,
        parent_key: Option<&[u8]>,
        msg: &M,
        txn: &mut Transaction,
    ) -> CoreResult<Vec<u8>> {
        let key = self.key_of(msg);
        let value = msg.encode()?;
        txn.set(&key, &value)?;
        if let Some(parent) = parent_key {
            txn.graph_mut().add_refs(parent, vec![key.clone()]);
        }
        if self.add_to_index {
            txn.mark_dirty(&key, Some(value))?;
        }
        Ok(key)
    }
}

impl<M> fmt::Debug for Upserter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upserter")
            .field("add_to_index", &self.add_to_index)
            .finish_non_exhaustive()
    }
}

/// Removes values and their edges.
#[derive(Debug, Default)]
pub struct Deleter {
    shared: bool,
    remove_from_index: bool,
    gc: Option<(BucketHandler, Box<Deleter>)>,
}

impl Deleter {
    /// Creates a deleter with every option off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether keys still referenced by anything are kept.
    #[must_use]
    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    /// Sets whether deleted keys are marked for removal from the index.
    #[must_use]
    pub fn remove_from_index(mut self, remove_from_index: bool) -> Self {
        self.remove_from_index = remove_from_index;
        self
    }

    /// Deletes children in `bucket` left unreferenced, using `deleter`.
    #[must_use]
    pub fn gc(mut self, bucket: BucketHandler, deleter: Deleter) -> Self {
        self.gc = Some((bucket, Box::new(deleter)));
        self
    }

    /// Deletes `key`, its value and every edge touching it.
    ///
    /// Returns false if the key was kept because it is shared and still
    /// referenced.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction rejects a write.
    pub fn delete_in(&self, key: &[u8], txn: &mut Transaction) -> CoreResult<bool> {
        if self.shared && txn.graph().count_refs_to(key) > 0 {
            debug!(key = ?String::from_utf8_lossy(key), "kept shared key");
            return Ok(false);
        }

        let children = self
            .gc
            .as_ref()
            .map(|(bucket, _)| bucket.get_filtered_refs_from(txn.graph(), key))
            .unwrap_or_default();

        txn.delete(key)?;
        let graph = txn.graph_mut();
        graph.delete_refs_from(key);
        graph.delete_refs_to(key);
        if self.remove_from_index {
            txn.mark_dirty(key, None)?;
        }

        if let Some((_, child_deleter)) = &self.gc {
            for child in &children {
                if txn.graph().count_refs_to(child) == 0 {
                    child_deleter.delete_in(child, txn)?;
                }
            }
        }
        Ok(true)
    }
}
