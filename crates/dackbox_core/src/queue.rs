//! Queue of keys awaiting secondary indexing.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Receives keys whose stored value changed in a committed transaction.
///
/// A `None` value means the key was removed from the primary store.
pub trait IndexQueue: Send + Sync {
    /// Enqueues one changed key.
    fn push(&self, key: Vec<u8>, value: Option<Vec<u8>>);
}

/// One queued change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexItem {
    /// The changed key.
    pub key: Vec<u8>,
    /// The new value, or `None` for a removal.
    pub value: Option<Vec<u8>>,
}

/// A FIFO [`IndexQueue`] that consumers can block on.
///
/// # Example
///
/// ```rust
/// use dackbox_core::{IndexQueue, WaitableQueue};
/// use std::time::Duration;
///
/// let queue = WaitableQueue::new();
/// queue.push(b"img\0a".to_vec(), None);
/// let item = queue.wait_pop(Duration::from_millis(10)).unwrap();
/// assert_eq!(item.key, b"img\0a");
/// ```
#[derive(Debug, Default)]
pub struct WaitableQueue {
    items: Mutex<VecDeque<IndexItem>>,
    ready: Condvar,
}

impl WaitableQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes the oldest item without waiting.
    #[must_use]
    pub fn pop(&self) -> Option<IndexItem> {
        self.items.lock().pop_front()
    }

    /// Removes the oldest item, waiting up to `timeout` for one to arrive.
    #[must_use]
    pub fn wait_pop(&self, timeout: Duration) -> Option<IndexItem> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();
        while items.is_empty() {
            if self.ready.wait_until(&mut items, deadline).timed_out() {
                break;
            }
        }
        items.pop_front()
    }

    /// Removes and returns every queued item.
    #[must_use]
    pub fn drain(&self) -> Vec<IndexItem> {
        self.items.lock().drain(..).collect()
    }

    /// Returns the number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl IndexQueue for WaitableQueue {
    fn push(&self, key: Vec<u8>, value: Option<Vec<u8>>) {
        self.items.lock().push_back(IndexItem { key, value });
        self.ready.notify_one();
    }
}
