//! # DackBox Core
//!
//! Graph-indexed transaction layer for DackBox.
//!
//! DackBox keeps a directed reference graph between keys next to an ordered
//! key/value store. Transactions see a snapshot of both: their own writes
//! and edge changes are private until commit, and a committed change
//! becomes visible to every transaction opened afterwards.
//!
//! ## Building blocks
//!
//! - [`SortedKeys`] - Ordered key sets with a compact binary encoding
//! - [`Graph`], [`ModifiedGraph`], [`RemoteGraph`], [`CompositeGraph`] -
//!   Adjacency maps and the layered views built from them
//! - [`History`] - Time-stepped graph modifications folded into a master
//!   graph once no reader needs them
//! - [`DackBox`] and [`Transaction`] - The transaction entry points
//! - [`BucketHandler`], [`CachedSearcher`] - Bucketed keys and path search
//! - [`Reader`], [`Upserter`], [`Deleter`] - Typed CRUD helpers
//!
//! ## Example
//!
//! ```rust
//! use dackbox_core::{Config, DackBox, RGraph, RWGraph};
//! use dackbox_storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! let dackbox = DackBox::open(Arc::new(InMemoryStore::new()), None, Config::default()).unwrap();
//!
//! let mut txn = dackbox.new_transaction().unwrap();
//! txn.set(b"deployments\0d1", b"{}").unwrap();
//! txn.graph_mut()
//!     .set_refs(b"deployments\0d1", vec![b"images\0i1".to_vec()]);
//! txn.commit().unwrap();
//!
//! let view = dackbox.new_graph_view();
//! assert_eq!(view.count_refs_to(b"images\0i1"), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bucket;
mod config;
mod crud;
mod dackbox;
mod error;
mod graph;
mod history;
mod persistor;
mod queue;
mod searcher;
mod sortedkeys;
mod transaction;
mod view;

pub use bucket::{BucketHandler, BucketPath, Direction, PathElement, SEPARATOR};
pub use config::Config;
pub use crud::{Deleter, Message, Reader, Upserter};
pub use dackbox::DackBox;
pub use error::{CoreError, CoreResult};
pub use graph::{
    CompositeGraph, Graph, Modification, ModifiedGraph, Overlay, RGraph, RWGraph, RemoteGraph,
    RemoteReadable,
};
pub use history::History;
pub use persistor::Persistor;
pub use queue::{IndexItem, IndexQueue, WaitableQueue};
pub use searcher::{CachedSearcher, ReachabilityChecker};
pub use sortedkeys::{SortedKeys, MAX_KEY_LEN};
pub use transaction::{Transaction, TransactionState};
pub use view::GraphView;
