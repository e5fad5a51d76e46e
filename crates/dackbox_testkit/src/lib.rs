//! # DackBox Testkit
//!
//! Test utilities for DackBox.
//!
//! This crate provides:
//! - Test fixtures over in-memory and file-backed stores
//! - Property-based test generators using proptest
//! - Stress testing utilities for concurrent transactions
//!
//! ## Usage
//!
//! ```rust
//! use dackbox_core::{RGraph, RWGraph};
//! use dackbox_testkit::prelude::*;
//!
//! let test = TestDackBox::memory();
//! let mut txn = test.new_transaction().unwrap();
//! txn.graph_mut().set_refs(b"a", keys(&["b"]));
//! txn.commit().unwrap();
//! assert_eq!(test.new_graph_view().count_refs_to(b"b"), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
