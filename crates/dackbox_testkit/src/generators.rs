//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, key sets and edge mutation
//! sequences, plus helpers to replay them against any graph.

use dackbox_core::{DackBox, Graph, RGraph, RWGraph, SortedKeys};
use proptest::prelude::*;

/// One edge mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphOp {
    /// Replace the forward edges of a key.
    Set {
        /// Source key.
        from: Vec<u8>,
        /// New forward edges.
        to: Vec<Vec<u8>>,
    },
    /// Add forward edges to a key.
    Add {
        /// Source key.
        from: Vec<u8>,
        /// Added forward edges.
        to: Vec<Vec<u8>>,
    },
    /// Remove every edge leaving a key.
    DeleteFrom(Vec<u8>),
    /// Remove every edge entering a key.
    DeleteTo(Vec<u8>),
}

impl GraphOp {
    /// Applies the mutation to `graph`.
    pub fn apply(&self, graph: &mut dyn RWGraph) {
        match self {
            Self::Set { from, to } => graph.set_refs(from, to.clone()),
            Self::Add { from, to } => graph.add_refs(from, to.clone()),
            Self::DeleteFrom(from) => graph.delete_refs_from(from),
            Self::DeleteTo(to) => graph.delete_refs_to(to),
        }
    }
}

/// Strategy for generating non-empty keys from a small alphabet, so that
/// generated operations collide often.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::string::string_regex("[a-f]{1,2}")
        .expect("Invalid regex")
        .prop_map(String::into_bytes)
}

/// Strategy for generating arbitrary non-empty binary keys.
pub fn binary_key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..24)
}

/// Strategy for generating sorted key sets.
pub fn sorted_keys_strategy() -> impl Strategy<Value = SortedKeys> {
    prop::collection::vec(binary_key_strategy(), 0..16).prop_map(SortedKeys::sort)
}

/// Strategy for generating a single edge mutation.
pub fn graph_op_strategy() -> impl Strategy<Value = GraphOp> {
    let targets = || prop::collection::vec(key_strategy(), 0..4);
    prop_oneof![
        3 => (key_strategy(), targets()).prop_map(|(from, to)| GraphOp::Set { from, to }),
        2 => (key_strategy(), targets()).prop_map(|(from, to)| GraphOp::Add { from, to }),
        1 => key_strategy().prop_map(GraphOp::DeleteFrom),
        1 => key_strategy().prop_map(GraphOp::DeleteTo),
    ]
}

/// Strategy for generating a sequence of edge mutations.
pub fn op_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<GraphOp>> {
    prop::collection::vec(graph_op_strategy(), min_ops..max_ops)
}

/// Replays `ops` on a fresh in-memory graph.
pub fn model_graph(ops: &[GraphOp]) -> Graph {
    let mut graph = Graph::new();
    for op in ops {
        op.apply(&mut graph);
    }
    graph
}

/// Replays `ops` through sequential transactions of at most `batch` ops
/// each.
pub fn commit_ops(dackbox: &DackBox, ops: &[GraphOp], batch: usize) {
    for chunk in ops.chunks(batch.max(1)) {
        let mut txn = dackbox.new_transaction().expect("Failed to open transaction");
        for op in chunk {
            op.apply(txn.graph_mut());
        }
        txn.commit().expect("Failed to commit");
    }
}

/// Returns every key mentioned by `ops`.
pub fn touched_keys(ops: &[GraphOp]) -> SortedKeys {
    let mut keys = Vec::new();
    for op in ops {
        match op {
            GraphOp::Set { from, to } | GraphOp::Add { from, to } => {
                keys.push(from.clone());
                keys.extend(to.iter().cloned());
            }
            GraphOp::DeleteFrom(key) | GraphOp::DeleteTo(key) => keys.push(key.clone()),
        }
    }
    SortedKeys::sort(keys)
}

/// Asserts that `actual` agrees with `expected` on every key in `keys`.
pub fn assert_same_edges(expected: &dyn RGraph, actual: &dyn RGraph, keys: &SortedKeys) {
    for key in keys {
        assert_eq!(
            expected.get_refs_from(key),
            actual.get_refs_from(key),
            "forward edges of {:?}",
            String::from_utf8_lossy(key)
        );
        assert_eq!(
            expected.get_refs_to(key),
            actual.get_refs_to(key),
            "backward edges of {:?}",
            String::from_utf8_lossy(key)
        );
        assert_eq!(
            expected.has_refs_from(key),
            actual.has_refs_from(key),
            "forward entry of {:?}",
            String::from_utf8_lossy(key)
        );
    }
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestDackBox;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_keys_are_storable(key in key_strategy()) {
            prop_assert!(!key.is_empty());
            prop_assert!(key.len() <= 2);
        }

        #[test]
        fn model_graph_stays_symmetric(ops in op_sequence_strategy(0, 40)) {
            let graph = model_graph(&ops);
            prop_assert_eq!(graph.find_asymmetric_edge(), None);
        }

        #[test]
        fn committed_ops_match_model(ops in op_sequence_strategy(1, 30), batch in 1usize..4) {
            let test = TestDackBox::memory();
            commit_ops(&test, &ops, batch);

            let expected = model_graph(&ops);
            let keys = touched_keys(&ops);
            let view = test.new_graph_view();
            assert_same_edges(&expected, &view, &keys);
        }

        #[test]
        fn reloaded_graph_matches_model(ops in op_sequence_strategy(1, 30)) {
            let test = TestDackBox::memory();
            commit_ops(&test, &ops, 2);

            let test = test.reopen();
            let expected = model_graph(&ops);
            let view = test.new_graph_view();
            assert_same_edges(&expected, &view, &touched_keys(&ops));
        }
    }
}
