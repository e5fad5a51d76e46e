//! Versioned graph over logical time-steps.
//!
//! History keeps a settled `master` graph plus every committed modification
//! that some open view may still need to see as a separate layer. Holding a
//! time-step pins the view at that step; releasing it lets modifications no
//! longer needed by any holder fold into `master`.
//!
//! # Time-steps
//!
//! - [`History::hold`] pins the current step without advancing it
//! - [`History::step_forward`] advances the step once per committed write
//! - [`History::apply`] records a modification at the current step
//!
//! A view of step `ts` is `master` overlaid by every pending modification
//! recorded at or before `ts`. Each modification is rebased onto the head
//! (`master` plus everything pending) when it is recorded, so its backward
//! entries reflect writers that committed after it was read.

use crate::graph::{CompositeGraph, Graph, ModifiedGraph, RGraph, RWGraph};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::trace;

/// Versioned reference graph.
///
/// `hold` and `view` take `&self` so that many transactions can pin and read
/// concurrently under a shared lock. Everything that changes `master` or the
/// pending set takes `&mut self`.
#[derive(Debug, Default)]
pub struct History {
    master: Graph,
    pushed: BTreeMap<u64, ModifiedGraph>,
    /// Held time-steps and how many holders each has.
    watched: Mutex<BTreeMap<u64, usize>>,
    curr_step: u64,
}

impl History {
    /// Creates a history whose settled state is `master`.
    #[must_use]
    pub fn new(master: Graph) -> Self {
        Self {
            master,
            ..Self::default()
        }
    }

    /// Pins the current time-step and returns it.
    pub fn hold(&self) -> u64 {
        let ts = self.curr_step;
        *self.watched.lock().entry(ts).or_insert(0) += 1;
        ts
    }

    /// Returns the graph as of time-step `ts`.
    ///
    /// # Panics
    ///
    /// Panics if `ts` is not currently held. Viewing an unpinned step would
    /// read state that may already have been folded away.
    #[must_use]
    pub fn view(&self, ts: u64) -> CompositeGraph<'_> {
        assert!(
            self.watched.lock().contains_key(&ts),
            "viewing time-step {ts} which is not held"
        );
        let mods = self.pushed.range(..=ts).map(|(_, m)| m).collect();
        CompositeGraph::new(&self.master, mods)
    }

    /// Drops one hold on `ts` and folds whatever no holder needs anymore.
    ///
    /// Returns false, changing nothing, if `ts` was not held.
    pub fn release(&mut self, ts: u64) -> bool {
        let watched = self.watched.get_mut();
        match watched.get_mut(&ts) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                watched.remove(&ts);
            }
            None => return false,
        }
        self.fold();
        true
    }

    /// Advances the current time-step and returns the new value.
    pub fn step_forward(&mut self) -> u64 {
        self.curr_step += 1;
        self.curr_step
    }

    /// Rebases `diff` onto the head and records it as pending at the
    /// current time-step.
    pub fn apply(&mut self, diff: ModifiedGraph) {
        let diff = {
            let head = CompositeGraph::new(&self.master, self.pushed.values().collect());
            diff.rebase(&head)
        };
        trace!(
            ts = self.curr_step,
            from_keys = diff.changes().modified_from().len(),
            "applying modification"
        );
        self.pushed.insert(self.curr_step, diff);
        self.fold();
    }

    /// Returns the current time-step.
    #[must_use]
    pub fn current_step(&self) -> u64 {
        self.curr_step
    }

    /// Returns the settled graph.
    #[must_use]
    pub fn master(&self) -> &Graph {
        &self.master
    }

    /// Returns the number of modifications not yet folded into `master`.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pushed.len()
    }

    /// Returns the number of distinct held time-steps.
    #[must_use]
    pub fn held(&self) -> usize {
        self.watched.lock().len()
    }

    /// Folds every modification at or before the earliest held step, or all
    /// of them when nothing is held, in ascending step order.
    fn fold(&mut self) {
        let watermark = self.watched.get_mut().keys().next().copied();
        let keep = match watermark {
            Some(ts) => self.pushed.split_off(&ts.saturating_add(1)),
            None => BTreeMap::new(),
        };
        let ready = std::mem::replace(&mut self.pushed, keep);
        if ready.is_empty() {
            return;
        }

        let count = ready.len();
        for diff in ready.into_values() {
            let (graph, changes) = diff.into_parts();
            for from in changes.modified_from().iter() {
                match graph.refs_from(from) {
                    Some(tos) => self.master.set_refs(from, tos.as_slice().to_vec()),
                    None => self.master.delete_refs_from(from),
                }
            }
        }
        trace!(count, ?watermark, "folded modifications into master");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testutil::{keys, refs};

    fn diff_setting(from: &str, to: &[&str]) -> ModifiedGraph {
        let mut diff = ModifiedGraph::new();
        diff.set_refs(from.as_bytes(), refs(to));
        diff
    }

    fn commit(history: &mut History, diff: ModifiedGraph) {
        history.step_forward();
        history.apply(diff);
    }

    #[test]
    fn unheld_history_folds_immediately() {
        let mut history = History::default();
        commit(&mut history, diff_setting("a", &["x"]));
        assert_eq!(history.pending(), 0);
        assert_eq!(history.current_step(), 1);
        assert_eq!(history.master().get_refs_from(b"a"), keys(&["x"]));
    }

    #[test]
    fn older_holder_does_not_see_later_commit() {
        let mut history = History::default();
        let ts0 = history.hold();
        commit(&mut history, diff_setting("a", &["x"]));
        let ts1 = history.hold();

        assert!(!history.view(ts0).has_refs_from(b"a"));
        assert_eq!(history.view(ts1).get_refs_from(b"a"), keys(&["x"]));
        assert_eq!(history.pending(), 1);

        assert!(history.release(ts0));
        assert_eq!(history.pending(), 0);
        assert_eq!(history.view(ts1).get_refs_from(b"a"), keys(&["x"]));
        assert!(history.release(ts1));
        assert_eq!(history.held(), 0);
    }

    #[test]
    fn later_release_keeps_older_view_intact() {
        let mut history = History::default();
        let ts0 = history.hold();
        commit(&mut history, diff_setting("a", &["x"]));
        let ts1 = history.hold();
        commit(&mut history, diff_setting("a", &["y"]));

        assert!(history.release(ts1));
        assert_eq!(history.pending(), 2);
        assert!(!history.view(ts0).has_refs_from(b"a"));
        assert_eq!(history.view(ts0).depth(), 0);

        assert!(history.release(ts0));
        assert_eq!(history.master().get_refs_from(b"a"), keys(&["y"]));
        assert_eq!(history.master().get_refs_to(b"x"), keys(&[]));
    }

    #[test]
    fn pending_layers_stay_transposed() {
        let mut history = History::default();
        let ts0 = history.hold();
        // Each diff was recorded against the empty snapshot at `ts0`.
        commit(&mut history, diff_setting("a", &["y"]));
        commit(&mut history, diff_setting("b", &["y"]));
        let ts2 = history.hold();
        commit(&mut history, diff_setting("a", &["x"]));
        let ts3 = history.hold();
        assert_eq!(history.pending(), 3);

        assert_eq!(history.view(ts2).get_refs_to(b"y"), keys(&["a", "b"]));
        {
            let view = history.view(ts3);
            assert_eq!(view.get_refs_to(b"y"), keys(&["b"]));
            assert_eq!(view.get_refs_to(b"x"), keys(&["a"]));
            assert_eq!(view.get_refs_from(b"a"), keys(&["x"]));
            assert_eq!(view.count_refs_to(b"y"), 1);
        }
        assert!(!history.view(ts0).has_refs_to(b"y"));

        assert!(history.release(ts0));
        assert!(history.release(ts2));
        assert!(history.release(ts3));
        assert_eq!(history.master().find_asymmetric_edge(), None);
        assert_eq!(history.master().get_refs_to(b"y"), keys(&["b"]));
        assert_eq!(history.master().get_refs_to(b"x"), keys(&["a"]));
    }

    #[test]
    fn shared_holds_are_counted() {
        let mut history = History::default();
        let first = history.hold();
        let second = history.hold();
        assert_eq!(first, second);

        commit(&mut history, diff_setting("a", &["x"]));
        assert!(history.release(first));
        assert_eq!(history.pending(), 1);
        assert!(!history.view(second).has_refs_from(b"a"));

        assert!(history.release(second));
        assert_eq!(history.pending(), 0);
    }

    #[test]
    fn double_release_is_a_no_op() {
        let mut history = History::default();
        let ts = history.hold();
        assert!(history.release(ts));
        assert!(!history.release(ts));
        assert!(!history.release(42));
    }

    #[test]
    fn fold_applies_deletions() {
        let mut master = Graph::new();
        master.set_refs(b"a", refs(&["x"]));
        master.set_refs(b"b", refs(&["x"]));
        let mut history = History::new(master.copy());

        let mut diff = ModifiedGraph::from_graph(master);
        diff.delete_refs_to(b"x");
        commit(&mut history, diff);

        assert!(!history.master().has_refs_from(b"a"));
        assert!(!history.master().has_refs_to(b"x"));
        assert_eq!(history.master().find_asymmetric_edge(), None);
    }

    #[test]
    #[should_panic(expected = "not held")]
    fn viewing_unheld_step_panics() {
        let history = History::default();
        let _ = history.view(0);
    }
}
