//! Memoized reachability search along bucket paths.

use crate::bucket::{BucketPath, PathElement};
use crate::error::CoreResult;
use crate::graph::RGraph;
use std::collections::HashMap;
use std::fmt;

type Predicate<'a> = Box<dyn FnMut(&[u8]) -> CoreResult<bool> + 'a>;

/// Depth-first search from an id along a fixed [`BucketPath`].
///
/// Layer 0 is the starting key; every following layer holds the filtered
/// refs of a key in the layer before it. The predicate is only asked about
/// keys in the last layer. Results are cached per layer and survive across
/// calls to [`search`](Self::search), so repeated searches over a shared
/// sub-graph reuse earlier work.
///
/// # Example
///
/// ```rust
/// use dackbox_core::{BucketHandler, BucketPath, CachedSearcher, Graph, RWGraph};
///
/// let deployments = BucketHandler::new("deployments");
/// let images = BucketHandler::new("images");
/// let mut graph = Graph::new();
/// graph.set_refs(&deployments.get_key("d1"), vec![images.get_key("i1")]);
///
/// let path = BucketPath::default()
///     .then_forward(deployments)
///     .then_forward(images.clone());
/// let mut searcher = CachedSearcher::new(&graph, path, |key: &[u8]| {
///     Ok(images.get_id(key) == Some(&b"i1"[..]))
/// });
/// assert!(searcher.search(b"d1").unwrap());
/// assert!(!searcher.search(b"d2").unwrap());
/// ```
pub struct CachedSearcher<'a> {
    graph: &'a dyn RGraph,
    path: Vec<PathElement>,
    predicate: Predicate<'a>,
    caches: Vec<HashMap<Vec<u8>, bool>>,
}

impl<'a> CachedSearcher<'a> {
    /// Creates a searcher over `graph`.
    ///
    /// # Panics
    ///
    /// Panics if `path` is empty.
    #[must_use]
    pub fn new<F>(graph: &'a dyn RGraph, path: BucketPath, predicate: F) -> Self
    where
        F: FnMut(&[u8]) -> CoreResult<bool> + 'a,
    {
        let path = path.into_elements();
        assert!(!path.is_empty(), "cannot search along an empty path");
        let caches = vec![HashMap::new(); path.len()];
        Self {
            graph,
            path,
            predicate: Box::new(predicate),
            caches,
        }
    }

    /// Returns true if any key reachable from `start_id` along the path
    /// satisfies the predicate.
    ///
    /// # Errors
    ///
    /// Returns the first error the predicate returns. Nothing is cached for
    /// a search that failed.
    pub fn search(&mut self, start_id: &[u8]) -> CoreResult<bool> {
        let start = self.path[0].bucket.get_key(start_id);
        self.visit(0, &start)
    }

    /// Returns the number of cached results in each layer.
    #[must_use]
    pub fn cached(&self) -> Vec<usize> {
        self.caches.iter().map(HashMap::len).collect()
    }

    fn visit(&mut self, depth: usize, key: &[u8]) -> CoreResult<bool> {
        if let Some(&found) = self.caches[depth].get(key) {
            return Ok(found);
        }

        let found = if depth + 1 == self.path.len() {
            (self.predicate)(key)?
        } else {
            let next = self.path[depth + 1].step(self.graph, key);
            let mut found = false;
            for child in &next {
                if self.visit(depth + 1, child)? {
                    found = true;
                    break;
                }
            }
            found
        };

        self.caches[depth].insert(key.to_vec(), found);
        Ok(found)
    }
}

impl fmt::Debug for CachedSearcher<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedSearcher")
            .field("path", &self.path)
            .field("cached", &self.cached())
            .finish_non_exhaustive()
    }
}

/// Checks whether a bucket can be reached from an id along a path.
///
/// For a path of `n` elements, a search succeeds if some key reached
/// through the first `n - 1` elements has any filtered ref into the last
/// element's bucket, in that element's direction.
#[derive(Debug)]
pub struct ReachabilityChecker<'a> {
    searcher: CachedSearcher<'a>,
}

impl<'a> ReachabilityChecker<'a> {
    /// Creates a checker over `graph`.
    ///
    /// # Panics
    ///
    /// Panics if `path` has fewer than two elements.
    #[must_use]
    pub fn new(graph: &'a dyn RGraph, path: BucketPath) -> Self {
        let mut elements = path.into_elements();
        assert!(
            elements.len() >= 2,
            "reachability needs a start bucket and at least one hop"
        );
        let last = match elements.pop() {
            Some(last) => last,
            None => unreachable!(),
        };
        let predicate = move |key: &[u8]| Ok(!last.step(graph, key).is_empty());
        Self {
            searcher: CachedSearcher::new(graph, BucketPath::new(elements), predicate),
        }
    }

    /// Returns true if the last bucket is reachable from `start_id`.
    ///
    /// # Errors
    ///
    /// Never fails today; the signature matches [`CachedSearcher::search`].
    pub fn search(&mut self, start_id: &[u8]) -> CoreResult<bool> {
        self.searcher.search(start_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BucketHandler;
    use crate::error::CoreError;
    use crate::graph::{Graph, RWGraph};
    use std::cell::Cell;

    struct Buckets {
        deployments: BucketHandler,
        images: BucketHandler,
        components: BucketHandler,
        cves: BucketHandler,
    }

    fn buckets() -> Buckets {
        Buckets {
            deployments: BucketHandler::new("deployments"),
            images: BucketHandler::new("images"),
            components: BucketHandler::new("components"),
            cves: BucketHandler::new("cves"),
        }
    }

    // d1 -> i1 -> {c1, c2}; d2 -> i1; c2 -> cve1
    fn fixture(b: &Buckets) -> Graph {
        let mut graph = Graph::new();
        graph.set_refs(&b.deployments.get_key("d1"), vec![b.images.get_key("i1")]);
        graph.set_refs(&b.deployments.get_key("d2"), vec![b.images.get_key("i1")]);
        graph.set_refs(
            &b.images.get_key("i1"),
            vec![b.components.get_key("c1"), b.components.get_key("c2")],
        );
        graph.set_refs(&b.components.get_key("c2"), vec![b.cves.get_key("cve1")]);
        graph
    }

    fn down_to_components(b: &Buckets) -> BucketPath {
        BucketPath::default()
            .then_forward(b.deployments.clone())
            .then_forward(b.images.clone())
            .then_forward(b.components.clone())
    }

    #[test]
    fn predicate_sees_terminal_layer_only() {
        let b = buckets();
        let graph = fixture(&b);
        let seen = Cell::new(0);
        let components = b.components.clone();
        let mut searcher = CachedSearcher::new(&graph, down_to_components(&b), |key: &[u8]| {
            seen.set(seen.get() + 1);
            assert!(components.has_prefix(key));
            Ok(components.get_id(key) == Some(&b"c2"[..]))
        });

        assert!(searcher.search(b"d1").unwrap());
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn cache_is_reused_across_searches() {
        let b = buckets();
        let graph = fixture(&b);
        let calls = Cell::new(0);
        let mut searcher = CachedSearcher::new(&graph, down_to_components(&b), |_: &[u8]| {
            calls.set(calls.get() + 1);
            Ok(false)
        });

        assert!(!searcher.search(b"d1").unwrap());
        assert_eq!(calls.get(), 2);
        // d2 shares i1 with d1, so nothing new reaches the predicate.
        assert!(!searcher.search(b"d2").unwrap());
        assert_eq!(calls.get(), 2);
        assert_eq!(searcher.cached(), vec![2, 1, 2]);
    }

    #[test]
    fn unknown_start_is_not_found() {
        let b = buckets();
        let graph = fixture(&b);
        let mut searcher = CachedSearcher::new(&graph, down_to_components(&b), |_: &[u8]| Ok(true));
        assert!(!searcher.search(b"missing").unwrap());
    }

    #[test]
    fn predicate_error_propagates() {
        let b = buckets();
        let graph = fixture(&b);
        let mut searcher = CachedSearcher::new(&graph, down_to_components(&b), |_: &[u8]| {
            Err(CoreError::invalid_operation("boom"))
        });

        assert!(matches!(
            searcher.search(b"d1"),
            Err(CoreError::InvalidOperation { .. })
        ));
        assert_eq!(searcher.cached(), vec![0, 0, 0]);
    }

    #[test]
    fn backward_hops() {
        let b = buckets();
        let graph = fixture(&b);
        let path = BucketPath::default()
            .then_backward(b.cves.clone())
            .then_backward(b.components.clone())
            .then_backward(b.images.clone());
        let images = b.images.clone();
        let mut searcher = CachedSearcher::new(&graph, path, |key: &[u8]| {
            Ok(images.get_id(key) == Some(&b"i1"[..]))
        });
        assert!(searcher.search(b"cve1").unwrap());
    }

    #[test]
    fn reachability_checks_last_hop() {
        let b = buckets();
        let graph = fixture(&b);
        let to_cves = down_to_components(&b).then_forward(b.cves.clone());
        let mut checker = ReachabilityChecker::new(&graph, to_cves);
        assert!(checker.search(b"d1").unwrap());
        assert!(!checker.search(b"d3").unwrap());

        let mut direct = ReachabilityChecker::new(
            &graph,
            BucketPath::default()
                .then_forward(b.components.clone())
                .then_forward(b.cves.clone()),
        );
        assert!(direct.search(b"c2").unwrap());
        assert!(!direct.search(b"c1").unwrap());
    }

    #[test]
    #[should_panic(expected = "empty path")]
    fn empty_path_panics() {
        let graph = Graph::new();
        let _ = CachedSearcher::new(&graph, BucketPath::default(), |_: &[u8]| Ok(true));
    }

    #[test]
    #[should_panic(expected = "at least one hop")]
    fn single_element_reachability_panics() {
        let graph = Graph::new();
        let path = BucketPath::default().then_forward(BucketHandler::new("a"));
        let _ = ReachabilityChecker::new(&graph, path);
    }
}
