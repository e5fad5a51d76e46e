//! Test fixtures and engine helpers.
//!
//! Provides convenience functions for opening engines over temporary
//! stores and for building common graph scenarios.

use dackbox_core::{Config, DackBox, IndexQueue, WaitableQueue};
use dackbox_storage::{FileStore, InMemoryStore, KvStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A test engine with automatic cleanup.
pub struct TestDackBox {
    /// The engine instance.
    pub dackbox: DackBox,
    /// Queue receiving the keys marked dirty by commits.
    pub queue: Arc<WaitableQueue>,
    store: Arc<dyn KvStore>,
    config: Config,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestDackBox {
    /// Creates an engine over a fresh in-memory store.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::default())
    }

    /// Creates an engine over a fresh in-memory store with `config`.
    pub fn memory_with_config(config: Config) -> Self {
        let store: Arc<dyn KvStore> = Arc::new(InMemoryStore::new());
        Self::open(store, config, None)
    }

    /// Creates an engine over a file store in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(temp_dir.path()).expect("Failed to open file store");
        Self::open(Arc::new(store), Config::default(), Some(temp_dir))
    }

    fn open(store: Arc<dyn KvStore>, config: Config, temp_dir: Option<TempDir>) -> Self {
        let queue = Arc::new(WaitableQueue::new());
        let dackbox = DackBox::open(
            Arc::clone(&store),
            Some(Arc::clone(&queue) as Arc<dyn IndexQueue>),
            config.clone(),
        )
        .expect("Failed to open engine");
        Self {
            dackbox,
            queue,
            store,
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the store directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().to_path_buf())
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Closes the engine and opens it again over the same data.
    ///
    /// In-memory engines keep their store; file engines reopen the
    /// directory, replaying the log. Every transaction and view must have
    /// ended before calling this.
    pub fn reopen(self) -> Self {
        let Self {
            dackbox,
            store,
            config,
            _temp_dir,
            ..
        } = self;
        drop(dackbox);
        match _temp_dir {
            Some(dir) => {
                drop(store);
                let store = FileStore::open(dir.path()).expect("Failed to reopen file store");
                Self::open(Arc::new(store), config, Some(dir))
            }
            None => Self::open(store, config, None),
        }
    }
}

impl std::ops::Deref for TestDackBox {
    type Target = DackBox;

    fn deref(&self) -> &Self::Target {
        &self.dackbox
    }
}

/// Runs a test with a temporary in-memory engine.
///
/// # Example
///
/// ```rust
/// use dackbox_core::RWGraph;
/// use dackbox_testkit::with_temp_dackbox;
///
/// with_temp_dackbox(|dackbox| {
///     let mut txn = dackbox.new_transaction().unwrap();
///     txn.graph_mut().set_refs(b"a", vec![b"b".to_vec()]);
///     txn.commit().unwrap();
/// });
/// ```
pub fn with_temp_dackbox<F, R>(f: F) -> R
where
    F: FnOnce(&DackBox) -> R,
{
    let test = TestDackBox::memory();
    f(&test.dackbox)
}

/// Runs a test with a temporary file-backed engine.
pub fn with_file_dackbox<F, R>(f: F) -> R
where
    F: FnOnce(&DackBox, &Path) -> R,
{
    let test = TestDackBox::file();
    let path = test.path().expect("File engine should have a path");
    f(&test.dackbox, &path)
}

/// Converts string keys into owned byte keys.
pub fn keys(list: &[&str]) -> Vec<Vec<u8>> {
    list.iter().map(|k| k.as_bytes().to_vec()).collect()
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use dackbox_core::BucketHandler;

    /// Buckets of the deployment scenario.
    #[derive(Debug, Clone)]
    pub struct Buckets {
        /// Top-level objects.
        pub deployments: BucketHandler,
        /// Referenced by deployments.
        pub images: BucketHandler,
        /// Referenced by images.
        pub components: BucketHandler,
        /// Referenced by components.
        pub cves: BucketHandler,
    }

    impl Default for Buckets {
        fn default() -> Self {
            Self {
                deployments: BucketHandler::new("deployments"),
                images: BucketHandler::new("images"),
                components: BucketHandler::new("components"),
                cves: BucketHandler::new("cves"),
            }
        }
    }

    /// Commits a four-level graph: `deployment_count` deployments sharing
    /// one image per pair, every image owning `components_per_image`
    /// components, and every other component carrying one CVE.
    pub fn deployment_graph(
        dackbox: &DackBox,
        deployment_count: usize,
        components_per_image: usize,
    ) -> Buckets {
        let buckets = Buckets::default();
        let mut txn = dackbox.new_transaction().expect("Failed to open transaction");
        let graph = txn.graph_mut();

        for d in 0..deployment_count {
            let image = format!("img-{}", d / 2);
            graph.set_refs(
                &buckets.deployments.get_key(format!("dep-{d}")),
                vec![buckets.images.get_key(&image)],
            );
        }
        for i in 0..deployment_count.div_ceil(2) {
            let image = buckets.images.get_key(format!("img-{i}"));
            let components = (0..components_per_image)
                .map(|c| buckets.components.get_key(format!("cmp-{i}-{c}")))
                .collect();
            graph.set_refs(&image, components);
            for c in (0..components_per_image).step_by(2) {
                graph.set_refs(
                    &buckets.components.get_key(format!("cmp-{i}-{c}")),
                    vec![buckets.cves.get_key(format!("cve-{i}-{c}"))],
                );
            }
        }

        txn.commit().expect("Failed to commit scenario");
        buckets
    }
}
