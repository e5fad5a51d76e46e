//! Stress tests for DackBox.
//!
//! These helpers drive an engine from many threads at once. Writers that
//! read-modify-write shared state take an external fence, the way callers
//! of the engine are expected to serialize conflicting transactions.

use dackbox_core::{CoreResult, DackBox, RGraph};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Key holding the counter of [`stress_fenced_counter`].
pub const COUNTER_KEY: &[u8] = b"stress\0counter";

/// Key referencing every node added by [`stress_fenced_hub`].
pub const HUB_KEY: &[u8] = b"stress\0hub";

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct leaf keys the disjoint writers point at.
    pub fan_out: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 100,
            threads: 8,
            fan_out: 16,
        }
    }
}

impl StressConfig {
    /// Returns the number of operations across all threads.
    pub fn total_ops(&self) -> usize {
        self.operations * self.threads
    }
}

/// Reads the counter written by [`stress_fenced_counter`].
pub fn read_counter(dackbox: &DackBox) -> u64 {
    let txn = dackbox
        .new_read_only_transaction()
        .expect("Failed to open transaction");
    decode_counter(txn.get(COUNTER_KEY).expect("Failed to read counter"))
}

fn decode_counter(value: Option<Vec<u8>>) -> u64 {
    value.map_or(0, |bytes| {
        u64::from_le_bytes(bytes.as_slice().try_into().expect("counter is 8 bytes"))
    })
}

fn run_threads<F>(dackbox: &DackBox, config: &StressConfig, op: F) -> StressTestResult
where
    F: Fn(&DackBox, usize, usize) -> CoreResult<()> + Send + Sync + 'static,
{
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let op = Arc::new(op);
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let dackbox = dackbox.clone();
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let op = Arc::clone(&op);
            let operations = config.operations;

            thread::spawn(move || {
                for i in 0..operations {
                    match op(&dackbox, t, i) {
                        Ok(()) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Increments a stored counter once per operation from every thread.
///
/// Each increment is a read-modify-write transaction taken under a shared
/// fence, so the final counter equals the number of successful operations.
pub fn stress_fenced_counter(dackbox: &DackBox, config: &StressConfig) -> StressTestResult {
    let fence = Arc::new(Mutex::new(()));
    run_threads(dackbox, config, move |dackbox, _, _| {
        let _guard = fence.lock();
        let mut txn = dackbox.new_transaction()?;
        let next = decode_counter(txn.get(COUNTER_KEY)?) + 1;
        txn.set(COUNTER_KEY, &next.to_le_bytes())?;
        txn.commit()
    })
}

/// Adds one node per operation to the forward edges of [`HUB_KEY`].
///
/// Adds are fenced, so the hub ends up referencing every node.
pub fn stress_fenced_hub(dackbox: &DackBox, config: &StressConfig) -> StressTestResult {
    let fence = Arc::new(Mutex::new(()));
    run_threads(dackbox, config, move |dackbox, t, i| {
        let _guard = fence.lock();
        let mut txn = dackbox.new_transaction()?;
        txn.graph_mut().add_refs(HUB_KEY, vec![node_key(t, i)]);
        txn.commit()
    })
}

/// Writes one node per operation without any fence.
///
/// Every node is written by exactly one thread and points at one of
/// `fan_out` shared leaves.
pub fn stress_disjoint_writers(dackbox: &DackBox, config: &StressConfig) -> StressTestResult {
    let fan_out = config.fan_out.max(1);
    run_threads(dackbox, config, move |dackbox, t, i| {
        let node = node_key(t, i);
        let mut txn = dackbox.new_transaction()?;
        txn.set(&node, &[1])?;
        txn.graph_mut().set_refs(&node, vec![leaf_key(i % fan_out)]);
        txn.commit()
    })
}

/// Opens and reads graph views while other threads commit.
pub fn stress_views_during_writes(dackbox: &DackBox, config: &StressConfig) -> StressTestResult {
    run_threads(dackbox, config, move |dackbox, t, i| {
        if t % 2 == 0 {
            let mut txn = dackbox.new_transaction()?;
            txn.graph_mut().set_refs(&node_key(t, i), vec![leaf_key(0)]);
            txn.commit()
        } else {
            let view = dackbox.new_graph_view();
            let _ = view.count_refs_to(&leaf_key(0));
            let _ = view.has_refs_from(&node_key(t - 1, i));
            Ok(())
        }
    })
}

/// Returns the key of node `i` written by thread `t`.
pub fn node_key(t: usize, i: usize) -> Vec<u8> {
    format!("node\0{t}-{i}").into_bytes()
}

/// Returns the key of leaf `n`.
pub fn leaf_key(n: usize) -> Vec<u8> {
    format!("leaf\0{n}").into_bytes()
}
