//! Benchmark utilities.

use dackbox_core::DackBox;
use rand::Rng;

/// Generates `count` keys of the form `bucket\0<n>`.
pub fn bucket_keys(bucket: &str, count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| {
            let mut key = bucket.as_bytes().to_vec();
            key.push(0);
            key.extend_from_slice(format!("{:08}", i).as_bytes());
            key
        })
        .collect()
}

/// Generates random bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Picks `count` random keys out of `pool`.
pub fn sample_keys(pool: &[Vec<u8>], count: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| pool[rng.gen_range(0..pool.len())].clone())
        .collect()
}

/// Commits a two-level graph: `parents` keys each referencing `fan_out`
/// random children out of `children` keys.
pub fn populate(dackbox: &DackBox, parents: usize, children: usize, fan_out: usize) {
    let parent_keys = bucket_keys("parent", parents);
    let child_keys = bucket_keys("child", children);
    let mut txn = dackbox.new_transaction().unwrap();
    for parent in &parent_keys {
        txn.graph_mut()
            .set_refs(parent, sample_keys(&child_keys, fan_out));
    }
    txn.commit().unwrap();
}
