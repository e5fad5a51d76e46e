//! Verify command implementation.

use super::open_store;
use crate::error::{CliError, CliResult};
use crate::keys::display_key;
use dackbox_core::{Config, Graph, RWGraph, SortedKeys};
use dackbox_storage::{FileStore, KvStore};
use std::path::Path;
use tracing::debug;

/// Outcome of checking the graph rows of a store.
#[derive(Debug, Default)]
pub struct VerifyReport {
    /// Number of graph rows read.
    pub rows: usize,
    /// Number of edges decoded.
    pub edges: usize,
    /// Human-readable problems found.
    pub issues: Vec<String>,
}

impl VerifyReport {
    /// Returns true if no problems were found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Decodes every graph row and checks that the rebuilt graph is symmetric.
pub fn verify(store: &FileStore, config: &Config) -> CliResult<VerifyReport> {
    let txn = store.new_read_only_transaction()?;
    let rows = txn.bucket_entries(config.graph_bucket().prefix(), true)?;
    txn.discard();

    let mut report = VerifyReport {
        rows: rows.len(),
        ..VerifyReport::default()
    };
    let mut graph = Graph::new();
    for (from, value) in rows {
        if from.is_empty() {
            report.issues.push("graph row with an empty key".to_string());
            continue;
        }
        match SortedKeys::unmarshal(&value) {
            Ok(tos) => {
                if tos.contains(&from) {
                    debug!(key = %display_key(&from), "row references itself");
                }
                report.edges += tos.len();
                graph.set_refs(&from, tos.into_vec());
            }
            Err(e) => report
                .issues
                .push(format!("row {}: {}", display_key(&from), e)),
        }
    }

    if let Some((from, to)) = graph.find_asymmetric_edge() {
        report.issues.push(format!(
            "edge {} -> {} is missing from one direction",
            display_key(&from),
            display_key(&to)
        ));
    }
    Ok(report)
}

/// Runs the verify command.
pub fn run(path: &Path, config: &Config) -> CliResult<()> {
    let store = open_store(path)?;
    println!("Verifying store at {:?}", path);

    let report = verify(&store, config)?;
    println!("  Graph rows: {}", report.rows);
    println!("  Edges:      {}", report.edges);

    if report.is_ok() {
        println!();
        println!("Verification passed.");
        return Ok(());
    }

    println!();
    for issue in &report.issues {
        println!("  ERROR: {}", issue);
    }
    Err(CliError::VerificationFailed {
        issues: report.issues.len(),
    })
}
