//! Inspect command implementation.

use super::open_store;
use crate::error::CliResult;
use crate::OutputFormat;
use dackbox_core::{Config, Persistor};
use dackbox_storage::{FileStore, KvStore};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Log file size in bytes.
    pub log_size: u64,
    /// Number of live rows.
    pub total_rows: usize,
    /// Number of persisted graph rows.
    pub graph_rows: usize,
    /// Number of keys waiting for indexing.
    pub dirty_rows: usize,
    /// Number of rows holding application data.
    pub data_rows: usize,
    /// Number of keys with forward edges.
    pub from_keys: usize,
    /// Number of keys with backward edges.
    pub to_keys: usize,
    /// Number of edges.
    pub edges: usize,
}

/// Gathers statistics about an open store.
pub fn inspect(store: &FileStore, config: &Config) -> CliResult<InspectResult> {
    let txn = store.new_read_only_transaction()?;
    let total_rows = txn.bucket_key_count(b"")?;
    let graph_rows = txn.bucket_key_count(config.graph_bucket().prefix())?;
    let dirty_rows = txn.bucket_key_count(config.dirty_bucket().prefix())?;
    let graph = Persistor::new(&config.graph_prefix).load(&*txn)?;
    txn.discard();

    Ok(InspectResult {
        path: store.path().display().to_string(),
        log_size: store.log_size()?,
        total_rows,
        graph_rows,
        dirty_rows,
        data_rows: total_rows.saturating_sub(graph_rows + dirty_rows),
        from_keys: graph.from_count(),
        to_keys: graph.to_count(),
        edges: graph.edge_count(),
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, config: &Config, format: OutputFormat) -> CliResult<()> {
    let store = open_store(path)?;
    let result = inspect(&store, config)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("DackBox Store Inspection");
    println!("========================");
    println!();
    println!("Path: {}", result.path);
    println!("Log size: {}", format_size(result.log_size));
    println!();
    println!("Rows:");
    println!("  Total: {}", result.total_rows);
    println!("  Graph: {}", result.graph_rows);
    println!("  Dirty: {}", result.dirty_rows);
    println!("  Data:  {}", result.data_rows);
    println!();
    println!("Graph:");
    println!("  Keys with refs:       {}", result.from_keys);
    println!("  Keys referenced:      {}", result.to_keys);
    println!("  Edges:                {}", result.edges);
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::seed;

    #[test]
    fn counts_rows_and_edges() {
        let dir = tempfile::TempDir::new().unwrap();
        seed(dir.path());
        let store = open_store(dir.path()).unwrap();
        let result = inspect(&store, &Config::default()).unwrap();

        assert_eq!(result.total_rows, 4);
        assert_eq!(result.graph_rows, 2);
        assert_eq!(result.dirty_rows, 1);
        assert_eq!(result.data_rows, 1);
        assert_eq!(result.from_keys, 2);
        assert_eq!(result.to_keys, 3);
        assert_eq!(result.edges, 3);
        assert!(result.log_size > 0);
    }

    #[test]
    fn formats_sizes() {
        assert_eq!(format_size(10), "10 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
