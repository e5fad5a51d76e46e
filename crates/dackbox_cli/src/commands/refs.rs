//! Refs command implementation.

use super::open_store;
use crate::error::CliResult;
use crate::keys::display_key;
use crate::OutputFormat;
use dackbox_core::{Config, DackBox, RGraph};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// The refs of one key in one direction.
#[derive(Debug, Serialize)]
pub struct RefsResult {
    /// The looked-up key.
    pub key: String,
    /// `"from"` for forward refs, `"to"` for backward refs.
    pub direction: &'static str,
    /// Whether the key has an entry in that direction.
    pub present: bool,
    /// The partner keys, in order.
    pub refs: Vec<String>,
}

/// Reads the refs of `key` from the store at `path`.
pub fn collect(path: &Path, config: &Config, key: &[u8], to: bool) -> CliResult<RefsResult> {
    let store = open_store(path)?;
    let dackbox = DackBox::open(Arc::new(store), None, config.clone())?;
    let view = dackbox.new_graph_view();

    let (present, refs) = if to {
        (view.has_refs_to(key), view.get_refs_to(key))
    } else {
        (view.has_refs_from(key), view.get_refs_from(key))
    };

    Ok(RefsResult {
        key: display_key(key),
        direction: if to { "to" } else { "from" },
        present,
        refs: refs.iter().map(display_key).collect(),
    })
}

/// Runs the refs command.
pub fn run(
    path: &Path,
    config: &Config,
    key: &[u8],
    to: bool,
    format: OutputFormat,
) -> CliResult<()> {
    let result = collect(path, config, key, to)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            let label = if to { "Referenced by" } else { "References" };
            if !result.present {
                println!("{}: no entry", result.key);
                return Ok(());
            }
            println!("{} ({}):", result.key, label);
            for r in &result.refs {
                println!("  {}", r);
            }
            println!("{} key(s)", result.refs.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::seed;

    #[test]
    fn lists_forward_refs() {
        let dir = tempfile::TempDir::new().unwrap();
        seed(dir.path());
        let result = collect(dir.path(), &Config::default(), b"images\0i1", false).unwrap();
        assert!(result.present);
        assert_eq!(result.direction, "from");
        assert_eq!(result.refs, vec!["components\\0c1", "components\\0c2"]);
    }

    #[test]
    fn lists_backward_refs() {
        let dir = tempfile::TempDir::new().unwrap();
        seed(dir.path());
        let result = collect(dir.path(), &Config::default(), b"images\0i1", true).unwrap();
        assert_eq!(result.refs, vec!["deployments\\0d1"]);
    }

    #[test]
    fn unknown_key_has_no_entry() {
        let dir = tempfile::TempDir::new().unwrap();
        seed(dir.path());
        let result = collect(dir.path(), &Config::default(), b"nope", false).unwrap();
        assert!(!result.present);
        assert!(result.refs.is_empty());
    }
}
