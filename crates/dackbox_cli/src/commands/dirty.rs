//! Dirty command implementation.

use super::open_store;
use crate::error::CliResult;
use crate::keys::display_key;
use dackbox_core::{Config, DackBox};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Returns the keys waiting for indexing, acknowledging them if `ack` is set.
pub fn collect(path: &Path, config: &Config, ack: bool) -> CliResult<Vec<Vec<u8>>> {
    let store = open_store(path)?;
    let dackbox = DackBox::open(Arc::new(store), None, config.clone())?;
    let keys = dackbox.keys_to_index()?;
    if ack && !keys.is_empty() {
        dackbox.ack_indexed(&keys)?;
        info!(count = keys.len(), "acknowledged dirty keys");
    }
    Ok(keys)
}

/// Runs the dirty command.
pub fn run(path: &Path, config: &Config, ack: bool) -> CliResult<()> {
    let keys = collect(path, config, ack)?;
    for key in &keys {
        println!("{}", display_key(key));
    }
    if ack {
        println!("{} key(s) acknowledged", keys.len());
    } else {
        println!("{} key(s) waiting for indexing", keys.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::seed;

    #[test]
    fn lists_then_acknowledges() {
        let dir = tempfile::TempDir::new().unwrap();
        seed(dir.path());
        let config = Config::default();

        assert_eq!(
            collect(dir.path(), &config, false).unwrap(),
            vec![b"images\0i1".to_vec()]
        );
        assert_eq!(collect(dir.path(), &config, true).unwrap().len(), 1);
        assert!(collect(dir.path(), &config, false).unwrap().is_empty());
    }

    #[test]
    fn other_prefix_sees_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        seed(dir.path());
        let config = Config::new().dirty_prefix("elsewhere");
        assert!(collect(dir.path(), &config, false).unwrap().is_empty());
    }
}
