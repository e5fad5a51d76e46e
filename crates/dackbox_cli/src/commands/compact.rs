//! Compact command implementation.

use super::open_store;
use crate::error::CliResult;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path) -> CliResult<()> {
    let store = open_store(path)?;
    println!("Compacting store at {:?}", path);

    let keys = store.len();
    let (before, after) = store.compact()?;

    println!();
    println!("  Live keys:   {}", keys);
    println!("  Size before: {} bytes", before);
    println!("  Size after:  {} bytes", after);
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        before.saturating_sub(after),
        if before > 0 {
            (before.saturating_sub(after) as f64 / before as f64) * 100.0
        } else {
            0.0
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::seed;
    use crate::error::CliError;

    #[test]
    fn compacts_seeded_store() {
        let dir = tempfile::TempDir::new().unwrap();
        seed(dir.path());
        run(dir.path()).unwrap();
        assert_eq!(open_store(dir.path()).unwrap().len(), 4);
    }

    #[test]
    fn missing_store_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(run(dir.path()), Err(CliError::NoStore { .. })));
    }
}
