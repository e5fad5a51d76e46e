//! CLI command implementations.

pub mod compact;
pub mod dirty;
pub mod inspect;
pub mod refs;
pub mod verify;

use crate::error::{CliError, CliResult};
use dackbox_storage::{FileStore, FileStoreOptions, LOG_FILE};
use std::path::Path;

/// Opens an existing store without creating anything.
pub fn open_store(path: &Path) -> CliResult<FileStore> {
    if !path.join(LOG_FILE).exists() {
        return Err(CliError::NoStore {
            path: path.to_path_buf(),
        });
    }
    let options = FileStoreOptions::new().create_if_missing(false);
    Ok(FileStore::open_with_options(path, options)?)
}
