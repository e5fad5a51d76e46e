//! File-based key/value store for persistent storage.

use crate::error::{StorageError, StorageResult};
use crate::kv::{KvStore, KvTransaction};
use crate::record::{decode_record, encode_batch, Decoded};
use crate::snapshot::{apply_batch, Batch, Committer, SnapshotTransaction, Version};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the batch log inside the store directory.
pub const LOG_FILE: &str = "dackbox.log";

/// Name of the lock file inside the store directory.
pub const LOCK_FILE: &str = "LOCK";

const COMPACT_FILE: &str = "dackbox.log.compact";

/// Options for opening a [`FileStore`].
#[derive(Debug, Clone)]
pub struct FileStoreOptions {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to `fsync` the log after every commit (safer but slower).
    pub sync_on_commit: bool,
}

impl Default for FileStoreOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
        }
    }
}

impl FileStoreOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}

/// A persistent ordered key/value store.
///
/// Committed batches are appended to a single log file and the full key
/// space is kept in memory, rebuilt by replaying the log on open. The store
/// directory is locked for exclusive use by one process.
///
/// # Durability
///
/// - A commit returns only after its record was written (and synced when
///   `sync_on_commit` is set)
/// - A torn record at the end of the log, left by a crash mid-append, is
///   dropped on open
/// - Any other damage is reported as [`StorageError::Corrupted`]
///
/// # Example
///
/// ```no_run
/// use dackbox_storage::{FileStore, KvStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("data")).unwrap();
/// let mut txn = store.new_transaction().unwrap();
/// txn.set(b"key", b"value").unwrap();
/// txn.commit().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    inner: Arc<FileInner>,
}

#[derive(Debug)]
struct FileInner {
    dir: PathBuf,
    log: Mutex<File>,
    current: RwLock<Version>,
    sync_on_commit: bool,
    _lock: File,
}

impl Committer for FileInner {
    fn apply(&self, batch: Batch) -> StorageResult<()> {
        let record = encode_batch(&batch)?;

        // Holding the log lock across the in-memory apply keeps log order
        // and version order identical.
        let mut log = self.log.lock();
        append_record(&mut *log, &record, self.sync_on_commit)?;

        let mut current = self.current.write();
        apply_batch(Arc::make_mut(&mut *current), batch);
        Ok(())
    }
}

impl FileStore {
    /// Opens or creates a store in the directory `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is locked by another process, the
    /// log is corrupted, or an I/O error occurs.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::open_with_options(path, FileStoreOptions::default())
    }

    /// Opens a store with custom options.
    ///
    /// # Errors
    ///
    /// See [`FileStore::open`]. Additionally fails with
    /// [`StorageError::NotFound`] if the directory doesn't exist and
    /// `create_if_missing` is false.
    pub fn open_with_options(path: &Path, options: FileStoreOptions) -> StorageResult<Self> {
        if !path.exists() {
            if !options.create_if_missing {
                return Err(StorageError::NotFound(path.display().to_string()));
            }
            fs::create_dir_all(path)?;
        }

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        lock.try_lock_exclusive()
            .map_err(|_| StorageError::Locked)?;

        let log_path = path.join(LOG_FILE);
        let mut log = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&log_path)?;

        let mut data = Vec::new();
        log.read_to_end(&mut data)?;
        let (map, valid_len, records) = replay(&data)?;
        if valid_len < data.len() {
            warn!(
                path = %log_path.display(),
                dropped = data.len() - valid_len,
                "dropping torn record at end of log"
            );
            log.set_len(valid_len as u64)?;
            log.sync_all()?;
        }
        debug!(path = %path.display(), records, keys = map.len(), "opened file store");

        Ok(Self {
            inner: Arc::new(FileInner {
                dir: path.to_path_buf(),
                log: Mutex::new(log),
                current: RwLock::new(Arc::new(map)),
                sync_on_commit: options.sync_on_commit,
                _lock: lock,
            }),
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.dir
    }

    /// Returns the number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.current.read().len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the size of the log file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn log_size(&self) -> StorageResult<u64> {
        Ok(self.inner.log.lock().metadata()?.len())
    }

    /// Rewrites the log as a single record holding the live key set.
    ///
    /// Returns the log size before and after compaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the new log cannot be written. The old log stays
    /// in place in that case.
    pub fn compact(&self) -> StorageResult<(u64, u64)> {
        let mut log = self.inner.log.lock();
        let before = log.metadata()?.len();

        let snapshot: Version = self.inner.current.read().clone();
        let batch: Batch = snapshot
            .iter()
            .map(|(k, v)| (k.clone(), Some(v.clone())))
            .collect();
        let record = if batch.is_empty() {
            Vec::new()
        } else {
            encode_batch(&batch)?
        };

        let tmp_path = self.inner.dir.join(COMPACT_FILE);
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&record)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, self.inner.dir.join(LOG_FILE))?;

        *log = OpenOptions::new()
            .read(true)
            .append(true)
            .open(self.inner.dir.join(LOG_FILE))?;
        let after = log.metadata()?.len();
        debug!(before, after, "compacted file store");
        Ok((before, after))
    }

    fn begin(&self, read_only: bool) -> Box<dyn KvTransaction> {
        let snapshot: Version = self.inner.current.read().clone();
        let committer: Arc<dyn Committer> = self.inner.clone();
        Box::new(SnapshotTransaction::new(snapshot, read_only, committer))
    }
}

impl KvStore for FileStore {
    fn new_transaction(&self) -> StorageResult<Box<dyn KvTransaction>> {
        Ok(self.begin(false))
    }

    fn new_read_only_transaction(&self) -> StorageResult<Box<dyn KvTransaction>> {
        Ok(self.begin(true))
    }
}

/// The append end of the batch log.
trait LogSink: Write {
    fn end(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl LogSink for File {
    fn end(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

/// Appends `record` to `log`.
///
/// On failure the log is cut back to its length before the append, so a
/// failed commit leaves no partial record behind for later appends to
/// follow.
fn append_record<L: LogSink + ?Sized>(log: &mut L, record: &[u8], sync: bool) -> StorageResult<()> {
    let len = log.end()?;
    let written = log
        .write_all(record)
        .and_then(|()| log.flush())
        .and_then(|()| if sync { log.sync() } else { Ok(()) });
    if let Err(err) = written {
        warn!(len, error = %err, "append to log failed, truncating");
        if let Err(cut) = log.truncate(len) {
            warn!(len, error = %cut, "could not truncate log after failed append");
        }
        return Err(err.into());
    }
    Ok(())
}

/// Replays every complete record in `data`.
///
/// Returns the resulting key space, the length of the valid prefix of
/// `data`, and the number of records applied.
fn replay(data: &[u8]) -> StorageResult<(BTreeMap<Vec<u8>, Vec<u8>>, usize, usize)> {
    let mut map = BTreeMap::new();
    let mut offset = 0;
    let mut records = 0;
    while offset < data.len() {
        match decode_record(&data[offset..])? {
            Decoded::Record(batch, used) => {
                apply_batch(&mut map, batch);
                offset += used;
                records += 1;
            }
            Decoded::Torn => break,
        }
    }
    Ok((map, offset, records))
}
