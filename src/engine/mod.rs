//! # LSM coordinator (C4)
//!
//! [`Lsm`] owns a table's mem-table and its ordered list of on-disk
//! sorted runs, and is the crate's only public entry point: `open`,
//! `get`, `put`, `delete`, `flush`, `compact`, matching spec.md §6's
//! "Public API surface" literally.
//!
//! Grounded on `examples/original_source/anura/lsm.py`'s `LSMTree`
//! (`get`/`put`/`delete`/`flush` delegating straight to `MemTable`/
//! `SSTable`) for the coordinator's shape, and on the teacher's
//! `engine/mod.rs` (`Arc<RwLock<..>>`-guarded state, `EngineConfig`,
//! `open`/`close` lifecycle, doc density) for the ambient idiom. Flush
//! and compaction are delegated to [`crate::compaction`]; this module's
//! job is to hold the run list and mem-table, assign serials, and
//! sequence the exclusive-lock acquisition spec.md §4.5 requires around
//! both.
//!
//! ## Run ordering
//!
//! [`Lsm::runs`] is kept newest-first (descending serial), matching
//! spec.md §4.4's "ordered logically by serial descending for read
//! lookups" — [`Lsm::get`] can stop at the first matching run.
//!
//! ## Background triggering
//!
//! [`EngineConfig::memtable_budget_bytes`] and
//! [`EngineConfig::compaction_run_threshold`] are checked synchronously
//! after every [`Lsm::put`]/[`Lsm::delete`]/[`Lsm::flush`] call — this
//! resolves spec.md §9's "triggering policy is intentionally
//! unspecified" Open Question with a pluggable, configurable default.
//! [`background`] adds an optional asynchronous worker on top for
//! callers that want triggering off the write path entirely.

pub mod background;

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, info, warn};

pub use background::{BackgroundWorker, Trigger};

use crate::codec::{CodecError, RecordSchema, Value};
use crate::compaction::{self, CompactionError};
use crate::concurrency::{LockError, LockManager, LockMode};
use crate::memtable::{Memtable, MemtableError};
use crate::metadata::{MetadataError, TableMetadata};
use crate::sstable::{SSTable, SstError, SPARSE_INDEX_EXT, SSTABLE_EXT};

/// Errors surfaced by the coordinator, composing every subsystem's own
/// error type (per spec.md §7's propagation policy: user-initiated
/// operations return their error to the caller).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("memtable error: {0}")]
    Memtable(#[from] MemtableError),

    #[error("sstable error: {0}")]
    Sst(#[from] SstError),

    #[error("compaction error: {0}")]
    Compaction(#[from] CompactionError),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

type Result<T> = std::result::Result<T, EngineError>;

/// Tunables governing flush/compaction triggering and block layout.
/// Constructed with [`Default`] and validated once, at [`Lsm::open`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Flush is triggered once the mem-table's approximate encoded
    /// size exceeds this many bytes. Set to `usize::MAX` to disable
    /// size-triggered flushing (manual [`Lsm::flush`] only).
    pub memtable_budget_bytes: usize,

    /// Compaction is triggered once the run count exceeds this
    /// threshold. Set to `usize::MAX` to disable automatic
    /// compaction. Must be at least 2 — spec.md §4.5's naive
    /// compaction is itself a no-op below two runs.
    pub compaction_run_threshold: usize,

    /// Block size (records per block) used by new sorted runs. Spec.md
    /// §3 default is 50.
    pub block_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            memtable_budget_bytes: 4 * 1024 * 1024,
            compaction_run_threshold: 4,
            block_size: crate::sstable::DEFAULT_BLOCK_SIZE,
        }
    }
}

impl EngineConfig {
    fn validate(&self) -> Result<()> {
        if self.memtable_budget_bytes == 0 {
            return Err(EngineError::InvalidState(
                "memtable_budget_bytes must be greater than zero".to_string(),
            ));
        }
        if self.compaction_run_threshold < 2 {
            return Err(EngineError::InvalidState(
                "compaction_run_threshold must be at least 2".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(EngineError::InvalidState(
                "block_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// The LSM coordinator: a table's mem-table plus its ordered run list,
/// a [`LockManager`] shared by every flush/compaction call, and a
/// serial generator. One instance per open table directory — "explicit
/// ownership" per spec.md §9, never a process-wide singleton.
pub struct Lsm {
    dir: PathBuf,
    metadata: TableMetadata,
    schema: RecordSchema,
    config: EngineConfig,
    memtable: Mutex<Memtable>,
    runs: RwLock<Vec<SSTable>>,
    lock_manager: LockManager,
    next_serial: AtomicU64,
    next_txn: AtomicU64,
}

impl Lsm {
    /// Opens a table directory, loading `metadata.json` and every
    /// committed run found on disk (a `.sst` file with no matching
    /// `.spx` is an orphaned partial write and is ignored, per spec.md
    /// §3's "fully committed or non-existent" run invariant).
    ///
    /// The serial counter is seeded from the current Unix-epoch
    /// nanosecond timestamp (spec.md §9's first Open Question:
    /// "substitute a strictly monotonic counter... without changing
    /// semantics"), floored so it never issues a serial at or below
    /// one already present on disk.
    pub fn open(dir: impl AsRef<Path>, config: EngineConfig) -> Result<Lsm> {
        config.validate()?;
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let metadata = TableMetadata::load(&dir)?;
        let schema = metadata.record_schema();

        let serials = discover_serials(&dir)?;
        let mut runs = Vec::with_capacity(serials.len());
        for serial in &serials {
            runs.push(SSTable::open(&dir, *serial, &schema)?);
        }
        runs.sort_unstable_by(|a, b| b.serial.cmp(&a.serial));

        let max_on_disk = serials.iter().max().copied().unwrap_or(0);
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let next_serial = seed.max(max_on_disk + 1);

        info!(
            table = metadata.table_name,
            runs = runs.len(),
            "opened lsm table"
        );

        Ok(Lsm {
            dir,
            metadata,
            schema,
            config,
            memtable: Mutex::new(Memtable::new()),
            runs: RwLock::new(runs),
            lock_manager: LockManager::new(),
            next_serial: AtomicU64::new(next_serial),
            next_txn: AtomicU64::new(1),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.metadata.table_name
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Number of committed runs currently visible to reads.
    pub fn run_count(&self) -> usize {
        self.runs.read().unwrap().len()
    }

    fn lock_id(&self) -> u64 {
        compaction::lock_id_for_table(&self.metadata.table_name)
    }

    fn fresh_txn_id(&self) -> u64 {
        self.next_txn.fetch_add(1, Ordering::Relaxed)
    }

    /// `get(k)`, per spec.md §4.4: mem-table first (tombstone masks
    /// any on-disk version and returns `None` immediately), then runs
    /// newest-to-oldest, returning the first non-tombstone definition.
    /// Acquires the table lock in shared mode, per spec.md §4.4's
    /// note that lock manager usage is optional for safety but is the
    /// documented concurrent-reader contract.
    pub fn get(&self, key: &Value) -> Result<Option<Value>> {
        let txn_id = self.fresh_txn_id();
        let _guard = self.lock_manager.lock(self.lock_id(), txn_id, LockMode::Shared)?;

        if let Some((value, tombstone)) = self.memtable.lock().unwrap().get(key) {
            return Ok(if tombstone { None } else { Some(value.clone()) });
        }

        for run in self.runs.read().unwrap().iter() {
            if let Some(record) = run.find(key)? {
                return Ok(if record.tombstone { None } else { Some(record.value) });
            }
        }
        Ok(None)
    }

    /// `put(k, v)`: `mem_table.insert((k, v, false))`, then checks
    /// whether the mem-table has crossed its flush threshold.
    pub fn put(&self, key: Value, value: Value) -> Result<()> {
        self.memtable.lock().unwrap().put(&self.schema, key, value)?;
        self.maybe_trigger()?;
        Ok(())
    }

    /// `delete(k)`: installs a tombstone even when `k` is absent from
    /// the mem-table, matching spec.md §4.4 (a tombstone must mask a
    /// potential on-disk version regardless of whether this key was
    /// ever written in-memory).
    pub fn delete(&self, key: Value) -> Result<()> {
        self.memtable.lock().unwrap().delete(&self.schema, key)?;
        self.maybe_trigger()?;
        Ok(())
    }

    fn maybe_trigger(&self) -> Result<()> {
        let size = self.memtable.lock().unwrap().approximate_size();
        if size >= self.config.memtable_budget_bytes {
            self.flush()?;
        }
        if self.run_count() > self.config.compaction_run_threshold {
            self.compact()?;
        }
        Ok(())
    }

    /// Factory returning a run bound to this coordinator's directory
    /// and schema, matching spec.md §4.4's `new_run(serial?) -> SST`.
    fn new_run(&self, serial: u64) -> Result<SSTable> {
        Ok(SSTable::open(&self.dir, serial, &self.schema)?)
    }

    /// Inserts `run` at the front of the run list (newest-first).
    /// Callers must already hold the table's exclusive lock — matches
    /// spec.md §4.4's `append_run(r)`.
    fn append_run(&self, run: SSTable) {
        self.runs.write().unwrap().insert(0, run);
    }

    /// Drops every run whose serial is in `superseded` from the run
    /// list. Callers must already hold the table's exclusive lock —
    /// matches spec.md §4.4's `remove_runs(S)`.
    fn remove_runs(&self, superseded: &[u64]) {
        self.runs
            .write()
            .unwrap()
            .retain(|r| !superseded.contains(&r.serial));
    }

    /// Flushes the mem-table to a brand-new run under the table's
    /// exclusive lock (spec.md §4.5's flush sequence: acquire, write,
    /// append, swap mem-table, release). A no-op on an empty
    /// mem-table, so a background trigger racing an already-flushed
    /// table does no work.
    pub fn flush(&self) -> Result<()> {
        let txn_id = self.fresh_txn_id();
        let _guard = self.lock_manager.lock(self.lock_id(), txn_id, LockMode::Exclusive)?;

        let mut memtable_guard = self.memtable.lock().unwrap();
        if memtable_guard.is_empty() {
            return Ok(());
        }

        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst);
        // Re-entrant: `compaction::flush` acquires the same lock_id
        // under the same txn_id, which the lock manager grants
        // immediately (already-held, same/stronger mode).
        compaction::flush(
            &self.dir,
            &self.metadata.table_name,
            &self.schema,
            &memtable_guard,
            serial,
            self.config.block_size,
            &self.lock_manager,
            txn_id,
        )?;

        let new_run = self.new_run(serial)?;
        self.append_run(new_run);
        *memtable_guard = Memtable::new();
        Ok(())
    }

    /// Merges every existing run into one, under the table's exclusive
    /// lock. No-op when fewer than two runs exist (spec.md §4.5's
    /// naive-compaction guard). On success, the old runs' files are
    /// removed from disk on a best-effort basis — spec.md §7's failure
    /// semantics explicitly tolerate a failed post-commit delete
    /// ("correctness unaffected... disk wasted").
    pub fn compact(&self) -> Result<()> {
        let txn_id = self.fresh_txn_id();
        let _guard = self.lock_manager.lock(self.lock_id(), txn_id, LockMode::Exclusive)?;

        if self.run_count() < 2 {
            return Ok(());
        }
        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst);

        let result = {
            let runs_guard = self.runs.read().unwrap();
            compaction::compact(
                &self.dir,
                &self.metadata.table_name,
                &self.schema,
                &runs_guard,
                serial,
                self.config.block_size,
                &self.lock_manager,
                txn_id,
            )?
        };
        let Some(result) = result else {
            return Ok(());
        };

        let new_run = self.new_run(result.new_serial)?;
        self.remove_runs(&result.superseded_serials);
        self.append_run(new_run);

        for old_serial in &result.superseded_serials {
            delete_run_files(&self.dir, *old_serial);
        }
        Ok(())
    }

    /// Spawns an async [`BackgroundWorker`] that calls [`Lsm::flush`]/
    /// [`Lsm::compact`] off the caller's thread whenever a
    /// [`background::TriggerSender`] is notified. Optional: most
    /// callers get triggering for free from [`Lsm::put`]/
    /// [`Lsm::delete`]'s synchronous threshold checks; this is for
    /// callers that want those checks off the write path entirely.
    pub fn spawn_background(self: &Arc<Lsm>) -> BackgroundWorker {
        let lsm = Arc::clone(self);
        BackgroundWorker::spawn(move |trigger| {
            let result = match trigger {
                Trigger::Flush => lsm.flush(),
                Trigger::Compact => lsm.compact(),
            };
            if let Err(e) = result {
                warn!(?trigger, error = %e, "background trigger failed");
            }
        })
    }
}

/// Scans `dir` for committed `<serial>.sst` files (ignoring `.tmp`
/// artifacts and any `.sst` missing its `.spx` partner), returning
/// their serials in ascending order.
fn discover_serials(dir: &Path) -> Result<Vec<u64>> {
    let mut serials = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SSTABLE_EXT) {
            continue;
        }
        let Some(serial) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u64>().ok())
        else {
            continue;
        };
        let spx = dir.join(format!("{serial}.{SPARSE_INDEX_EXT}"));
        if spx.exists() {
            serials.push(serial);
        } else {
            warn!(serial, "sstable missing its sparse index; ignoring");
        }
    }
    serials.sort_unstable();
    Ok(serials)
}

/// Best-effort removal of a superseded run's two files. Failures are
/// logged, not propagated — per spec.md §7, orphaned files after a
/// successful compaction are a disk-space leak, not a correctness bug.
fn delete_run_files(dir: &Path, serial: u64) {
    for ext in [SSTABLE_EXT, SPARSE_INDEX_EXT] {
        let path = dir.join(format!("{serial}.{ext}"));
        if let Err(e) = fs::remove_file(&path) {
            warn!(serial, path = %path.display(), error = %e, "failed to remove superseded run file");
        } else {
            debug!(serial, ext, "removed superseded run file");
        }
    }
}
