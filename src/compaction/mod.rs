//! # Flush & compaction pipeline (C5)
//!
//! Two operations run against a table's list of sorted runs:
//!
//! - [`flush`] — writes the mem-table's current contents out as a new,
//!   freshly-serialed run.
//! - [`compact`] — merges every existing run (only triggers when there
//!   are at least two) into a single new run, dropping tombstones and
//!   all-but-the-newest version of each key.
//!
//! Both acquire the table's lock in exclusive mode before touching the
//! run list.
//!
//! The actual k-way merge ([`merge_runs`]) is a `BinaryHeap`-based
//! merge ordered by `(key ASC, serial DESC)` — a min-heap of boxed
//! iterators, one per input run.
//!
//! This is the one "naive" full-merge compaction algorithm this crate
//! implements; there is no size-tiered bucket selection.

#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::codec::{Record, RecordSchema};
use crate::concurrency::{LockManager, LockMode};
use crate::memtable::Memtable;
use crate::sstable::builder::SstWriter;
use crate::sstable::{SSTable, SstError};

#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("sstable error: {0}")]
    Sst(#[from] SstError),

    #[error("lock error: {0}")]
    Lock(#[from] crate::concurrency::LockError),
}

type Result<T> = std::result::Result<T, CompactionError>;

/// One entry in the k-way merge heap: a record plus the serial of the
/// run it came from, ordered so [`BinaryHeap`] (a max-heap) pops the
/// entry with the smallest key and, for ties, the *largest* serial
/// first — matching `anura/algorithms.py::k_way_merge_sort`'s
/// `key=lambda x: -x.serial` tie-break.
struct HeapEntry {
    record: Record,
    serial: u64,
    source_idx: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap (max-heap) yields the smallest key
        // first, with higher serial breaking ties in its favor.
        match other.record.key.cmp_typed(&self.record.key) {
            Ordering::Equal => self.serial.cmp(&other.serial),
            ord => ord,
        }
    }
}

/// Merges several sorted record streams (each labeled with the serial
/// of the run it came from) into one sorted, deduplicated,
/// tombstone-resolved stream: for equal keys, the highest-serial
/// record wins, and a winning tombstone suppresses the key entirely
/// from the output. Mirrors `anura/compaction.py::gen_sort_uniq`.
struct MergeIterator<'a> {
    iters: Vec<Box<dyn Iterator<Item = Record> + 'a>>,
    serials: Vec<u64>,
    heap: BinaryHeap<HeapEntry>,
    last_key: Option<crate::codec::Value>,
}

impl<'a> MergeIterator<'a> {
    fn new(sources: Vec<(u64, Box<dyn Iterator<Item = Record> + 'a>)>) -> Self {
        let mut iters = Vec::with_capacity(sources.len());
        let mut serials = Vec::with_capacity(sources.len());
        for (serial, it) in sources {
            iters.push(it);
            serials.push(serial);
        }
        let mut merge = MergeIterator {
            iters,
            serials,
            heap: BinaryHeap::new(),
            last_key: None,
        };
        for idx in 0..merge.iters.len() {
            merge.pull(idx);
        }
        merge
    }

    fn pull(&mut self, idx: usize) {
        if let Some(record) = self.iters[idx].next() {
            self.heap.push(HeapEntry {
                record,
                serial: self.serials[idx],
                source_idx: idx,
            });
        }
    }
}

impl<'a> Iterator for MergeIterator<'a> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            let entry = self.heap.pop()?;
            self.pull(entry.source_idx);

            // First-occurrence-wins: since the heap always yields the
            // lowest key next and, among equal keys, the highest
            // serial first, the first time we see a given key is its
            // winning version. Skip any further occurrences of the
            // same key (they're from older runs, already superseded).
            let is_repeat = self
                .last_key
                .as_ref()
                .is_some_and(|k| k.eq_typed(&entry.record.key));
            if is_repeat {
                continue;
            }
            self.last_key = Some(entry.record.key.clone());

            if entry.record.tombstone {
                continue;
            }
            return Some(entry.record);
        }
    }
}

/// Public entry point: merges sorted runs, applying the "highest
/// serial wins, drop tombstones" resolution rule.
pub fn merge_runs<'a>(
    sources: Vec<(u64, Box<dyn Iterator<Item = Record> + 'a>)>,
) -> impl Iterator<Item = Record> + 'a {
    MergeIterator::new(sources)
}

/// Flushes a mem-table to a brand-new run, under the table's exclusive
/// lock. Mirrors `anura/flusher.py::TableFlusher.flush`.
pub fn flush(
    dir: &Path,
    table_name: &str,
    schema: &RecordSchema,
    memtable: &Memtable,
    new_serial: u64,
    block_size: usize,
    lock_manager: &LockManager,
    txn_id: u64,
) -> Result<()> {
    let lock_id = lock_id_for_table(table_name);
    let _guard = lock_manager.lock(lock_id, txn_id, LockMode::Exclusive)?;

    let records = memtable
        .iter()
        .map(|(k, v, tombstone)| Record {
            key: k.clone(),
            value: v.clone(),
            tombstone,
        });
    let writer = SstWriter::new(dir, new_serial, schema.clone(), false).with_block_size(block_size);
    writer.write(records)?;
    info!(table_name, serial = new_serial, "flushed memtable to sstable");
    Ok(())
}

/// Result of a successful [`compact`]: the serial of the newly written
/// run and the serials it supersedes (to be removed from the run
/// list and deleted from disk by the caller, which owns that state).
pub struct CompactionResult {
    pub new_serial: u64,
    pub superseded_serials: Vec<u64>,
}

/// Merges every run in `runs` (oldest-to-newest irrelevant — ordering
/// comes from `serial`) into one new run, under the table's exclusive
/// lock. No-ops (returns `Ok(None)`) when fewer than two runs exist,
/// matching `NaiveCompaction.compact`'s `if len(lsm.sstables) > 1`
/// guard.
pub fn compact(
    dir: &Path,
    table_name: &str,
    schema: &RecordSchema,
    runs: &[SSTable],
    new_serial: u64,
    block_size: usize,
    lock_manager: &LockManager,
    txn_id: u64,
) -> Result<Option<CompactionResult>> {
    if runs.len() < 2 {
        return Ok(None);
    }

    let lock_id = lock_id_for_table(table_name);
    let _guard = lock_manager.lock(lock_id, txn_id, LockMode::Exclusive)?;

    let sources: Vec<(u64, Box<dyn Iterator<Item = Record> + '_>)> = runs
        .iter()
        .map(|t| (t.serial, Box::new(t.scan()) as Box<dyn Iterator<Item = Record> + '_>))
        .collect();
    let merged = merge_runs(sources);

    let writer = SstWriter::new(dir, new_serial, schema.clone(), true).with_block_size(block_size);
    writer.write(merged)?;
    writer.commit()?;

    let superseded_serials = runs.iter().map(|t| t.serial).collect();
    info!(
        table_name,
        new_serial,
        merged_runs = runs.len(),
        "compacted sstables"
    );
    Ok(Some(CompactionResult {
        new_serial,
        superseded_serials,
    }))
}

/// Deterministic lock id for a table name, matching
/// `anura/compaction.py`'s `hash(lsm.metadata.table_name)`.
pub fn lock_id_for_table(table_name: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    table_name.hash(&mut hasher);
    hasher.finish()
}
