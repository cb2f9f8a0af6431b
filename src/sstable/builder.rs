//! SSTable writer — builds a complete `<serial>.sst`/`<serial>.spx`
//! pair from a single sorted record stream.
//!
//! Grounded on `examples/original_source/anura/sstable.py`'s
//! `_write_pipeline` (chunk into blocks of `BLOCK_SIZE`, record each
//! block's first key and offset, compress and emit) and
//! `rename_tmp_table` (strip the `.tmp` suffix on success), translated
//! into the teacher's `.tmp` → `rename` atomic-commit idiom from
//! `sstable/builder.rs`.
//!
//! # Input requirement
//!
//! The input iterator must yield records in strictly ascending key
//! order — the writer does not sort.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::codec::{Record, RecordSchema};

use super::{encode_block, sst_path, spx_path, SstError, DEFAULT_BLOCK_SIZE};

type Result<T> = std::result::Result<T, SstError>;

/// Summary statistics returned after a successful [`SstWriter::write`].
#[derive(Debug, Default, Clone)]
pub struct BuildStats {
    pub record_count: usize,
    pub block_count: usize,
}

/// Builds one new sorted run. A writer is single-use: construct it,
/// call [`SstWriter::write`] with a sorted record stream, then
/// [`SstWriter::commit`] to atomically publish the result (or drop it
/// to discard the `.tmp` files).
pub struct SstWriter {
    dir: PathBuf,
    serial: u64,
    schema: RecordSchema,
    block_size: usize,
    temp: bool,
}

impl SstWriter {
    /// `temp = true` builds at `<serial>.sst.tmp` / `<serial>.spx.tmp`,
    /// requiring an explicit [`SstWriter::commit`] — used by
    /// compaction. `temp = false` writes directly to the final path —
    /// used by a mem-table flush, which has no concurrent readers of
    /// that serial to race against.
    pub fn new(dir: &Path, serial: u64, schema: RecordSchema, temp: bool) -> SstWriter {
        SstWriter {
            dir: dir.to_path_buf(),
            serial,
            schema,
            block_size: DEFAULT_BLOCK_SIZE,
            temp,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    fn sst_target(&self) -> PathBuf {
        let base = sst_path(&self.dir, self.serial);
        if self.temp {
            let mut name = base.into_os_string();
            name.push(".tmp");
            PathBuf::from(name)
        } else {
            base
        }
    }

    fn spx_target(&self) -> PathBuf {
        let base = spx_path(&self.dir, self.serial);
        if self.temp {
            let mut name = base.into_os_string();
            name.push(".tmp");
            PathBuf::from(name)
        } else {
            base
        }
    }

    /// Streams `records` into blocks of `block_size`, writing the
    /// `.sst` data file and the `.spx` sparse index in one pass.
    pub fn write<I: Iterator<Item = Record>>(&self, records: I) -> Result<BuildStats> {
        let mut sst_file = File::create(self.sst_target())?;
        let mut spx_file = File::create(self.spx_target())?;

        let mut stats = BuildStats::default();
        let mut offset: u64 = 0;
        let mut chunk: Vec<Record> = Vec::with_capacity(self.block_size);

        let mut flush_chunk = |chunk: &mut Vec<Record>, offset: &mut u64| -> Result<()> {
            if chunk.is_empty() {
                return Ok(());
            }
            let encoded = encode_block(chunk, &self.schema)?;
            let first_key = &chunk[0].key;

            // `(key_type, i64)` per spec.md §4.3 step 3 — no stored
            // length; a reader derives each block's length from the
            // next entry's offset (or EOF for the last block).
            let mut index_entry = Vec::new();
            first_key.encode(&self.schema.key_type, &mut index_entry)?;
            index_entry.extend_from_slice(&(*offset as i64).to_be_bytes());
            spx_file.write_all(&index_entry)?;

            sst_file.write_all(&encoded)?;
            *offset += encoded.len() as u64;
            stats.record_count += chunk.len();
            stats.block_count += 1;
            chunk.clear();
            Ok(())
        };

        for record in records {
            chunk.push(record);
            if chunk.len() >= self.block_size {
                flush_chunk(&mut chunk, &mut offset)?;
            }
        }
        flush_chunk(&mut chunk, &mut offset)?;

        sst_file.sync_all()?;
        spx_file.sync_all()?;

        info!(
            serial = self.serial,
            records = stats.record_count,
            blocks = stats.block_count,
            "wrote sstable"
        );
        Ok(stats)
    }

    /// Atomically renames the `.tmp` files to their final paths.
    /// Calling this on a writer constructed with `temp = false` is a
    /// contract violation — such a writer already wrote its final
    /// path directly and has nothing to rename.
    pub fn commit(&self) -> Result<()> {
        if !self.temp {
            return Err(SstError::InvalidState(
                "commit() called on a non-temporary SstWriter".to_string(),
            ));
        }
        fs::rename(self.sst_target(), sst_path(&self.dir, self.serial))?;
        fs::rename(self.spx_target(), spx_path(&self.dir, self.serial))?;
        info!(serial = self.serial, "committed sstable");
        Ok(())
    }
}
