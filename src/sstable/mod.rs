//! Sorted run / SSTable module (C3)
//!
//! An SSTable is an **immutable**, disk-backed sorted run: a sequence
//! of blocks of up to `block_size` sorted records (default 50, per
//! `examples/original_source/anura/constants.py::BLOCK_SIZE`), each
//! independently `zstd`-compressed and CRC32-checked, plus a sparse
//! index mapping each block's first key to its byte offset.
//!
//! Grounded on `examples/original_source/anura/sstable.py` for the
//! overall shape (`write`/`find`/`seq_scan`/`commit`, the `.tmp`-suffix
//! atomic rename protocol) and on the teacher's `sstable/mod.rs` /
//! `sstable/builder.rs` / `sstable/iterator.rs` for the Rust idiom
//! (`memmap2`-backed reads, `crc32fast` per-block checksums,
//! `BlockHandle`-style offset/size pairs, a `thiserror` error
//! taxonomy).
//!
//! # On-disk layout
//!
//! `<serial>.sst`:
//! ```text
//! [BLOCK_LEN_BE][ZSTD_COMPRESSED_BLOCK_BYTES][CRC32_BE]
//! [BLOCK_LEN_BE][ZSTD_COMPRESSED_BLOCK_BYTES][CRC32_BE]
//! ...
//! ```
//! `<serial>.spx` (sparse index, one entry per block, exactly spec.md
//! §6's `encode(key) ‖ encode_i64_be(offset)`):
//! ```text
//! [FIRST_KEY_ENCODED][OFFSET_BE i64]
//! ...
//! ```
//! A block's on-disk length is never stored — it is derived at read
//! time as the next entry's offset minus this one's, or the file's
//! length for the last block (spec.md §4.3).
//!
//! Both files are written to `<serial>.sst.tmp` / `<serial>.spx.tmp`
//! during a compaction build and atomically renamed in
//! [`builder::SstWriter::commit`]; a flush-produced run is written
//! directly to its final path, per spec's atomicity policy.

pub mod builder;
pub mod iterator;

#[cfg(test)]
mod tests;

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use thiserror::Error;
use tracing::debug;

use crate::codec::{CodecError, FieldType, Record, RecordSchema, Value};

pub const SSTABLE_EXT: &str = "sst";
pub const SPARSE_INDEX_EXT: &str = "spx";
pub const TMP_EXT: &str = "tmp";
pub const DEFAULT_BLOCK_SIZE: usize = 50;

#[derive(Debug, Error)]
pub enum SstError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("checksum mismatch in block at offset {offset}")]
    ChecksumMismatch { offset: u64 },

    #[error("corrupt sparse index: {0}")]
    CorruptIndex(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

type Result<T> = std::result::Result<T, SstError>;

/// Offset/length pair locating a block within the `.sst` file. `len`
/// is never stored on disk (spec.md §6's index format is just
/// `encode(key) ‖ encode_i64_be(offset)`) — it is derived at read time
/// from the next index entry's offset, or the file's end for the last
/// block.
#[derive(Debug, Clone, Copy)]
pub struct BlockHandle {
    pub offset: u64,
    pub len: u64,
}

/// One sparse-index entry: a block's first key plus its byte offset in
/// the `.sst` file, per spec.md §4.3 step 3 ("encode the sparse index
/// with schema `(key_type, i64)`").
pub struct IndexEntry {
    pub first_key: Value,
    pub offset: u64,
}

fn sst_path(dir: &Path, serial: u64) -> PathBuf {
    dir.join(format!("{serial}.{SSTABLE_EXT}"))
}

fn spx_path(dir: &Path, serial: u64) -> PathBuf {
    dir.join(format!("{serial}.{SPARSE_INDEX_EXT}"))
}

/// A single immutable sorted run, opened read-only and memory-mapped.
pub struct SSTable {
    pub serial: u64,
    schema: RecordSchema,
    mmap: Mmap,
    index: Vec<IndexEntry>,
}

impl SSTable {
    /// Opens an existing `<serial>.sst`/`<serial>.spx` pair, loading
    /// the sparse index fully into memory and memory-mapping the data
    /// file for zero-copy block reads.
    pub fn open(dir: &Path, serial: u64, schema: &RecordSchema) -> Result<SSTable> {
        let sst_file = File::open(sst_path(dir, serial))?;
        let mmap = unsafe { Mmap::map(&sst_file)? };
        let index = read_sparse_index(&spx_path(dir, serial), &schema.key_type)?;
        debug!(serial, blocks = index.len(), "opened sstable");
        Ok(SSTable {
            serial,
            schema: schema.clone(),
            mmap,
            index,
        })
    }

    /// Binary-searches the sparse index for the last block whose first
    /// key is `<= key`, decompresses that one block, and linear-scans
    /// it for an exact match. Mirrors `sstable.py::find`'s bisect-then-
    /// scan shape.
    pub fn find(&self, key: &Value) -> Result<Option<Record>> {
        let Some(block_idx) = self.candidate_block(key) else {
            return Ok(None);
        };
        let handle = self.block_handle(block_idx);
        let records = self.read_block(handle)?;
        for record in records {
            if record.key.eq_typed(key) {
                return Ok(Some(record));
            }
            if matches!(record.key.cmp_typed(key), std::cmp::Ordering::Greater) {
                break;
            }
        }
        Ok(None)
    }

    /// Finds the rightmost index entry whose `first_key <= key`.
    fn candidate_block(&self, key: &Value) -> Option<usize> {
        if self.index.is_empty() {
            return None;
        }
        let mut lo = 0i64;
        let mut hi = self.index.len() as i64 - 1;
        let mut result = None;
        while lo <= hi {
            let mid = (lo + hi) / 2;
            if matches!(
                self.index[mid as usize].first_key.cmp_typed(key),
                std::cmp::Ordering::Less | std::cmp::Ordering::Equal
            ) {
                result = Some(mid as usize);
                lo = mid + 1;
            } else {
                hi = mid - 1;
            }
        }
        result
    }

    fn read_block(&self, handle: BlockHandle) -> Result<Vec<Record>> {
        let start = handle.offset as usize;
        let end = start + handle.len as usize;
        let raw = self
            .mmap
            .get(start..end)
            .ok_or_else(|| SstError::CorruptIndex("block handle out of file bounds".to_string()))?;
        decode_block(raw, handle.offset, &self.schema)
    }

    /// Sequential full scan over every block in ascending key order.
    pub fn scan(&self) -> iterator::ScanIterator<'_> {
        iterator::ScanIterator::new(self)
    }

    fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Derives a block's offset/length handle: the length is the gap
    /// to the next block's offset, or to end-of-file for the last
    /// block — spec.md §4.3's "compressed size = next index offset −
    /// this offset, or to EOF for the last block".
    fn block_handle(&self, block_idx: usize) -> BlockHandle {
        let offset = self.index[block_idx].offset;
        let end = self
            .index
            .get(block_idx + 1)
            .map(|e| e.offset)
            .unwrap_or(self.mmap.len() as u64);
        BlockHandle {
            offset,
            len: end - offset,
        }
    }
}

/// Encodes one block: length-prefixed, zstd-compressed, CRC32-checked.
/// Returns the bytes to append to the `.sst` file and the handle
/// (offset supplied by the caller, since only the writer knows the
/// running file offset).
pub(crate) fn encode_block(records: &[Record], schema: &RecordSchema) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    for record in records {
        record.encode(schema, &mut raw)?;
    }
    let compressed = zstd::encode_all(raw.as_slice(), 0)
        .map_err(|e| SstError::Compression(e.to_string()))?;

    let mut out = Vec::with_capacity(compressed.len() + 12);
    out.extend_from_slice(&(compressed.len() as u64).to_be_bytes());
    out.extend_from_slice(&compressed);
    let crc = crc32fast::hash(&compressed);
    out.extend_from_slice(&crc.to_be_bytes());
    Ok(out)
}

/// Decodes one on-disk block (as produced by [`encode_block`]) given
/// the raw bytes starting at `[LEN][COMPRESSED][CRC]`.
fn decode_block(raw: &[u8], file_offset: u64, schema: &RecordSchema) -> Result<Vec<Record>> {
    if raw.len() < 12 {
        return Err(SstError::CorruptIndex("block shorter than header".to_string()));
    }
    let len = u64::from_be_bytes(raw[0..8].try_into().unwrap()) as usize;
    let compressed = &raw[8..8 + len];
    let crc_expected = u32::from_be_bytes(raw[8 + len..8 + len + 4].try_into().unwrap());
    let crc_actual = crc32fast::hash(compressed);
    if crc_actual != crc_expected {
        return Err(SstError::ChecksumMismatch { offset: file_offset });
    }
    let decompressed =
        zstd::decode_all(compressed).map_err(|e| SstError::Compression(e.to_string()))?;

    let mut records = Vec::new();
    let mut consumed = 0;
    while consumed < decompressed.len() {
        let (record, n) = Record::decode(&decompressed[consumed..], schema)?;
        records.push(record);
        consumed += n;
    }
    Ok(records)
}

/// Parses `.spx` as spec.md §6 defines it: a concatenation of
/// `encode(key) ‖ encode_i64_be(offset)` pairs, one per block, no
/// stored length.
fn read_sparse_index(path: &Path, key_type: &FieldType) -> Result<Vec<IndexEntry>> {
    let bytes = std::fs::read(path)?;
    let mut entries = Vec::new();
    let mut consumed = 0;
    while consumed < bytes.len() {
        let (first_key, n) = Value::decode(&bytes[consumed..], key_type)?;
        consumed += n;
        if consumed + 8 > bytes.len() {
            return Err(SstError::CorruptIndex(
                "truncated sparse index entry".to_string(),
            ));
        }
        let offset = i64::from_be_bytes(bytes[consumed..consumed + 8].try_into().unwrap()) as u64;
        consumed += 8;
        entries.push(IndexEntry { first_key, offset });
    }
    Ok(entries)
}
