//! # lsmengine
//!
//! A persistent, ordered key-value store built on a **Log-Structured
//! Merge (LSM) tree**, with a typed record codec and explicit
//! transactional concurrency control.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      engine::Lsm                          │
//! │  ┌────────────┐        ┌───────────────────────────────┐ │
//! │  │  memtable  │  flush │   runs (sparse-indexed SSTs)  │ │
//! │  │  (AVL tree)│───────▶│  newest ───────────────▶ oldest│ │
//! │  └────────────┘        └───────────────────────────────┘ │
//! │        ▲                           │                      │
//! │        │                      compaction                 │
//! │        │                    (k-way merge)                │
//! │        └───────────────────────────┘                      │
//! │                                                            │
//! │  every run-list mutation is guarded by                    │
//! │  concurrency::LockManager (shared/exclusive, upgrade,      │
//! │  wait-for-graph deadlock detection)                         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`codec`] | Typed record encoding/decoding over a small schema type system |
//! | [`memtable`] | Self-balancing AVL tree, the in-memory write buffer |
//! | [`sstable`] | Immutable compressed-block runs with a sparse index |
//! | [`engine`] | The LSM coordinator — open, get, put, delete, flush, compact |
//! | [`compaction`] | Flush + k-way-merge compaction pipeline |
//! | [`concurrency`] | Shared/exclusive lock manager + wait-for-graph deadlock detection |
//! | [`metadata`] | Loads a table's schema from `metadata.json` |
//!
//! ## Key properties
//!
//! - **Typed records.** Keys and values are described by a small closed
//!   type system (fixed-width primitives, length-prefixed strings,
//!   arrays, nested structs), not opaque byte strings.
//! - **Tombstone masking.** A delete installs a tombstone that survives
//!   flush and shadows any older on-disk definition of the same key,
//!   until a full compaction drops it.
//! - **Transactional locking.** Every run-list mutation (flush, append,
//!   compaction) happens under an exclusive per-table lock; concurrent
//!   readers take a shared lock. Lock upgrade and active deadlock
//!   detection are first-class, not bolted on.
//! - **No write-ahead log.** Durability for a key is established at
//!   flush time; data still resident only in the mem-table is lost on
//!   an unclean process exit.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use lsmengine::codec::Value;
//! use lsmengine::engine::{EngineConfig, Lsm};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let lsm = Lsm::open("/tmp/my_table", EngineConfig::default())?;
//!
//! lsm.put(Value::Long(1), Value::Varchar("hello".to_string()))?;
//! assert_eq!(
//!     lsm.get(&Value::Long(1))?,
//!     Some(Value::Varchar("hello".to_string()))
//! );
//!
//! lsm.delete(Value::Long(1))?;
//! assert_eq!(lsm.get(&Value::Long(1))?, None);
//!
//! lsm.flush()?;
//! lsm.compact()?;
//! # Ok(())
//! # }
//! ```
//!
//! `my_table` must contain a `metadata.json` describing the table's
//! key/value schema — see [`metadata`] for the JSON shape.

#![allow(dead_code)]

pub mod codec;
pub mod compaction;
pub mod concurrency;
pub mod engine;
pub mod memtable;
pub mod metadata;
pub mod sstable;
