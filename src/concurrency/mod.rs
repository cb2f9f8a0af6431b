//! # Concurrency control (C6, C7)
//!
//! Per-entity shared/exclusive lock manager with re-entrancy and lock
//! upgrade, plus a wait-for graph that detects deadlocks via cycle
//! detection and aborts one of the involved transactions.
//!
//! Built fresh — the teacher protects all engine state with one
//! `Arc<RwLock<EngineInner>>` and has no transaction or lock concept —
//! grounded directly on
//! `examples/original_source/anura/concurrent/manager.py`
//! (`TransactionLock`, `Transaction`, `WaitForGraph`, `LockManager`)
//! and `anura/concurrent/_locks.py` (`ReentrantReadWriteLock`).
//! `std::sync::{Mutex, Condvar}` stand in for Python's
//! `threading.Condition(RLock())`; `crossbeam::sync::ShardedLock`
//! stands in for `anura/concurrent/util.py`'s `ConcurrentDict`.
//!
//! "Singleton lock manager → explicit ownership": there is exactly one
//! [`LockManager`] per [`crate::engine::Lsm`], passed by reference to
//! the flush/compaction pipeline — never a process-wide singleton.
//!
//! "Scope-guard lock release": [`LockManager::lock`] returns a
//! [`LockGuard`] whose `Drop` releases the lock, replacing Python's
//! `@contextmanager`/`with`-block pattern with RAII.

pub mod lock_manager;
pub mod wait_for_graph;

#[cfg(test)]
mod tests;

pub use lock_manager::{LockGuard, LockManager};
pub use wait_for_graph::WaitForGraph;

use thiserror::Error;

/// The two lock modes a [`LockManager`] grants. Exclusive subsumes
/// shared: a transaction already holding exclusive never needs to
/// acquire shared, and is never asked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug, Error)]
pub enum LockError {
    /// Acquiring this lock would complete a cycle in the wait-for
    /// graph. The caller's transaction has had all of its held locks
    /// released; it must retry from scratch or give up.
    #[error("transaction {txn_id} aborted: deadlock detected")]
    Deadlock { txn_id: u64 },
}
