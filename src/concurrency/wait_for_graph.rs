//! Wait-for graph & cycle detection.
//!
//! Grounded on `examples/original_source/anura/concurrent/manager.py`'s
//! `WaitForGraph` (`add`/`remove`/`detect_deadlock`) and
//! `anura/algorithms.py::has_cycle` (iterative stack-based DFS).
//!
//! `add`/`remove` take the lock table's write guard (they mutate the
//! adjacency map); `detect_deadlock` only reads it. This is the
//! natural Rust locking split for a single `ShardedLock`-guarded map —
//! a deliberate simplification of the Python original, where `add`/
//! `remove` hold only the *read* side of an outer
//! `ReentrantReadWriteLock` because the mutation itself is delegated
//! to `ConcurrentDict`'s own internal lock. Rust has no equivalent
//! "lock within a lock" primitive to reach for here, so mutators simply
//! take the write lock.

use std::collections::{HashMap, HashSet};

use crossbeam::sync::ShardedLock;
use tracing::debug;

use super::LockError;

type Result<T> = std::result::Result<T, LockError>;

/// Directed adjacency: `txn -> { transactions it is waiting on }`.
#[derive(Default)]
pub struct WaitForGraph {
    adjacency: ShardedLock<HashMap<u64, HashSet<u64>>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        WaitForGraph::default()
    }

    /// Records that `predecessor` is now waiting on every transaction
    /// in `successors`.
    pub fn add(&self, predecessor: u64, successors: HashSet<u64>) {
        let mut adjacency = self.adjacency.write().unwrap();
        adjacency.entry(predecessor).or_default().extend(successors);
    }

    /// Removes `txn` as a waiter and as anything else is waiting on —
    /// called once a transaction's lock request resolves (acquired,
    /// aborted, or released).
    pub fn remove(&self, txn_id: u64) {
        debug!(txn_id, "wait-for graph: removing transaction");
        let mut adjacency = self.adjacency.write().unwrap();
        adjacency.remove(&txn_id);
        for successors in adjacency.values_mut() {
            successors.remove(&txn_id);
        }
    }

    /// Returns `Err(LockError::Deadlock)` if `txn_id` is part of a
    /// cycle reachable by following wait-for edges from itself.
    pub fn detect_deadlock(&self, txn_id: u64) -> Result<()> {
        debug!(txn_id, "wait-for graph: checking for deadlock");
        let adjacency = self.adjacency.read().unwrap();
        if has_cycle(&adjacency, txn_id) {
            return Err(LockError::Deadlock { txn_id });
        }
        Ok(())
    }
}

/// `true` if there is a path from `start` back to `start` following
/// the directed edges in `adjacency`. Iterative (no recursion stack
/// depth risk on a large graph), per
/// `anura/algorithms.py::has_cycle`'s stack-based DFS.
fn has_cycle(adjacency: &HashMap<u64, HashSet<u64>>, start: u64) -> bool {
    let mut stack = vec![start];
    let mut visited: HashSet<u64> = HashSet::new();
    visited.insert(start);

    while let Some(current) = stack.pop() {
        let Some(neighbors) = adjacency.get(&current) else {
            continue;
        };
        for &next in neighbors {
            if next == start {
                return true;
            }
            if visited.insert(next) {
                stack.push(next);
            }
        }
    }
    false
}
