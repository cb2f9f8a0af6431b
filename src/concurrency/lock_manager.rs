//! Per-entity shared/exclusive lock manager.
//!
//! Grounded on
//! `examples/original_source/anura/concurrent/manager.py`'s
//! `TransactionLock` (`s_acquire`/`x_acquire`/`upgrade`/`release`) and
//! `LockManager` (`lock`'s re-entrant/upgrade dispatch,
//! `remove_transaction`). `threading.Condition(RLock())` becomes
//! `std::sync::{Mutex, Condvar}`; the `@contextmanager`/`with`-block
//! acquire-then-release pattern becomes an RAII [`LockGuard`].

use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex};

use crossbeam::sync::ShardedLock;
use tracing::{debug, trace};

use super::wait_for_graph::WaitForGraph;
use super::{LockError, LockMode};

type Result<T> = std::result::Result<T, LockError>;

#[derive(Default)]
struct LockState {
    slock_count: u32,
    xlock_count: u32,
    owners: HashSet<u64>,
    /// Count of transactions currently parked in [`EntityLock::upgrade`]
    /// on this entity. While nonzero, fresh shared requests block
    /// behind the pending upgrade instead of jumping ahead of it —
    /// per spec.md §8's "no starvation of upgrade requests" property
    /// and the scenario 6 example ("a concurrent new S-acquire by
    /// Txn3 waits until Txn1's X is released").
    upgrade_waiters: u32,
}

impl LockState {
    fn is_xlock(&self) -> bool {
        self.xlock_count == 1
    }

    fn is_slock(&self) -> bool {
        self.slock_count > 0
    }
}

/// A single entity's lock — shared/exclusive state plus the condvar
/// blocked waiters sleep on. Mirrors `TransactionLock`.
struct EntityLock {
    lock_id: u64,
    state: Mutex<LockState>,
    condvar: Condvar,
}

impl EntityLock {
    fn new(lock_id: u64) -> Self {
        EntityLock {
            lock_id,
            state: Mutex::new(LockState::default()),
            condvar: Condvar::new(),
        }
    }

    fn mode_held_by(&self, txn_id: u64) -> Option<LockMode> {
        let state = self.state.lock().unwrap();
        if !state.owners.contains(&txn_id) {
            return None;
        }
        Some(if state.is_xlock() {
            LockMode::Exclusive
        } else {
            LockMode::Shared
        })
    }

    fn s_acquire(&self, txn_id: u64, graph: &WaitForGraph) -> Result<()> {
        trace!(txn_id, lock_id = self.lock_id, "acquiring shared lock");
        let mut state = self.state.lock().unwrap();
        // A fresh shared request never wins a race against a pending
        // upgrade: blocking here until `upgrade_waiters` drains gives
        // the blocked upgrader priority, the way spec.md §8 scenario 6
        // requires.
        while state.is_xlock() || state.upgrade_waiters > 0 {
            graph.add(txn_id, state.owners.clone());
            graph.detect_deadlock(txn_id)?;
            trace!(txn_id, lock_id = self.lock_id, "waiting for shared lock");
            state = self.condvar.wait(state).unwrap();
        }
        state.slock_count += 1;
        state.owners.insert(txn_id);
        Ok(())
    }

    fn x_acquire(&self, txn_id: u64, graph: &WaitForGraph) -> Result<()> {
        trace!(txn_id, lock_id = self.lock_id, "acquiring exclusive lock");
        let mut state = self.state.lock().unwrap();
        while state.is_xlock() || state.is_slock() {
            graph.add(txn_id, state.owners.clone());
            graph.detect_deadlock(txn_id)?;
            trace!(txn_id, lock_id = self.lock_id, "waiting for exclusive lock");
            state = self.condvar.wait(state).unwrap();
        }
        state.xlock_count += 1;
        state.owners.insert(txn_id);
        Ok(())
    }

    /// Upgrades a shared lock already held by `txn_id` to exclusive.
    /// Waits until this transaction is the lock's sole shared holder.
    /// Registers itself as an `upgrade_waiters` entrant for the
    /// duration of the wait so fresh shared requests queue behind it
    /// (see [`EntityLock::s_acquire`]) instead of indefinitely
    /// refreshing `slock_count` out from under it.
    fn upgrade(&self, txn_id: u64, graph: &WaitForGraph) -> Result<()> {
        debug!(txn_id, lock_id = self.lock_id, "upgrading lock");
        let mut state = self.state.lock().unwrap();
        state.upgrade_waiters += 1;
        while state.is_xlock() || state.slock_count > 1 {
            let mut others = state.owners.clone();
            others.remove(&txn_id);
            graph.add(txn_id, others);
            if let Err(e) = graph.detect_deadlock(txn_id) {
                state.upgrade_waiters -= 1;
                return Err(e);
            }
            state = self.condvar.wait(state).unwrap();
        }
        state.upgrade_waiters -= 1;
        state.owners.remove(&txn_id);
        state.slock_count = 0;
        state.xlock_count = 1;
        state.owners.insert(txn_id);
        Ok(())
    }

    fn release(&self, txn_id: u64, graph: &WaitForGraph) {
        trace!(txn_id, lock_id = self.lock_id, "releasing lock");
        let mut state = self.state.lock().unwrap();
        if state.slock_count > 0 {
            state.slock_count -= 1;
        }
        if state.xlock_count == 1 {
            state.xlock_count = 0;
        }
        state.owners.remove(&txn_id);
        drop(state);
        graph.remove(txn_id);
        self.condvar.notify_all();
    }
}

/// Owns the lock table, the transaction → held-locks index, and the
/// wait-for graph. Exactly one instance lives per
/// [`crate::engine::Lsm`] — "Singleton lock manager → explicit
/// ownership".
pub struct LockManager {
    lock_table: ShardedLock<HashMap<u64, std::sync::Arc<EntityLock>>>,
    txn_locks: ShardedLock<HashMap<u64, HashSet<u64>>>,
    graph: WaitForGraph,
}

impl LockManager {
    pub fn new() -> Self {
        debug!("creating lock manager");
        LockManager {
            lock_table: ShardedLock::new(HashMap::new()),
            txn_locks: ShardedLock::new(HashMap::new()),
            graph: WaitForGraph::new(),
        }
    }

    fn get_or_create(&self, lock_id: u64) -> std::sync::Arc<EntityLock> {
        if let Some(lock) = self.lock_table.read().unwrap().get(&lock_id) {
            return lock.clone();
        }
        let mut table = self.lock_table.write().unwrap();
        table
            .entry(lock_id)
            .or_insert_with(|| std::sync::Arc::new(EntityLock::new(lock_id)))
            .clone()
    }

    fn record_held(&self, txn_id: u64, lock_id: u64) {
        self.txn_locks
            .write()
            .unwrap()
            .entry(txn_id)
            .or_default()
            .insert(lock_id);
    }

    fn forget_held(&self, txn_id: u64, lock_id: u64) {
        if let Some(held) = self.txn_locks.write().unwrap().get_mut(&txn_id) {
            held.remove(&lock_id);
        }
    }

    /// Acquires `lock_id` for `txn_id` at `mode`, blocking if
    /// necessary, and returns a guard that releases the lock when
    /// dropped. Re-entrant: a transaction that already holds a
    /// sufficient mode gets a guard whose drop is a no-op (the
    /// original acquisition's guard is responsible for the real
    /// release). Mirrors `LockManager.lock`'s three-way dispatch
    /// (already-held / upgrade / fresh acquire).
    pub fn lock(&self, lock_id: u64, txn_id: u64, mode: LockMode) -> Result<LockGuard<'_>> {
        let entity = self.get_or_create(lock_id);

        match (entity.mode_held_by(txn_id), mode) {
            (Some(LockMode::Exclusive), _) | (Some(LockMode::Shared), LockMode::Shared) => {
                trace!(txn_id, lock_id, "txn already holds a sufficient lock");
                return Ok(LockGuard::noop());
            }
            (Some(LockMode::Shared), LockMode::Exclusive) => {
                entity.upgrade(txn_id, &self.graph).map_err(|e| {
                    self.remove_transaction(txn_id);
                    e
                })?;
            }
            (None, LockMode::Shared) => {
                entity.s_acquire(txn_id, &self.graph).map_err(|e| {
                    self.remove_transaction(txn_id);
                    e
                })?;
            }
            (None, LockMode::Exclusive) => {
                entity.x_acquire(txn_id, &self.graph).map_err(|e| {
                    self.remove_transaction(txn_id);
                    e
                })?;
            }
        }

        self.record_held(txn_id, lock_id);
        Ok(LockGuard::active(self, entity, txn_id))
    }

    /// Releases every lock `txn_id` holds and forgets it. Mirrors
    /// `LockManager.remove_transaction`, called on deadlock abort.
    pub fn remove_transaction(&self, txn_id: u64) {
        let held = self
            .txn_locks
            .write()
            .unwrap()
            .remove(&txn_id)
            .unwrap_or_default();
        let table = self.lock_table.read().unwrap();
        for lock_id in held {
            if let Some(entity) = table.get(&lock_id) {
                entity.release(txn_id, &self.graph);
            }
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        LockManager::new()
    }
}

/// RAII handle on a held lock. Dropping it releases the lock (unless
/// it was a re-entrant no-op acquisition).
pub struct LockGuard<'a> {
    inner: Option<ActiveGuard<'a>>,
}

struct ActiveGuard<'a> {
    manager: &'a LockManager,
    entity: std::sync::Arc<EntityLock>,
    txn_id: u64,
}

impl<'a> LockGuard<'a> {
    fn noop() -> Self {
        LockGuard { inner: None }
    }

    fn active(manager: &'a LockManager, entity: std::sync::Arc<EntityLock>, txn_id: u64) -> Self {
        LockGuard {
            inner: Some(ActiveGuard {
                manager,
                entity,
                txn_id,
            }),
        }
    }
}

impl<'a> Drop for LockGuard<'a> {
    fn drop(&mut self) {
        if let Some(active) = self.inner.take() {
            active.entity.release(active.txn_id, &active.manager.graph);
            active.manager.forget_held(active.txn_id, active.entity.lock_id);
        }
    }
}
