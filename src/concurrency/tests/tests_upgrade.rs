#[cfg(test)]
mod tests {
    use crate::concurrency::{LockManager, LockMode};

    #[test]
    fn test_sole_shared_holder_upgrades_to_exclusive() {
        let mgr = LockManager::new();
        let _g1 = mgr.lock(1, 100, LockMode::Shared).unwrap();
        // Same txn, same lock: exclusive subsumes its own shared hold.
        let _g2 = mgr.lock(1, 100, LockMode::Exclusive).unwrap();
    }

    #[test]
    fn test_upgrade_waits_for_other_shared_holders() {
        use std::sync::Arc;
        use std::time::Duration;

        let mgr = Arc::new(LockManager::new());
        let mgr2 = mgr.clone();

        // Txn 100 and txn 200 both hold A(S).
        let _g1 = mgr.lock(1, 100, LockMode::Shared).unwrap();
        let g_other = mgr.lock(1, 200, LockMode::Shared).unwrap();

        // Txn 100 requests A(X): must block until it is the sole
        // shared holder, i.e. until txn 200 releases — per spec.md
        // §8 scenario 6.
        let handle = std::thread::spawn(move || {
            let _g = mgr2.lock(1, 100, LockMode::Exclusive).unwrap();
        });

        std::thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        // Releasing txn 100's own shared hold must NOT be what
        // unblocks the upgrade — only the other holder's release can.
        drop(g_other);

        handle.join().unwrap();
    }

    #[test]
    fn test_new_shared_request_waits_behind_pending_upgrade() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::time::Duration;

        let mgr = Arc::new(LockManager::new());

        // Txn 100 and txn 200 both hold A(S); txn 100 requests A(X)
        // and blocks on txn 200.
        let g1 = mgr.lock(1, 100, LockMode::Shared).unwrap();
        let g_other = mgr.lock(1, 200, LockMode::Shared).unwrap();

        let mgr_upgrade = mgr.clone();
        let upgrade_done = Arc::new(AtomicBool::new(false));
        let upgrade_done_writer = upgrade_done.clone();
        let upgrade_handle = std::thread::spawn(move || {
            let _g = mgr_upgrade.lock(1, 100, LockMode::Exclusive).unwrap();
            upgrade_done_writer.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
        });

        std::thread::sleep(Duration::from_millis(30));

        // Txn 300's fresh shared request must wait behind the pending
        // upgrade, not jump ahead of it.
        let mgr_reader = mgr.clone();
        let reader_handle = std::thread::spawn(move || {
            let _g = mgr_reader.lock(1, 300, LockMode::Shared).unwrap();
        });

        std::thread::sleep(Duration::from_millis(30));
        assert!(!upgrade_done.load(Ordering::SeqCst));
        assert!(!reader_handle.is_finished());

        drop(g_other);
        upgrade_handle.join().unwrap();
        assert!(upgrade_done.load(Ordering::SeqCst));
        reader_handle.join().unwrap();

        drop(g1);
    }
}
