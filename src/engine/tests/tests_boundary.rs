use tempfile::TempDir;

use crate::codec::Value;
use crate::engine::tests::helpers::{open_manual, write_int_int_metadata};
use crate::sstable::SSTable;

#[test]
fn test_single_block_run_is_findable_and_scannable() {
    let dir = TempDir::new().unwrap();
    write_int_int_metadata(dir.path(), "t");
    let lsm = open_manual(dir.path());

    for k in 0..5 {
        lsm.put(Value::Int(k), Value::Int(k * 10)).unwrap();
    }
    lsm.flush().unwrap();

    for k in 0..5 {
        assert_eq!(lsm.get(&Value::Int(k)).unwrap(), Some(Value::Int(k * 10)));
    }
    assert_eq!(lsm.get(&Value::Int(5)).unwrap(), None);
}

#[test]
fn test_key_at_block_boundary_found_via_prior_block() {
    // DEFAULT_BLOCK_SIZE is 50; write exactly two blocks' worth of
    // keys so a key exactly at the second block's first_key still
    // resolves through the `first_key <= k` sparse-index rule.
    let dir = TempDir::new().unwrap();
    write_int_int_metadata(dir.path(), "t");
    let lsm = open_manual(dir.path());

    for k in 0..100 {
        lsm.put(Value::Int(k), Value::Int(k)).unwrap();
    }
    lsm.flush().unwrap();

    assert_eq!(lsm.get(&Value::Int(49)).unwrap(), Some(Value::Int(49)));
    assert_eq!(lsm.get(&Value::Int(50)).unwrap(), Some(Value::Int(50)));
    assert_eq!(lsm.get(&Value::Int(99)).unwrap(), Some(Value::Int(99)));
}

#[test]
fn test_scan_yields_keys_in_ascending_order() {
    let dir = TempDir::new().unwrap();
    write_int_int_metadata(dir.path(), "t");
    let lsm = open_manual(dir.path());

    for k in (0..20).rev() {
        lsm.put(Value::Int(k), Value::Int(k)).unwrap();
    }
    lsm.flush().unwrap();

    // The serial is seeded from a nanosecond timestamp (spec.md §9),
    // not a small fixed number, so discover it from the directory
    // rather than assuming serial 1.
    let serial = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.path().file_stem().and_then(|s| s.to_str().map(str::to_string)))
        .filter_map(|s| s.parse::<u64>().ok())
        .max()
        .expect("a committed run should exist after flush");
    let table = SSTable::open(dir.path(), serial, lsm.schema()).unwrap();
    let keys: Vec<i32> = table
        .scan()
        .map(|r| match r.key {
            Value::Int(v) => v,
            _ => unreachable!(),
        })
        .collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted);
    assert_eq!(keys.len(), 20);
}
