#[cfg(test)]
mod tests {
    use crate::codec::{Record, Value};
    use crate::compaction::merge_runs;

    fn rec(key: i32, val: i32, tombstone: bool) -> Record {
        Record {
            key: Value::Int(key),
            value: Value::Int(val),
            tombstone,
        }
    }

    #[test]
    fn test_merge_interleaves_two_sorted_runs() {
        let run1 = vec![rec(1, 10, false), rec(3, 30, false)];
        let run2 = vec![rec(2, 20, false), rec(4, 40, false)];
        let sources: Vec<(u64, Box<dyn Iterator<Item = Record>>)> = vec![
            (1, Box::new(run1.into_iter())),
            (2, Box::new(run2.into_iter())),
        ];
        let merged: Vec<Record> = merge_runs(sources).collect();
        let keys: Vec<i32> = merged
            .iter()
            .map(|r| match r.key {
                Value::Int(v) => v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_higher_serial_wins_on_key_collision() {
        let older = vec![rec(1, 100, false)];
        let newer = vec![rec(1, 999, false)];
        let sources: Vec<(u64, Box<dyn Iterator<Item = Record>>)> = vec![
            (1, Box::new(older.into_iter())),
            (5, Box::new(newer.into_iter())),
        ];
        let merged: Vec<Record> = merge_runs(sources).collect();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, Value::Int(999));
    }

    #[test]
    fn test_tombstone_suppresses_key_in_output() {
        let older = vec![rec(1, 100, false)];
        let newer = vec![rec(1, 0, true)];
        let sources: Vec<(u64, Box<dyn Iterator<Item = Record>>)> = vec![
            (1, Box::new(older.into_iter())),
            (5, Box::new(newer.into_iter())),
        ];
        let merged: Vec<Record> = merge_runs(sources).collect();
        assert!(merged.is_empty());
    }

    #[test]
    fn test_older_tombstone_does_not_suppress_newer_put() {
        let older = vec![rec(1, 0, true)];
        let newer = vec![rec(1, 42, false)];
        let sources: Vec<(u64, Box<dyn Iterator<Item = Record>>)> = vec![
            (1, Box::new(older.into_iter())),
            (5, Box::new(newer.into_iter())),
        ];
        let merged: Vec<Record> = merge_runs(sources).collect();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, Value::Int(42));
    }

    #[test]
    fn test_merge_of_three_runs_preserves_order() {
        let r1 = vec![rec(1, 1, false), rec(4, 4, false)];
        let r2 = vec![rec(2, 2, false)];
        let r3 = vec![rec(3, 3, false), rec(5, 5, false)];
        let sources: Vec<(u64, Box<dyn Iterator<Item = Record>>)> = vec![
            (1, Box::new(r1.into_iter())),
            (2, Box::new(r2.into_iter())),
            (3, Box::new(r3.into_iter())),
        ];
        let merged: Vec<Record> = merge_runs(sources).collect();
        let keys: Vec<i32> = merged
            .iter()
            .map(|r| match r.key {
                Value::Int(v) => v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![1, 2, 3, 4, 5]);
    }
}
