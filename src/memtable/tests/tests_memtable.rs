#[cfg(test)]
mod tests {
    use crate::codec::{FieldType, RecordSchema, Value};
    use crate::memtable::Memtable;

    fn schema() -> RecordSchema {
        RecordSchema {
            key_type: FieldType::Int,
            value_type: FieldType::Int,
        }
    }

    #[test]
    fn test_put_tracks_approximate_size() {
        let schema = schema();
        let mut mt = Memtable::new();
        assert_eq!(mt.approximate_size(), 0);
        mt.put(&schema, Value::Int(1), Value::Int(100)).unwrap();
        assert!(mt.approximate_size() > 0);
    }

    #[test]
    fn test_get_reflects_put_and_delete() {
        let schema = schema();
        let mut mt = Memtable::new();
        mt.put(&schema, Value::Int(1), Value::Int(100)).unwrap();
        let (value, tombstone) = mt.get(&Value::Int(1)).unwrap();
        assert_eq!(value, &Value::Int(100));
        assert!(!tombstone);

        mt.delete(&schema, Value::Int(1)).unwrap();
        let (_, tombstone) = mt.get(&Value::Int(1)).unwrap();
        assert!(tombstone);
    }

    #[test]
    fn test_len_counts_distinct_keys_including_tombstones() {
        let schema = schema();
        let mut mt = Memtable::new();
        mt.put(&schema, Value::Int(1), Value::Int(1)).unwrap();
        mt.put(&schema, Value::Int(2), Value::Int(2)).unwrap();
        mt.delete(&schema, Value::Int(3)).unwrap();
        assert_eq!(mt.len(), 3);
    }

    #[test]
    fn test_iter_yields_all_entries_sorted_by_key() {
        let schema = schema();
        let mut mt = Memtable::new();
        mt.put(&schema, Value::Int(3), Value::Int(30)).unwrap();
        mt.put(&schema, Value::Int(1), Value::Int(10)).unwrap();
        mt.put(&schema, Value::Int(2), Value::Int(20)).unwrap();

        let keys: Vec<i32> = mt
            .iter()
            .map(|(k, _, _)| match k {
                Value::Int(v) => *v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }
}
