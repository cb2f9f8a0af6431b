#[cfg(test)]
mod tests {
    use crate::codec::{FieldType, Record, RecordSchema, Value};
    use crate::sstable::builder::SstWriter;
    use crate::sstable::SSTable;
    use tempfile::TempDir;

    fn schema() -> RecordSchema {
        RecordSchema {
            key_type: FieldType::Int,
            value_type: FieldType::Int,
        }
    }

    #[test]
    fn test_temp_build_leaves_no_final_files_until_commit() {
        let tmp = TempDir::new().unwrap();
        let schema = schema();
        let writer = SstWriter::new(tmp.path(), 3, schema.clone(), true);
        writer
            .write(vec![Record::new(Value::Int(1), Value::Int(2))].into_iter())
            .unwrap();

        assert!(!tmp.path().join("3.sst").exists());
        assert!(tmp.path().join("3.sst.tmp").exists());

        writer.commit().unwrap();
        assert!(tmp.path().join("3.sst").exists());
        assert!(tmp.path().join("3.spx").exists());
        assert!(!tmp.path().join("3.sst.tmp").exists());

        let table = SSTable::open(tmp.path(), 3, &schema).unwrap();
        assert!(table.find(&Value::Int(1)).unwrap().is_some());
    }

    #[test]
    fn test_non_temp_build_writes_final_files_directly() {
        let tmp = TempDir::new().unwrap();
        let schema = schema();
        let writer = SstWriter::new(tmp.path(), 4, schema.clone(), false);
        writer
            .write(vec![Record::new(Value::Int(1), Value::Int(2))].into_iter())
            .unwrap();
        assert!(tmp.path().join("4.sst").exists());
        assert!(tmp.path().join("4.spx").exists());
    }

    #[test]
    fn test_commit_on_non_temp_writer_is_invalid_state() {
        let tmp = TempDir::new().unwrap();
        let schema = schema();
        let writer = SstWriter::new(tmp.path(), 5, schema.clone(), false);
        writer
            .write(vec![Record::new(Value::Int(1), Value::Int(2))].into_iter())
            .unwrap();

        let err = writer.commit().unwrap_err();
        assert!(matches!(err, crate::sstable::SstError::InvalidState(_)));
    }
}
