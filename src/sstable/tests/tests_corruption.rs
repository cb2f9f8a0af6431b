#[cfg(test)]
mod tests {
    use crate::codec::{FieldType, Record, RecordSchema, Value};
    use crate::sstable::builder::SstWriter;
    use crate::sstable::{SSTable, SstError};
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::TempDir;

    fn schema() -> RecordSchema {
        RecordSchema {
            key_type: FieldType::Int,
            value_type: FieldType::Int,
        }
    }

    #[test]
    fn test_flipped_byte_in_block_is_detected_via_checksum() {
        let tmp = TempDir::new().unwrap();
        let schema = schema();
        let writer = SstWriter::new(tmp.path(), 1, schema.clone(), false);
        writer
            .write(vec![Record::new(Value::Int(1), Value::Int(2))].into_iter())
            .unwrap();

        let sst_path = tmp.path().join("1.sst");
        let mut file = OpenOptions::new().write(true).open(&sst_path).unwrap();
        // Flip a byte inside the compressed payload (past the 8-byte length prefix).
        file.seek(SeekFrom::Start(9)).unwrap();
        file.write_all(&[0xffu8]).unwrap();
        file.sync_all().unwrap();

        let table = SSTable::open(tmp.path(), 1, &schema).unwrap();
        let err = table.find(&Value::Int(1)).unwrap_err();
        assert!(matches!(
            err,
            SstError::ChecksumMismatch { .. } | SstError::Compression(_)
        ));
    }
}
