#[cfg(test)]
mod tests {
    use crate::codec::{FieldType, Record, RecordSchema, Value};
    use std::cmp::Ordering;

    fn schema() -> RecordSchema {
        RecordSchema {
            key_type: FieldType::UnsignedInt,
            value_type: FieldType::Int,
        }
    }

    #[test]
    fn test_record_roundtrip() {
        let schema = schema();
        let record = Record::new(Value::UnsignedInt(42), Value::Int(-7));
        let mut buf = Vec::new();
        record.encode(&schema, &mut buf).unwrap();
        let (decoded, consumed) = Record::decode(&buf, &schema).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded.key, record.key);
        assert_eq!(decoded.value, record.value);
        assert_eq!(decoded.tombstone, false);
    }

    #[test]
    fn test_tombstone_roundtrip() {
        let schema = schema();
        let record = Record::tombstone(Value::UnsignedInt(1), Value::Int(0));
        let mut buf = Vec::new();
        record.encode(&schema, &mut buf).unwrap();
        let (decoded, _) = Record::decode(&buf, &schema).unwrap();
        assert!(decoded.tombstone);
    }

    #[test]
    fn test_cmp_by_key_orders_by_key_only() {
        let a = Record::new(Value::UnsignedInt(1), Value::Int(100));
        let b = Record::new(Value::UnsignedInt(2), Value::Int(-100));
        assert_eq!(a.cmp_by_key(&b), Ordering::Less);
        assert_eq!(b.cmp_by_key(&a), Ordering::Greater);

        let c = Record::new(Value::UnsignedInt(1), Value::Int(999));
        assert_eq!(a.cmp_by_key(&c), Ordering::Equal);
    }

    #[test]
    fn test_multiple_records_concatenate() {
        let schema = schema();
        let r1 = Record::new(Value::UnsignedInt(1), Value::Int(1));
        let r2 = Record::new(Value::UnsignedInt(2), Value::Int(2));
        let mut buf = Vec::new();
        r1.encode(&schema, &mut buf).unwrap();
        r2.encode(&schema, &mut buf).unwrap();

        let (d1, n1) = Record::decode(&buf, &schema).unwrap();
        let (d2, n2) = Record::decode(&buf[n1..], &schema).unwrap();
        assert_eq!(n1 + n2, buf.len());
        assert_eq!(d1.key, r1.key);
        assert_eq!(d2.key, r2.key);
    }
}
