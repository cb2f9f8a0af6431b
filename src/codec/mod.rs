//! # Type registry & record codec
//!
//! This module is the crate's closed type system and the binary codec
//! built on top of it (C1 in the design).
//!
//! A [`FieldType`] describes the shape of one field — a fixed-width
//! primitive, a length-prefixed string, a homogeneous array, or an
//! ordered struct of named fields. Schemas are data (loaded at runtime
//! from `metadata.json`, see [`crate::metadata`]), so dispatch on type
//! happens at the value level, not at compile time: [`Value`] is the
//! single runtime value representation, and [`Encode`]/[`Decode`] are
//! the two capability traits implemented for it.
//!
//! ## Wire format
//!
//! All multi-byte integers are **big-endian**. A primitive occupies
//! exactly `FieldType::base_size()` bytes, raw-packed. A varchar is a
//! length (of the declared `length_type` width) followed by that many
//! bytes of text. An array is a length followed by that many encodings
//! of the inner type. A struct is the concatenation of its fields'
//! encodings in declaration order — there is no per-field tag, because
//! the schema drives both encode and decode.
//!
//! The codec is purely functional: no function here retains state
//! across calls, and nothing here touches the filesystem.

#[cfg(test)]
mod tests;

use std::fmt;

use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Errors
// ------------------------------------------------------------------------------------------------

/// Errors raised by the codec.
///
/// Decoding failures are [`CodecError::SchemaMismatch`] — the byte
/// stream cannot satisfy the schema. Encoding failures are
/// [`CodecError::EncodingError`] — the value cannot be represented in
/// the wire format (e.g. a string too long for its length prefix).
#[derive(Debug, Error)]
pub enum CodecError {
    /// The byte stream does not match what the schema requires to
    /// decode one more value (truncated input, invalid UTF-8, an
    /// out-of-range boolean byte, a malformed length prefix, ...).
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A value cannot be encoded under the given schema (length
    /// overflow, non-ASCII text under an ASCII charset, a struct
    /// missing a declared field, ...).
    #[error("encoding error: {0}")]
    EncodingError(String),
}

type Result<T> = std::result::Result<T, CodecError>;

// ------------------------------------------------------------------------------------------------
// Charset
// ------------------------------------------------------------------------------------------------

/// Text encoding for a [`FieldType::Varchar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Ascii,
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Charset::Utf8 => write!(f, "utf-8"),
            Charset::Ascii => write!(f, "ascii"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FieldType — the closed tagged union
// ------------------------------------------------------------------------------------------------

/// One field's type, as declared by table metadata.
///
/// This is a closed tagged union: every variant is a finite, fixed
/// construct handled explicitly by [`Encode`]/[`Decode`] — there is no
/// runtime reflection, just a `match` on the tag.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Short,
    Int,
    Long,
    Float,
    Double,
    Bool,
    UnsignedShort,
    UnsignedInt,
    UnsignedLong,
    /// A length-prefixed string. `length_type` must be an unsigned
    /// integer primitive (validated by [`FieldType::validate`]).
    Varchar {
        charset: Charset,
        length_type: Box<FieldType>,
    },
    /// A length-prefixed homogeneous sequence. `length_type` must be
    /// an unsigned integer primitive.
    Array {
        inner_type: Box<FieldType>,
        length_type: Box<FieldType>,
    },
    /// An ordered map from field name to type. Encoding is the plain
    /// concatenation of field encodings in declaration order.
    Struct { fields: Vec<(String, FieldType)> },
}

impl FieldType {
    /// The default length type for varchar/array fields when the
    /// schema does not specify one: unsigned 16-bit (spec default).
    pub fn default_length_type() -> FieldType {
        FieldType::UnsignedShort
    }

    /// `true` for the fixed-width primitives (everything except
    /// varchar/array/struct).
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            FieldType::Short
                | FieldType::Int
                | FieldType::Long
                | FieldType::Float
                | FieldType::Double
                | FieldType::Bool
                | FieldType::UnsignedShort
                | FieldType::UnsignedInt
                | FieldType::UnsignedLong
        )
    }

    /// `true` for the unsigned integer primitives — the only types
    /// legal as a `length_type`.
    pub fn is_unsigned_length_type(&self) -> bool {
        matches!(
            self,
            FieldType::UnsignedShort | FieldType::UnsignedInt | FieldType::UnsignedLong
        )
    }

    /// Encoded size in bytes for a fixed-width primitive. Panics if
    /// called on a non-primitive — callers must check
    /// [`FieldType::is_primitive`] first (this mirrors the teacher's
    /// `base_size()` on `APrimitiveType`, which is likewise only
    /// defined for primitives).
    pub fn base_size(&self) -> usize {
        match self {
            FieldType::Short | FieldType::UnsignedShort => 2,
            FieldType::Int | FieldType::UnsignedInt | FieldType::Float => 4,
            FieldType::Long | FieldType::UnsignedLong | FieldType::Double => 8,
            FieldType::Bool => 1,
            _ => unreachable!("base_size() called on a non-primitive FieldType"),
        }
    }

    /// Validates schema-load-time constraints: every `length_type`
    /// reachable from this type must be an unsigned integer primitive,
    /// recursively through arrays/structs.
    pub fn validate(&self) -> Result<()> {
        match self {
            FieldType::Varchar { length_type, .. } | FieldType::Array { length_type, .. } => {
                if !length_type.is_unsigned_length_type() {
                    return Err(CodecError::SchemaMismatch(format!(
                        "length_type must be an unsigned integer primitive, got {length_type:?}"
                    )));
                }
                if let FieldType::Array { inner_type, .. } = self {
                    inner_type.validate()?;
                }
                Ok(())
            }
            FieldType::Struct { fields } => {
                for (_, ty) in fields {
                    ty.validate()?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Value — the single runtime value representation
// ------------------------------------------------------------------------------------------------

/// A runtime value, tagged to match one [`FieldType`] variant.
///
/// `Value` carries no type information of its own; callers always pair
/// it with the [`FieldType`] that describes it (from table metadata).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    UnsignedShort(u16),
    UnsignedInt(u32),
    UnsignedLong(u64),
    Varchar(String),
    Array(Vec<Value>),
    /// Ordered to match the struct's declared field order.
    Struct(Vec<(String, Value)>),
}

impl Value {
    /// Orders two values of the *same* logical type. Keys in this
    /// crate are always compared under a single schema's key type, so
    /// mismatched variants here indicate a programming error upstream.
    pub fn cmp_typed(&self, other: &Value) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        use Value::*;
        match (self, other) {
            (Short(a), Short(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Long(a), Long(b)) => a.cmp(b),
            (UnsignedShort(a), UnsignedShort(b)) => a.cmp(b),
            (UnsignedInt(a), UnsignedInt(b)) => a.cmp(b),
            (UnsignedLong(a), UnsignedLong(b)) => a.cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Double(a), Double(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Varchar(a), Varchar(b)) => a.cmp(b),
            (Array(a), Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.cmp_typed(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Struct(a), Struct(b)) => {
                for ((_, x), (_, y)) in a.iter().zip(b.iter()) {
                    let ord = x.cmp_typed(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            }
            _ => unreachable!("cmp_typed called on values of different shapes"),
        }
    }

    pub fn eq_typed(&self, other: &Value) -> bool {
        self.cmp_typed(other) == std::cmp::Ordering::Equal
    }
}

// ------------------------------------------------------------------------------------------------
// Capability traits
// ------------------------------------------------------------------------------------------------

/// Encodes a value into a byte buffer under a given [`FieldType`].
///
/// A single-method capability trait (the "`IEncoder`" redesign note):
/// one implementation, dispatching on the type tag at the call site.
pub trait Encode {
    fn encode(&self, ty: &FieldType, buf: &mut Vec<u8>) -> Result<()>;
}

/// Decodes a value from a byte slice under a given [`FieldType`].
///
/// Returns `(value, bytes_consumed)` so callers can advance a cursor
/// through a buffer holding multiple encoded items.
pub trait Decode: Sized {
    fn decode(buf: &[u8], ty: &FieldType) -> Result<(Self, usize)>;
}

impl Encode for Value {
    fn encode(&self, ty: &FieldType, buf: &mut Vec<u8>) -> Result<()> {
        match (ty, self) {
            (FieldType::Short, Value::Short(v)) => buf.extend_from_slice(&v.to_be_bytes()),
            (FieldType::Int, Value::Int(v)) => buf.extend_from_slice(&v.to_be_bytes()),
            (FieldType::Long, Value::Long(v)) => buf.extend_from_slice(&v.to_be_bytes()),
            (FieldType::Float, Value::Float(v)) => buf.extend_from_slice(&v.to_be_bytes()),
            (FieldType::Double, Value::Double(v)) => buf.extend_from_slice(&v.to_be_bytes()),
            (FieldType::Bool, Value::Bool(v)) => buf.push(if *v { 1 } else { 0 }),
            (FieldType::UnsignedShort, Value::UnsignedShort(v)) => {
                buf.extend_from_slice(&v.to_be_bytes())
            }
            (FieldType::UnsignedInt, Value::UnsignedInt(v)) => {
                buf.extend_from_slice(&v.to_be_bytes())
            }
            (FieldType::UnsignedLong, Value::UnsignedLong(v)) => {
                buf.extend_from_slice(&v.to_be_bytes())
            }
            (
                FieldType::Varchar {
                    charset,
                    length_type,
                },
                Value::Varchar(s),
            ) => {
                if *charset == Charset::Ascii && !s.is_ascii() {
                    return Err(CodecError::EncodingError(format!(
                        "varchar {s:?} is not valid ASCII"
                    )));
                }
                let bytes = s.as_bytes();
                encode_length(length_type, bytes.len(), buf)?;
                buf.extend_from_slice(bytes);
            }
            (
                FieldType::Array {
                    inner_type,
                    length_type,
                },
                Value::Array(items),
            ) => {
                encode_length(length_type, items.len(), buf)?;
                for item in items {
                    item.encode(inner_type, buf)?;
                }
            }
            (FieldType::Struct { fields }, Value::Struct(values)) => {
                if fields.len() != values.len() {
                    return Err(CodecError::EncodingError(format!(
                        "struct arity mismatch: schema has {} fields, value has {}",
                        fields.len(),
                        values.len()
                    )));
                }
                for ((field_name, field_ty), (value_name, value)) in fields.iter().zip(values) {
                    if field_name != value_name {
                        return Err(CodecError::EncodingError(format!(
                            "struct field order mismatch: expected {field_name:?}, got {value_name:?}"
                        )));
                    }
                    value.encode(field_ty, buf)?;
                }
            }
            (ty, value) => {
                return Err(CodecError::EncodingError(format!(
                    "value {value:?} does not match type {ty:?}"
                )));
            }
        }
        Ok(())
    }
}

impl Decode for Value {
    fn decode(buf: &[u8], ty: &FieldType) -> Result<(Self, usize)> {
        match ty {
            FieldType::Short => {
                let bytes = take(buf, 2)?;
                Ok((
                    Value::Short(i16::from_be_bytes(bytes.try_into().unwrap())),
                    2,
                ))
            }
            FieldType::Int => {
                let bytes = take(buf, 4)?;
                Ok((Value::Int(i32::from_be_bytes(bytes.try_into().unwrap())), 4))
            }
            FieldType::Long => {
                let bytes = take(buf, 8)?;
                Ok((
                    Value::Long(i64::from_be_bytes(bytes.try_into().unwrap())),
                    8,
                ))
            }
            FieldType::Float => {
                let bytes = take(buf, 4)?;
                Ok((
                    Value::Float(f32::from_be_bytes(bytes.try_into().unwrap())),
                    4,
                ))
            }
            FieldType::Double => {
                let bytes = take(buf, 8)?;
                Ok((
                    Value::Double(f64::from_be_bytes(bytes.try_into().unwrap())),
                    8,
                ))
            }
            FieldType::Bool => {
                let bytes = take(buf, 1)?;
                match bytes[0] {
                    0 => Ok((Value::Bool(false), 1)),
                    1 => Ok((Value::Bool(true), 1)),
                    other => Err(CodecError::SchemaMismatch(format!(
                        "invalid bool byte 0x{other:02x}"
                    ))),
                }
            }
            FieldType::UnsignedShort => {
                let bytes = take(buf, 2)?;
                Ok((
                    Value::UnsignedShort(u16::from_be_bytes(bytes.try_into().unwrap())),
                    2,
                ))
            }
            FieldType::UnsignedInt => {
                let bytes = take(buf, 4)?;
                Ok((
                    Value::UnsignedInt(u32::from_be_bytes(bytes.try_into().unwrap())),
                    4,
                ))
            }
            FieldType::UnsignedLong => {
                let bytes = take(buf, 8)?;
                Ok((
                    Value::UnsignedLong(u64::from_be_bytes(bytes.try_into().unwrap())),
                    8,
                ))
            }
            FieldType::Varchar {
                charset,
                length_type,
            } => {
                let (len, mut consumed) = decode_length(length_type, buf)?;
                let text_bytes = take(&buf[consumed..], len)?;
                consumed += len;
                let text = match charset {
                    Charset::Utf8 | Charset::Ascii => {
                        String::from_utf8(text_bytes.to_vec()).map_err(|e| {
                            CodecError::SchemaMismatch(format!("invalid utf-8 in varchar: {e}"))
                        })?
                    }
                };
                if *charset == Charset::Ascii && !text.is_ascii() {
                    return Err(CodecError::SchemaMismatch(
                        "varchar declared ascii contains non-ascii bytes".to_string(),
                    ));
                }
                Ok((Value::Varchar(text), consumed))
            }
            FieldType::Array {
                inner_type,
                length_type,
            } => {
                let (count, mut consumed) = decode_length(length_type, buf)?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    let (item, n) = Value::decode(&buf[consumed..], inner_type)?;
                    items.push(item);
                    consumed += n;
                }
                Ok((Value::Array(items), consumed))
            }
            FieldType::Struct { fields } => {
                let mut consumed = 0;
                let mut values = Vec::with_capacity(fields.len());
                for (name, field_ty) in fields {
                    let (value, n) = Value::decode(&buf[consumed..], field_ty)?;
                    values.push((name.clone(), value));
                    consumed += n;
                }
                Ok((Value::Struct(values), consumed))
            }
        }
    }
}

fn take(buf: &[u8], n: usize) -> Result<&[u8]> {
    if buf.len() < n {
        return Err(CodecError::SchemaMismatch(format!(
            "unexpected end of buffer: need {n} bytes, have {}",
            buf.len()
        )));
    }
    Ok(&buf[..n])
}

fn encode_length(length_type: &FieldType, n: usize, buf: &mut Vec<u8>) -> Result<()> {
    match length_type {
        FieldType::UnsignedShort => {
            let n = u16::try_from(n).map_err(|_| {
                CodecError::EncodingError(format!("length {n} overflows unsigned 16-bit prefix"))
            })?;
            buf.extend_from_slice(&n.to_be_bytes());
        }
        FieldType::UnsignedInt => {
            let n = u32::try_from(n).map_err(|_| {
                CodecError::EncodingError(format!("length {n} overflows unsigned 32-bit prefix"))
            })?;
            buf.extend_from_slice(&n.to_be_bytes());
        }
        FieldType::UnsignedLong => {
            buf.extend_from_slice(&(n as u64).to_be_bytes());
        }
        other => unreachable!("invalid length_type {other:?} should have been rejected at schema load"),
    }
    Ok(())
}

fn decode_length(length_type: &FieldType, buf: &[u8]) -> Result<(usize, usize)> {
    match length_type {
        FieldType::UnsignedShort => {
            let bytes = take(buf, 2)?;
            Ok((u16::from_be_bytes(bytes.try_into().unwrap()) as usize, 2))
        }
        FieldType::UnsignedInt => {
            let bytes = take(buf, 4)?;
            Ok((u32::from_be_bytes(bytes.try_into().unwrap()) as usize, 4))
        }
        FieldType::UnsignedLong => {
            let bytes = take(buf, 8)?;
            Ok((u64::from_be_bytes(bytes.try_into().unwrap()) as usize, 8))
        }
        other => unreachable!("invalid length_type {other:?} should have been rejected at schema load"),
    }
}

// ------------------------------------------------------------------------------------------------
// Record — (key, value, tombstone)
// ------------------------------------------------------------------------------------------------

/// The schema for one table: the type of its key and value fields. The
/// tombstone field is always [`FieldType::Bool`] and is not stored
/// here.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub key_type: FieldType,
    pub value_type: FieldType,
}

/// A single `(key, value, tombstone)` triple. Two records are equal
/// iff their keys are equal; ordering is by key only (see
/// [`Record::cmp_by_key`]).
#[derive(Debug, Clone)]
pub struct Record {
    pub key: Value,
    pub value: Value,
    pub tombstone: bool,
}

impl Record {
    pub fn new(key: Value, value: Value) -> Self {
        Record {
            key,
            value,
            tombstone: false,
        }
    }

    pub fn tombstone(key: Value, value: Value) -> Self {
        Record {
            key,
            value,
            tombstone: true,
        }
    }

    pub fn cmp_by_key(&self, other: &Record) -> std::cmp::Ordering {
        self.key.cmp_typed(&other.key)
    }

    /// `key ‖ value ‖ tombstone`, per spec's record encoding rule.
    pub fn encode(&self, schema: &RecordSchema, buf: &mut Vec<u8>) -> Result<()> {
        self.key.encode(&schema.key_type, buf)?;
        self.value.encode(&schema.value_type, buf)?;
        Value::Bool(self.tombstone).encode(&FieldType::Bool, buf)?;
        Ok(())
    }

    pub fn decode(buf: &[u8], schema: &RecordSchema) -> Result<(Record, usize)> {
        let (key, n1) = Value::decode(buf, &schema.key_type)?;
        let (value, n2) = Value::decode(&buf[n1..], &schema.value_type)?;
        let (tombstone, n3) = Value::decode(&buf[n1 + n2..], &FieldType::Bool)?;
        let tombstone = match tombstone {
            Value::Bool(b) => b,
            _ => unreachable!(),
        };
        Ok((Record { key, value, tombstone }, n1 + n2 + n3))
    }
}
