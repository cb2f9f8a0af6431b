//! # Table metadata (`metadata.json`)
//!
//! Loads a table's key/value schema from a `metadata.json` file sitting
//! next to its data directory. Grounded on
//! `examples/original_source/anura/metadata.py`'s `TableMetadata`
//! (`_parse_type` recursively walking a JSON `{"type": ..., "options":
//! {...}}` tree) — translated from Python's reflection-based
//! `get_class_type` lookup into a plain `match` over a `type` string,
//! since Rust has no runtime class registry to reflect into.
//!
//! The schema-description mini-language (`anura/metadata/parser.py`, a
//! `ply` lexer/yacc grammar) is out of scope; `metadata.json` is parsed
//! with `serde_json` instead.
//!
//! ## JSON shape
//!
//! Per spec.md §6, the schema's three record fields (`key`, `value`,
//! `tombstone`) live under a top-level `"fields"` object, matching
//! `examples/original_source/anura/metadata.py`'s
//! `json_meta["fields"]`. `tombstone` is always `BOOL` and is parsed
//! only to be validated/ignored — [`RecordSchema`] does not store it
//! (see [`TableMetadata::record_schema`]).
//!
//! ```json
//! {
//!   "table_name": "users",
//!   "fields": {
//!     "key": { "type": "unsigned_int" },
//!     "value": {
//!       "type": "struct",
//!       "options": {
//!         "fields": [
//!           { "name": "name", "type": { "type": "varchar", "options": { "charset": "utf-8" } } },
//!           { "name": "active", "type": { "type": "bool" } }
//!         ]
//!       }
//!     },
//!     "tombstone": { "type": "BOOL" }
//!   }
//! }
//! ```
//!
//! `varchar`/`array` fields may carry a `"length_type"` option (one of
//! `unsigned_short`/`unsigned_int`/`unsigned_long`, default
//! `unsigned_short`); `array` additionally carries `"inner_type"`;
//! `struct` carries an ordered `"fields"` array so declaration order
//! survives JSON parsing without relying on map iteration order.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::codec::{Charset, FieldType, RecordSchema};

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("io error reading metadata: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid metadata json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid schema: {0}")]
    Schema(String),
}

type Result<T> = std::result::Result<T, MetadataError>;

#[derive(Debug, Deserialize)]
struct TypeSpecJson {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    options: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StructFieldJson {
    name: String,
    #[serde(rename = "type")]
    type_spec: TypeSpecJson,
}

#[derive(Debug, Deserialize)]
struct FieldsJson {
    key: TypeSpecJson,
    value: TypeSpecJson,
    /// Always `BOOL` per spec.md §6; parsed only so a conformant
    /// `metadata.json` deserializes, never consulted beyond that
    /// (the tombstone flag itself is not schema-driven data).
    #[serde(default)]
    #[allow(dead_code)]
    tombstone: Option<TypeSpecJson>,
}

#[derive(Debug, Deserialize)]
struct MetadataJson {
    table_name: String,
    fields: FieldsJson,
}

/// A table's schema: name plus key/value [`FieldType`]s.
#[derive(Debug, Clone)]
pub struct TableMetadata {
    pub table_name: String,
    pub key_type: FieldType,
    pub value_type: FieldType,
}

impl TableMetadata {
    /// Loads and parses `<dir>/metadata.json`.
    pub fn load(dir: &Path) -> Result<TableMetadata> {
        let path = dir.join("metadata.json");
        let raw = fs::read_to_string(&path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<TableMetadata> {
        let parsed: MetadataJson = serde_json::from_str(raw)?;
        let key_type = parse_type(&parsed.fields.key)?;
        let value_type = parse_type(&parsed.fields.value)?;
        key_type
            .validate()
            .map_err(|e| MetadataError::Schema(e.to_string()))?;
        value_type
            .validate()
            .map_err(|e| MetadataError::Schema(e.to_string()))?;
        Ok(TableMetadata {
            table_name: parsed.table_name,
            key_type,
            value_type,
        })
    }

    pub fn record_schema(&self) -> RecordSchema {
        RecordSchema {
            key_type: self.key_type.clone(),
            value_type: self.value_type.clone(),
        }
    }
}

/// Matches spec.md §6's recognized `type` values
/// (`SHORT|INT|LONG|FLOAT|DOUBLE|BOOL|UNSIGNED_SHORT|UNSIGNED_INT|
/// UNSIGNED_LONG`) case-insensitively, so `metadata.json` may spell
/// them in the spec's own upper-snake-case or in lowercase.
fn parse_primitive_name(name: &str) -> Option<FieldType> {
    Some(match name.to_ascii_lowercase().as_str() {
        "short" => FieldType::Short,
        "int" => FieldType::Int,
        "long" => FieldType::Long,
        "float" => FieldType::Float,
        "double" => FieldType::Double,
        "bool" => FieldType::Bool,
        "unsigned_short" => FieldType::UnsignedShort,
        "unsigned_int" => FieldType::UnsignedInt,
        "unsigned_long" => FieldType::UnsignedLong,
        _ => return None,
    })
}

fn parse_length_type(options: &serde_json::Value) -> Result<FieldType> {
    match options.get("length_type").and_then(|v| v.as_str()) {
        None => Ok(FieldType::default_length_type()),
        Some(name) => parse_primitive_name(name).ok_or_else(|| {
            MetadataError::Schema(format!("unknown length_type {name:?}"))
        }),
    }
}

fn parse_charset(options: &serde_json::Value) -> Result<Charset> {
    match options.get("charset").and_then(|v| v.as_str()) {
        None | Some("utf-8") | Some("utf8") => Ok(Charset::Utf8),
        Some("ascii") => Ok(Charset::Ascii),
        Some(other) => Err(MetadataError::Schema(format!("unknown charset {other:?}"))),
    }
}

fn parse_type(spec: &TypeSpecJson) -> Result<FieldType> {
    if let Some(primitive) = parse_primitive_name(&spec.type_name) {
        return Ok(primitive);
    }

    let options = spec
        .options
        .clone()
        .unwrap_or(serde_json::Value::Object(Default::default()));

    match spec.type_name.to_ascii_lowercase().as_str() {
        "varchar" => {
            let charset = parse_charset(&options)?;
            let length_type = parse_length_type(&options)?;
            Ok(FieldType::Varchar {
                charset,
                length_type: Box::new(length_type),
            })
        }
        "array" => {
            let inner_json = options.get("inner_type").ok_or_else(|| {
                MetadataError::Schema("array type requires options.inner_type".to_string())
            })?;
            let inner_spec: TypeSpecJson = serde_json::from_value(inner_json.clone())?;
            let inner_type = parse_type(&inner_spec)?;
            let length_type = parse_length_type(&options)?;
            Ok(FieldType::Array {
                inner_type: Box::new(inner_type),
                length_type: Box::new(length_type),
            })
        }
        "struct" => {
            let fields_json = options.get("fields").ok_or_else(|| {
                MetadataError::Schema("struct type requires options.fields".to_string())
            })?;
            let fields_spec: Vec<StructFieldJson> = serde_json::from_value(fields_json.clone())?;
            let mut fields = Vec::with_capacity(fields_spec.len());
            for field in fields_spec {
                let field_type = parse_type(&field.type_spec)?;
                fields.push((field.name, field_type));
            }
            Ok(FieldType::Struct { fields })
        }
        other => Err(MetadataError::Schema(format!("unknown type {other:?}"))),
    }
}
