use std::path::Path;

use crate::engine::{EngineConfig, Lsm};

/// Writes a `metadata.json` for a simple `(LONG key, VARCHAR value)`
/// table, matching spec.md §8 scenario 1's schema.
pub fn write_long_varchar_metadata(dir: &Path, table_name: &str) {
    let json = format!(
        r#"{{
            "table_name": "{table_name}",
            "fields": {{
                "key": {{ "type": "long" }},
                "value": {{ "type": "varchar" }},
                "tombstone": {{ "type": "BOOL" }}
            }}
        }}"#
    );
    std::fs::write(dir.join("metadata.json"), json).unwrap();
}

/// Writes a `metadata.json` for an `(INT key, INT value)` table — the
/// schema used by most unit-level engine tests.
pub fn write_int_int_metadata(dir: &Path, table_name: &str) {
    let json = format!(
        r#"{{
            "table_name": "{table_name}",
            "fields": {{
                "key": {{ "type": "int" }},
                "value": {{ "type": "int" }},
                "tombstone": {{ "type": "BOOL" }}
            }}
        }}"#
    );
    std::fs::write(dir.join("metadata.json"), json).unwrap();
}

/// Opens an `Lsm` over a fresh table directory with a tiny flush
/// threshold disabled (`usize::MAX`) so tests control flush/compact
/// timing explicitly unless a test overrides the config.
pub fn open_manual(dir: &Path) -> Lsm {
    let config = EngineConfig {
        memtable_budget_bytes: usize::MAX,
        compaction_run_threshold: usize::MAX,
        ..EngineConfig::default()
    };
    Lsm::open(dir, config).unwrap()
}
