//! Database inventory loading.
//!
//! The inventory is a JSON array of records:
//!
//! ```json
//! [
//!   {
//!     "db_unique_name": "DBA01_BURG",
//!     "instances": [["bol8db1", "dba01"], ["bol8db2", "dba02"]],
//!     "diag_path": "/u01/oracle"
//!   }
//! ]
//! ```
//!
//! The whole document is validated before anything is returned: a single bad
//! record rejects the load.

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

const REQUIRED_KEYS: [&str; 3] = ["db_unique_name", "instances", "diag_path"];

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read inventory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("inventory is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("top-level JSON must be a list")]
    NotAList,
    #[error("traces[{index}] must be an object")]
    NotAnObject { index: usize },
    #[error("traces[{index}] missing '{key}'")]
    MissingKey { index: usize, key: &'static str },
    #[error("traces[{index}]['instances'] must be a list")]
    InstancesNotAList { index: usize },
    #[error("traces[{index}] is malformed: {reason}")]
    Malformed { index: usize, reason: String },
}

/// One (host, instance identifier) pair of a tracked database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub host: String,
    pub sid: String,
}

/// One tracked database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    /// Lower-cased `db_unique_name`.
    pub name: String,
    pub diagnostic_root: PathBuf,
    pub instances: Vec<Instance>,
}

#[derive(Deserialize)]
struct RawEntry {
    db_unique_name: String,
    instances: Vec<(String, String)>,
    diag_path: String,
}

impl From<RawEntry> for InventoryEntry {
    fn from(raw: RawEntry) -> Self {
        Self {
            name: raw.db_unique_name.to_lowercase(),
            diagnostic_root: PathBuf::from(raw.diag_path),
            instances: raw
                .instances
                .into_iter()
                .map(|(host, sid)| Instance { host, sid })
                .collect(),
        }
    }
}

/// Read and validate the inventory file at `path`.
pub fn load(path: &Path) -> Result<Vec<InventoryEntry>, SchemaError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents)
}

/// Parse and validate an inventory document.
///
/// Structural checks run first so the error names the offending record and
/// key; the typed conversion then catches wrong value types.
pub fn parse(contents: &str) -> Result<Vec<InventoryEntry>, SchemaError> {
    let document: Value = serde_json::from_str(contents)?;
    let records = match document {
        Value::Array(records) => records,
        _ => return Err(SchemaError::NotAList),
    };

    let mut entries = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let object = record
            .as_object()
            .ok_or(SchemaError::NotAnObject { index })?;

        for key in REQUIRED_KEYS {
            if !object.contains_key(key) {
                return Err(SchemaError::MissingKey { index, key });
            }
        }
        if !object["instances"].is_array() {
            return Err(SchemaError::InstancesNotAList { index });
        }

        let raw: RawEntry =
            serde_json::from_value(record).map_err(|e| SchemaError::Malformed {
                index,
                reason: e.to_string(),
            })?;
        entries.push(InventoryEntry::from(raw));
    }

    Ok(entries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_lowercases_name() {
        let entries = parse(
            r#"[{"db_unique_name": "DBA01_Burg", "instances": [["bol8db1", "dba01"]], "diag_path": "/u01/oracle"}]"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "dba01_burg");
        assert_eq!(entries[0].diagnostic_root, PathBuf::from("/u01/oracle"));
        assert_eq!(
            entries[0].instances,
            vec![Instance {
                host: "bol8db1".to_string(),
                sid: "dba01".to_string()
            }]
        );
    }

    #[test]
    fn test_parse_keeps_instance_order() {
        let entries = parse(
            r#"[{"db_unique_name": "cdb", "instances": [["h2", "cdb2"], ["h1", "cdb1"]], "diag_path": "/u01"}]"#,
        )
        .unwrap();
        let hosts: Vec<&str> = entries[0]
            .instances
            .iter()
            .map(|i| i.host.as_str())
            .collect();
        assert_eq!(hosts, vec!["h2", "h1"]);
    }

    #[test]
    fn test_parse_empty_instances_allowed() {
        let entries =
            parse(r#"[{"db_unique_name": "x", "instances": [], "diag_path": "/u01"}]"#).unwrap();
        assert!(entries[0].instances.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_list() {
        let err = parse(r#"{"db_unique_name": "x"}"#).unwrap_err();
        assert!(matches!(err, SchemaError::NotAList));
    }

    #[test]
    fn test_parse_rejects_non_object_element() {
        let err = parse(r#"["x"]"#).unwrap_err();
        assert!(matches!(err, SchemaError::NotAnObject { index: 0 }));
    }

    #[test]
    fn test_parse_missing_diag_path_rejects_whole_document() {
        let err = parse(
            r#"[
                {"db_unique_name": "good", "instances": [["h", "s"]], "diag_path": "/u01"},
                {"db_unique_name": "bad", "instances": [["h", "s"]]}
            ]"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::MissingKey {
                index: 1,
                key: "diag_path"
            }
        ));
        assert_eq!(err.to_string(), "traces[1] missing 'diag_path'");
    }

    #[test]
    fn test_parse_rejects_instances_not_list() {
        let err = parse(r#"[{"db_unique_name": "x", "instances": "h:s", "diag_path": "/u01"}]"#)
            .unwrap_err();
        assert!(matches!(err, SchemaError::InstancesNotAList { index: 0 }));
    }

    #[test]
    fn test_parse_rejects_malformed_instance_pair() {
        let err = parse(r#"[{"db_unique_name": "x", "instances": [["h"]], "diag_path": "/u01"}]"#)
            .unwrap_err();
        assert!(matches!(err, SchemaError::Malformed { index: 0, .. }));
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(matches!(parse("[{").unwrap_err(), SchemaError::Json(_)));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prod.json");
        std::fs::write(
            &path,
            r#"[{"db_unique_name": "PROD", "instances": [["h", "prod1"]], "diag_path": "/u01"}]"#,
        )
        .unwrap();
        let entries = load(&path).unwrap();
        assert_eq!(entries[0].name, "prod");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, SchemaError::Read { .. }));
    }
}
