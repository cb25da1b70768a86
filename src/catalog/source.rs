//! Reading raw records from JSON files on disk.
//!
//! A path may name a single JSON file (one record object, or an array of
//! records) or a directory whose `*.json` files each hold records. Files are
//! read in file-name order so load order is deterministic.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use super::loader::{LoadError, SchemaViolation};
use super::record::{RawRecord, RecordRef};

/// The record path itself could not be read.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("record path '{}' does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Records read from disk, plus files that could not be turned into records.
///
/// `errors` carry a `Malformed` violation; their `RecordRef::index` is the
/// position of the offending file among the files read.
#[derive(Debug, Default)]
pub struct SourceRecords {
    pub records: Vec<RawRecord>,
    pub errors: Vec<LoadError>,
}

/// Read every record under `path`.
pub fn read_records(path: &Path) -> Result<SourceRecords, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }

    let files = if path.is_dir() {
        json_files_in(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut out = SourceRecords::default();
    for (file_index, file) in files.iter().enumerate() {
        read_file(file, file_index, &mut out);
    }

    tracing::debug!(
        path = %path.display(),
        records = out.records.len(),
        malformed = out.errors.len(),
        "read record source"
    );
    Ok(out)
}

/// List `*.json` files directly inside `dir`, sorted by file name.
fn json_files_in(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let entries = std::fs::read_dir(dir).map_err(|source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

fn read_file(file: &Path, file_index: usize, out: &mut SourceRecords) {
    let display = file.display().to_string();

    let parsed = std::fs::read_to_string(file)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()));

    let value = match parsed {
        Ok(value) => value,
        Err(reason) => {
            push_malformed(out, file_index, display, reason);
            return;
        }
    };

    match value {
        Value::Array(items) => {
            for (i, item) in items.into_iter().enumerate() {
                push_value(out, file_index, item, format!("{display}#{i}"));
            }
        }
        other => push_value(out, file_index, other, display),
    }
}

fn push_value(out: &mut SourceRecords, file_index: usize, value: Value, origin: String) {
    match serde_json::from_value::<RawRecord>(value) {
        Ok(mut record) => {
            record.origin = Some(origin);
            out.records.push(record);
        }
        Err(e) => push_malformed(out, file_index, origin, e.to_string()),
    }
}

fn push_malformed(out: &mut SourceRecords, file_index: usize, origin: String, reason: String) {
    tracing::warn!(%origin, %reason, "skipping malformed record file");
    out.errors.push(LoadError {
        record: RecordRef {
            index: file_index,
            origin: Some(origin),
        },
        name: None,
        violations: vec![SchemaViolation::Malformed { reason }],
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a unique temp directory for test isolation.
    fn make_test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("exprdoc-source-test")
            .join(name)
            .join(format!("{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup_test_dir(dir: &Path) {
        let _ = std::fs::remove_dir_all(dir);
    }

    const UPPER: &str = r#"{
        "name": "upper", "type": "function", "groups": ["String"],
        "description": "Converts a string to upper case.",
        "examples": [{"expression": "upper('a')", "returns": "'A'"}]
    }"#;

    #[test]
    fn reads_directory_in_name_order() {
        let dir = make_test_dir("dir-order");
        std::fs::write(dir.join("b_upper.json"), UPPER).unwrap();
        std::fs::write(
            dir.join("a_lower.json"),
            UPPER.replace("upper", "lower"),
        )
        .unwrap();
        std::fs::write(dir.join("notes.txt"), "not a record").unwrap();

        let out = read_records(&dir).unwrap();
        assert!(out.errors.is_empty());
        let names: Vec<_> = out
            .records
            .iter()
            .map(|r| r.name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["lower", "upper"]);
        assert!(out.records[0]
            .origin
            .as_deref()
            .unwrap()
            .ends_with("a_lower.json"));

        cleanup_test_dir(&dir);
    }

    #[test]
    fn reads_array_file() {
        let dir = make_test_dir("array-file");
        let file = dir.join("all.json");
        std::fs::write(&file, format!("[{UPPER}, {UPPER}]")).unwrap();

        let out = read_records(&file).unwrap();
        assert_eq!(out.records.len(), 2);
        assert!(out.records[1].origin.as_deref().unwrap().ends_with("all.json#1"));

        cleanup_test_dir(&dir);
    }

    #[test]
    fn malformed_file_does_not_stop_others() {
        let dir = make_test_dir("malformed");
        std::fs::write(dir.join("a.json"), "{ not json").unwrap();
        std::fs::write(dir.join("b.json"), r#"{"name": 42}"#).unwrap();
        std::fs::write(dir.join("c.json"), UPPER).unwrap();

        let out = read_records(&dir).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.errors.len(), 2);
        assert_eq!(out.errors[0].record.index, 0);
        assert_eq!(out.errors[1].record.index, 1);
        assert!(matches!(
            out.errors[0].violations[0],
            SchemaViolation::Malformed { .. }
        ));

        cleanup_test_dir(&dir);
    }

    #[test]
    fn missing_path_is_error() {
        let dir = make_test_dir("missing");
        let result = read_records(&dir.join("nope"));
        assert!(matches!(result, Err(SourceError::NotFound(_))));
        cleanup_test_dir(&dir);
    }
}
