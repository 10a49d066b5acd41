//! File-per-record backend.

use super::backend::RecordBackend;
use crate::error::{CoreError, CoreResult, IoResultExt};
use crate::layout::{list_files, read_optional, write_atomic};
use crate::naming::{decode_name, encode_name};
use crate::types::Record;
use std::fs;
use std::path::{Path, PathBuf};

/// Stores each record as `data/<encoded key>` holding internal-form JSON.
///
/// Writes go through a temporary file and a rename, so a reader sees either
/// the old or the new body.
#[derive(Debug, Clone)]
pub struct FileRecords {
    dir: PathBuf,
}

impl FileRecords {
    /// Creates a backend over an existing data directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> CoreResult<PathBuf> {
        Ok(self.dir.join(encode_name(key)?))
    }
}

impl RecordBackend for FileRecords {
    fn read(&self, key: &str) -> CoreResult<Option<Record>> {
        let path = self.path(key)?;
        match read_optional(&path)? {
            Some(bytes) => {
                let record: Record = serde_json::from_slice(&bytes).map_err(|e| {
                    CoreError::internal(format!("corrupt record {}: {e}", path.display()))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn write(&self, key: &str, record: &Record) -> CoreResult<()> {
        let path = self.path(key)?;
        write_atomic(&path, &serde_json::to_vec(record)?)
    }

    fn delete(&self, key: &str) -> CoreResult<bool> {
        let path = self.path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CoreError::io(&path, e)),
        }
    }

    fn exists(&self, key: &str) -> CoreResult<bool> {
        let path = self.path(key)?;
        Ok(path.try_exists().at(&path)?)
    }

    fn keys(&self) -> CoreResult<Vec<String>> {
        let mut keys = list_files(&self.dir)?
            .iter()
            .map(|name| decode_name(name))
            .collect::<CoreResult<Vec<_>>>()?;
        keys.sort();
        Ok(keys)
    }

    fn len(&self) -> CoreResult<u64> {
        Ok(list_files(&self.dir)?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn write_read_delete() {
        let temp = tempdir().unwrap();
        let backend = FileRecords::new(temp.path());

        assert!(backend.read("a/1").unwrap().is_none());
        backend.write("a/1", &record(json!({"1": "x"}))).unwrap();
        assert!(temp.path().join("a%2F1").is_file());
        assert_eq!(backend.read("a/1").unwrap().unwrap(), record(json!({"1": "x"})));
        assert!(backend.exists("a/1").unwrap());

        assert!(backend.delete("a/1").unwrap());
        assert!(!backend.delete("a/1").unwrap());
        assert!(!backend.exists("a/1").unwrap());
    }

    #[test]
    fn keys_are_decoded_and_sorted() {
        let temp = tempdir().unwrap();
        let backend = FileRecords::new(temp.path());
        for key in ["b", "a b", "c"] {
            backend.write(key, &Record::new()).unwrap();
        }
        assert_eq!(backend.keys().unwrap(), ["a b", "b", "c"]);
        assert_eq!(backend.len().unwrap(), 3);
    }

    #[test]
    fn corrupt_body_is_internal_error() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("bad"), b"{").unwrap();
        let err = FileRecords::new(temp.path()).read("bad").unwrap_err();
        assert_eq!(err.code(), "INTERNAL_OPERATION_ERROR");
    }
}
