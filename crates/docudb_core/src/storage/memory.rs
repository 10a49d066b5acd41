//! Memory-resident backends.

use super::backend::RecordBackend;
use super::file::FileRecords;
use crate::error::CoreResult;
use crate::types::Record;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

/// Records held only in memory (`in-memory-nd` collections).
///
/// # Example
///
/// ```rust
/// use docudb_core::storage::{MemoryRecords, RecordBackend};
///
/// let backend = MemoryRecords::new();
/// backend.write("k1", &Default::default()).unwrap();
/// assert!(backend.exists("k1").unwrap());
/// ```
#[derive(Debug, Default)]
pub struct MemoryRecords {
    records: RwLock<BTreeMap<String, Record>>,
}

impl MemoryRecords {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every record.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl RecordBackend for MemoryRecords {
    fn read(&self, key: &str) -> CoreResult<Option<Record>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn write(&self, key: &str, record: &Record) -> CoreResult<()> {
        self.records.write().insert(key.to_string(), record.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> CoreResult<bool> {
        Ok(self.records.write().remove(key).is_some())
    }

    fn exists(&self, key: &str) -> CoreResult<bool> {
        Ok(self.records.read().contains_key(key))
    }

    fn keys(&self) -> CoreResult<Vec<String>> {
        Ok(self.records.read().keys().cloned().collect())
    }

    fn len(&self) -> CoreResult<u64> {
        Ok(self.records.read().len() as u64)
    }
}

/// Records served from memory and written through to files (`in-memory`
/// collections).
#[derive(Debug)]
pub struct DurableMemoryRecords {
    memory: MemoryRecords,
    files: FileRecords,
}

impl DurableMemoryRecords {
    /// Loads every record file of `files` into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if a record file cannot be read.
    pub fn rehydrate(files: FileRecords) -> CoreResult<Self> {
        let memory = MemoryRecords::new();
        let keys = files.keys()?;
        for key in &keys {
            if let Some(record) = files.read(key)? {
                memory.write(key, &record)?;
            }
        }
        debug!(dir = %files.dir().display(), records = keys.len(), "rehydrated memory collection");
        Ok(Self { memory, files })
    }
}

impl RecordBackend for DurableMemoryRecords {
    fn read(&self, key: &str) -> CoreResult<Option<Record>> {
        self.memory.read(key)
    }

    fn write(&self, key: &str, record: &Record) -> CoreResult<()> {
        self.files.write(key, record)?;
        self.memory.write(key, record)
    }

    fn delete(&self, key: &str) -> CoreResult<bool> {
        let on_disk = self.files.delete(key)?;
        Ok(self.memory.delete(key)? || on_disk)
    }

    fn exists(&self, key: &str) -> CoreResult<bool> {
        self.memory.exists(key)
    }

    fn keys(&self) -> CoreResult<Vec<String>> {
        self.memory.keys()
    }

    fn len(&self) -> CoreResult<u64> {
        self.memory.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn memory_backend_basics() {
        let backend = MemoryRecords::new();
        let record = json!({"1": 5}).as_object().cloned().unwrap();
        backend.write("b", &record).unwrap();
        backend.write("a", &record).unwrap();
        assert_eq!(backend.keys().unwrap(), ["a", "b"]);
        assert_eq!(backend.read("a").unwrap(), Some(record));
        assert!(backend.delete("a").unwrap());
        assert_eq!(backend.len().unwrap(), 1);
        backend.clear();
        assert_eq!(backend.len().unwrap(), 0);
    }

    #[test]
    fn durable_backend_survives_reload() {
        let temp = tempdir().unwrap();
        let record = json!({"1": "x"}).as_object().cloned().unwrap();
        {
            let backend = DurableMemoryRecords::rehydrate(FileRecords::new(temp.path())).unwrap();
            backend.write("k1", &record).unwrap();
            backend.write("k2", &record).unwrap();
            backend.delete("k2").unwrap();
        }
        let reloaded = DurableMemoryRecords::rehydrate(FileRecords::new(temp.path())).unwrap();
        assert_eq!(reloaded.keys().unwrap(), ["k1"]);
        assert_eq!(reloaded.read("k1").unwrap(), Some(record));
    }
}
