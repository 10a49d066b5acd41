//! Record backend trait definition.

use crate::error::CoreResult;
use crate::types::Record;

/// Keyed store of internal-form record bodies for one collection.
///
/// Backends know nothing of schemas or indexes. Keys are primary key strings;
/// file-based backends encode them into file names.
///
/// # Invariants
///
/// - `read` returns exactly the record last passed to `write` for the key
/// - `delete` reports whether a record was present
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::FileRecords`] - One JSON file per record
/// - [`super::MemoryRecords`] - Memory only, lost on restart
/// - [`super::DurableMemoryRecords`] - Memory with write-through to files
pub trait RecordBackend: Send + Sync {
    /// Reads the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read or parsed.
    fn read(&self, key: &str) -> CoreResult<Option<Record>>;

    /// Stores `record` under `key`, replacing any previous body.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot name a record or on I/O failure.
    fn write(&self, key: &str, record: &Record) -> CoreResult<()>;

    /// Deletes the record under `key`, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn delete(&self, key: &str) -> CoreResult<bool>;

    /// Whether a record is stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn exists(&self, key: &str) -> CoreResult<bool>;

    /// All stored keys in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn keys(&self) -> CoreResult<Vec<String>>;

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn len(&self) -> CoreResult<u64> {
        Ok(self.keys()?.len() as u64)
    }
}
