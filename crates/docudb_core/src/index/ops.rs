//! Long-running operation tracking.
//!
//! Each background job owns `ops/<op-id>.json` in its collection. Jobs started
//! by this process are also held in memory so callers can wait for them.

use crate::error::{CoreError, CoreResult};
use crate::layout::{list_dirs, read_optional, write_atomic, Layout};
use chrono::{SecondsFormat, Utc};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of long-running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    /// Full-column reindex.
    Index,
}

/// Lifecycle state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// Registered, not yet running.
    NotStarted,
    /// In progress.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Error,
}

impl OperationStatus {
    /// Whether the operation has finished.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Error)
    }
}

/// Persisted state of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OperationRecord {
    /// Operation id.
    pub id: String,
    /// Operation kind.
    #[serde(rename = "type")]
    pub kind: OperationKind,
    /// Current state.
    pub status: OperationStatus,
    /// Owning datastore.
    pub datastore: String,
    /// Owning collection.
    pub collection: String,
    /// Column being indexed.
    pub column: String,
    /// Index type being built.
    pub index_type: String,
    /// Records processed so far.
    pub records: u64,
    /// RFC 3339 start time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_started: Option<String>,
    /// RFC 3339 completion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_completed: Option<String>,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Registry of operation files and in-process jobs.
pub struct OperationTracker {
    layout: Layout,
    jobs: Mutex<HashMap<String, OperationRecord>>,
    finished: Condvar,
}

impl OperationTracker {
    /// Creates a tracker over `layout`.
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            jobs: Mutex::new(HashMap::new()),
            finished: Condvar::new(),
        }
    }

    /// Registers a new index operation in the `NOT_STARTED` state.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation file cannot be written.
    pub fn register(
        &self,
        datastore: &str,
        collection: &str,
        column: &str,
        index_type: &str,
    ) -> CoreResult<OperationRecord> {
        let record = OperationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            kind: OperationKind::Index,
            status: OperationStatus::NotStarted,
            datastore: datastore.to_string(),
            collection: collection.to_string(),
            column: column.to_string(),
            index_type: index_type.to_string(),
            records: 0,
            time_started: None,
            time_completed: None,
            error: None,
        };
        self.save(&record)?;
        Ok(record)
    }

    /// Marks the operation running.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation file cannot be written.
    pub fn start(&self, record: &mut OperationRecord) -> CoreResult<()> {
        record.status = OperationStatus::Running;
        record.time_started = Some(now());
        self.save(record)
    }

    /// Records progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation file cannot be written.
    pub fn progress(&self, record: &mut OperationRecord, records: u64) -> CoreResult<()> {
        record.records = records;
        self.save(record)
    }

    /// Marks the operation finished and wakes waiters.
    ///
    /// Once the file is written the job is dropped from memory and later
    /// lookups read the file. If the write fails the in-memory state is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation file cannot be written.
    pub fn finish(&self, record: &mut OperationRecord, outcome: CoreResult<u64>) -> CoreResult<()> {
        match outcome {
            Ok(records) => {
                record.status = OperationStatus::Completed;
                record.records = records;
            }
            Err(e) => {
                record.status = OperationStatus::Error;
                record.error = Some(e.to_string());
            }
        }
        record.time_completed = Some(now());
        let saved = self.save(record);
        if saved.is_ok() {
            self.jobs.lock().remove(&record.id);
        }
        self.finished.notify_all();
        saved
    }

    fn save(&self, record: &OperationRecord) -> CoreResult<()> {
        self.jobs.lock().insert(record.id.clone(), record.clone());
        let path = self
            .layout
            .ops_dir(&record.datastore, &record.collection)
            .join(format!("{}.json", record.id));
        write_atomic(&path, &serde_json::to_vec_pretty(record)?)
    }

    /// Current state of an operation.
    ///
    /// Jobs of this process are answered from memory; others are looked up in
    /// the `ops/` directories of every collection.
    ///
    /// # Errors
    ///
    /// Returns `OperationNotFound` if no operation has this id, including ids
    /// that are not UUIDs.
    pub fn status(&self, operation_id: &str) -> CoreResult<OperationRecord> {
        let not_found = || CoreError::OperationNotFound {
            operation_id: operation_id.to_string(),
        };
        if let Some(record) = self.jobs.lock().get(operation_id) {
            return Ok(record.clone());
        }
        if uuid::Uuid::parse_str(operation_id).is_err() {
            return Err(not_found());
        }
        let file = format!("{operation_id}.json");
        for datastore in list_dirs(self.layout.base())? {
            for collection in list_dirs(&self.layout.collections_dir(&datastore))? {
                let path = self.layout.ops_dir(&datastore, &collection).join(&file);
                if let Some(bytes) = read_optional(&path)? {
                    return Ok(serde_json::from_slice(&bytes)?);
                }
            }
        }
        Err(not_found())
    }

    /// Number of jobs held in memory.
    #[must_use]
    pub fn tracked_jobs(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Blocks until the operation has finished.
    ///
    /// # Errors
    ///
    /// Returns `OperationNotFound` if no operation has this id.
    pub fn wait(&self, operation_id: &str) -> CoreResult<OperationRecord> {
        let mut jobs = self.jobs.lock();
        loop {
            match jobs.get(operation_id) {
                Some(record) if record.status.is_finished() => return Ok(record.clone()),
                Some(_) => self.finished.wait(&mut jobs),
                None => break,
            }
        }
        drop(jobs);
        self.status(operation_id)
    }
}
