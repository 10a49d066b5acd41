//! Record Store: the insert/select/save/remove path.
//!
//! Every write follows the same sequence:
//!
//! 1. Load the schema, auto-adding unknown fields on flexible collections
//! 2. Fill defaults and auto-defined columns, convert every value through
//!    its column's field type
//! 3. Take the primary key's write lock
//! 4. Translate to internal names and run the `before_*` triggers
//! 5. Persist the record body, then update the secondary indexes
//! 6. Run the `after_*` triggers, invalidate the query-result cache and
//!    publish a change event
//!
//! Steps 5 and 6 are not atomic: a concurrent reader can observe a record
//! whose index entries are not yet written.

use super::locks::KeyLocks;
use super::query_cache::QueryResultCache;
use super::trigger::{run_before, TriggerRegistry};
use crate::change_feed::{ChangeFeed, ChangeType};
use crate::error::{CoreError, CoreResult};
use crate::index::{IndexManager, Operator, Predicate};
use crate::layout::{read_optional, write_atomic, Layout};
use crate::schema::translate::{to_internal, to_viewable};
use crate::schema::{AutoDefine, Column, ColumnMapping, Schema, SchemaManager};
use crate::stats::EngineStats;
use crate::storage::{RecordBackend, StorageRegistry};
use crate::types::{primary_key_string, CollectionKey, Record};
use docudb_types::FieldType;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Reads and writes records, keeping their indexes in step.
pub struct RecordStore {
    layout: Layout,
    schemas: Arc<SchemaManager>,
    storage: Arc<StorageRegistry>,
    indexes: Arc<IndexManager>,
    triggers: Arc<TriggerRegistry>,
    query_cache: Arc<QueryResultCache>,
    feed: Arc<ChangeFeed>,
    stats: Arc<EngineStats>,
    locks: KeyLocks,
    row_count_lock: Mutex<()>,
}

/// Collaborators of a [`RecordStore`].
pub struct RecordStoreParts {
    /// On-disk layout.
    pub layout: Layout,
    /// Schema and mapping cache.
    pub schemas: Arc<SchemaManager>,
    /// Record backends.
    pub storage: Arc<StorageRegistry>,
    /// Secondary indexes.
    pub indexes: Arc<IndexManager>,
    /// Trigger hooks.
    pub triggers: Arc<TriggerRegistry>,
    /// Query-result cache to invalidate on writes.
    pub query_cache: Arc<QueryResultCache>,
    /// Change event sink.
    pub feed: Arc<ChangeFeed>,
    /// Counters.
    pub stats: Arc<EngineStats>,
    /// Per-key locks.
    pub locks: KeyLocks,
}

impl RecordStore {
    /// Creates a record store from its collaborators.
    pub fn new(parts: RecordStoreParts) -> Self {
        Self {
            layout: parts.layout,
            schemas: parts.schemas,
            storage: parts.storage,
            indexes: parts.indexes,
            triggers: parts.triggers,
            query_cache: parts.query_cache,
            feed: parts.feed,
            stats: parts.stats,
            locks: parts.locks,
            row_count_lock: Mutex::new(()),
        }
    }

    fn backend(&self, key: &CollectionKey, schema: &Schema) -> CoreResult<Arc<dyn RecordBackend>> {
        self.storage
            .backend_for(&key.datastore, &key.collection, schema)
    }

    /// Loads schema and mapping, adding unknown payload fields as STRING
    /// columns when the collection is flexible.
    fn prepare(
        &self,
        key: &CollectionKey,
        viewable: &Record,
    ) -> CoreResult<(Arc<Schema>, Arc<ColumnMapping>)> {
        let mut schema = self.schemas.read_schema(&key.datastore, &key.collection)?;
        if schema.meta().flexible {
            let unknown: Vec<&String> = viewable.keys().filter(|name| !schema.contains(name)).collect();
            if !unknown.is_empty() {
                self.schemas
                    .update(&key.datastore, &key.collection, |schema, _| {
                        for name in &unknown {
                            if !schema.contains(name) {
                                schema.add_column(Column::new(name.as_str(), FieldType::string()))?;
                            }
                        }
                        Ok(())
                    })?;
                info!(%key, columns = ?unknown, "inferred columns added");
                schema = self.schemas.read_schema(&key.datastore, &key.collection)?;
            }
        }
        let mapping = self.schemas.read_mapping(&key.datastore, &key.collection)?;
        Ok((schema, mapping))
    }

    /// Canonical primary key of a payload, converted through the primary
    /// column's type.
    fn resolve_primary_key(schema: &Schema, payload: &Record) -> CoreResult<Option<String>> {
        let Some(raw) = payload.get(schema.primary_key()).filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let converted = match schema.primary_column() {
            Some(column) => column.field_type().convert(raw)?.to_json(),
            None => raw.clone(),
        };
        Ok(primary_key_string(&converted))
    }

    fn row_count_delta(&self, key: &CollectionKey, delta: i64) -> CoreResult<()> {
        let _guard = self.row_count_lock.lock();
        let path = self.layout.row_count_file(&key.datastore, &key.collection);
        let current = read_row_count(&path)?.unwrap_or(0);
        let next = if delta >= 0 {
            current.saturating_add(delta.unsigned_abs())
        } else {
            current.saturating_sub(delta.unsigned_abs())
        };
        write_atomic(&path, next.to_string().as_bytes())
    }

    fn after_write(&self, key: &CollectionKey, primary_key: &str, change: ChangeType, record: Option<Record>) {
        self.query_cache.invalidate(key);
        let sequence = self.feed.publish(key, primary_key, change, record);
        debug!(%key, primary_key, ?change, sequence, "record change published");
    }

    /// Inserts a new record and returns it in viewable form.
    ///
    /// Auto-defined columns overwrite caller values. A uuid primary key is
    /// generated when the payload has none.
    ///
    /// # Errors
    ///
    /// - `CollectionInvalid` if the collection does not exist
    /// - `InsertError` for a missing or empty primary key, or one already
    ///   stored
    /// - `DataType*` errors if a value does not convert
    /// - `UniqueIndexViolation` if a unique column value is taken
    pub fn insert(&self, datastore: &str, collection: &str, viewable: &Record) -> CoreResult<Record> {
        let key = CollectionKey::new(datastore, collection);
        let (schema, mapping) = self.prepare(&key, viewable)?;
        self.insert_prepared(&key, &schema, &mapping, viewable.clone())
    }

    fn insert_prepared(
        &self,
        key: &CollectionKey,
        schema: &Schema,
        mapping: &ColumnMapping,
        mut payload: Record,
    ) -> CoreResult<Record> {
        complete(schema, &mut payload, None)?;
        let primary_key = Self::resolve_primary_key(schema, &payload)?.ok_or_else(|| {
            CoreError::insert(format!("primary key {} is null or empty", schema.primary_key()))
        })?;

        let _guard = self.locks.write(key, &primary_key);
        let backend = self.backend(key, schema)?;
        if backend.exists(&primary_key)? {
            return Err(CoreError::insert(format!(
                "record {primary_key} already exists in {key}"
            )));
        }
        self.persist_new(key, schema, mapping, &*backend, &primary_key, &payload)
    }

    fn persist_new(
        &self,
        key: &CollectionKey,
        schema: &Schema,
        mapping: &ColumnMapping,
        backend: &dyn RecordBackend,
        primary_key: &str,
        payload: &Record,
    ) -> CoreResult<Record> {
        let internal = to_internal(schema, mapping, payload);
        let triggers = self.triggers.for_collection(key);
        run_before(&triggers, |t| t.before_insert(key, &internal))?;
        self.indexes
            .check_unique(key, schema, mapping, primary_key, payload)?;

        backend.write(primary_key, &internal)?;
        if let Err(e) = self.row_count_delta(key, 1) {
            warn!(%key, error = %e, "row count not updated");
        }
        let stored = to_viewable(schema, mapping, &internal);
        self.indexes
            .add_index(key, schema, mapping, primary_key, &stored);

        for trigger in &triggers {
            trigger.after_insert(key, &internal);
        }
        self.stats.record_insert();
        debug!(%key, primary_key, "record inserted");
        self.after_write(key, primary_key, ChangeType::Insert, Some(stored.clone()));
        Ok(stored)
    }

    /// Inserts or updates a record.
    ///
    /// An update merges: schema columns missing from `viewable` keep their
    /// stored value (or null). Timestamp auto-define columns are refreshed on
    /// every save; uuid ones keep their stored value.
    ///
    /// # Errors
    ///
    /// Same as [`RecordStore::insert`], plus errors of the update triggers.
    pub fn save(&self, datastore: &str, collection: &str, viewable: &Record) -> CoreResult<()> {
        let key = CollectionKey::new(datastore, collection);
        let (schema, mapping) = self.prepare(&key, viewable)?;
        let Some(primary_key) = Self::resolve_primary_key(&schema, viewable)? else {
            return self
                .insert_prepared(&key, &schema, &mapping, viewable.clone())
                .map(|_| ());
        };

        let _guard = self.locks.write(&key, &primary_key);
        let backend = self.backend(&key, &schema)?;
        let mut payload = viewable.clone();
        let Some(old_internal) = backend.read(&primary_key)? else {
            complete(&schema, &mut payload, None)?;
            return self
                .persist_new(&key, &schema, &mapping, &*backend, &primary_key, &payload)
                .map(|_| ());
        };

        let old = to_viewable(&schema, &mapping, &old_internal);
        complete(&schema, &mut payload, Some(&old))?;
        let mut internal = to_internal(&schema, &mapping, &payload);
        // Fields of dropped columns stay with the record.
        for (name, value) in &old_internal {
            internal.entry(name.clone()).or_insert_with(|| value.clone());
        }

        let triggers = self.triggers.for_collection(&key);
        run_before(&triggers, |t| t.before_update(&key, &old_internal, &internal))?;
        self.indexes
            .check_unique(&key, &schema, &mapping, &primary_key, &payload)?;

        backend.write(&primary_key, &internal)?;
        let stored = to_viewable(&schema, &mapping, &internal);
        if schema.needs_indexing() {
            self.indexes
                .diff_index(&key, &schema, &mapping, &primary_key, &old, &stored);
        }

        for trigger in &triggers {
            trigger.after_update(&key, &old_internal, &internal);
        }
        self.stats.record_save();
        debug!(%key, primary_key, "record updated");
        self.after_write(&key, &primary_key, ChangeType::Update, Some(stored));
        Ok(())
    }

    /// Reads one record, optionally projected onto `columns`.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if no record has this key.
    pub fn select(
        &self,
        datastore: &str,
        collection: &str,
        primary_key: &str,
        columns: Option<&[&str]>,
    ) -> CoreResult<Record> {
        let key = CollectionKey::new(datastore, collection);
        let schema = self.schemas.read_schema(datastore, collection)?;
        let mapping = self.schemas.read_mapping(datastore, collection)?;
        let internal = {
            let _guard = self.locks.read(&key, primary_key);
            self.backend(&key, &schema)?.read(primary_key)?
        };
        let internal = internal.ok_or_else(|| CoreError::RecordNotFound {
            collection: key.to_string(),
            key: primary_key.to_string(),
        })?;
        self.stats.record_read();

        let mut record = to_viewable(&schema, &mapping, &internal);
        if let Some(columns) = columns {
            record.retain(|name, _| columns.contains(&name.as_str()));
        }
        Ok(record)
    }

    /// Whether a record with this key exists.
    ///
    /// # Errors
    ///
    /// Returns `CollectionInvalid` or an I/O error.
    pub fn exists(&self, datastore: &str, collection: &str, primary_key: &str) -> CoreResult<bool> {
        let key = CollectionKey::new(datastore, collection);
        let schema = self.schemas.read_schema(datastore, collection)?;
        self.backend(&key, &schema)?.exists(primary_key)
    }

    /// Removes a record and its index entries. Removing a missing key is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `CollectionInvalid`, an error from a `before_delete` trigger,
    /// or an I/O error.
    pub fn remove(&self, datastore: &str, collection: &str, primary_key: &str) -> CoreResult<()> {
        let key = CollectionKey::new(datastore, collection);
        let schema = self.schemas.read_schema(datastore, collection)?;
        let mapping = self.schemas.read_mapping(datastore, collection)?;

        let _guard = self.locks.write(&key, primary_key);
        let backend = self.backend(&key, &schema)?;
        let Some(internal) = backend.read(primary_key)? else {
            debug!(%key, primary_key, "remove of missing record ignored");
            return Ok(());
        };
        let triggers = self.triggers.for_collection(&key);
        run_before(&triggers, |t| t.before_delete(&key, &internal))?;

        let old = to_viewable(&schema, &mapping, &internal);
        self.indexes
            .remove_index(&key, &schema, &mapping, primary_key, &old);
        if backend.delete(primary_key)? {
            if let Err(e) = self.row_count_delta(&key, -1) {
                warn!(%key, error = %e, "row count not updated");
            }
        }

        for trigger in &triggers {
            trigger.after_delete(&key, &internal);
        }
        self.stats.record_remove();
        debug!(%key, primary_key, "record removed");
        self.after_write(&key, primary_key, ChangeType::Delete, None);
        Ok(())
    }

    /// Removes a record on a background thread. Failures are logged.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the thread cannot be started.
    pub fn remove_async(
        self: &Arc<Self>,
        datastore: &str,
        collection: &str,
        primary_key: &str,
    ) -> CoreResult<thread::JoinHandle<()>> {
        let store = Arc::clone(self);
        let (datastore, collection, primary_key) =
            (datastore.to_string(), collection.to_string(), primary_key.to_string());
        thread::Builder::new()
            .name("docudb-remove".to_string())
            .spawn(move || {
                if let Err(e) = store.remove(&datastore, &collection, &primary_key) {
                    warn!(
                        datastore = %datastore,
                        collection = %collection,
                        primary_key = %primary_key,
                        error = %e,
                        "async remove failed"
                    );
                }
            })
            .map_err(|e| CoreError::internal(format!("cannot start async remove: {e}")))
    }

    /// All primary keys, ascending.
    ///
    /// # Errors
    ///
    /// Returns `CollectionInvalid` or an I/O error.
    pub fn select_all_keys(&self, datastore: &str, collection: &str) -> CoreResult<Vec<String>> {
        let key = CollectionKey::new(datastore, collection);
        let schema = self.schemas.read_schema(datastore, collection)?;
        self.backend(&key, &schema)?.keys()
    }

    /// The first `limit` primary keys, ascending.
    ///
    /// # Errors
    ///
    /// Returns `CollectionInvalid` or an I/O error.
    pub fn select_all_keys_with_limit(
        &self,
        datastore: &str,
        collection: &str,
        limit: usize,
    ) -> CoreResult<Vec<String>> {
        let mut keys = self.select_all_keys(datastore, collection)?;
        keys.truncate(limit);
        Ok(keys)
    }

    /// Number of records, from `meta/row-count`.
    ///
    /// Falls back to counting the backend when the file is missing.
    ///
    /// # Errors
    ///
    /// Returns `CollectionInvalid` or an I/O error.
    pub fn row_count(&self, datastore: &str, collection: &str) -> CoreResult<u64> {
        let path = self.layout.row_count_file(datastore, collection);
        if let Some(count) = read_row_count(&path)? {
            return Ok(count);
        }
        let key = CollectionKey::new(datastore, collection);
        let schema = self.schemas.read_schema(datastore, collection)?;
        self.backend(&key, &schema)?.len()
    }

    /// Primary keys of records whose `column` satisfies `operator` against
    /// `reference`.
    ///
    /// Querying an unindexed column indexes it first.
    ///
    /// # Errors
    ///
    /// - `ColumnInvalid` for an unknown column
    /// - `DataType*` errors if `reference` does not convert
    /// - `OperationNotSupported` for range queries on hashed indexes
    pub fn select_keys_with_pattern(
        &self,
        datastore: &str,
        collection: &str,
        column: &str,
        reference: &Value,
        operator: Operator,
    ) -> CoreResult<Vec<String>> {
        let schema = self.schemas.read_schema(datastore, collection)?;
        let col = schema
            .column(column)
            .ok_or_else(|| CoreError::column_invalid(collection, column))?;
        let predicate = Predicate::new(col.field_type(), operator, reference)?;

        if schema.is_primary(column) && operator == Operator::Eq {
            let primary_key = col.field_type().convert(reference)?.to_json();
            let Some(primary_key) = primary_key_string(&primary_key) else {
                return Ok(Vec::new());
            };
            let exists = self.exists(datastore, collection, &primary_key)?;
            return Ok(if exists { vec![primary_key] } else { Vec::new() });
        }
        self.indexes
            .keys_matching(datastore, collection, column, &predicate)
    }

    /// Records matching a pattern, read lazily in primary key order.
    ///
    /// The iterator yields `RecordNotFound` for a record removed between the
    /// index scan and its read.
    ///
    /// # Errors
    ///
    /// Same as [`RecordStore::select_keys_with_pattern`].
    pub fn select_with_pattern<'a>(
        &'a self,
        datastore: &str,
        collection: &str,
        column: &str,
        reference: &Value,
        operator: Operator,
    ) -> CoreResult<impl Iterator<Item = CoreResult<Record>> + 'a> {
        let keys = self.select_keys_with_pattern(datastore, collection, column, reference, operator)?;
        let (datastore, collection) = (datastore.to_string(), collection.to_string());
        Ok(keys
            .into_iter()
            .map(move |primary_key| self.select(&datastore, &collection, &primary_key, None)))
    }

    /// Removes every record matching a pattern and returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Same as [`RecordStore::select_keys_with_pattern`] and
    /// [`RecordStore::remove`].
    pub fn remove_with_pattern(
        &self,
        datastore: &str,
        collection: &str,
        column: &str,
        reference: &Value,
        operator: Operator,
    ) -> CoreResult<u64> {
        let keys = self.select_keys_with_pattern(datastore, collection, column, reference, operator)?;
        let mut removed = 0;
        for primary_key in keys {
            self.remove(datastore, collection, &primary_key)?;
            removed += 1;
        }
        info!(datastore, collection, column, %operator, removed, "records removed by pattern");
        Ok(removed)
    }
}

/// Fills defaults and auto-defined columns and converts every value.
///
/// With `existing`, columns absent from the payload are merged from the
/// stored record and uuid auto-define columns keep their stored value.
fn complete(schema: &Schema, payload: &mut Record, existing: Option<&Record>) -> CoreResult<()> {
    for column in schema.columns() {
        let name = column.name();
        let present = payload.get(name).is_some_and(|v| !v.is_null());

        match column.auto_define() {
            AutoDefine::Uuid => {
                let stored = existing
                    .and_then(|old| old.get(name))
                    .filter(|v| !v.is_null())
                    .cloned();
                let keep = schema.is_primary(name) && present;
                if !keep {
                    let value = stored.unwrap_or_else(|| Value::String(uuid::Uuid::new_v4().to_string()));
                    payload.insert(name.to_string(), value);
                }
            }
            AutoDefine::Timestamp => {
                if let FieldType::Timestamp(timestamp) = column.field_type() {
                    payload.insert(name.to_string(), timestamp.now().to_json());
                }
            }
            AutoDefine::None => {
                if !payload.contains_key(name) {
                    let fill = match existing {
                        Some(old) => Some(old.get(name).cloned().unwrap_or(Value::Null)),
                        None => column.field_type().default().map(|d| d.to_json()),
                    };
                    if let Some(value) = fill {
                        payload.insert(name.to_string(), value);
                    }
                }
            }
        }

        if let Some(value) = payload.get_mut(name) {
            if !value.is_null() {
                *value = column.field_type().convert(value)?.to_json();
            }
        }
    }
    Ok(())
}

fn read_row_count(path: &std::path::Path) -> CoreResult<Option<u64>> {
    Ok(read_optional(path)?.and_then(|bytes| String::from_utf8_lossy(&bytes).trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IndexType, SchemaMeta};
    use docudb_types::field_type_from_string;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn orders() -> Schema {
        let mut schema = Schema::new(SchemaMeta::default())
            .with_column(
                Column::new("id", FieldType::string())
                    .with_index(IndexType::Unique)
                    .with_auto_define(AutoDefine::Uuid),
            )
            .unwrap()
            .with_column(Column::new("total", field_type_from_string("DECIMAL(10,2)").unwrap()))
            .unwrap()
            .with_column(Column::new(
                "status",
                FieldType::string().with_default(&json!("new")).unwrap(),
            ))
            .unwrap()
            .with_column(
                Column::new("updated", field_type_from_string("TIMESTAMP(3)").unwrap())
                    .with_auto_define(AutoDefine::Timestamp),
            )
            .unwrap()
            .with_primary("id");
        schema.ensure_primary();
        schema
    }

    #[test]
    fn insert_completion() {
        let schema = orders();
        let mut payload = record(json!({"total": 19.999}));
        complete(&schema, &mut payload, None).unwrap();

        assert_eq!(payload["total"].to_string(), "20.00");
        assert_eq!(payload["status"], json!("new"));
        assert_eq!(payload["id"].as_str().unwrap().len(), 36);
        assert!(payload["updated"].is_string());
    }

    #[test]
    fn explicit_primary_key_is_kept() {
        let schema = orders();
        let mut payload = record(json!({"id": "o-1"}));
        complete(&schema, &mut payload, None).unwrap();
        assert_eq!(payload["id"], json!("o-1"));
        assert_eq!(
            RecordStore::resolve_primary_key(&schema, &payload).unwrap().as_deref(),
            Some("o-1")
        );
    }

    #[test]
    fn update_merges_stored_values() {
        let schema = orders();
        let old = record(json!({"id": "o-1", "total": "5.00", "status": "paid"}));
        let mut payload = record(json!({"id": "o-1", "total": 7}));
        complete(&schema, &mut payload, Some(&old)).unwrap();

        assert_eq!(payload["total"].to_string(), "7.00");
        assert_eq!(payload["status"], json!("paid"));
        assert!(payload["updated"].is_string());
    }

    #[test]
    fn nulls_pass_through_and_bad_values_fail() {
        let schema = orders();
        let mut payload = record(json!({"id": "o-1", "total": null}));
        complete(&schema, &mut payload, None).unwrap();
        assert!(payload["total"].is_null());

        let mut payload = record(json!({"id": "o-1", "total": "abc"}));
        let err = complete(&schema, &mut payload, None).unwrap_err();
        assert_eq!(err.code(), "DATA_TYPE_FORMAT_INVALID");
    }

    #[test]
    fn missing_primary_key_resolves_to_none() {
        let schema = Schema::new(SchemaMeta::default())
            .with_column(Column::new("sku", FieldType::string()).with_index(IndexType::Unique))
            .unwrap()
            .with_primary("sku");
        let mut payload = record(json!({"sku": ""}));
        complete(&schema, &mut payload, None).unwrap();
        assert_eq!(RecordStore::resolve_primary_key(&schema, &payload).unwrap(), None);
    }
}
