//! Index Manager: strategy dispatch, index maintenance and lookups.
//!
//! Index areas live under `index/<internal column>/`, so renaming a column
//! never moves index data; the [`IndexCache`] is keyed by viewable column
//! name and is invalidated on rename instead.
//!
//! Index writes from the record path are best effort. A failing column is
//! logged, counted in `index_failures` and skipped; the record body stays the
//! source of truth and a reindex repairs the drift.

use super::cache::IndexCache;
use super::filter::Predicate;
use super::ops::{OperationRecord, OperationTracker};
use super::strategy::{strategy_for, IndexArea, IndexingStrategy};
use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult, IoResultExt};
use crate::layout::{archive, read_optional, write_atomic, Layout};
use crate::naming::encode_name;
use crate::schema::{Column, ColumnMapping, IndexType, Schema, SchemaManager};
use crate::stats::EngineStats;
use crate::storage::StorageRegistry;
use crate::types::{CollectionKey, Record};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, trace, warn, Level};

/// Maintains and queries the secondary indexes of every collection.
pub struct IndexManager {
    layout: Layout,
    schemas: Arc<SchemaManager>,
    storage: Arc<StorageRegistry>,
    cache: Arc<IndexCache>,
    stats: Arc<EngineStats>,
    tracker: OperationTracker,
    pool: Option<rayon::ThreadPool>,
    progress_interval: u64,
    count_lock: Mutex<()>,
}

impl IndexManager {
    /// Creates an index manager.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the dedicated index thread pool cannot be built.
    pub fn new(
        layout: Layout,
        schemas: Arc<SchemaManager>,
        storage: Arc<StorageRegistry>,
        cache: Arc<IndexCache>,
        stats: Arc<EngineStats>,
        config: &EngineConfig,
    ) -> CoreResult<Self> {
        let pool = match config.index_parallelism {
            0 => None,
            threads => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("docudb-index-{i}"))
                    .build()
                    .map_err(|e| CoreError::internal(format!("index thread pool: {e}")))?,
            ),
        };
        Ok(Self {
            tracker: OperationTracker::new(layout.clone()),
            layout,
            schemas,
            storage,
            cache,
            stats,
            pool,
            progress_interval: config.reindex_progress_interval.max(1),
            count_lock: Mutex::new(()),
        })
    }

    /// The shared index cache.
    #[must_use]
    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    fn internal_name<'m>(
        mapping: &'m ColumnMapping,
        key: &CollectionKey,
        column: &str,
    ) -> CoreResult<&'m str> {
        mapping
            .internal(column)
            .ok_or_else(|| CoreError::column_invalid(key.to_string(), column))
    }

    fn area_dir(&self, key: &CollectionKey, internal: &str) -> PathBuf {
        self.layout
            .index_root(&key.datastore, &key.collection)
            .join(internal)
    }

    fn count_dir(&self, key: &CollectionKey, internal: &str) -> PathBuf {
        self.layout
            .index_count_root(&key.datastore, &key.collection)
            .join(internal)
    }

    fn area(&self, key: &CollectionKey, mapping: &ColumnMapping, column: &str) -> CoreResult<IndexArea> {
        let internal = Self::internal_name(mapping, key, column)?;
        Ok(IndexArea::new(self.area_dir(key, internal), column))
    }

    /// Index key of a stored value, or `None` for null.
    fn value_key(column: &Column, value: Option<&Value>) -> CoreResult<Option<String>> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(value) => {
                let typed = column.field_type().convert(value)?;
                typed.index_key().map(Some).ok_or_else(|| {
                    CoreError::not_supported(format!("indexing {} values", column.field_type().name()))
                })
            }
        }
    }

    /// Creates the (empty) index area of a column.
    ///
    /// # Errors
    ///
    /// Returns `ColumnInvalid` for an unknown column, `NotIndexed` if it has
    /// no index, or an I/O error.
    pub fn initialize(&self, datastore: &str, collection: &str, column: &str) -> CoreResult<()> {
        let key = CollectionKey::new(datastore, collection);
        let schema = self.schemas.read_schema(datastore, collection)?;
        let mapping = self.schemas.read_mapping(datastore, collection)?;
        let col = schema
            .column(column)
            .ok_or_else(|| CoreError::column_invalid(collection, column))?;
        let strategy = strategy_for(col.index()).map_err(|_| CoreError::NotIndexed {
            column: column.to_string(),
        })?;
        let internal = Self::internal_name(&mapping, &key, column)?;
        strategy.initialize(&IndexArea::new(self.area_dir(&key, internal), column))?;
        let counts = self.count_dir(&key, internal);
        fs::create_dir_all(&counts).at(&counts)?;
        debug!(%key, column, index = %col.index(), "index area initialized");
        Ok(())
    }

    fn for_each_indexed<F>(&self, key: &CollectionKey, schema: &Schema, action: &str, op: F)
    where
        F: Fn(&Column) -> CoreResult<()> + Send + Sync,
    {
        let columns: Vec<&Column> = schema.indexed_columns().collect();
        let run = || {
            columns.par_iter().for_each(|column| {
                if let Err(e) = op(column) {
                    warn!(
                        %key,
                        column = column.name(),
                        action,
                        error = %e,
                        "index update failed"
                    );
                    self.stats.record_index_failure();
                }
            });
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    fn add_entry(
        &self,
        key: &CollectionKey,
        mapping: &ColumnMapping,
        column: &Column,
        value: &str,
        primary_key: &str,
    ) -> CoreResult<()> {
        let strategy = strategy_for(column.index())?;
        let internal = Self::internal_name(mapping, key, column.name())?;
        let area = IndexArea::new(self.area_dir(key, internal), column.name());
        if strategy.index(&area, value, primary_key)? {
            self.bump_count(&self.count_dir(key, internal), value, 1)?;
        }
        self.cache.add_entry(key, column.name(), value, primary_key);
        self.stats.record_index_write();
        Ok(())
    }

    fn remove_entry(
        &self,
        key: &CollectionKey,
        mapping: &ColumnMapping,
        column: &Column,
        value: &str,
        primary_key: &str,
    ) -> CoreResult<()> {
        let strategy = strategy_for(column.index())?;
        let internal = Self::internal_name(mapping, key, column.name())?;
        let area = IndexArea::new(self.area_dir(key, internal), column.name());
        if strategy.remove(&area, value, primary_key)? {
            self.bump_count(&self.count_dir(key, internal), value, -1)?;
        }
        self.cache.remove_entry(key, column.name(), value, primary_key);
        self.stats.record_index_write();
        Ok(())
    }

    /// Indexes every indexed non-primary column of a viewable record.
    ///
    /// Null and absent values are not indexed. Failures are swallowed per
    /// column.
    pub fn add_index(
        &self,
        key: &CollectionKey,
        schema: &Schema,
        mapping: &ColumnMapping,
        primary_key: &str,
        record: &Record,
    ) {
        self.for_each_indexed(key, schema, "add", |column| {
            match Self::value_key(column, record.get(column.name()))? {
                Some(value) => self.add_entry(key, mapping, column, &value, primary_key),
                None => Ok(()),
            }
        });
    }

    /// Removes every index entry of a viewable record. Failures are
    /// swallowed per column.
    pub fn remove_index(
        &self,
        key: &CollectionKey,
        schema: &Schema,
        mapping: &ColumnMapping,
        primary_key: &str,
        record: &Record,
    ) {
        self.for_each_indexed(key, schema, "remove", |column| {
            match Self::value_key(column, record.get(column.name()))? {
                Some(value) => self.remove_entry(key, mapping, column, &value, primary_key),
                None => Ok(()),
            }
        });
    }

    /// Moves the entries of columns whose value changed between `old` and
    /// `new`. Unchanged columns are not touched. Failures are swallowed per
    /// column.
    pub fn diff_index(
        &self,
        key: &CollectionKey,
        schema: &Schema,
        mapping: &ColumnMapping,
        primary_key: &str,
        old: &Record,
        new: &Record,
    ) {
        self.for_each_indexed(key, schema, "diff", |column| {
            let before = old.get(column.name());
            let after = new.get(column.name());
            if before == after {
                return Ok(());
            }
            if let Some(value) = Self::value_key(column, before)? {
                self.remove_entry(key, mapping, column, &value, primary_key)?;
            }
            if let Some(value) = Self::value_key(column, after)? {
                self.add_entry(key, mapping, column, &value, primary_key)?;
            }
            Ok(())
        });
    }

    /// Fails if a unique column of `record` already belongs to another key.
    ///
    /// # Errors
    ///
    /// Returns `UniqueIndexViolation`, or an error reading the index.
    pub fn check_unique(
        &self,
        key: &CollectionKey,
        schema: &Schema,
        mapping: &ColumnMapping,
        primary_key: &str,
        record: &Record,
    ) -> CoreResult<()> {
        for column in schema
            .indexed_columns()
            .filter(|c| c.index() == IndexType::Unique)
        {
            let Some(value) = Self::value_key(column, record.get(column.name()))? else {
                continue;
            };
            let area = self.area(key, mapping, column.name())?;
            match strategy_for(IndexType::Unique)?.any_entry(&area, &value)? {
                Some(owner) if owner != primary_key => {
                    return Err(CoreError::UniqueIndexViolation {
                        column: column.name().to_string(),
                        value,
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn bump_count(&self, dir: &Path, value: &str, delta: i64) -> CoreResult<()> {
        let _guard = self.count_lock.lock();
        let path = dir.join(encode_name(value)?);
        let current = read_count(&path)?;
        let next = if delta >= 0 {
            current.saturating_add(delta.unsigned_abs())
        } else {
            current.saturating_sub(delta.unsigned_abs())
        };
        if next == 0 {
            match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(CoreError::io(&path, e)),
            }
        } else {
            fs::create_dir_all(dir).at(dir)?;
            write_atomic(&path, next.to_string().as_bytes())
        }
    }

    /// Number of records holding `value` in an indexed column.
    ///
    /// # Errors
    ///
    /// Returns `ColumnInvalid`, a conversion error, or an I/O error.
    pub fn index_count(
        &self,
        datastore: &str,
        collection: &str,
        column: &str,
        value: &Value,
    ) -> CoreResult<u64> {
        let key = CollectionKey::new(datastore, collection);
        let (schema, mapping) = self.snapshot(datastore, collection)?;
        let col = indexed_column(&schema, collection, column)?;
        let Some(value) = Self::value_key(col, Some(value))? else {
            return Ok(0);
        };
        let internal = Self::internal_name(&mapping, &key, column)?;
        read_count(&self.count_dir(&key, internal).join(encode_name(&value)?))
    }

    fn snapshot(&self, datastore: &str, collection: &str) -> CoreResult<(Arc<Schema>, Arc<ColumnMapping>)> {
        Ok((
            self.schemas.read_schema(datastore, collection)?,
            self.schemas.read_mapping(datastore, collection)?,
        ))
    }

    /// Whether the index of `column` maps `value` to `primary_key`.
    ///
    /// # Errors
    ///
    /// Returns `ColumnInvalid`, `NotIndexed`, a conversion error, or an I/O
    /// error.
    pub fn contains(
        &self,
        datastore: &str,
        collection: &str,
        column: &str,
        value: &Value,
        primary_key: &str,
    ) -> CoreResult<bool> {
        let key = CollectionKey::new(datastore, collection);
        let (schema, mapping) = self.snapshot(datastore, collection)?;
        let col = indexed_column(&schema, collection, column)?;
        let Some(value) = Self::value_key(col, Some(value))? else {
            return Ok(false);
        };
        if let Some(found) = self.cache.contains(&key, column, &value, primary_key) {
            return Ok(found);
        }
        strategy_for(col.index())?.contains(&self.area(&key, &mapping, column)?, &value, primary_key)
    }

    /// Distinct values indexed for `column`.
    ///
    /// # Errors
    ///
    /// Returns `ColumnInvalid`, `NotIndexed`, or an I/O error.
    pub fn cardinality(&self, datastore: &str, collection: &str, column: &str) -> CoreResult<Vec<String>> {
        let key = CollectionKey::new(datastore, collection);
        let (schema, mapping) = self.snapshot(datastore, collection)?;
        let col = indexed_column(&schema, collection, column)?;
        strategy_for(col.index())?.cardinality(&self.area(&key, &mapping, column)?)
    }

    /// Any one primary key holding `value`.
    ///
    /// # Errors
    ///
    /// Returns `ColumnInvalid`, `NotIndexed`, a conversion error, or an I/O
    /// error.
    pub fn get_any_cardinal_entry(
        &self,
        datastore: &str,
        collection: &str,
        column: &str,
        value: &Value,
    ) -> CoreResult<Option<String>> {
        let key = CollectionKey::new(datastore, collection);
        let (schema, mapping) = self.snapshot(datastore, collection)?;
        let col = indexed_column(&schema, collection, column)?;
        let Some(value) = Self::value_key(col, Some(value))? else {
            return Ok(None);
        };
        strategy_for(col.index())?.any_entry(&self.area(&key, &mapping, column)?, &value)
    }

    /// Primary keys whose `column` value satisfies `predicate`, ascending.
    ///
    /// Querying a column with no index indexes it first (b-tree, built
    /// synchronously). The primary key column is answered from the record
    /// keys.
    ///
    /// # Errors
    ///
    /// Returns `ColumnInvalid`, `OperationNotSupported` for a range query on a
    /// hashed index, or an I/O error.
    pub fn keys_matching(
        &self,
        datastore: &str,
        collection: &str,
        column: &str,
        predicate: &Predicate,
    ) -> CoreResult<Vec<String>> {
        let key = CollectionKey::new(datastore, collection);
        let mut schema = self.schemas.read_schema(datastore, collection)?;
        let col = schema
            .column(column)
            .ok_or_else(|| CoreError::column_invalid(collection, column))?;

        if schema.is_primary(column) {
            let field_type = col.field_type();
            let backend = self.storage.backend_for(datastore, collection, &schema)?;
            return Ok(backend
                .keys()?
                .into_iter()
                .filter(|pk| predicate.matches_key(field_type, pk))
                .collect());
        }
        if !col.is_indexed() {
            self.ensure_indexed(datastore, collection, column)?;
            schema = self.schemas.read_schema(datastore, collection)?;
        }
        let mapping = self.schemas.read_mapping(datastore, collection)?;
        let col = schema
            .column(column)
            .ok_or_else(|| CoreError::column_invalid(collection, column))?;
        let strategy = strategy_for(col.index())?;
        let area = self.area(&key, &mapping, column)?;

        if !predicate.operator().is_point_lookup() {
            let field_type = col.field_type();
            return strategy.scan(&area, &|value: &str| predicate.matches_key(field_type, value));
        }

        let values = predicate.keys();
        if self.cache.is_cached(&key, column) {
            self.stats.record_cache_hit();
        } else {
            self.stats.record_cache_miss();
            self.cache.begin_load(&key, column);
            match strategy.entries(&area) {
                Ok(entries) => {
                    if self.cache.finish_load(&key, column, entries) {
                        debug!(%key, column, "index column cached");
                    }
                }
                Err(e) => {
                    self.cache.invalidate_column(&key, column);
                    return Err(e);
                }
            }
        }
        if let Some(keys) = self.cache.in_query(&key, column, &values) {
            return Ok(keys);
        }
        let mut keys = Vec::new();
        for value in &values {
            keys.extend(strategy.lookup(&area, value)?);
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// Iterator over [`IndexManager::keys_matching`].
    ///
    /// # Errors
    ///
    /// Same as [`IndexManager::keys_matching`].
    pub fn load_index_stream(
        &self,
        datastore: &str,
        collection: &str,
        column: &str,
        predicate: &Predicate,
    ) -> CoreResult<impl Iterator<Item = String>> {
        Ok(self
            .keys_matching(datastore, collection, column, predicate)?
            .into_iter())
    }

    /// Gives an unindexed column a b-tree index and builds it synchronously.
    ///
    /// Returns false if the column was already indexed.
    ///
    /// # Errors
    ///
    /// Returns `ColumnInvalid`, `InvalidSchema` for unindexable types, or a
    /// reindex error.
    pub fn ensure_indexed(&self, datastore: &str, collection: &str, column: &str) -> CoreResult<bool> {
        let changed = self.schemas.update(datastore, collection, |schema, _| {
            let col = schema
                .column_mut(column)
                .ok_or_else(|| CoreError::column_invalid(collection, column))?;
            if col.is_indexed() {
                return Ok(false);
            }
            col.set_index(IndexType::Btree);
            Ok(true)
        })?;
        if changed {
            info!(datastore, collection, column, "auto-indexing queried column");
            self.stats.record_auto_index();
            self.initialize(datastore, collection, column)?;
            self.reindex_now(datastore, collection, column)?;
        }
        Ok(changed)
    }

    /// Rebuilds a column's index from the record bodies, synchronously.
    ///
    /// Returns the number of records scanned.
    ///
    /// # Errors
    ///
    /// Returns `ColumnInvalid`, `NotIndexed`, or an I/O error. Records whose
    /// value cannot be indexed are counted as index failures.
    pub fn reindex_now(&self, datastore: &str, collection: &str, column: &str) -> CoreResult<u64> {
        self.rebuild(&CollectionKey::new(datastore, collection), column, None)
    }

    fn rebuild(
        &self,
        key: &CollectionKey,
        column: &str,
        mut operation: Option<&mut OperationRecord>,
    ) -> CoreResult<u64> {
        let (schema, mapping) = self.snapshot(&key.datastore, &key.collection)?;
        let col = indexed_column(&schema, &key.collection, column)?;
        if schema.is_primary(column) {
            return Ok(0);
        }
        let strategy = strategy_for(col.index())?;
        let internal = Self::internal_name(&mapping, key, column)?;
        let area = IndexArea::new(self.area_dir(key, internal), column);
        let counts = self.count_dir(key, internal);
        for dir in [area.dir(), counts.as_path()] {
            if dir.exists() {
                fs::remove_dir_all(dir).at(dir)?;
            }
        }
        strategy.initialize(&area)?;
        fs::create_dir_all(&counts).at(&counts)?;
        self.cache.invalidate_column(key, column);

        let backend = self
            .storage
            .backend_for(&key.datastore, &key.collection, &schema)?;
        let mut processed = 0u64;
        for primary_key in backend.keys()? {
            let Some(record) = backend.read(&primary_key)? else {
                continue;
            };
            processed += 1;
            let indexed = Self::value_key(col, record.get(internal)).and_then(|value| match value {
                Some(value) => {
                    if strategy.index(&area, &value, &primary_key)? {
                        self.bump_count(&counts, &value, 1)?;
                    }
                    self.stats.record_index_write();
                    Ok(())
                }
                None => Ok(()),
            });
            if let Err(e) = indexed {
                warn!(%key, column, %primary_key, error = %e, "record not indexed");
                self.stats.record_index_failure();
            }
            if processed % self.progress_interval == 0 {
                if let Some(operation) = operation.as_deref_mut() {
                    self.tracker.progress(operation, processed)?;
                }
            }
        }
        self.stats.record_reindex_job();
        Ok(processed)
    }

    /// Starts a background rebuild of a column's index and returns its
    /// operation id.
    ///
    /// Progress and completion are logged at `level`.
    ///
    /// # Errors
    ///
    /// Returns `ColumnInvalid`, `NotIndexed`, or an error registering the
    /// operation.
    pub fn index_records(
        self: &Arc<Self>,
        datastore: &str,
        collection: &str,
        column: &str,
        level: Level,
    ) -> CoreResult<String> {
        let schema = self.schemas.read_schema(datastore, collection)?;
        let col = indexed_column(&schema, collection, column)?;
        let mut operation = self
            .tracker
            .register(datastore, collection, column, col.index().as_str())?;
        let id = operation.id.clone();
        let mut fallback = operation.clone();

        let manager = Arc::clone(self);
        let key = CollectionKey::new(datastore, collection);
        let column = column.to_string();
        let spawned = thread::Builder::new()
            .name(format!("docudb-reindex-{}", &id[..8]))
            .spawn(move || manager.run_job(&key, &column, level, &mut operation));
        if let Err(e) = spawned {
            let err = CoreError::internal(format!("cannot start reindex: {e}"));
            let message = err.to_string();
            if let Err(e) = self.tracker.finish(&mut fallback, Err(err)) {
                warn!(operation = %id, error = %e, "cannot record failed reindex start");
            }
            return Err(CoreError::internal(message));
        }
        Ok(id)
    }

    fn run_job(&self, key: &CollectionKey, column: &str, level: Level, operation: &mut OperationRecord) {
        if let Err(e) = self.tracker.start(operation) {
            error!(%key, column, operation = %operation.id, error = %e, "cannot record reindex start");
        }
        log_at(level, key, column, &operation.id, "reindex started");
        let outcome = self.rebuild(key, column, Some(&mut *operation));
        match &outcome {
            Ok(records) => {
                log_at(level, key, column, &operation.id, "reindex completed");
                debug!(%key, column, records, "reindex record count");
            }
            Err(e) => error!(%key, column, operation = %operation.id, error = %e, "reindex failed"),
        }
        if let Err(e) = self.tracker.finish(operation, outcome) {
            error!(%key, column, operation = %operation.id, error = %e, "cannot record reindex outcome");
        }
    }

    /// Gives a column an index and starts building it in the background.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyIndexed`, `ColumnInvalid`, `OperationNotSupported` for
    /// index types without a strategy, or `InvalidSchema` for unindexable
    /// column types.
    pub fn index(
        self: &Arc<Self>,
        datastore: &str,
        collection: &str,
        column: &str,
        index_type: IndexType,
    ) -> CoreResult<String> {
        strategy_for(index_type)?;
        self.schemas.update(datastore, collection, |schema, _| {
            let col = schema
                .column_mut(column)
                .ok_or_else(|| CoreError::column_invalid(collection, column))?;
            if col.is_indexed() {
                return Err(CoreError::AlreadyIndexed {
                    column: column.to_string(),
                });
            }
            col.set_index(index_type);
            Ok(())
        })?;
        info!(datastore, collection, column, index = %index_type, "column indexed");
        self.initialize(datastore, collection, column)?;
        self.index_records(datastore, collection, column, Level::INFO)
    }

    /// Removes a column's index, archiving its area.
    ///
    /// # Errors
    ///
    /// Returns `PrimaryKeyIndexDropRestricted` for the primary key,
    /// `NotIndexed` for an unindexed column, or `ColumnInvalid`.
    pub fn drop_index(&self, datastore: &str, collection: &str, column: &str) -> CoreResult<()> {
        self.schemas.update(datastore, collection, |schema, _| {
            if schema.is_primary(column) {
                return Err(CoreError::PrimaryKeyIndexDropRestricted {
                    column: column.to_string(),
                });
            }
            let col = schema
                .column_mut(column)
                .ok_or_else(|| CoreError::column_invalid(collection, column))?;
            if !col.is_indexed() {
                return Err(CoreError::NotIndexed {
                    column: column.to_string(),
                });
            }
            col.set_index(IndexType::None);
            Ok(())
        })?;
        let mapping = self.schemas.read_mapping(datastore, collection)?;
        let key = CollectionKey::new(datastore, collection);
        self.discard_area(&key, &mapping, column)?;
        info!(datastore, collection, column, "index dropped");
        Ok(())
    }

    /// Archives a column's index area and deletes its counts.
    pub(crate) fn discard_area(&self, key: &CollectionKey, mapping: &ColumnMapping, column: &str) -> CoreResult<()> {
        let internal = Self::internal_name(mapping, key, column)?;
        let area = self.area_dir(key, internal);
        if area.exists() {
            let stem = format!("index-{}.{}", key.collection, encode_name(column)?);
            archive(&area, &self.layout.collection_archive(&key.datastore), &stem)?;
        }
        let counts = self.count_dir(key, internal);
        if counts.exists() {
            fs::remove_dir_all(&counts).at(&counts)?;
        }
        self.cache.invalidate_column(key, column);
        Ok(())
    }

    /// State of a long-running operation.
    ///
    /// # Errors
    ///
    /// Returns `OperationNotFound` for an unknown id.
    pub fn operation_status(&self, operation_id: &str) -> CoreResult<OperationRecord> {
        self.tracker.status(operation_id)
    }

    /// Blocks until an operation has finished and returns its final state.
    ///
    /// # Errors
    ///
    /// Returns `OperationNotFound` for an unknown id.
    pub fn wait_for_operation(&self, operation_id: &str) -> CoreResult<OperationRecord> {
        self.tracker.wait(operation_id)
    }
}

fn indexed_column<'s>(schema: &'s Schema, collection: &str, column: &str) -> CoreResult<&'s Column> {
    let col = schema
        .column(column)
        .ok_or_else(|| CoreError::column_invalid(collection, column))?;
    if !col.is_indexed() {
        return Err(CoreError::NotIndexed {
            column: column.to_string(),
        });
    }
    Ok(col)
}

fn read_count(path: &Path) -> CoreResult<u64> {
    Ok(read_optional(path)?
        .and_then(|bytes| String::from_utf8_lossy(&bytes).trim().parse::<u64>().ok())
        .unwrap_or(0))
}

fn log_at(level: Level, key: &CollectionKey, column: &str, operation: &str, message: &str) {
    if level == Level::ERROR {
        error!(%key, column, operation, "{message}");
    } else if level == Level::WARN {
        warn!(%key, column, operation, "{message}");
    } else if level == Level::INFO {
        info!(%key, column, operation, "{message}");
    } else if level == Level::DEBUG {
        debug!(%key, column, operation, "{message}");
    } else {
        trace!(%key, column, operation, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_parse_leniently() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("n");
        assert_eq!(read_count(&path).unwrap(), 0);
        fs::write(&path, b" 7\n").unwrap();
        assert_eq!(read_count(&path).unwrap(), 7);
        fs::write(&path, b"x").unwrap();
        assert_eq!(read_count(&path).unwrap(), 0);
    }

    #[test]
    fn indexed_column_checks() {
        use docudb_types::FieldType;
        let mut schema = Schema::new(Default::default())
            .with_column(Column::new("a", FieldType::string()).with_index(IndexType::Btree))
            .unwrap()
            .with_column(Column::new("b", FieldType::string()))
            .unwrap();
        schema.ensure_primary();
        assert!(indexed_column(&schema, "c", "a").is_ok());
        assert_eq!(
            indexed_column(&schema, "c", "b").unwrap_err().code(),
            "NOT_INDEXED"
        );
        assert_eq!(
            indexed_column(&schema, "c", "z").unwrap_err().code(),
            "COLUMN_INVALID"
        );
    }
}
