//! Schema and column mapping persistence with a snapshot cache.
//!
//! Readers get `Arc` snapshots. Writers build a new schema, persist it and
//! swap a new map into the cache, so a reader never sees a half-updated
//! schema. Every change to the cache maps happens under `fill_lock`, so a
//! reader filling a miss from disk cannot install a copy older than one a
//! writer installed or invalidated meanwhile.

use super::mapping::ColumnMapping;
use super::model::{Schema, SchemaMeta};
use super::translate;
use crate::error::{CoreError, CoreResult};
use crate::layout::{read_optional, write_atomic, Layout};
use crate::stats::EngineStats;
use crate::types::{CollectionKey, Record};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type Snapshot<T> = ArcSwap<HashMap<CollectionKey, Arc<T>>>;

/// Reads, writes and caches collection schemas and column mappings.
pub struct SchemaManager {
    layout: Layout,
    defaults: SchemaMeta,
    schemas: Snapshot<Schema>,
    mappings: Snapshot<ColumnMapping>,
    write_lock: Mutex<()>,
    fill_lock: Mutex<()>,
    stats: Arc<EngineStats>,
}

impl SchemaManager {
    /// Creates a manager over `layout`. `defaults` fill missing `meta` fields.
    pub fn new(layout: Layout, defaults: SchemaMeta, stats: Arc<EngineStats>) -> Self {
        Self {
            layout,
            defaults,
            schemas: ArcSwap::from_pointee(HashMap::new()),
            mappings: ArcSwap::from_pointee(HashMap::new()),
            write_lock: Mutex::new(()),
            fill_lock: Mutex::new(()),
            stats,
        }
    }

    /// Settings given to schemas that do not specify them.
    #[must_use]
    pub fn defaults(&self) -> &SchemaMeta {
        &self.defaults
    }

    /// Loads the schema of a collection.
    ///
    /// # Errors
    ///
    /// Returns `CollectionInvalid` if the collection directory is missing and
    /// `SchemaFileNotFound` if it has no schema file.
    pub fn read_schema(&self, datastore: &str, collection: &str) -> CoreResult<Arc<Schema>> {
        let key = CollectionKey::new(datastore, collection);
        if let Some(schema) = self.schemas.load().get(&key) {
            self.stats.record_cache_hit();
            debug!(%key, "schema cache hit");
            return Ok(Arc::clone(schema));
        }
        self.stats.record_cache_miss();
        debug!(%key, "schema cache miss");

        let _fill = self.fill_lock.lock();
        if let Some(schema) = self.schemas.load().get(&key) {
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(self.load_schema(datastore, collection)?);
        install(&self.schemas, key, Arc::clone(&schema));
        Ok(schema)
    }

    fn load_schema(&self, datastore: &str, collection: &str) -> CoreResult<Schema> {
        if !self.layout.collection(datastore, collection).is_dir() {
            return Err(CoreError::collection_invalid(datastore, collection));
        }
        let path = self.layout.schema_file(datastore, collection);
        let bytes = read_optional(&path)?.ok_or_else(|| CoreError::SchemaFileNotFound {
            datastore: datastore.to_string(),
            collection: collection.to_string(),
        })?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        Schema::from_json_with_defaults(&value, &self.defaults)
    }

    /// Loads the column mapping of a collection.
    ///
    /// A collection without a mapping file gets one derived from its schema.
    ///
    /// # Errors
    ///
    /// Same as [`SchemaManager::read_schema`].
    pub fn read_mapping(&self, datastore: &str, collection: &str) -> CoreResult<Arc<ColumnMapping>> {
        let key = CollectionKey::new(datastore, collection);
        if let Some(mapping) = self.mappings.load().get(&key) {
            return Ok(Arc::clone(mapping));
        }
        // Read first: a miss on the schema takes the fill lock itself.
        let schema = self.read_schema(datastore, collection)?;

        let _fill = self.fill_lock.lock();
        if let Some(mapping) = self.mappings.load().get(&key) {
            return Ok(Arc::clone(mapping));
        }
        let path = self.layout.mapping_file(datastore, collection);
        let mapping = match read_optional(&path)? {
            Some(bytes) => ColumnMapping::from_json(&serde_json::from_slice(&bytes)?)?,
            None => ColumnMapping::for_schema(&schema),
        };
        let mapping = Arc::new(mapping);
        install(&self.mappings, key, Arc::clone(&mapping));
        Ok(mapping)
    }

    /// Validates and persists a schema.
    ///
    /// With `sync_mapping`, the column mapping gains an entry for every new
    /// column and is written before the schema.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` if validation fails, or an I/O error.
    pub fn write_schema(
        &self,
        datastore: &str,
        collection: &str,
        schema: &Schema,
        sync_mapping: bool,
    ) -> CoreResult<()> {
        schema.validate()?;
        let _guard = self.write_lock.lock();
        let key = CollectionKey::new(datastore, collection);
        if sync_mapping {
            let mut mapping = self.current_mapping(datastore, collection)?;
            if mapping.sync(schema) {
                self.persist_mapping(&key, mapping)?;
            }
        }
        self.persist_schema(&key, schema.clone())
    }

    /// Applies `mutate` to copies of the current schema and mapping, then
    /// persists both (mapping first) and installs them in the cache.
    ///
    /// Nothing is written if `mutate` or validation fails.
    ///
    /// # Errors
    ///
    /// Returns the error from `mutate`, validation, or I/O.
    pub fn update<R>(
        &self,
        datastore: &str,
        collection: &str,
        mutate: impl FnOnce(&mut Schema, &mut ColumnMapping) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let _guard = self.write_lock.lock();
        let key = CollectionKey::new(datastore, collection);
        let mut schema = (*self.read_schema(datastore, collection)?).clone();
        let mut mapping = self.current_mapping(datastore, collection)?;
        let original_mapping = mapping.clone();

        let result = mutate(&mut schema, &mut mapping)?;
        mapping.sync(&schema);
        schema.validate()?;

        if mapping != original_mapping {
            self.persist_mapping(&key, mapping)?;
        }
        self.persist_schema(&key, schema)?;
        Ok(result)
    }

    fn current_mapping(&self, datastore: &str, collection: &str) -> CoreResult<ColumnMapping> {
        let path = self.layout.mapping_file(datastore, collection);
        if read_optional(&path)?.is_none() {
            self.invalidate_mapping(&CollectionKey::new(datastore, collection));
            return Ok(ColumnMapping::new());
        }
        Ok((*self.read_mapping(datastore, collection)?).clone())
    }

    fn persist_mapping(&self, key: &CollectionKey, mapping: ColumnMapping) -> CoreResult<()> {
        let path = self.layout.mapping_file(&key.datastore, &key.collection);
        write_atomic(&path, &serde_json::to_vec_pretty(&mapping.to_json())?)?;
        let _fill = self.fill_lock.lock();
        install(&self.mappings, key.clone(), Arc::new(mapping));
        Ok(())
    }

    fn persist_schema(&self, key: &CollectionKey, schema: Schema) -> CoreResult<()> {
        let path = self.layout.schema_file(&key.datastore, &key.collection);
        write_atomic(&path, &serde_json::to_vec_pretty(&schema.to_json())?)?;
        debug!(%key, columns = schema.columns().len(), "schema written");
        let _fill = self.fill_lock.lock();
        install(&self.schemas, key.clone(), Arc::new(schema));
        Ok(())
    }

    /// Translates a viewable record to internal form.
    ///
    /// # Errors
    ///
    /// Fails if the schema or mapping cannot be read.
    pub fn viewable_to_internal(
        &self,
        datastore: &str,
        collection: &str,
        viewable: &Record,
    ) -> CoreResult<Record> {
        let schema = self.read_schema(datastore, collection)?;
        let mapping = self.read_mapping(datastore, collection)?;
        Ok(translate::to_internal(&schema, &mapping, viewable))
    }

    /// Translates an internal record to viewable form.
    ///
    /// # Errors
    ///
    /// Fails if the schema or mapping cannot be read.
    pub fn internal_to_viewable(
        &self,
        datastore: &str,
        collection: &str,
        internal: &Record,
    ) -> CoreResult<Record> {
        let schema = self.read_schema(datastore, collection)?;
        let mapping = self.read_mapping(datastore, collection)?;
        Ok(translate::to_viewable(&schema, &mapping, internal))
    }

    /// Drops cached state of one collection.
    pub fn invalidate(&self, datastore: &str, collection: &str) {
        let key = CollectionKey::new(datastore, collection);
        let _guard = self.write_lock.lock();
        let _fill = self.fill_lock.lock();
        remove_where(&self.schemas, |k| *k == key);
        remove_where(&self.mappings, |k| *k == key);
    }

    /// Drops cached state of every collection in a datastore.
    pub fn invalidate_datastore(&self, datastore: &str) {
        let _guard = self.write_lock.lock();
        let _fill = self.fill_lock.lock();
        remove_where(&self.schemas, |k| k.datastore == datastore);
        remove_where(&self.mappings, |k| k.datastore == datastore);
    }

    fn invalidate_mapping(&self, key: &CollectionKey) {
        let _fill = self.fill_lock.lock();
        remove_where(&self.mappings, |k| k == key);
    }
}

fn install<T>(cache: &Snapshot<T>, key: CollectionKey, value: Arc<T>) {
    cache.rcu(|current| {
        let mut next = HashMap::clone(current);
        next.insert(key.clone(), Arc::clone(&value));
        next
    });
}

fn remove_where<T>(cache: &Snapshot<T>, predicate: impl Fn(&CollectionKey) -> bool) {
    if !cache.load().keys().any(&predicate) {
        return;
    }
    cache.rcu(|current| {
        let mut next = HashMap::clone(current);
        next.retain(|k, _| !predicate(k));
        next
    });
}
