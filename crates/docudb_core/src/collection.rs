//! Collection Manager: collection lifecycle and column structure.
//!
//! Creation is all-or-nothing: any failure after the collection directory
//! exists tears the directory down before the error is returned. Drops and
//! truncates archive the directory into `<ds>/del/` instead of deleting it.
//!
//! Column changes go through [`SchemaManager::update`], so the mapping is
//! always persisted before the schema. Each change invalidates only the
//! affected column in the index cache.

use crate::error::{CoreError, CoreResult, IoResultExt};
use crate::index::{IndexCache, IndexManager};
use crate::layout::{archive, create_areas, list_dirs, write_atomic, Layout, COLLECTION_AREAS};
use crate::naming::is_valid_identifier;
use crate::records::QueryResultCache;
use crate::schema::{AutoDefine, Column, ReplicationType, Schema, SchemaManager};
use crate::storage::StorageRegistry;
use crate::types::CollectionKey;
use docudb_types::FieldType;
use serde_json::Value;
use std::fs;
use std::sync::Arc;
use tracing::{debug, info, warn, Level};

/// Creates, drops and restructures collections.
pub struct CollectionManager {
    layout: Layout,
    schemas: Arc<SchemaManager>,
    storage: Arc<StorageRegistry>,
    indexes: Arc<IndexManager>,
    index_cache: Arc<IndexCache>,
    query_cache: Arc<QueryResultCache>,
}

impl CollectionManager {
    /// Creates a collection manager.
    pub fn new(
        layout: Layout,
        schemas: Arc<SchemaManager>,
        storage: Arc<StorageRegistry>,
        indexes: Arc<IndexManager>,
        index_cache: Arc<IndexCache>,
        query_cache: Arc<QueryResultCache>,
    ) -> Self {
        Self {
            layout,
            schemas,
            storage,
            indexes,
            index_cache,
            query_cache,
        }
    }

    fn require_collection(&self, datastore: &str, collection: &str) -> CoreResult<()> {
        if self.collection_exists(datastore, collection) {
            Ok(())
        } else {
            Err(CoreError::collection_invalid(datastore, collection))
        }
    }

    fn forget(&self, datastore: &str, collection: &str) {
        let key = CollectionKey::new(datastore, collection);
        self.schemas.invalidate(datastore, collection);
        self.index_cache.invalidate_collection(&key);
        self.query_cache.invalidate(&key);
        self.storage.evict(datastore, collection);
    }

    /// Whether the collection exists (its directory has a `data/` area).
    #[must_use]
    pub fn collection_exists(&self, datastore: &str, collection: &str) -> bool {
        is_valid_identifier(collection) && self.layout.data_dir(datastore, collection).is_dir()
    }

    /// Names of the datastore's collections, sorted.
    ///
    /// # Errors
    ///
    /// Returns `DatastoreInvalid` if the datastore does not exist.
    pub fn list_collections(&self, datastore: &str) -> CoreResult<Vec<String>> {
        let dir = self.layout.collections_dir(datastore);
        if !dir.is_dir() {
            return Err(CoreError::datastore_invalid(datastore));
        }
        Ok(list_dirs(&dir)?
            .into_iter()
            .filter(|name| self.layout.data_dir(datastore, name).is_dir())
            .collect())
    }

    /// Creates a collection from a schema in its persisted JSON form.
    ///
    /// A primary key column is synthesised if the schema has none. Indexed
    /// columns get empty index areas.
    ///
    /// # Errors
    ///
    /// - `DatastoreInvalid` if the datastore does not exist
    /// - `CollectionInvalid` if the name cannot name a directory
    /// - `DuplicateCollectionName` if the collection exists
    /// - `InvalidSchema` if the schema is malformed or breaks a rule
    pub fn create_collection(&self, datastore: &str, collection: &str, schema: &Value) -> CoreResult<()> {
        if !self.layout.collections_dir(datastore).is_dir() {
            return Err(CoreError::datastore_invalid(datastore));
        }
        if !is_valid_identifier(collection) {
            return Err(CoreError::collection_invalid(datastore, collection));
        }
        let dir = self.layout.collection(datastore, collection);
        if dir.exists() {
            return Err(CoreError::DuplicateCollectionName {
                datastore: datastore.to_string(),
                collection: collection.to_string(),
            });
        }

        let mut schema = Schema::from_json_with_defaults(schema, self.schemas.defaults())?;
        schema.ensure_primary();
        schema.validate()?;

        fs::create_dir_all(&dir).at(&dir)?;
        self.forget(datastore, collection);
        if let Err(e) = self.populate(datastore, collection, &schema) {
            warn!(datastore, collection, error = %e, "collection creation failed, rolling back");
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                warn!(datastore, collection, error = %cleanup, "rollback incomplete");
            }
            self.forget(datastore, collection);
            return Err(e);
        }
        info!(
            datastore,
            collection,
            storage = schema.meta().storage.as_str(),
            columns = schema.columns().len(),
            "collection created"
        );
        Ok(())
    }

    fn populate(&self, datastore: &str, collection: &str, schema: &Schema) -> CoreResult<()> {
        create_areas(&self.layout.collection(datastore, collection), &COLLECTION_AREAS)?;
        write_atomic(&self.layout.row_count_file(datastore, collection), b"0")?;
        self.schemas.write_schema(datastore, collection, schema, true)?;
        for column in schema.indexed_columns() {
            self.indexes.initialize(datastore, collection, column.name())?;
        }
        Ok(())
    }

    /// Archives a collection into `<ds>/del/<collection>.<millis>`.
    ///
    /// # Errors
    ///
    /// Returns `CollectionInvalid` if the collection does not exist.
    pub fn drop_collection(&self, datastore: &str, collection: &str) -> CoreResult<()> {
        self.require_collection(datastore, collection)?;
        let target = archive(
            &self.layout.collection(datastore, collection),
            &self.layout.collection_archive(datastore),
            collection,
        )?;
        self.forget(datastore, collection);
        info!(datastore, collection, archive = %target.display(), "collection dropped");
        Ok(())
    }

    /// Renames a collection directory.
    ///
    /// # Errors
    ///
    /// Returns `CollectionInvalid` if `old` does not exist or `new` is not a
    /// valid name, and `DuplicateCollectionName` if `new` exists.
    pub fn rename_collection(&self, datastore: &str, old: &str, new: &str) -> CoreResult<()> {
        self.require_collection(datastore, old)?;
        if !is_valid_identifier(new) {
            return Err(CoreError::collection_invalid(datastore, new));
        }
        let target = self.layout.collection(datastore, new);
        if target.exists() {
            return Err(CoreError::DuplicateCollectionName {
                datastore: datastore.to_string(),
                collection: new.to_string(),
            });
        }
        let source = self.layout.collection(datastore, old);
        fs::rename(&source, &target).at(&source)?;

        self.storage.rename(datastore, old, new);
        for name in [old, new] {
            let key = CollectionKey::new(datastore, name);
            self.schemas.invalidate(datastore, name);
            self.index_cache.invalidate_collection(&key);
            self.query_cache.invalidate(&key);
        }
        info!(datastore, old, new, "collection renamed");
        Ok(())
    }

    /// Empties a collection by dropping and recreating it with its schema.
    ///
    /// # Errors
    ///
    /// Returns `CollectionInvalid` if the collection does not exist.
    pub fn truncate_collection(&self, datastore: &str, collection: &str) -> CoreResult<()> {
        let schema = self.schemas.read_schema(datastore, collection)?.to_json();
        self.drop_collection(datastore, collection)?;
        self.create_collection(datastore, collection, &schema)?;
        info!(datastore, collection, "collection truncated");
        Ok(())
    }

    /// Adds a column. An indexed column starts a background reindex whose
    /// operation id is returned.
    ///
    /// # Errors
    ///
    /// Returns `CollectionInvalid`, `DuplicateColumnName`, or
    /// `InvalidSchema` for a column the schema rules reject.
    pub fn add_column(&self, datastore: &str, collection: &str, column: Column) -> CoreResult<Option<String>> {
        let name = column.name().to_string();
        let indexed = column.is_indexed();
        self.schemas.update(datastore, collection, |schema, _| {
            if schema.contains(&name) {
                return Err(CoreError::duplicate_column(collection, &name));
            }
            schema.add_column(column)
        })?;
        self.index_cache
            .invalidate_column(&CollectionKey::new(datastore, collection), &name);
        info!(datastore, collection, column = %name, indexed, "column added");

        if !indexed {
            return Ok(None);
        }
        self.indexes.initialize(datastore, collection, &name)?;
        self.indexes
            .index_records(datastore, collection, &name, Level::INFO)
            .map(Some)
    }

    /// Adds an unindexed STRING column, as flexible schemas do for unknown
    /// fields.
    ///
    /// # Errors
    ///
    /// Same as [`CollectionManager::add_column`].
    pub fn add_inferred_column(&self, datastore: &str, collection: &str, column: &str) -> CoreResult<()> {
        self.add_column(datastore, collection, Column::new(column, FieldType::string()))
            .map(|_| ())
    }

    /// Removes a column. Its index area is archived; stored values stay in
    /// the record bodies under the retained mapping.
    ///
    /// # Errors
    ///
    /// Returns `PrimaryKeyDropRestricted` for the primary key and
    /// `ColumnInvalid` for an unknown column.
    pub fn drop_column(&self, datastore: &str, collection: &str, column: &str) -> CoreResult<()> {
        let removed = self.schemas.update(datastore, collection, |schema, _| {
            if schema.is_primary(column) {
                return Err(CoreError::PrimaryKeyDropRestricted {
                    column: column.to_string(),
                });
            }
            schema
                .remove_column(column)
                .ok_or_else(|| CoreError::column_invalid(collection, column))
        })?;

        let key = CollectionKey::new(datastore, collection);
        if removed.is_indexed() {
            let mapping = self.schemas.read_mapping(datastore, collection)?;
            self.indexes.discard_area(&key, &mapping, column)?;
        }
        self.index_cache.invalidate_column(&key, column);
        info!(datastore, collection, column, "column dropped");
        Ok(())
    }

    /// Renames a column. Records are not rewritten: the internal name stays
    /// and only the mapping changes.
    ///
    /// # Errors
    ///
    /// Returns `ColumnInvalid` if `old` does not exist and
    /// `DuplicateColumnName` if `new` does.
    pub fn rename_column(&self, datastore: &str, collection: &str, old: &str, new: &str) -> CoreResult<()> {
        self.schemas.update(datastore, collection, |schema, mapping| {
            if !schema.contains(old) {
                return Err(CoreError::column_invalid(collection, old));
            }
            if schema.contains(new) {
                return Err(CoreError::duplicate_column(collection, new));
            }
            if mapping.forget(new).is_some() {
                debug!(datastore, collection, column = new, "stale mapping of dropped column removed");
            }
            mapping.rename(collection, old, new)?;
            schema.rename_column(old, new);
            Ok(())
        })?;
        let key = CollectionKey::new(datastore, collection);
        self.index_cache.invalidate_column(&key, old);
        self.index_cache.invalidate_column(&key, new);
        info!(datastore, collection, old, new, "column renamed");
        Ok(())
    }

    /// Replaces a column's field type and auto-define, keeping its index.
    /// An indexed column is reindexed in the background and the operation id
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns `ColumnInvalid`, or `InvalidSchema` if the new definition
    /// breaks a schema rule (for example a non-scalar primary key).
    pub fn alter_column(
        &self,
        datastore: &str,
        collection: &str,
        column: &str,
        field_type: FieldType,
        auto_define: AutoDefine,
    ) -> CoreResult<Option<String>> {
        let indexed = self.schemas.update(datastore, collection, |schema, _| {
            let primary = schema.is_primary(column);
            let col = schema
                .column_mut(column)
                .ok_or_else(|| CoreError::column_invalid(collection, column))?;
            col.set_field_type(field_type);
            col.set_auto_define(auto_define);
            Ok(col.is_indexed() && !primary)
        })?;
        let key = CollectionKey::new(datastore, collection);
        self.index_cache.invalidate_column(&key, column);
        info!(datastore, collection, column, %auto_define, "column altered");

        if !indexed {
            return Ok(None);
        }
        self.indexes
            .index_records(datastore, collection, column, Level::INFO)
            .map(Some)
    }

    /// Changes only a column's field type.
    ///
    /// # Errors
    ///
    /// Same as [`CollectionManager::alter_column`].
    pub fn change_data_type(
        &self,
        datastore: &str,
        collection: &str,
        column: &str,
        field_type: FieldType,
    ) -> CoreResult<Option<String>> {
        let schema = self.schemas.read_schema(datastore, collection)?;
        let auto_define = schema
            .column(column)
            .ok_or_else(|| CoreError::column_invalid(collection, column))?
            .auto_define();
        self.alter_column(datastore, collection, column, field_type, auto_define)
    }

    /// Changes only a column's auto-define type.
    ///
    /// # Errors
    ///
    /// Returns `ColumnInvalid`, or `InvalidSchema` if the column's type does
    /// not allow this auto-define.
    pub fn set_auto_define(
        &self,
        datastore: &str,
        collection: &str,
        column: &str,
        auto_define: AutoDefine,
    ) -> CoreResult<()> {
        self.schemas.update(datastore, collection, |schema, _| {
            schema
                .column_mut(column)
                .ok_or_else(|| CoreError::column_invalid(collection, column))?
                .set_auto_define(auto_define);
            Ok(())
        })?;
        debug!(datastore, collection, column, %auto_define, "auto-define changed");
        Ok(())
    }

    /// Records replication settings in the schema metadata.
    ///
    /// # Errors
    ///
    /// Returns `CollectionInvalid` if the collection does not exist.
    pub fn set_replication(
        &self,
        datastore: &str,
        collection: &str,
        replication_type: ReplicationType,
        factor: u32,
    ) -> CoreResult<()> {
        self.schemas.update(datastore, collection, |schema, _| {
            let meta = schema.meta_mut();
            meta.replication_type = replication_type;
            meta.replication_factor = factor;
            Ok(())
        })
    }

    /// Whether the collection is memory resident. Memory collections are
    /// registered (and rehydrated or reset) on first observation.
    ///
    /// # Errors
    ///
    /// Returns `CollectionInvalid` or a registration error.
    pub fn is_in_memory(&self, datastore: &str, collection: &str) -> CoreResult<bool> {
        let schema = self.schemas.read_schema(datastore, collection)?;
        self.storage.is_in_memory(datastore, collection, &schema)
    }
}
