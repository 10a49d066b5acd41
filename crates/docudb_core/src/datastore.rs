//! Datastore lifecycle.

use crate::error::{CoreError, CoreResult};
use crate::index::IndexCache;
use crate::layout::{archive, create_areas, list_dirs, Layout, DATASTORE_AREAS};
use crate::naming::is_valid_identifier;
use crate::records::QueryResultCache;
use crate::schema::SchemaManager;
use crate::storage::StorageRegistry;
use std::fs;
use std::sync::Arc;
use tracing::info;

/// Creates, drops and lists datastores.
pub struct DatastoreManager {
    layout: Layout,
    schemas: Arc<SchemaManager>,
    storage: Arc<StorageRegistry>,
    index_cache: Arc<IndexCache>,
    query_cache: Arc<QueryResultCache>,
}

impl DatastoreManager {
    /// Creates a datastore manager.
    pub fn new(
        layout: Layout,
        schemas: Arc<SchemaManager>,
        storage: Arc<StorageRegistry>,
        index_cache: Arc<IndexCache>,
        query_cache: Arc<QueryResultCache>,
    ) -> Self {
        Self {
            layout,
            schemas,
            storage,
            index_cache,
            query_cache,
        }
    }

    fn is_reserved(&self, datastore: &str) -> bool {
        self.layout.datastore(datastore) == self.layout.datastore_archive()
    }

    /// Whether the datastore exists.
    #[must_use]
    pub fn datastore_exists(&self, datastore: &str) -> bool {
        is_valid_identifier(datastore)
            && !self.is_reserved(datastore)
            && self.layout.collections_dir(datastore).is_dir()
    }

    /// Names of all datastores, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the base directory cannot be read.
    pub fn list_datastores(&self) -> CoreResult<Vec<String>> {
        Ok(list_dirs(self.layout.base())?
            .into_iter()
            .filter(|name| self.datastore_exists(name))
            .collect())
    }

    /// Creates a datastore and its fixed sub-areas.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDatastoreName` if it exists and `DatastoreInvalid`
    /// if the name cannot name a directory.
    pub fn create_datastore(&self, datastore: &str) -> CoreResult<()> {
        if !is_valid_identifier(datastore) || self.is_reserved(datastore) {
            return Err(CoreError::datastore_invalid(datastore));
        }
        let dir = self.layout.datastore(datastore);
        if dir.exists() {
            return Err(CoreError::DuplicateDatastoreName {
                datastore: datastore.to_string(),
            });
        }
        if let Err(e) = create_areas(&dir, &DATASTORE_AREAS) {
            let _ = fs::remove_dir_all(&dir);
            return Err(e);
        }
        info!(datastore, "datastore created");
        Ok(())
    }

    /// Archives a datastore to `<base>/del/<ds>.<millis>` and drops every
    /// cached state of its collections.
    ///
    /// # Errors
    ///
    /// Returns `DatastoreInvalid` if the datastore does not exist.
    pub fn drop_datastore(&self, datastore: &str) -> CoreResult<()> {
        if !self.datastore_exists(datastore) {
            return Err(CoreError::datastore_invalid(datastore));
        }
        let target = archive(
            &self.layout.datastore(datastore),
            &self.layout.datastore_archive(),
            datastore,
        )?;

        self.schemas.invalidate_datastore(datastore);
        self.index_cache.invalidate_datastore(datastore);
        self.query_cache.invalidate_datastore(datastore);
        self.storage.evict_datastore(datastore);
        info!(datastore, archive = %target.display(), "datastore dropped");
        Ok(())
    }
}
