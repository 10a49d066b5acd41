//! Resolves the record backend of each collection.

use super::backend::RecordBackend;
use super::file::FileRecords;
use super::memory::{DurableMemoryRecords, MemoryRecords};
use crate::error::{CoreResult, IoResultExt};
use crate::index::IndexCache;
use crate::layout::{write_atomic, Layout};
use crate::schema::{Schema, StorageKind};
use crate::types::CollectionKey;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tracing::info;

/// Registry of memory-resident collections.
///
/// On-disk collections get a fresh [`FileRecords`] per call. Memory
/// collections are registered the first time they are observed: durable ones
/// are rehydrated from their data files, non-durable ones start empty and have
/// their index areas reset.
pub struct StorageRegistry {
    layout: Layout,
    index_cache: Arc<IndexCache>,
    memory: RwLock<HashMap<CollectionKey, Arc<dyn RecordBackend>>>,
}

impl StorageRegistry {
    /// Creates an empty registry.
    pub fn new(layout: Layout, index_cache: Arc<IndexCache>) -> Self {
        Self {
            layout,
            index_cache,
            memory: RwLock::new(HashMap::new()),
        }
    }

    /// Backend holding the collection's records.
    ///
    /// # Errors
    ///
    /// Returns an error if registering a memory collection fails.
    pub fn backend_for(
        &self,
        datastore: &str,
        collection: &str,
        schema: &Schema,
    ) -> CoreResult<Arc<dyn RecordBackend>> {
        let storage = schema.meta().storage;
        if !storage.is_memory() {
            return Ok(Arc::new(FileRecords::new(
                self.layout.data_dir(datastore, collection),
            )));
        }
        let key = CollectionKey::new(datastore, collection);
        if let Some(backend) = self.memory.read().get(&key) {
            return Ok(Arc::clone(backend));
        }

        let mut memory = self.memory.write();
        if let Some(backend) = memory.get(&key) {
            return Ok(Arc::clone(backend));
        }
        let backend = self.register(&key, storage)?;
        memory.insert(key, Arc::clone(&backend));
        Ok(backend)
    }

    fn register(&self, key: &CollectionKey, storage: StorageKind) -> CoreResult<Arc<dyn RecordBackend>> {
        let files = FileRecords::new(self.layout.data_dir(&key.datastore, &key.collection));
        if storage == StorageKind::InMemory {
            info!(%key, "registering durable memory collection");
            return Ok(Arc::new(DurableMemoryRecords::rehydrate(files)?));
        }

        info!(%key, "registering non-durable memory collection, resetting indexes");
        for root in [
            self.layout.index_root(&key.datastore, &key.collection),
            self.layout.index_count_root(&key.datastore, &key.collection),
        ] {
            if root.exists() {
                fs::remove_dir_all(&root).at(&root)?;
            }
            fs::create_dir_all(&root).at(&root)?;
        }
        write_atomic(
            &self.layout.row_count_file(&key.datastore, &key.collection),
            b"0",
        )?;
        self.index_cache.invalidate_collection(key);
        Ok(Arc::new(MemoryRecords::new()))
    }

    /// Whether the collection is memory resident, registering it if so.
    ///
    /// # Errors
    ///
    /// Returns an error if registration fails.
    pub fn is_in_memory(&self, datastore: &str, collection: &str, schema: &Schema) -> CoreResult<bool> {
        if !schema.meta().storage.is_memory() {
            return Ok(false);
        }
        self.backend_for(datastore, collection, schema)?;
        Ok(true)
    }

    /// Whether the collection is currently registered.
    #[must_use]
    pub fn is_registered(&self, datastore: &str, collection: &str) -> bool {
        self.memory
            .read()
            .contains_key(&CollectionKey::new(datastore, collection))
    }

    /// Forgets a collection's memory backend.
    pub fn evict(&self, datastore: &str, collection: &str) {
        self.memory
            .write()
            .remove(&CollectionKey::new(datastore, collection));
    }

    /// Moves a registered memory backend to a new collection name.
    pub fn rename(&self, datastore: &str, old: &str, new: &str) {
        let mut memory = self.memory.write();
        if let Some(backend) = memory.remove(&CollectionKey::new(datastore, old)) {
            memory.insert(CollectionKey::new(datastore, new), backend);
        }
    }

    /// Forgets every memory backend of a datastore.
    pub fn evict_datastore(&self, datastore: &str) {
        self.memory.write().retain(|key, _| key.datastore != datastore);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{create_areas, COLLECTION_AREAS};
    use crate::schema::SchemaMeta;
    use crate::types::Record;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, Layout, StorageRegistry) {
        let temp = tempdir().unwrap();
        let layout = Layout::new(temp.path());
        create_areas(&layout.collection("shop", "cart"), &COLLECTION_AREAS).unwrap();
        let registry = StorageRegistry::new(layout.clone(), Arc::new(IndexCache::new()));
        (temp, layout, registry)
    }

    fn schema(storage: StorageKind) -> Schema {
        Schema::new(SchemaMeta {
            storage,
            ..SchemaMeta::default()
        })
    }

    #[test]
    fn on_disk_is_not_registered() {
        let (_temp, _layout, registry) = setup();
        assert!(!registry
            .is_in_memory("shop", "cart", &schema(StorageKind::OnDisk))
            .unwrap());
        assert!(!registry.is_registered("shop", "cart"));
    }

    #[test]
    fn memory_backend_is_shared() {
        let (_temp, _layout, registry) = setup();
        let schema = schema(StorageKind::InMemoryNonDurable);
        assert!(registry.is_in_memory("shop", "cart", &schema).unwrap());
        let first = registry.backend_for("shop", "cart", &schema).unwrap();
        first.write("k", &Record::new()).unwrap();
        let second = registry.backend_for("shop", "cart", &schema).unwrap();
        assert!(second.exists("k").unwrap());

        registry.evict("shop", "cart");
        let fresh = registry.backend_for("shop", "cart", &schema).unwrap();
        assert!(!fresh.exists("k").unwrap());
    }

    #[test]
    fn non_durable_registration_resets_indexes() {
        let (_temp, layout, registry) = setup();
        let stale = layout.index_root("shop", "cart").join("2").join("x");
        fs::create_dir_all(&stale).unwrap();
        registry
            .backend_for("shop", "cart", &schema(StorageKind::InMemoryNonDurable))
            .unwrap();
        assert!(!stale.exists());
        assert!(layout.index_root("shop", "cart").is_dir());
        assert_eq!(fs::read(layout.row_count_file("shop", "cart")).unwrap(), b"0");
    }

    #[test]
    fn durable_registration_rehydrates() {
        let (_temp, layout, registry) = setup();
        FileRecords::new(layout.data_dir("shop", "cart"))
            .write("k1", &Record::new())
            .unwrap();
        let backend = registry
            .backend_for("shop", "cart", &schema(StorageKind::InMemory))
            .unwrap();
        assert_eq!(backend.keys().unwrap(), ["k1"]);
    }
}
