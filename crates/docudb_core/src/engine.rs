//! Engine facade.

use crate::change_feed::ChangeFeed;
use crate::collection::CollectionManager;
use crate::config::EngineConfig;
use crate::datastore::DatastoreManager;
use crate::error::CoreResult;
use crate::index::{IndexCache, IndexManager};
use crate::layout::{DirLock, Layout};
use crate::records::{KeyLocks, QueryResultCache, RecordStore, RecordStoreParts, TriggerRegistry};
use crate::schema::{SchemaManager, SchemaMeta};
use crate::stats::{EngineStats, StatsSnapshot};
use crate::storage::StorageRegistry;
use std::sync::Arc;
use tracing::info;

/// An open DocuDB engine.
///
/// `Engine` owns every registry the core needs (schema cache, index cache,
/// memory-collection registry, triggers, change feed) and hands them to the
/// managers it creates, so two engines on different base directories share
/// nothing.
///
/// # Example
///
/// ```rust,ignore
/// use docudb_core::{Engine, EngineConfig};
/// use serde_json::json;
///
/// let engine = Engine::open(EngineConfig::new("data"))?;
/// engine.datastores().create_datastore("shop")?;
/// engine.collections().create_collection("shop", "orders", &json!({}))?;
///
/// let record = json!({"status": "new"});
/// let stored = engine.records().insert("shop", "orders", record.as_object().unwrap())?;
/// println!("{}", stored["_id"]);
/// ```
pub struct Engine {
    config: EngineConfig,
    layout: Layout,
    stats: Arc<EngineStats>,
    schemas: Arc<SchemaManager>,
    index_cache: Arc<IndexCache>,
    indexes: Arc<IndexManager>,
    records: Arc<RecordStore>,
    collections: CollectionManager,
    datastores: DatastoreManager,
    triggers: Arc<TriggerRegistry>,
    query_cache: Arc<QueryResultCache>,
    feed: Arc<ChangeFeed>,
    _lock: DirLock,
}

impl Engine {
    /// Opens an engine over `config.base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another engine holds the base directory (`StoreLocked`)
    /// - The directory is missing and `create_if_missing` is false
    /// - The index thread pool cannot be built
    pub fn open(config: EngineConfig) -> CoreResult<Self> {
        let lock = DirLock::acquire(&config.base_dir, config.create_if_missing)?;
        let layout = Layout::new(config.base_dir.clone());

        let stats = Arc::new(EngineStats::new());
        let defaults = SchemaMeta {
            flexible: config.default_flexible_schema,
            ..SchemaMeta::default()
        };
        let schemas = Arc::new(SchemaManager::new(layout.clone(), defaults, Arc::clone(&stats)));
        let index_cache = Arc::new(IndexCache::new());
        let storage = Arc::new(StorageRegistry::new(layout.clone(), Arc::clone(&index_cache)));
        let indexes = Arc::new(IndexManager::new(
            layout.clone(),
            Arc::clone(&schemas),
            Arc::clone(&storage),
            Arc::clone(&index_cache),
            Arc::clone(&stats),
            &config,
        )?);
        let triggers = Arc::new(TriggerRegistry::new());
        let query_cache = Arc::new(QueryResultCache::new());
        let feed = Arc::new(ChangeFeed::with_max_history(config.change_feed_history));

        let records = Arc::new(RecordStore::new(RecordStoreParts {
            layout: layout.clone(),
            schemas: Arc::clone(&schemas),
            storage: Arc::clone(&storage),
            indexes: Arc::clone(&indexes),
            triggers: Arc::clone(&triggers),
            query_cache: Arc::clone(&query_cache),
            feed: Arc::clone(&feed),
            stats: Arc::clone(&stats),
            locks: KeyLocks::new(config.lock_shards, config.record_locking),
        }));
        let collections = CollectionManager::new(
            layout.clone(),
            Arc::clone(&schemas),
            Arc::clone(&storage),
            Arc::clone(&indexes),
            Arc::clone(&index_cache),
            Arc::clone(&query_cache),
        );
        let datastores = DatastoreManager::new(
            layout.clone(),
            Arc::clone(&schemas),
            storage,
            Arc::clone(&index_cache),
            Arc::clone(&query_cache),
        );

        info!(
            base = %config.base_dir.display(),
            record_locking = config.record_locking,
            "engine opened"
        );
        Ok(Self {
            config,
            layout,
            stats,
            schemas,
            index_cache,
            indexes,
            records,
            collections,
            datastores,
            triggers,
            query_cache,
            feed,
            _lock: lock,
        })
    }

    /// Configuration the engine was opened with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// On-disk layout.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Datastore lifecycle.
    pub fn datastores(&self) -> &DatastoreManager {
        &self.datastores
    }

    /// Collection lifecycle and column structure.
    pub fn collections(&self) -> &CollectionManager {
        &self.collections
    }

    /// Schema reads, writes and name translation.
    pub fn schemas(&self) -> &SchemaManager {
        &self.schemas
    }

    /// Record operations. Shared so background removes can hold it.
    pub fn records(&self) -> &Arc<RecordStore> {
        &self.records
    }

    /// Index operations. Shared so reindex jobs can hold it.
    pub fn indexes(&self) -> &Arc<IndexManager> {
        &self.indexes
    }

    /// Cached index entries.
    pub fn index_cache(&self) -> &IndexCache {
        &self.index_cache
    }

    /// Trigger registrations.
    pub fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    /// Query-result cache.
    pub fn query_cache(&self) -> &QueryResultCache {
        &self.query_cache
    }

    /// Change feed.
    pub fn change_feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Snapshot of the engine counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_engine_is_locked_out() {
        let temp = tempdir().unwrap();
        let _engine = Engine::open(EngineConfig::new(temp.path())).unwrap();
        let err = Engine::open(EngineConfig::new(temp.path())).err().unwrap();
        assert_eq!(err.code(), "STORE_LOCKED");
    }

    #[test]
    fn missing_base_without_create() {
        let temp = tempdir().unwrap();
        let config = EngineConfig::new(temp.path().join("absent")).create_if_missing(false);
        assert!(Engine::open(config).is_err());
    }

    #[test]
    fn reopen_after_drop() {
        let temp = tempdir().unwrap();
        {
            let engine = Engine::open(EngineConfig::new(temp.path())).unwrap();
            engine.datastores().create_datastore("shop").unwrap();
        }
        let engine = Engine::open(EngineConfig::new(temp.path())).unwrap();
        assert_eq!(engine.datastores().list_datastores().unwrap(), ["shop"]);
        assert_eq!(engine.stats(), StatsSnapshot::default());
    }
}
