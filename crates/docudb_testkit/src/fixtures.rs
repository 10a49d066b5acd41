//! Test fixtures and engine helpers.
//!
//! Provides convenience functions for opening throwaway engines and
//! setting up the collections most tests start from.

use docudb_core::{Engine, EngineConfig, Record};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An engine over a temporary base directory, removed on drop.
pub struct TestEngine {
    /// The engine instance.
    pub engine: Engine,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestEngine {
    /// Opens an engine with default settings.
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    /// Opens an engine after letting `configure` adjust the defaults.
    pub fn with_config(configure: impl FnOnce(EngineConfig) -> EngineConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let engine = Engine::open(configure(EngineConfig::new(temp_dir.path())))
            .expect("Failed to open engine");
        Self { engine, temp_dir }
    }

    /// Base directory of the engine.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Closes the engine and opens a new one over the same directory.
    pub fn reopen(self) -> Self {
        let Self { engine, temp_dir } = self;
        let config = engine.config().clone();
        drop(engine);
        let engine = Engine::open(config).expect("Failed to reopen engine");
        Self { engine, temp_dir }
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestEngine {
    type Target = Engine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Runs a test with a temporary engine.
///
/// # Example
///
/// ```rust,ignore
/// use docudb_testkit::with_temp_engine;
///
/// #[test]
/// fn my_test() {
///     with_temp_engine(|engine| {
///         engine.datastores().create_datastore("shop").unwrap();
///         // ... test operations
///     });
/// }
/// ```
pub fn with_temp_engine<F, R>(f: F) -> R
where
    F: FnOnce(&Engine) -> R,
{
    let test_engine = TestEngine::new();
    f(&test_engine.engine)
}

/// Runs a test with a temporary engine and its base directory.
pub fn with_temp_engine_path<F, R>(f: F) -> R
where
    F: FnOnce(&Engine, PathBuf) -> R,
{
    let test_engine = TestEngine::new();
    let path = test_engine.path().to_path_buf();
    f(&test_engine.engine, path)
}

/// Builds a record from a JSON object literal.
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("record fixture must be a JSON object, got {other}"),
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use serde_json::json;

    /// Schema of the `shop.orders` collection used across the tests.
    ///
    /// `_id` is a uuid primary key, `status` has a b-tree index, `total` is
    /// a fixed point amount and `created` is stamped on every write.
    pub fn orders_schema() -> Value {
        json!({
            "meta": {"type": "on-disk", "flexible-schema": true},
            "primary": "_id",
            "cols": {
                "_id": {"type": "STRING", "index": "unique", "auto-define": "uuid"},
                "status": {"type": "VARCHAR(16)", "index": "btree"},
                "total": {"type": "DECIMAL(10,2)"},
                "created": {"type": "TIMESTAMP", "auto-define": "timestamp"}
            },
            "order": ["_id", "status", "total", "created"]
        })
    }

    /// Creates the `shop` datastore and its `orders` collection.
    pub fn with_orders(engine: &Engine) {
        create_collection(engine, "shop", "orders", &orders_schema());
    }

    /// Creates a datastore (if missing) and a collection inside it.
    pub fn create_collection(engine: &Engine, datastore: &str, collection: &str, schema: &Value) {
        if !engine.datastores().datastore_exists(datastore) {
            engine
                .datastores()
                .create_datastore(datastore)
                .expect("Failed to create datastore");
        }
        engine
            .collections()
            .create_collection(datastore, collection, schema)
            .expect("Failed to create collection");
    }

    /// Opens an engine with `shop.orders` and `count` orders, alternating
    /// between the `new` and `paid` statuses. Returns the stored records.
    pub fn populated_orders(count: usize) -> (TestEngine, Vec<Record>) {
        let engine = TestEngine::new();
        with_orders(&engine);
        let stored = (0..count)
            .map(|i| {
                let status = if i % 2 == 0 { "new" } else { "paid" };
                engine
                    .records()
                    .insert(
                        "shop",
                        "orders",
                        &record(json!({"status": status, "total": i * 10})),
                    )
                    .expect("Failed to insert order")
            })
            .collect();
        (engine, stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn temp_engine_starts_empty() {
        with_temp_engine(|engine| {
            assert!(engine.datastores().list_datastores().unwrap().is_empty());
        });
    }

    #[test]
    fn orders_scenario() {
        let (engine, stored) = scenarios::populated_orders(4);
        assert_eq!(stored.len(), 4);
        assert_eq!(engine.records().row_count("shop", "orders").unwrap(), 4);
    }

    #[test]
    fn reopen_keeps_data() {
        let engine = TestEngine::new();
        scenarios::with_orders(&engine);
        let stored = engine
            .records()
            .insert("shop", "orders", &record(json!({"status": "new"})))
            .unwrap();
        let pk = stored["_id"].as_str().unwrap().to_string();

        let engine = engine.reopen();
        assert!(engine.records().exists("shop", "orders", &pk).unwrap());
    }

    #[test]
    #[should_panic(expected = "JSON object")]
    fn record_rejects_non_objects() {
        let _ = record(json!([1, 2]));
    }
}
