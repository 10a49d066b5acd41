//! Integration tests for triggers, the change feed and the query-result cache.

use docudb_core::{ChangeType, CollectionKey, CoreError, CoreResult, Record, Trigger};
use docudb_testkit::prelude::*;
use docudb_testkit::scenarios::with_orders;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Counting {
    inserts: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    fields_seen: AtomicUsize,
}

impl Trigger for Counting {
    fn after_insert(&self, _key: &CollectionKey, record: &Record) {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.fields_seen.store(record.len(), Ordering::SeqCst);
    }

    fn after_update(&self, _key: &CollectionKey, _old: &Record, _new: &Record) {
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn after_delete(&self, _key: &CollectionKey, _record: &Record) {
        self.deletes.fetch_add(1, Ordering::SeqCst);
    }
}

struct Veto;

impl Trigger for Veto {
    fn before_delete(&self, key: &CollectionKey, _record: &Record) -> CoreResult<()> {
        Err(CoreError::internal(format!("records of {key} are permanent")))
    }

    fn before_update(&self, _key: &CollectionKey, _old: &Record, new: &Record) -> CoreResult<()> {
        // Triggers see internal names only.
        if new.keys().any(|name| name == "status") {
            return Err(CoreError::internal("viewable name leaked"));
        }
        Ok(())
    }
}

fn orders_key() -> CollectionKey {
    CollectionKey::new("shop", "orders")
}

#[test]
fn after_hooks_fire_once_per_write() {
    let engine = TestEngine::new();
    with_orders(&engine);
    let counting = Arc::new(Counting::default());
    engine.triggers().register(orders_key(), counting.clone());
    assert_eq!(engine.triggers().count(&orders_key()), 1);

    let records = engine.records();
    records
        .insert("shop", "orders", &record(json!({"_id": "o-1", "status": "new", "total": 1})))
        .unwrap();
    records
        .save("shop", "orders", &record(json!({"_id": "o-1", "status": "paid"})))
        .unwrap();
    records.remove("shop", "orders", "o-1").unwrap();

    assert_eq!(counting.inserts.load(Ordering::SeqCst), 1);
    assert_eq!(counting.updates.load(Ordering::SeqCst), 1);
    assert_eq!(counting.deletes.load(Ordering::SeqCst), 1);
    // _id, status, total and created.
    assert_eq!(counting.fields_seen.load(Ordering::SeqCst), 4);

    engine.triggers().clear(&orders_key());
    records
        .insert("shop", "orders", &record(json!({"_id": "o-2"})))
        .unwrap();
    assert_eq!(counting.inserts.load(Ordering::SeqCst), 1);
}

#[test]
fn before_hooks_abort_the_write() {
    let engine = TestEngine::new();
    with_orders(&engine);
    engine
        .records()
        .insert("shop", "orders", &record(json!({"_id": "o-1", "status": "new"})))
        .unwrap();
    engine.triggers().register(orders_key(), Arc::new(Veto));

    let err = engine.records().remove("shop", "orders", "o-1").unwrap_err();
    assert_eq!(err.code(), "INTERNAL_OPERATION_ERROR");
    assert!(engine.records().exists("shop", "orders", "o-1").unwrap());
    assert!(engine
        .indexes()
        .contains("shop", "orders", "status", &json!("new"), "o-1")
        .unwrap());

    engine
        .records()
        .save("shop", "orders", &record(json!({"_id": "o-1", "status": "paid"})))
        .unwrap();
}

#[test]
fn change_feed_reports_every_write() {
    let engine = TestEngine::new();
    with_orders(&engine);
    let receiver = engine.change_feed().subscribe();

    let records = engine.records();
    records
        .insert("shop", "orders", &record(json!({"_id": "o-1", "status": "new"})))
        .unwrap();
    records
        .save("shop", "orders", &record(json!({"_id": "o-1", "status": "paid"})))
        .unwrap();
    records.remove("shop", "orders", "o-1").unwrap();
    records.remove("shop", "orders", "o-1").unwrap();

    let events: Vec<_> = receiver.try_iter().collect();
    let kinds: Vec<_> = events.iter().map(|e| e.change_type).collect();
    assert_eq!(kinds, [ChangeType::Insert, ChangeType::Update, ChangeType::Delete]);
    assert_eq!(events[1].record.as_ref().unwrap()["status"], json!("paid"));
    assert!(events[2].record.is_none());
    assert!(events.iter().all(|e| e.primary_key == "o-1" && e.collection == "orders"));

    let feed = engine.change_feed();
    assert_eq!(feed.latest_sequence(), events[2].sequence);
    let tail = feed.poll(events[0].sequence, 10);
    assert_eq!(tail.len(), 2);
}

#[test]
fn change_feed_history_is_bounded() {
    let engine = TestEngine::with_config(|config| config.change_feed_history(2));
    with_orders(&engine);
    for id in ["a", "b", "c"] {
        engine
            .records()
            .insert("shop", "orders", &record(json!({"_id": id})))
            .unwrap();
    }
    let feed = engine.change_feed();
    assert_eq!(feed.history_len(), 2);
    let keys: Vec<_> = feed.poll(0, 10).into_iter().map(|e| e.primary_key).collect();
    assert_eq!(keys, ["b", "c"]);
}

#[test]
fn writes_invalidate_cached_query_results() {
    let engine = TestEngine::new();
    with_orders(&engine);
    let key = orders_key();
    let cache = engine.query_cache();

    cache.put(&key, "status = new", Vec::new());
    assert!(cache.get(&key, "status = new").is_some());

    engine
        .records()
        .insert("shop", "orders", &record(json!({"status": "new"})))
        .unwrap();
    assert!(cache.get(&key, "status = new").is_none());

    cache.put(&key, "status = new", Vec::new());
    engine.collections().drop_collection("shop", "orders").unwrap();
    assert!(cache.get(&key, "status = new").is_none());
}
