//! Query-result cache.
//!
//! Results are stored by an external query layer under an opaque query string.
//! The record store only invalidates: every write to a collection drops that
//! collection's entries. There is no expiry.

use crate::types::{CollectionKey, Record};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Cached query results per collection.
#[derive(Default)]
pub struct QueryResultCache {
    entries: RwLock<HashMap<CollectionKey, HashMap<String, Arc<Vec<Record>>>>>,
}

impl QueryResultCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the result of `query` against a collection.
    pub fn put(&self, key: &CollectionKey, query: impl Into<String>, result: Vec<Record>) {
        self.entries
            .write()
            .entry(key.clone())
            .or_default()
            .insert(query.into(), Arc::new(result));
    }

    /// Cached result of `query`, if still valid.
    pub fn get(&self, key: &CollectionKey, query: &str) -> Option<Arc<Vec<Record>>> {
        self.entries.read().get(key)?.get(query).cloned()
    }

    /// Drops every cached result of a collection.
    pub fn invalidate(&self, key: &CollectionKey) {
        self.entries.write().remove(key);
    }

    /// Drops every cached result of a datastore.
    pub fn invalidate_datastore(&self, datastore: &str) {
        self.entries.write().retain(|k, _| k.datastore != datastore);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_invalidate() {
        let cache = QueryResultCache::new();
        let orders = CollectionKey::new("shop", "orders");
        let users = CollectionKey::new("crm", "users");
        cache.put(&orders, "status = new", vec![Record::new()]);
        cache.put(&users, "all", Vec::new());

        assert_eq!(cache.get(&orders, "status = new").unwrap().len(), 1);
        assert!(cache.get(&orders, "other").is_none());

        cache.invalidate(&orders);
        assert!(cache.get(&orders, "status = new").is_none());
        assert!(cache.get(&users, "all").is_some());

        cache.invalidate_datastore("crm");
        assert!(cache.get(&users, "all").is_none());
    }
}
