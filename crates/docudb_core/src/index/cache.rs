//! In-memory copy of on-disk index contents.
//!
//! A column's entries are loaded on its first equality lookup and then kept
//! current by the index write path. Any mutation that changes what a column's
//! index means (rename, retype, drop) invalidates the column; collection and
//! datastore drops invalidate everything beneath them.

use crate::types::CollectionKey;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Value key to primary keys.
pub type ColumnEntries = HashMap<String, HashSet<String>>;

#[derive(Debug, Clone)]
enum PendingWrite {
    Add { value: String, primary_key: String },
    Remove { value: String, primary_key: String },
}

impl PendingWrite {
    fn apply(self, entries: &mut ColumnEntries) {
        match self {
            PendingWrite::Add { value, primary_key } => {
                entries.entry(value).or_default().insert(primary_key);
            }
            PendingWrite::Remove { value, primary_key } => remove_from(entries, &value, &primary_key),
        }
    }
}

fn remove_from(entries: &mut ColumnEntries, value: &str, primary_key: &str) {
    if let Some(pks) = entries.get_mut(value) {
        pks.remove(primary_key);
        if pks.is_empty() {
            entries.remove(value);
        }
    }
}

#[derive(Debug, Default)]
struct State {
    columns: HashMap<CollectionKey, HashMap<String, ColumnEntries>>,
    /// Columns being loaded from disk, with the writes seen meanwhile.
    loading: HashMap<CollectionKey, HashMap<String, Vec<PendingWrite>>>,
}

impl State {
    fn write(&mut self, key: &CollectionKey, column: &str, write: PendingWrite) {
        if let Some(entries) = self.columns.get_mut(key).and_then(|c| c.get_mut(column)) {
            write.apply(entries);
        } else if let Some(pending) = self.loading.get_mut(key).and_then(|c| c.get_mut(column)) {
            pending.push(write);
        }
    }
}

/// Process-wide cache of index entries, keyed by collection then viewable
/// column name.
///
/// Loading a column is bracketed by [`IndexCache::begin_load`] and
/// [`IndexCache::finish_load`]. Writes that land between the two are replayed
/// onto the loaded entries, and an invalidation in between cancels the load.
#[derive(Debug, Default)]
pub struct IndexCache {
    state: RwLock<State>,
}

impl IndexCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the full entry set of a column.
    pub fn cache(&self, key: &CollectionKey, column: &str, entries: ColumnEntries) {
        let mut state = self.state.write();
        if let Some(columns) = state.loading.get_mut(key) {
            columns.remove(column);
        }
        state
            .columns
            .entry(key.clone())
            .or_default()
            .insert(column.to_string(), entries);
    }

    /// Starts loading a column. Must precede reading its entries from disk.
    pub fn begin_load(&self, key: &CollectionKey, column: &str) {
        let mut state = self.state.write();
        if state.columns.get(key).is_some_and(|c| c.contains_key(column)) {
            return;
        }
        state
            .loading
            .entry(key.clone())
            .or_default()
            .entry(column.to_string())
            .or_default();
    }

    /// Installs entries read since [`IndexCache::begin_load`], replaying the
    /// writes seen meanwhile. Returns false if the load was cancelled or
    /// another load already installed the column.
    pub fn finish_load(&self, key: &CollectionKey, column: &str, mut entries: ColumnEntries) -> bool {
        let mut state = self.state.write();
        let Some(pending) = state.loading.get_mut(key).and_then(|c| c.remove(column)) else {
            return false;
        };
        if state.loading.get(key).is_some_and(HashMap::is_empty) {
            state.loading.remove(key);
        }
        for write in pending {
            write.apply(&mut entries);
        }
        state
            .columns
            .entry(key.clone())
            .or_default()
            .insert(column.to_string(), entries);
        true
    }

    /// Whether the column's entries are cached.
    #[must_use]
    pub fn is_cached(&self, key: &CollectionKey, column: &str) -> bool {
        self.state
            .read()
            .columns
            .get(key)
            .is_some_and(|columns| columns.contains_key(column))
    }

    /// Primary keys holding `value`, or `None` if the column is not cached.
    #[must_use]
    pub fn lookup(&self, key: &CollectionKey, column: &str, value: &str) -> Option<Vec<String>> {
        let state = self.state.read();
        let entries = state.columns.get(key)?.get(column)?;
        let mut keys: Vec<String> = entries
            .get(value)
            .map(|pks| pks.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Some(keys)
    }

    /// Union of [`IndexCache::lookup`] over `values`.
    #[must_use]
    pub fn in_query(
        &self,
        key: &CollectionKey,
        column: &str,
        values: &[String],
    ) -> Option<Vec<String>> {
        let state = self.state.read();
        let entries = state.columns.get(key)?.get(column)?;
        let mut keys: Vec<String> = values
            .iter()
            .filter_map(|value| entries.get(value))
            .flatten()
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        keys.sort();
        Some(keys)
    }

    /// Whether the cached column maps `value` to `primary_key`.
    #[must_use]
    pub fn contains(
        &self,
        key: &CollectionKey,
        column: &str,
        value: &str,
        primary_key: &str,
    ) -> Option<bool> {
        let state = self.state.read();
        let entries = state.columns.get(key)?.get(column)?;
        Some(entries.get(value).is_some_and(|pks| pks.contains(primary_key)))
    }

    /// Records a new entry if the column is cached or loading.
    pub fn add_entry(&self, key: &CollectionKey, column: &str, value: &str, primary_key: &str) {
        self.state.write().write(
            key,
            column,
            PendingWrite::Add {
                value: value.to_string(),
                primary_key: primary_key.to_string(),
            },
        );
    }

    /// Forgets an entry if the column is cached or loading.
    pub fn remove_entry(&self, key: &CollectionKey, column: &str, value: &str, primary_key: &str) {
        self.state.write().write(
            key,
            column,
            PendingWrite::Remove {
                value: value.to_string(),
                primary_key: primary_key.to_string(),
            },
        );
    }

    /// Drops one column, cancelling a load in progress.
    pub fn invalidate_column(&self, key: &CollectionKey, column: &str) {
        let mut state = self.state.write();
        if let Some(columns) = state.columns.get_mut(key) {
            columns.remove(column);
        }
        if let Some(columns) = state.loading.get_mut(key) {
            columns.remove(column);
        }
    }

    /// Drops every column of a collection.
    pub fn invalidate_collection(&self, key: &CollectionKey) {
        let mut state = self.state.write();
        state.columns.remove(key);
        state.loading.remove(key);
    }

    /// Drops every collection of a datastore.
    pub fn invalidate_datastore(&self, datastore: &str) {
        let mut state = self.state.write();
        state.columns.retain(|key, _| key.datastore != datastore);
        state.loading.retain(|key, _| key.datastore != datastore);
    }

    /// Drops everything.
    pub fn invalidate_all(&self) {
        let mut state = self.state.write();
        state.columns.clear();
        state.loading.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CollectionKey {
        CollectionKey::new("shop", "orders")
    }

    fn entries() -> ColumnEntries {
        let mut entries = ColumnEntries::new();
        entries.insert("new".into(), ["o1".to_string(), "o2".to_string()].into());
        entries.insert("paid".into(), ["o3".to_string()].into());
        entries
    }

    #[test]
    fn lookups_need_a_cached_column() {
        let cache = IndexCache::new();
        assert_eq!(cache.lookup(&key(), "status", "new"), None);
        cache.cache(&key(), "status", entries());
        assert_eq!(cache.lookup(&key(), "status", "new").unwrap(), ["o1", "o2"]);
        assert_eq!(cache.lookup(&key(), "status", "void").unwrap(), Vec::<String>::new());
        assert_eq!(
            cache
                .in_query(&key(), "status", &["new".into(), "paid".into()])
                .unwrap(),
            ["o1", "o2", "o3"]
        );
    }

    #[test]
    fn entries_follow_writes() {
        let cache = IndexCache::new();
        cache.add_entry(&key(), "status", "new", "o9");
        assert!(!cache.is_cached(&key(), "status"));

        cache.cache(&key(), "status", entries());
        cache.add_entry(&key(), "status", "new", "o9");
        cache.remove_entry(&key(), "status", "paid", "o3");
        assert_eq!(cache.contains(&key(), "status", "new", "o9"), Some(true));
        assert_eq!(cache.lookup(&key(), "status", "paid").unwrap().len(), 0);
    }

    #[test]
    fn invalidation_scopes() {
        let cache = IndexCache::new();
        let other = CollectionKey::new("shop", "items");
        let elsewhere = CollectionKey::new("crm", "leads");
        cache.cache(&key(), "status", entries());
        cache.cache(&key(), "total", entries());
        cache.cache(&other, "sku", entries());
        cache.cache(&elsewhere, "name", entries());

        cache.invalidate_column(&key(), "status");
        assert!(!cache.is_cached(&key(), "status"));
        assert!(cache.is_cached(&key(), "total"));

        cache.invalidate_collection(&key());
        assert!(!cache.is_cached(&key(), "total"));

        cache.invalidate_datastore("shop");
        assert!(!cache.is_cached(&other, "sku"));
        assert!(cache.is_cached(&elsewhere, "name"));

        cache.invalidate_all();
        assert!(!cache.is_cached(&elsewhere, "name"));
    }

    #[test]
    fn writes_during_a_load_are_replayed() {
        let cache = IndexCache::new();
        cache.begin_load(&key(), "status");
        // Read from disk before these writes landed.
        let snapshot = entries();
        cache.add_entry(&key(), "status", "new", "o9");
        cache.remove_entry(&key(), "status", "paid", "o3");
        assert!(!cache.is_cached(&key(), "status"));

        assert!(cache.finish_load(&key(), "status", snapshot));
        assert_eq!(cache.lookup(&key(), "status", "new").unwrap(), ["o1", "o2", "o9"]);
        assert_eq!(cache.lookup(&key(), "status", "paid").unwrap().len(), 0);
    }

    #[test]
    fn invalidation_cancels_a_load() {
        let cache = IndexCache::new();
        cache.begin_load(&key(), "status");
        cache.invalidate_column(&key(), "status");
        assert!(!cache.finish_load(&key(), "status", entries()));
        assert!(!cache.is_cached(&key(), "status"));

        cache.begin_load(&key(), "status");
        cache.invalidate_datastore("shop");
        assert!(!cache.finish_load(&key(), "status", entries()));
    }

    #[test]
    fn second_load_does_not_overwrite() {
        let cache = IndexCache::new();
        cache.begin_load(&key(), "status");
        cache.begin_load(&key(), "status");
        assert!(cache.finish_load(&key(), "status", entries()));
        cache.add_entry(&key(), "status", "new", "o9");
        assert!(!cache.finish_load(&key(), "status", ColumnEntries::new()));
        assert_eq!(cache.contains(&key(), "status", "new", "o9"), Some(true));
    }
}
