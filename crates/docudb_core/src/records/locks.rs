//! Per-primary-key locks.
//!
//! Keys hash onto a fixed set of `RwLock` shards, so two keys may share a
//! shard but one key always maps to the same one. With locking disabled the
//! guards are empty and concurrent operations on one key race.

use crate::types::CollectionKey;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Sharded read/write locks keyed by (datastore, collection, primary key).
pub struct KeyLocks {
    shards: Vec<RwLock<()>>,
    enabled: bool,
}

/// Held read lock, or nothing when locking is disabled.
pub struct KeyReadGuard<'a> {
    _guard: Option<RwLockReadGuard<'a, ()>>,
}

/// Held write lock, or nothing when locking is disabled.
pub struct KeyWriteGuard<'a> {
    _guard: Option<RwLockWriteGuard<'a, ()>>,
}

impl KeyLocks {
    /// Creates `shards` lock shards (at least one).
    pub fn new(shards: usize, enabled: bool) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| RwLock::new(())).collect(),
            enabled,
        }
    }

    /// Whether guards actually lock.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn shard(&self, key: &CollectionKey, primary_key: &str) -> &RwLock<()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        primary_key.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    /// Shared lock for reading one record.
    pub fn read(&self, key: &CollectionKey, primary_key: &str) -> KeyReadGuard<'_> {
        KeyReadGuard {
            _guard: self.enabled.then(|| self.shard(key, primary_key).read()),
        }
    }

    /// Exclusive lock for writing one record.
    pub fn write(&self, key: &CollectionKey, primary_key: &str) -> KeyWriteGuard<'_> {
        KeyWriteGuard {
            _guard: self.enabled.then(|| self.shard(key, primary_key).write()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_key_is_exclusive() {
        let locks = KeyLocks::new(4, true);
        let key = CollectionKey::new("shop", "orders");
        let _write = locks.write(&key, "o1");
        assert!(locks.shard(&key, "o1").try_read().is_none());
    }

    #[test]
    fn disabled_locks_never_block() {
        let locks = KeyLocks::new(4, false);
        let key = CollectionKey::new("shop", "orders");
        let _a = locks.write(&key, "o1");
        let _b = locks.write(&key, "o1");
        assert!(!locks.is_enabled());
    }

    #[test]
    fn writers_serialize() {
        let locks = Arc::new(KeyLocks::new(1, true));
        let counter = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let key = CollectionKey::new("shop", "orders");

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let locks = Arc::clone(&locks);
                let counter = Arc::clone(&counter);
                let key = key.clone();
                thread::spawn(move || {
                    let _guard = locks.write(&key, "o1");
                    counter.lock().push(i);
                    thread::sleep(Duration::from_millis(2));
                    counter.lock().push(i);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let order = counter.lock();
        for pair in order.chunks(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }
}
