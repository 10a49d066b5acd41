//! Record trigger hooks.
//!
//! Triggers see internal-form records. A `before_*` hook that returns an
//! error aborts the operation before anything is persisted; `after_*` hooks
//! run once the record body and its indexes are written and cannot fail.

use crate::error::CoreResult;
use crate::types::{CollectionKey, Record};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Callbacks around record writes of one collection.
///
/// Every hook has an empty default, so implementors only override what they
/// need.
pub trait Trigger: Send + Sync {
    /// Runs before a new record is persisted.
    ///
    /// # Errors
    ///
    /// An error aborts the insert.
    fn before_insert(&self, _key: &CollectionKey, _record: &Record) -> CoreResult<()> {
        Ok(())
    }

    /// Runs after a new record and its indexes are written.
    fn after_insert(&self, _key: &CollectionKey, _record: &Record) {}

    /// Runs before an existing record is replaced.
    ///
    /// # Errors
    ///
    /// An error aborts the save.
    fn before_update(&self, _key: &CollectionKey, _old: &Record, _new: &Record) -> CoreResult<()> {
        Ok(())
    }

    /// Runs after an existing record was replaced.
    fn after_update(&self, _key: &CollectionKey, _old: &Record, _new: &Record) {}

    /// Runs before a record is removed.
    ///
    /// # Errors
    ///
    /// An error aborts the remove.
    fn before_delete(&self, _key: &CollectionKey, _record: &Record) -> CoreResult<()> {
        Ok(())
    }

    /// Runs after a record and its index entries were removed.
    fn after_delete(&self, _key: &CollectionKey, _record: &Record) {}
}

/// Triggers registered per collection.
#[derive(Default)]
pub struct TriggerRegistry {
    triggers: RwLock<HashMap<CollectionKey, Vec<Arc<dyn Trigger>>>>,
}

impl TriggerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a trigger to a collection. Triggers run in registration order.
    pub fn register(&self, key: CollectionKey, trigger: Arc<dyn Trigger>) {
        self.triggers.write().entry(key).or_default().push(trigger);
    }

    /// Removes every trigger of a collection.
    pub fn clear(&self, key: &CollectionKey) {
        self.triggers.write().remove(key);
    }

    /// Number of triggers on a collection.
    pub fn count(&self, key: &CollectionKey) -> usize {
        self.triggers.read().get(key).map_or(0, Vec::len)
    }

    /// Snapshot of a collection's triggers, so hooks run without the lock.
    pub(crate) fn for_collection(&self, key: &CollectionKey) -> Vec<Arc<dyn Trigger>> {
        self.triggers.read().get(key).cloned().unwrap_or_default()
    }
}

/// Runs `hook` on every trigger, stopping at the first error.
pub(crate) fn run_before(
    triggers: &[Arc<dyn Trigger>],
    hook: impl Fn(&dyn Trigger) -> CoreResult<()>,
) -> CoreResult<()> {
    triggers.iter().try_for_each(|t| hook(t.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    impl Trigger for Counting {
        fn after_insert(&self, _key: &CollectionKey, _record: &Record) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Veto;

    impl Trigger for Veto {
        fn before_delete(&self, _key: &CollectionKey, _record: &Record) -> CoreResult<()> {
            Err(CoreError::not_supported("deletes are disabled"))
        }
    }

    #[test]
    fn registry_is_per_collection() {
        let registry = TriggerRegistry::new();
        let orders = CollectionKey::new("shop", "orders");
        registry.register(orders.clone(), Arc::new(Counting(AtomicUsize::new(0))));
        registry.register(orders.clone(), Arc::new(Veto));

        assert_eq!(registry.count(&orders), 2);
        assert_eq!(registry.count(&CollectionKey::new("shop", "users")), 0);

        registry.clear(&orders);
        assert!(registry.for_collection(&orders).is_empty());
    }

    #[test]
    fn first_failing_hook_stops_the_chain() {
        let key = CollectionKey::new("shop", "orders");
        let triggers: Vec<Arc<dyn Trigger>> = vec![Arc::new(Veto), Arc::new(Veto)];
        let err = run_before(&triggers, |t| t.before_delete(&key, &Record::new())).unwrap_err();
        assert_eq!(err.code(), "OPERATION_NOT_SUPPORTED");
        assert!(run_before(&triggers, |t| t.before_insert(&key, &Record::new())).is_ok());
    }
}
