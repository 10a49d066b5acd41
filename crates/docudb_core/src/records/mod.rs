//! Record Store and its write-path collaborators.

mod locks;
mod query_cache;
mod store;
mod trigger;

pub use locks::{KeyLocks, KeyReadGuard, KeyWriteGuard};
pub use query_cache::QueryResultCache;
pub use store::{RecordStore, RecordStoreParts};
pub use trigger::{Trigger, TriggerRegistry};
