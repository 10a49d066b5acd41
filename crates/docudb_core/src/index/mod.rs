//! Secondary indexes: on-disk strategies, the entry cache and the manager.

mod btree;
mod cache;
mod filter;
mod hashed;
mod manager;
mod ops;
mod strategy;
mod unique;

pub use btree::BtreeStrategy;
pub use cache::{ColumnEntries, IndexCache};
pub use filter::{LikePattern, Operator, Predicate};
pub use hashed::HashedStrategy;
pub use manager::IndexManager;
pub use ops::{OperationKind, OperationRecord, OperationStatus, OperationTracker};
pub use strategy::{strategy_for, IndexArea, IndexingStrategy};
pub use unique::UniqueStrategy;
