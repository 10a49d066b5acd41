//! # DocuDB Core
//!
//! Storage, schema and indexing engine for DocuDB.
//!
//! This crate provides:
//! - Datastore and collection lifecycle over a fixed on-disk layout
//! - Schemas with viewable/internal column name translation
//! - The record insert/select/save/remove path with auto-defined columns,
//!   triggers and a change feed
//! - Pluggable secondary indexes (b-tree, unique, hashed) with range filters
//!   and a lazily populated entry cache
//!
//! Record bodies are the source of truth. Index writes that fail are logged,
//! counted in [`StatsSnapshot::index_failures`] and repaired by a reindex.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod collection;
mod config;
mod datastore;
mod engine;
mod error;
pub mod index;
mod layout;
pub mod naming;
pub mod records;
pub mod schema;
mod stats;
pub mod storage;
mod types;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeType};
pub use collection::CollectionManager;
pub use config::EngineConfig;
pub use datastore::DatastoreManager;
pub use engine::Engine;
pub use error::{CoreError, CoreResult};
pub use index::{IndexManager, Operator, OperationRecord, OperationStatus};
pub use layout::{Layout, COLLECTION_AREAS, DATASTORE_AREAS};
pub use records::{RecordStore, Trigger};
pub use schema::{AutoDefine, Column, IndexType, Schema, SchemaMeta, StorageKind};
pub use stats::{EngineStats, StatsSnapshot};
pub use types::{primary_key_string, CollectionKey, Record};

pub use docudb_types;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
