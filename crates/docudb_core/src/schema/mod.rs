//! Schema model, column mapping and name translation.

mod column;
mod manager;
mod mapping;
mod model;
pub mod translate;

pub use column::{AutoDefine, Column, IndexType};
pub use manager::SchemaManager;
pub use mapping::ColumnMapping;
pub use model::{ReplicationType, Schema, SchemaMeta, StorageKind, DEFAULT_PRIMARY_KEY};
