//! Record storage backends.

mod backend;
mod file;
mod memory;
mod registry;

pub use backend::RecordBackend;
pub use file::FileRecords;
pub use memory::{DurableMemoryRecords, MemoryRecords};
pub use registry::StorageRegistry;
