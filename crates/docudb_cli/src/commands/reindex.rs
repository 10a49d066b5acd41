//! Reindex command implementation.

use docudb_core::{Engine, OperationStatus};
use tracing::Level;

/// Starts a background rebuild of a column index and, unless `detach` is
/// set, waits for it to finish.
pub fn run(
    engine: &Engine,
    datastore: &str,
    collection: &str,
    column: &str,
    detach: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let operation = engine
        .indexes()
        .index_records(datastore, collection, column, Level::INFO)?;
    if detach {
        println!("Started reindex operation {operation}");
        return Ok(());
    }

    let finished = engine.indexes().wait_for_operation(&operation)?;
    match finished.status {
        OperationStatus::Completed => {
            println!(
                "Reindexed {datastore}.{collection}.{column}: {} records (operation {operation})",
                finished.records
            );
            Ok(())
        }
        _ => Err(format!(
            "reindex {operation} failed: {}",
            finished.error.as_deref().unwrap_or("unknown error")
        )
        .into()),
    }
}
