//! Schema command implementation.

use docudb_core::Engine;

/// Prints the persisted form of a collection schema.
pub fn run(engine: &Engine, datastore: &str, collection: &str) -> Result<(), Box<dyn std::error::Error>> {
    let schema = engine.schemas().read_schema(datastore, collection)?;
    println!("{}", serde_json::to_string_pretty(&schema.to_json())?);
    Ok(())
}
