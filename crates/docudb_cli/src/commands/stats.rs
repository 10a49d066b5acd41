//! Stats command implementation.

use docudb_core::{Engine, StatsSnapshot};
use serde::Serialize;
use std::collections::BTreeMap;

/// Index statistics of one collection.
#[derive(Debug, Serialize)]
pub struct CollectionStats {
    /// Number of records.
    pub rows: u64,
    /// Per indexed column, the record count of each distinct value.
    pub indexes: BTreeMap<String, BTreeMap<String, u64>>,
    /// Engine counters after gathering the statistics.
    pub engine: StatsSnapshot,
}

/// Collects index statistics of a collection.
pub fn collect(engine: &Engine, datastore: &str, collection: &str) -> Result<CollectionStats, Box<dyn std::error::Error>> {
    let schema = engine.schemas().read_schema(datastore, collection)?;
    let mut indexes = BTreeMap::new();
    for column in schema.indexed_columns() {
        let mut counts = BTreeMap::new();
        for value in engine.indexes().cardinality(datastore, collection, column.name())? {
            let count = engine.indexes().index_count(
                datastore,
                collection,
                column.name(),
                &serde_json::Value::String(value.clone()),
            )?;
            counts.insert(value, count);
        }
        indexes.insert(column.name().to_string(), counts);
    }
    Ok(CollectionStats {
        rows: engine.records().row_count(datastore, collection)?,
        indexes,
        engine: engine.stats(),
    })
}

/// Runs the stats command.
pub fn run(engine: &Engine, datastore: &str, collection: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stats = collect(engine, datastore, collection)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&stats)?),
        _ => {
            println!("{datastore}.{collection}: {} rows", stats.rows);
            for (column, counts) in &stats.indexes {
                println!("  index {column}: {} distinct values", counts.len());
                for (value, count) in counts {
                    println!("    {value:<24} {count}");
                }
            }
            let e = &stats.engine;
            println!(
                "engine: reads={} index_writes={} index_failures={} cache_hits={} cache_misses={}",
                e.reads, e.index_writes, e.index_failures, e.cache_hits, e.cache_misses
            );
        }
    }
    Ok(())
}
