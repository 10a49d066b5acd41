//! Inspect command implementation.

use docudb_core::Engine;
use serde::Serialize;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store base directory.
    pub path: String,
    /// Datastores, sorted by name.
    pub datastores: Vec<DatastoreInfo>,
}

/// One datastore and its collections.
#[derive(Debug, Serialize)]
pub struct DatastoreInfo {
    /// Datastore name.
    pub name: String,
    /// Collections, sorted by name.
    pub collections: Vec<CollectionInfo>,
}

/// Summary of one collection.
#[derive(Debug, Serialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Storage kind tag.
    pub storage: String,
    /// Number of records.
    pub rows: u64,
    /// Primary key column.
    pub primary_key: String,
    /// Columns with their type and index (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnInfo>>,
}

/// A column as shown by `inspect --columns`.
#[derive(Debug, Serialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Type name.
    pub data_type: String,
    /// Index type tag.
    pub index: String,
}

/// Collects the inspection result.
pub fn collect(engine: &Engine, show_columns: bool) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let mut datastores = Vec::new();
    for datastore in engine.datastores().list_datastores()? {
        let mut collections = Vec::new();
        for collection in engine.collections().list_collections(&datastore)? {
            let schema = engine.schemas().read_schema(&datastore, &collection)?;
            let columns = show_columns.then(|| {
                schema
                    .columns()
                    .iter()
                    .map(|c| ColumnInfo {
                        name: c.name().to_string(),
                        data_type: c.field_type().name().to_string(),
                        index: c.index().as_str().to_string(),
                    })
                    .collect()
            });
            collections.push(CollectionInfo {
                rows: engine.records().row_count(&datastore, &collection)?,
                storage: schema.meta().storage.as_str().to_string(),
                primary_key: schema.primary_key().to_string(),
                name: collection,
                columns,
            });
        }
        datastores.push(DatastoreInfo {
            name: datastore,
            collections,
        });
    }
    Ok(InspectResult {
        path: engine.layout().base().display().to_string(),
        datastores,
    })
}

/// Runs the inspect command.
pub fn run(engine: &Engine, show_columns: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(engine, show_columns)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("DocuDB Store: {}", result.path);
    if result.datastores.is_empty() {
        println!("  (no datastores)");
    }
    for datastore in &result.datastores {
        println!();
        println!("Datastore {}", datastore.name);
        for collection in &datastore.collections {
            println!(
                "  {:<24} {:>10} rows  {:<13} pk={}",
                collection.name, collection.rows, collection.storage, collection.primary_key
            );
            for column in collection.columns.iter().flatten() {
                println!("    {:<22} {:<12} {}", column.name, column.data_type, column.index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docudb_testkit::scenarios::populated_orders;

    #[test]
    fn collects_collections_and_columns() {
        let (engine, _) = populated_orders(3);
        engine.datastores().create_datastore("empty").unwrap();

        let result = collect(&engine, true).unwrap();
        let names: Vec<_> = result.datastores.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["empty", "shop"]);

        let orders = &result.datastores[1].collections[0];
        assert_eq!(orders.name, "orders");
        assert_eq!(orders.rows, 3);
        assert_eq!(orders.primary_key, "_id");
        let status = orders
            .columns
            .as_ref()
            .unwrap()
            .iter()
            .find(|c| c.name == "status")
            .unwrap();
        assert_eq!(status.index, "btree");
        assert_eq!(status.data_type, "VARCHAR");
    }

    #[test]
    fn columns_are_optional() {
        let (engine, _) = populated_orders(1);
        let result = collect(&engine, false).unwrap();
        assert!(result.datastores[0].collections[0].columns.is_none());
    }
}
