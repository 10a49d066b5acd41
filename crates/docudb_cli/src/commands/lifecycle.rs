//! Datastore and collection lifecycle commands.

use docudb_core::Engine;
use serde_json::Value;
use std::fs;

/// Reads a schema argument: inline JSON, or `@path` to read it from a file.
pub fn read_schema_arg(raw: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let text = match raw.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).map_err(|e| format!("cannot read schema file {path}: {e}"))?,
        None => raw.to_string(),
    };
    Ok(serde_json::from_str(&text)?)
}

/// Creates a collection, creating its datastore first if needed.
pub fn create_collection(
    engine: &Engine,
    datastore: &str,
    collection: &str,
    schema: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = read_schema_arg(schema)?;
    if !engine.datastores().datastore_exists(datastore) {
        engine.datastores().create_datastore(datastore)?;
    }
    engine
        .collections()
        .create_collection(datastore, collection, &schema)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docudb_testkit::TestEngine;
    use serde_json::json;

    #[test]
    fn schema_from_file_or_inline() {
        let engine = TestEngine::new();
        let file = engine.path().join("schema.json");
        fs::write(&file, r#"{"cols": {"name": {"type": "STRING"}}}"#).unwrap();

        let from_file = read_schema_arg(&format!("@{}", file.display())).unwrap();
        assert_eq!(from_file["cols"]["name"]["type"], json!("STRING"));
        assert_eq!(read_schema_arg("{}").unwrap(), json!({}));
        assert!(read_schema_arg("not json").is_err());
        assert!(read_schema_arg("@/definitely/missing.json").is_err());
    }

    #[test]
    fn creates_missing_datastore() {
        let engine = TestEngine::new();
        create_collection(&engine, "crm", "users", "{}").unwrap();
        assert!(engine.collections().collection_exists("crm", "users"));
        create_collection(&engine, "crm", "leads", "{}").unwrap();
        assert_eq!(
            engine.collections().list_collections("crm").unwrap(),
            ["leads", "users"]
        );
    }
}
