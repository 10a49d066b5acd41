//! CLI command implementations.

pub mod inspect;
pub mod lifecycle;
pub mod records;
pub mod reindex;
pub mod schema;
pub mod stats;

use docudb_core::{Engine, EngineConfig};
use serde_json::Value;
use std::path::Path;

/// Opens the store at `path`. Only `create` allows a missing directory.
pub fn open_engine(path: &Path, create: bool) -> Result<Engine, Box<dyn std::error::Error>> {
    if !create && !path.is_dir() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    Ok(Engine::open(EngineConfig::new(path).create_if_missing(create))?)
}

/// Parses a command-line value as JSON, falling back to a plain string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_parse_as_json_or_text() {
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("[\"a\",\"b\"]"), json!(["a", "b"]));
        assert_eq!(parse_value("paid"), json!("paid"));
        assert_eq!(parse_value("\"7\""), json!("7"));
    }

    #[test]
    fn missing_store_is_reported() {
        let temp = docudb_testkit::TestEngine::new();
        let missing = temp.path().join("absent");
        let err = open_engine(&missing, false).err().unwrap();
        assert!(err.to_string().contains("No store found"));
    }
}
