//! Viewable to internal column name mapping.
//!
//! Record bodies are stored under internal names handed out by a counter, so
//! renaming a column only edits this mapping.

use super::model::Schema;
use crate::error::{CoreError, CoreResult};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Bidirectional column name mapping for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnMapping {
    next_index: u64,
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
}

impl ColumnMapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mapping with one entry per schema column.
    #[must_use]
    pub fn for_schema(schema: &Schema) -> Self {
        let mut mapping = Self::new();
        mapping.sync(schema);
        mapping
    }

    /// Internal name of a viewable column.
    #[must_use]
    pub fn internal(&self, viewable: &str) -> Option<&str> {
        self.forward.get(viewable).map(String::as_str)
    }

    /// Viewable name of an internal column.
    #[must_use]
    pub fn viewable(&self, internal: &str) -> Option<&str> {
        self.reverse.get(internal).map(String::as_str)
    }

    /// Number of mapped columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Whether no column is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Maps `viewable` to a fresh internal name, or returns the existing one.
    pub fn add(&mut self, viewable: &str) -> &str {
        if !self.forward.contains_key(viewable) {
            self.next_index += 1;
            let internal = self.next_index.to_string();
            self.reverse.insert(internal.clone(), viewable.to_string());
            self.forward.insert(viewable.to_string(), internal);
        }
        self.forward
            .get(viewable)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Removes the entry of a column that left the schema, returning its
    /// internal name. Bodies still holding that internal name stop
    /// translating.
    pub fn forget(&mut self, viewable: &str) -> Option<String> {
        let internal = self.forward.remove(viewable)?;
        self.reverse.remove(&internal);
        Some(internal)
    }

    /// Points the internal name of `old` at `new`.
    ///
    /// A stale entry left by a dropped column named `new` must be removed with
    /// [`ColumnMapping::forget`] first.
    ///
    /// # Errors
    ///
    /// Returns `ColumnInvalid` if `old` is unmapped and `DuplicateColumnName`
    /// if `new` is already mapped.
    pub fn rename(&mut self, collection: &str, old: &str, new: &str) -> CoreResult<()> {
        if self.forward.contains_key(new) {
            return Err(CoreError::duplicate_column(collection, new));
        }
        let internal = self
            .forward
            .remove(old)
            .ok_or_else(|| CoreError::column_invalid(collection, old))?;
        self.reverse.insert(internal.clone(), new.to_string());
        self.forward.insert(new.to_string(), internal);
        Ok(())
    }

    /// Adds an entry for every schema column that lacks one.
    ///
    /// Entries for columns no longer in the schema are kept so older record
    /// bodies still translate. Returns true if anything was added.
    pub fn sync(&mut self, schema: &Schema) -> bool {
        let before = self.len();
        for column in schema.columns() {
            self.add(column.name());
        }
        self.len() != before
    }

    /// Persisted form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut entries: Vec<(&String, &String)> = self.forward.iter().collect();
        entries.sort_by(|a, b| a.1.len().cmp(&b.1.len()).then_with(|| a.1.cmp(b.1)));
        let map: Map<String, Value> = entries
            .into_iter()
            .map(|(viewable, internal)| (viewable.clone(), Value::from(internal.clone())))
            .collect();
        let mut obj = Map::new();
        obj.insert("index".into(), Value::from(self.next_index));
        obj.insert("map".into(), Value::Object(map));
        Value::Object(obj)
    }

    /// Parses the persisted form.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` if the map is malformed or not bijective.
    pub fn from_json(value: &Value) -> CoreResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| CoreError::invalid_schema("column mapping is not an object"))?;
        let mut mapping = Self::new();
        if let Some(map) = obj.get("map").and_then(Value::as_object) {
            for (viewable, internal) in map {
                let internal = internal.as_str().ok_or_else(|| {
                    CoreError::invalid_schema(format!("mapping for {viewable} is not a string"))
                })?;
                if mapping
                    .reverse
                    .insert(internal.to_string(), viewable.clone())
                    .is_some()
                {
                    return Err(CoreError::invalid_schema(format!(
                        "internal column {internal} is mapped twice"
                    )));
                }
                mapping.forward.insert(viewable.clone(), internal.to_string());
                if let Ok(n) = internal.parse::<u64>() {
                    mapping.next_index = mapping.next_index.max(n);
                }
            }
        }
        if let Some(index) = obj.get("index").and_then(Value::as_u64) {
            mapping.next_index = mapping.next_index.max(index);
        }
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::Column;
    use crate::schema::model::SchemaMeta;
    use docudb_types::FieldType;
    use serde_json::json;

    #[test]
    fn internal_names_come_from_a_counter() {
        let mut mapping = ColumnMapping::new();
        assert_eq!(mapping.add("id"), "1");
        assert_eq!(mapping.add("total"), "2");
        assert_eq!(mapping.add("id"), "1");
        assert_eq!(mapping.viewable("2"), Some("total"));
    }

    #[test]
    fn rename_keeps_internal_name() {
        let mut mapping = ColumnMapping::new();
        mapping.add("status");
        mapping.add("note");
        mapping.rename("orders", "status", "state").unwrap();
        assert_eq!(mapping.internal("state"), Some("1"));
        assert_eq!(mapping.internal("status"), None);
        assert_eq!(mapping.viewable("1"), Some("state"));
        let err = mapping.rename("orders", "state", "note").unwrap_err();
        assert_eq!(
            err.to_string(),
            CoreError::duplicate_column("orders", "note").to_string()
        );
        assert!(mapping.rename("orders", "missing", "x").is_err());
    }

    #[test]
    fn forgotten_names_can_be_reused() {
        let mut mapping = ColumnMapping::new();
        mapping.add("a");
        mapping.add("b");
        assert_eq!(mapping.forget("a").as_deref(), Some("1"));
        assert_eq!(mapping.viewable("1"), None);
        assert_eq!(mapping.forget("a"), None);

        mapping.rename("orders", "b", "a").unwrap();
        assert_eq!(mapping.internal("a"), Some("2"));
        assert_eq!(mapping.add("c"), "3");
    }

    #[test]
    fn sync_only_adds() {
        let schema = Schema::new(SchemaMeta::default())
            .with_column(Column::new("a", FieldType::string()))
            .unwrap();
        let mut mapping = ColumnMapping::new();
        mapping.add("retired");
        assert!(mapping.sync(&schema));
        assert!(!mapping.sync(&schema));
        assert_eq!(mapping.internal("retired"), Some("1"));
        assert_eq!(mapping.internal("a"), Some("2"));
    }

    #[test]
    fn json_round_trip() {
        let mut mapping = ColumnMapping::new();
        mapping.add("x");
        mapping.add("y");
        mapping.rename("orders", "x", "z").unwrap();
        let json = mapping.to_json();
        assert_eq!(json, json!({"index": 2, "map": {"z": "1", "y": "2"}}));
        let parsed = ColumnMapping::from_json(&json).unwrap();
        assert_eq!(parsed, mapping);
        let mut parsed = parsed;
        assert_eq!(parsed.add("w"), "3");
    }

    #[test]
    fn duplicate_internal_names_are_rejected() {
        let err = ColumnMapping::from_json(&json!({"index": 1, "map": {"a": "1", "b": "1"}}))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_SCHEMA");
    }
}
