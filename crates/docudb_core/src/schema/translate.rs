//! Viewable and internal record forms.

use super::mapping::ColumnMapping;
use super::model::Schema;
use crate::types::Record;

/// Renames viewable fields to their internal names.
///
/// Fields that are not schema columns, or have no mapping, are dropped.
#[must_use]
pub fn to_internal(schema: &Schema, mapping: &ColumnMapping, viewable: &Record) -> Record {
    viewable
        .iter()
        .filter(|(name, _)| schema.contains(name))
        .filter_map(|(name, value)| {
            mapping
                .internal(name)
                .map(|internal| (internal.to_string(), value.clone()))
        })
        .collect()
}

/// Renames internal fields back to viewable names.
///
/// Internal names whose mapping survives but whose column was dropped from the
/// schema are skipped, as are unmapped names.
#[must_use]
pub fn to_viewable(schema: &Schema, mapping: &ColumnMapping, internal: &Record) -> Record {
    internal
        .iter()
        .filter_map(|(name, value)| {
            mapping
                .viewable(name)
                .filter(|viewable| schema.contains(viewable))
                .map(|viewable| (viewable.to_string(), value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::Column;
    use crate::schema::model::SchemaMeta;
    use docudb_types::FieldType;
    use serde_json::json;

    fn setup() -> (Schema, ColumnMapping) {
        let schema = Schema::new(SchemaMeta::default())
            .with_column(Column::new("id", FieldType::string()))
            .unwrap()
            .with_column(Column::new("name", FieldType::string()))
            .unwrap()
            .with_primary("id");
        let mapping = ColumnMapping::for_schema(&schema);
        (schema, mapping)
    }

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn unknown_fields_are_dropped() {
        let (schema, mapping) = setup();
        let internal = to_internal(
            &schema,
            &mapping,
            &record(json!({"id": "a", "name": "n", "extra": 1})),
        );
        assert_eq!(internal, record(json!({"1": "a", "2": "n"})));
    }

    #[test]
    fn dropped_columns_are_hidden() {
        let (mut schema, mapping) = setup();
        schema.remove_column("name");
        let viewable = to_viewable(&schema, &mapping, &record(json!({"1": "a", "2": "n"})));
        assert_eq!(viewable, record(json!({"id": "a"})));
    }

    #[test]
    fn round_trip() {
        let (schema, mapping) = setup();
        let original = record(json!({"id": "a", "name": null}));
        let back = to_viewable(&schema, &mapping, &to_internal(&schema, &mapping, &original));
        assert_eq!(back, original);
    }
}
