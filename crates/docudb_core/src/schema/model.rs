//! The collection schema.

use super::column::{AutoDefine, Column, IndexType};
use crate::error::{CoreError, CoreResult};
use docudb_types::{FieldType, TypeFamily};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Name of the primary column synthesised for schemas without one.
pub const DEFAULT_PRIMARY_KEY: &str = "_id";

/// Where a collection's records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageKind {
    /// One file per record under `data/`.
    #[default]
    OnDisk,
    /// Memory resident, written through to disk and rehydrated at first use.
    InMemory,
    /// Memory resident only; lost on restart.
    InMemoryNonDurable,
}

impl StorageKind {
    /// Persisted tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StorageKind::OnDisk => "on-disk",
            StorageKind::InMemory => "in-memory",
            StorageKind::InMemoryNonDurable => "in-memory-nd",
        }
    }

    /// Whether records are held in memory.
    #[must_use]
    pub const fn is_memory(self) -> bool {
        !matches!(self, StorageKind::OnDisk)
    }
}

impl FromStr for StorageKind {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on-disk" => Ok(StorageKind::OnDisk),
            "in-memory" => Ok(StorageKind::InMemory),
            "in-memory-nd" => Ok(StorageKind::InMemoryNonDurable),
            other => Err(CoreError::invalid_schema(format!("unknown storage type {other}"))),
        }
    }
}

/// Replication mode recorded in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReplicationType {
    /// Records are spread over nodes.
    #[default]
    Distributed,
    /// Every node holds every record.
    Mirrored,
}

impl ReplicationType {
    /// Persisted tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ReplicationType::Distributed => "distributed",
            ReplicationType::Mirrored => "mirrored",
        }
    }
}

impl FromStr for ReplicationType {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "distributed" => Ok(ReplicationType::Distributed),
            "mirrored" => Ok(ReplicationType::Mirrored),
            other => Err(CoreError::invalid_schema(format!(
                "unknown replication type {other}"
            ))),
        }
    }
}

impl fmt::Display for ReplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collection-level settings stored in the schema's `meta` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMeta {
    /// Storage kind.
    pub storage: StorageKind,
    /// Whether unknown fields are added as STRING columns.
    pub flexible: bool,
    /// Replication mode.
    pub replication_type: ReplicationType,
    /// Replication factor.
    pub replication_factor: u32,
}

impl Default for SchemaMeta {
    fn default() -> Self {
        Self {
            storage: StorageKind::OnDisk,
            flexible: true,
            replication_type: ReplicationType::Distributed,
            replication_factor: 0,
        }
    }
}

/// Ordered columns plus the primary key designation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    meta: SchemaMeta,
    primary: Option<String>,
    columns: Vec<Column>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(meta: SchemaMeta) -> Self {
        Self {
            meta,
            primary: None,
            columns: Vec::new(),
        }
    }

    /// Builder: adds a column.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateColumnName` if the name is taken.
    pub fn with_column(mut self, column: Column) -> CoreResult<Self> {
        self.add_column(column)?;
        Ok(self)
    }

    /// Builder: designates the primary key column.
    #[must_use]
    pub fn with_primary(mut self, name: impl Into<String>) -> Self {
        self.primary = Some(name.into());
        self
    }

    /// Collection settings.
    #[must_use]
    pub fn meta(&self) -> &SchemaMeta {
        &self.meta
    }

    /// Mutable collection settings.
    pub fn meta_mut(&mut self) -> &mut SchemaMeta {
        &mut self.meta
    }

    /// Primary key column name. Empty only for a schema that was never
    /// completed with [`Schema::ensure_primary`].
    #[must_use]
    pub fn primary_key(&self) -> &str {
        self.primary.as_deref().unwrap_or_default()
    }

    /// The primary key column.
    #[must_use]
    pub fn primary_column(&self) -> Option<&Column> {
        self.primary.as_deref().and_then(|name| self.column(name))
    }

    /// Whether `name` is the primary key.
    #[must_use]
    pub fn is_primary(&self, name: &str) -> bool {
        self.primary.as_deref() == Some(name)
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Looks up a column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name() == name)
    }

    /// Whether the column exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Non-primary columns that carry an index.
    pub fn indexed_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(move |c| c.is_indexed() && !self.is_primary(c.name()))
    }

    /// Whether any non-primary column is indexed.
    #[must_use]
    pub fn needs_indexing(&self) -> bool {
        self.indexed_columns().next().is_some()
    }

    /// Adds a column at the end.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateColumnName` if the name is taken.
    pub fn add_column(&mut self, column: Column) -> CoreResult<()> {
        if self.contains(column.name()) {
            return Err(CoreError::duplicate_column("schema", column.name()));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Removes a column, returning it.
    pub(crate) fn remove_column(&mut self, name: &str) -> Option<Column> {
        let position = self.columns.iter().position(|c| c.name() == name)?;
        Some(self.columns.remove(position))
    }

    /// Renames a column in place, following the primary key designation.
    pub(crate) fn rename_column(&mut self, old: &str, new: &str) -> bool {
        let Some(column) = self.column_mut(old) else {
            return false;
        };
        column.set_name(new);
        if self.is_primary(old) {
            self.primary = Some(new.to_string());
        }
        true
    }

    /// Synthesises the default `_id` primary column if none is designated.
    ///
    /// Returns true if the schema changed.
    pub fn ensure_primary(&mut self) -> bool {
        if self.primary.is_some() {
            return false;
        }
        if !self.contains(DEFAULT_PRIMARY_KEY) {
            self.columns.insert(
                0,
                Column::new(DEFAULT_PRIMARY_KEY, FieldType::string())
                    .with_index(IndexType::Unique)
                    .with_auto_define(AutoDefine::Uuid),
            );
        }
        self.primary = Some(DEFAULT_PRIMARY_KEY.to_string());
        true
    }

    /// Checks the structural rules every persisted schema satisfies.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` for rule violations and `OperationNotSupported`
    /// for index types without a strategy.
    pub fn validate(&self) -> CoreResult<()> {
        let primary = self
            .primary
            .as_deref()
            .ok_or_else(|| CoreError::invalid_schema("no primary key column"))?;
        let primary_column = self.column(primary).ok_or_else(|| {
            CoreError::invalid_schema(format!("primary key column {primary} is not defined"))
        })?;
        if !primary_column.field_type().is_indexable() {
            return Err(CoreError::invalid_schema(format!(
                "primary key column {primary} must have a scalar type"
            )));
        }
        if primary_column.index() != IndexType::Unique {
            return Err(CoreError::invalid_schema(format!(
                "primary key column {primary} must have a unique index"
            )));
        }

        for column in &self.columns {
            if !column.index().is_supported() {
                return Err(CoreError::not_supported(format!(
                    "{} index on column {}",
                    column.index(),
                    column.name()
                )));
            }
            let scalar = column.field_type().is_indexable();
            if column.is_indexed() && !scalar {
                return Err(CoreError::invalid_schema(format!(
                    "column {} of type {} cannot be indexed",
                    column.name(),
                    column.field_type().name()
                )));
            }
            match column.auto_define() {
                AutoDefine::None => {}
                AutoDefine::Uuid if column.field_type().family() == TypeFamily::String => {}
                AutoDefine::Timestamp
                    if column.field_type().family() == TypeFamily::Timestamp => {}
                other => {
                    return Err(CoreError::invalid_schema(format!(
                        "column {} of type {} cannot use {other} auto-define",
                        column.name(),
                        column.field_type().name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Persisted form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut meta = Map::new();
        meta.insert(
            "replication-type".into(),
            Value::from(self.meta.replication_type.as_str()),
        );
        meta.insert(
            "replication-factor".into(),
            Value::from(self.meta.replication_factor),
        );
        meta.insert("type".into(), Value::from(self.meta.storage.as_str()));
        meta.insert("flexible-schema".into(), Value::from(self.meta.flexible));

        let mut cols = Map::new();
        for column in &self.columns {
            cols.insert(column.name().to_string(), column.to_json());
        }
        let order: Vec<Value> = self
            .columns
            .iter()
            .map(|c| Value::from(c.name()))
            .collect();

        let mut obj = Map::new();
        obj.insert("meta".into(), Value::Object(meta));
        if let Some(primary) = &self.primary {
            obj.insert("primary".into(), Value::from(primary.clone()));
        }
        obj.insert("cols".into(), Value::Object(cols));
        obj.insert("order".into(), Value::Array(order));
        Value::Object(obj)
    }

    /// Parses the persisted form. Missing `meta` fields take `defaults`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` for malformed input.
    pub fn from_json_with_defaults(value: &Value, defaults: &SchemaMeta) -> CoreResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| CoreError::invalid_schema("schema is not an object"))?;

        let mut meta = defaults.clone();
        if let Some(section) = obj.get("meta").and_then(Value::as_object) {
            if let Some(kind) = section.get("type").and_then(Value::as_str) {
                meta.storage = kind.parse()?;
            }
            if let Some(flexible) = section.get("flexible-schema").and_then(Value::as_bool) {
                meta.flexible = flexible;
            }
            if let Some(replication) = section.get("replication-type").and_then(Value::as_str) {
                meta.replication_type = replication.parse()?;
            }
            if let Some(factor) = section.get("replication-factor").and_then(Value::as_u64) {
                meta.replication_factor = u32::try_from(factor).unwrap_or(u32::MAX);
            }
        }

        let cols = match obj.get("cols") {
            Some(Value::Object(cols)) => cols.clone(),
            None => Map::new(),
            Some(other) => {
                return Err(CoreError::invalid_schema(format!("cols is not an object: {other}")))
            }
        };
        let order: Vec<String> = match obj.get("order").and_then(Value::as_array) {
            Some(order) => order
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            None => cols.keys().cloned().collect(),
        };

        let mut schema = Schema::new(meta);
        for name in &order {
            if let Some(column) = cols.get(name) {
                schema.add_column(Column::from_json(name, column)?)?;
            }
        }
        for (name, column) in &cols {
            if !order.contains(name) {
                schema.add_column(Column::from_json(name, column)?)?;
            }
        }
        schema.primary = obj
            .get("primary")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        Ok(schema)
    }

    /// Parses the persisted form with default settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` for malformed input.
    pub fn from_json(value: &Value) -> CoreResult<Self> {
        Self::from_json_with_defaults(value, &SchemaMeta::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docudb_types::field_type_from_string;
    use serde_json::json;

    fn orders() -> Schema {
        Schema::new(SchemaMeta::default())
            .with_column(
                Column::new("id", FieldType::string())
                    .with_index(IndexType::Unique)
                    .with_auto_define(AutoDefine::Uuid),
            )
            .unwrap()
            .with_column(Column::new(
                "total",
                field_type_from_string("DECIMAL(10,2)").unwrap(),
            ))
            .unwrap()
            .with_column(Column::new("status", FieldType::string()).with_index(IndexType::Btree))
            .unwrap()
            .with_primary("id")
    }

    #[test]
    fn json_round_trip_keeps_order() {
        let schema = orders();
        let parsed = Schema::from_json(&schema.to_json()).unwrap();
        assert_eq!(parsed, schema);
        let names: Vec<&str> = parsed.columns().iter().map(Column::name).collect();
        assert_eq!(names, ["id", "total", "status"]);
    }

    #[test]
    fn missing_primary_is_synthesised() {
        let mut schema = Schema::from_json(&json!({"cols": {"name": {"type": "STRING"}}})).unwrap();
        assert!(schema.validate().is_err());
        assert!(schema.ensure_primary());
        assert_eq!(schema.primary_key(), DEFAULT_PRIMARY_KEY);
        assert_eq!(schema.columns()[0].name(), DEFAULT_PRIMARY_KEY);
        schema.validate().unwrap();
        assert!(!schema.ensure_primary());
    }

    #[test]
    fn indexed_columns_skip_primary() {
        let schema = orders();
        let indexed: Vec<&str> = schema.indexed_columns().map(Column::name).collect();
        assert_eq!(indexed, ["status"]);
        assert!(schema.needs_indexing());
    }

    #[test]
    fn validation_rules() {
        let blob_index = orders()
            .with_column(
                Column::new("photo", field_type_from_string("BLOB").unwrap())
                    .with_index(IndexType::Btree),
            )
            .unwrap();
        assert_eq!(blob_index.validate().unwrap_err().code(), "INVALID_SCHEMA");

        let geo = orders()
            .with_column(Column::new("where", FieldType::string()).with_index(IndexType::Geo))
            .unwrap();
        assert_eq!(geo.validate().unwrap_err().code(), "OPERATION_NOT_SUPPORTED");

        let bad_auto = orders()
            .with_column(
                Column::new("n", field_type_from_string("INTEGER").unwrap())
                    .with_auto_define(AutoDefine::Uuid),
            )
            .unwrap();
        assert!(bad_auto.validate().is_err());

        let mut non_unique_pk = orders();
        non_unique_pk
            .column_mut("id")
            .unwrap()
            .set_index(IndexType::Btree);
        assert!(non_unique_pk.validate().is_err());
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = orders()
            .with_column(Column::new("status", FieldType::string()))
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_COLUMN_NAME");
    }

    #[test]
    fn rename_follows_primary() {
        let mut schema = orders();
        assert!(schema.rename_column("id", "order_id"));
        assert_eq!(schema.primary_key(), "order_id");
        assert!(!schema.rename_column("missing", "x"));
    }

    #[test]
    fn meta_defaults_apply() {
        let defaults = SchemaMeta {
            flexible: false,
            ..SchemaMeta::default()
        };
        let schema = Schema::from_json_with_defaults(
            &json!({"meta": {"type": "in-memory"}, "cols": {}}),
            &defaults,
        )
        .unwrap();
        assert_eq!(schema.meta().storage, StorageKind::InMemory);
        assert!(!schema.meta().flexible);
    }
}
