//! Column definitions.

use crate::error::{CoreError, CoreResult};
use docudb_types::{field_type_from_descriptor, field_type_from_string, FieldType};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Index kind attached to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexType {
    /// Not indexed.
    #[default]
    None,
    /// One record per value.
    Unique,
    /// Value directories holding primary key markers; supports range filters.
    Btree,
    /// Hash buckets; equality and membership only.
    Hashed,
    /// Declared but not implemented.
    Bitmap,
    /// Declared but not implemented.
    Array,
    /// Declared but not implemented.
    Timeseries,
    /// Declared but not implemented.
    Geo,
}

impl IndexType {
    /// Persisted tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            IndexType::None => "none",
            IndexType::Unique => "unique",
            IndexType::Btree => "btree",
            IndexType::Hashed => "hashed",
            IndexType::Bitmap => "bitmap",
            IndexType::Array => "array",
            IndexType::Timeseries => "timeseries",
            IndexType::Geo => "geo",
        }
    }

    /// Whether an indexing strategy exists for this type.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(
            self,
            IndexType::None | IndexType::Unique | IndexType::Btree | IndexType::Hashed
        )
    }
}

impl FromStr for IndexType {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => IndexType::None,
            "unique" => IndexType::Unique,
            "btree" | "b-tree" => IndexType::Btree,
            "hashed" | "hash" => IndexType::Hashed,
            "bitmap" => IndexType::Bitmap,
            "array" => IndexType::Array,
            "timeseries" => IndexType::Timeseries,
            "geo" => IndexType::Geo,
            other => return Err(CoreError::invalid_schema(format!("unknown index type {other}"))),
        })
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value generation applied to a column on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AutoDefine {
    /// Caller supplies the value.
    #[default]
    None,
    /// A random UUID.
    Uuid,
    /// The current timestamp, refreshed on every write.
    Timestamp,
}

impl AutoDefine {
    /// Persisted tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AutoDefine::None => "none",
            AutoDefine::Uuid => "uuid",
            AutoDefine::Timestamp => "timestamp",
        }
    }
}

impl FromStr for AutoDefine {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => AutoDefine::None,
            "uuid" => AutoDefine::Uuid,
            "timestamp" => AutoDefine::Timestamp,
            other => {
                return Err(CoreError::invalid_schema(format!(
                    "unknown auto-define type {other}"
                )))
            }
        })
    }
}

impl fmt::Display for AutoDefine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    field_type: FieldType,
    index: IndexType,
    auto_define: AutoDefine,
}

impl Column {
    /// Creates an unindexed column with no auto-define.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            index: IndexType::None,
            auto_define: AutoDefine::None,
        }
    }

    /// Sets the index type.
    #[must_use]
    pub fn with_index(mut self, index: IndexType) -> Self {
        self.index = index;
        self
    }

    /// Sets the auto-define type.
    #[must_use]
    pub fn with_auto_define(mut self, auto_define: AutoDefine) -> Self {
        self.auto_define = auto_define;
        self
    }

    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field type.
    #[must_use]
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Index type.
    #[must_use]
    pub const fn index(&self) -> IndexType {
        self.index
    }

    /// Auto-define type.
    #[must_use]
    pub const fn auto_define(&self) -> AutoDefine {
        self.auto_define
    }

    /// Whether any index is declared.
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.index != IndexType::None
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_field_type(&mut self, field_type: FieldType) {
        self.field_type = field_type;
    }

    pub(crate) fn set_index(&mut self, index: IndexType) {
        self.index = index;
    }

    pub(crate) fn set_auto_define(&mut self, auto_define: AutoDefine) {
        self.auto_define = auto_define;
    }

    /// Persisted form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".into(), Value::from(self.name.clone()));
        obj.insert("type".into(), self.field_type.to_descriptor());
        obj.insert("auto-define".into(), Value::from(self.auto_define.as_str()));
        obj.insert("index".into(), Value::from(self.index.as_str()));
        Value::Object(obj)
    }

    /// Parses a column; `type` may be a descriptor object or a compact string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` for a malformed column and a `DataType*` error
    /// for a bad type declaration.
    pub fn from_json(fallback_name: &str, value: &Value) -> CoreResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| CoreError::invalid_schema(format!("column {fallback_name} is not an object")))?;
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(fallback_name)
            .to_string();
        let field_type = match obj.get("type") {
            Some(Value::String(compact)) => field_type_from_string(compact)?,
            Some(descriptor @ Value::Object(_)) => field_type_from_descriptor(descriptor)?,
            Some(other) => {
                return Err(CoreError::invalid_schema(format!(
                    "column {name} has an invalid type {other}"
                )))
            }
            None => FieldType::string(),
        };
        let index = match obj.get("index").and_then(Value::as_str) {
            Some(tag) => tag.parse()?,
            None => IndexType::None,
        };
        let auto_define = match obj.get("auto-define").and_then(Value::as_str) {
            Some(tag) => tag.parse()?,
            None => AutoDefine::None,
        };
        Ok(Self {
            name,
            field_type,
            index,
            auto_define,
        })
    }
}
