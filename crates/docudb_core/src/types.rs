//! Shared identifier and record types.

use serde_json::Value;
use std::fmt;

/// A JSON record body, keyed by column name.
pub type Record = serde_json::Map<String, Value>;

/// Identifies a collection inside a datastore.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionKey {
    /// Datastore name.
    pub datastore: String,
    /// Collection name.
    pub collection: String,
}

impl CollectionKey {
    /// Creates a new collection key.
    pub fn new(datastore: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            datastore: datastore.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.datastore, self.collection)
    }
}

/// String form of a primary key value, or `None` if the value cannot key a record.
#[must_use]
pub fn primary_key_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_display() {
        assert_eq!(CollectionKey::new("shop", "orders").to_string(), "shop.orders");
    }

    #[test]
    fn primary_key_strings() {
        assert_eq!(primary_key_string(&json!("a1")).as_deref(), Some("a1"));
        assert_eq!(primary_key_string(&json!(42)).as_deref(), Some("42"));
        assert_eq!(primary_key_string(&json!("")), None);
        assert_eq!(primary_key_string(&json!(null)), None);
        assert_eq!(primary_key_string(&json!([1])), None);
    }
}
