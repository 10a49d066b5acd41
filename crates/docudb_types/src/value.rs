//! Typed values produced by field-type conversion.

use crate::decimal::Decimal;
use crate::temporal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use std::cmp::Ordering;

/// A value after it has been converted through a field type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// Character data.
    Text(String),
    /// Unsigned bytes.
    Bytes(Vec<u8>),
    /// Integer of any declared width.
    Integer(i64),
    /// DOUBLE, FLOAT and REAL values.
    Float(f64),
    /// Fixed point value with its scale.
    Decimal(Decimal),
    /// True/false.
    Boolean(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day, whole seconds.
    Time(NaiveTime),
    /// Date-time with the fractional precision it is rendered at.
    Timestamp {
        /// The (already rounded) value.
        value: NaiveDateTime,
        /// Number of fraction digits when rendered.
        precision: u8,
    },
    /// `UUID:UUID` reference.
    Reference(String),
    /// ARRAY or MULTISET elements.
    List(Vec<TypedValue>),
}

impl TypedValue {
    /// JSON form stored in record bodies.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            TypedValue::Text(s) | TypedValue::Reference(s) => Value::String(s.clone()),
            TypedValue::Bytes(bytes) => {
                Value::Array(bytes.iter().map(|b| Value::from(*b)).collect())
            }
            TypedValue::Integer(i) => Value::from(*i),
            TypedValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            TypedValue::Decimal(d) => d
                .to_json_number()
                .map(Value::Number)
                .unwrap_or_else(|_| Value::String(d.to_plain_string())),
            TypedValue::Boolean(b) => Value::Bool(*b),
            TypedValue::Date(d) => Value::String(temporal::format_date(*d)),
            TypedValue::Time(t) => Value::String(temporal::format_time(*t)),
            TypedValue::Timestamp { value, precision } => {
                Value::String(temporal::format_timestamp(*value, *precision))
            }
            TypedValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    /// Canonical string used to name index entries.
    ///
    /// Converting the key back through the same field type yields a value
    /// that compares equal. Decimals drop trailing zeros so `20`, `20.0` and
    /// `20.00` share one key. Bytes and lists have no key.
    #[must_use]
    pub fn index_key(&self) -> Option<String> {
        match self {
            TypedValue::Text(s) | TypedValue::Reference(s) => Some(s.clone()),
            TypedValue::Integer(i) => Some(i.to_string()),
            TypedValue::Float(f) => Some(format!("{f}")),
            TypedValue::Decimal(d) => Some(d.strip_trailing_zeros().to_plain_string()),
            TypedValue::Boolean(b) => Some(b.to_string()),
            TypedValue::Date(_) | TypedValue::Time(_) | TypedValue::Timestamp { .. } => {
                self.to_json().as_str().map(str::to_string)
            }
            TypedValue::Bytes(_) | TypedValue::List(_) => None,
        }
    }

    /// Text content, if this is a text or reference value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::Text(s) | TypedValue::Reference(s) => Some(s),
            _ => None,
        }
    }

    fn as_decimal(&self) -> Option<Decimal> {
        match self {
            TypedValue::Integer(i) => Some(Decimal::from_i64(*i)),
            TypedValue::Decimal(d) => Some(d.clone()),
            TypedValue::Float(f) => Decimal::from_f64(*f).ok(),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Integer(i) => Some(*i as f64),
            TypedValue::Float(f) => Some(*f),
            TypedValue::Decimal(d) => Some(d.to_f64()),
            _ => None,
        }
    }
}

impl PartialOrd for TypedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use TypedValue::{
            Boolean, Bytes, Date, Decimal as Dec, Float, Integer, Reference, Text, Time, Timestamp,
        };
        match (self, other) {
            (Text(a), Text(b)) | (Reference(a), Reference(b)) => Some(a.cmp(b)),
            (Bytes(a), Bytes(b)) => Some(a.cmp(b)),
            (Integer(a), Integer(b)) => Some(a.cmp(b)),
            (Float(_), Integer(_) | Float(_) | Dec(_)) | (Integer(_) | Dec(_), Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Integer(_) | Dec(_), Integer(_) | Dec(_)) => {
                Some(self.as_decimal()?.cmp(&other.as_decimal()?))
            }
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (Date(a), Date(b)) => Some(a.cmp(b)),
            (Time(a), Time(b)) => Some(a.cmp(b)),
            (Timestamp { value: a, .. }, Timestamp { value: b, .. }) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_numeric_ordering() {
        let two = TypedValue::Integer(2);
        let two_and_half = TypedValue::Decimal("2.5".parse().unwrap());
        let three = TypedValue::Float(3.0);
        assert!(two < two_and_half);
        assert!(two_and_half < three);
        assert!(three > two);
        assert_eq!(
            TypedValue::Decimal("2.00".parse().unwrap()).partial_cmp(&two),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn unrelated_values_do_not_compare() {
        assert_eq!(
            TypedValue::Text("1".into()).partial_cmp(&TypedValue::Integer(1)),
            None
        );
        assert_eq!(
            TypedValue::List(vec![]).partial_cmp(&TypedValue::List(vec![])),
            None
        );
    }

    #[test]
    fn decimal_json_keeps_scale() {
        let value = TypedValue::Decimal("20.00".parse().unwrap());
        assert_eq!(value.to_json().to_string(), "20.00");
        assert_eq!(value.index_key().as_deref(), Some("20"));
    }

    #[test]
    fn decimal_keys_ignore_trailing_zeros() {
        let key = |s: &str| TypedValue::Decimal(s.parse().unwrap()).index_key().unwrap();
        assert_eq!(key("20.0"), key("20"));
        assert_eq!(key("-0.50"), "-0.5");
        assert_eq!(key("1200"), "1200");
        assert_eq!(key("0.000"), "0");
    }

    #[test]
    fn bytes_have_no_index_key() {
        let value = TypedValue::Bytes(vec![1, 255]);
        assert_eq!(value.index_key(), None);
        assert_eq!(value.to_json(), serde_json::json!([1, 255]));
    }
}
