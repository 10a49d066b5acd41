//! Field types and value conversion.
//!
//! A [`FieldType`] is a closed set of variants, one payload struct per type
//! family. Every variant converts raw JSON into a [`TypedValue`] and validates
//! it against the declared constraints. Construction validates the constraints
//! themselves, so an impossible combination never reaches a schema.

use crate::decimal::Decimal;
use crate::error::{TypeError, TypeResult};
use crate::names::{TypeFamily, TypeName};
use crate::temporal;
use crate::value::TypedValue;
use chrono::{NaiveTime, Timelike};
use serde_json::Value;

/// Precision used by DECIMAL/NUMERIC/DEC when none is declared.
pub const DEFAULT_DECIMAL_PRECISION: u32 = 38;
/// Precision used by FLOAT when none is declared, and always by REAL.
pub const DEFAULT_FLOAT_PRECISION: u32 = 24;
/// Largest precision any numeric type may declare.
pub const MAX_PRECISION: u32 = 127;
/// Smallest legal scale.
pub const MIN_SCALE: i32 = -84;
/// Largest legal scale.
pub const MAX_SCALE: i32 = 127;

fn scalar_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn null_mismatch(expected: TypeName) -> TypeError {
    TypeError::mismatch(format!("null is not a valid {expected} value"))
}

fn shape_mismatch(expected: TypeName, raw: &Value) -> TypeError {
    TypeError::mismatch(format!("{raw} cannot be converted to {expected}"))
}

/// CHAR, VARCHAR, CLOB, NCHAR and STRING family.
#[derive(Debug, Clone, PartialEq)]
pub struct StringType {
    name: TypeName,
    max_length: Option<u64>,
    default: Option<TypedValue>,
}

impl StringType {
    /// Creates a string type; `None` means unbounded.
    ///
    /// # Errors
    ///
    /// Returns a constraint violation for a zero length, or a definition
    /// error if `name` is not a string-family name.
    pub fn new(name: TypeName, max_length: Option<u64>) -> TypeResult<Self> {
        if name.family() != TypeFamily::String {
            return Err(TypeError::definition(format!("{name} is not a string type")));
        }
        if max_length == Some(0) {
            return Err(TypeError::constraint(format!(
                "{name} length must be positive"
            )));
        }
        Ok(Self {
            name,
            max_length,
            default: None,
        })
    }

    /// Unbounded STRING.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            name: TypeName::String,
            max_length: None,
            default: None,
        }
    }

    /// Maximum length in characters, `None` when unbounded.
    #[must_use]
    pub const fn max_length(&self) -> Option<u64> {
        self.max_length
    }

    fn convert(&self, raw: &Value) -> TypeResult<TypedValue> {
        if raw.is_null() {
            return Err(null_mismatch(self.name));
        }
        let text = scalar_text(raw).ok_or_else(|| shape_mismatch(self.name, raw))?;
        if let Some(max) = self.max_length {
            let length = text.chars().count() as u64;
            if length > max {
                return Err(TypeError::constraint(format!(
                    "value of length {length} exceeds {} maximum length {max}",
                    self.name
                )));
            }
        }
        Ok(TypedValue::Text(text))
    }
}

/// BLOB family.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryType {
    name: TypeName,
    max_length: Option<u64>,
}

impl BinaryType {
    /// Creates a binary type; `None` means unbounded.
    ///
    /// # Errors
    ///
    /// Returns a constraint violation for a zero length.
    pub fn new(name: TypeName, max_length: Option<u64>) -> TypeResult<Self> {
        if name.family() != TypeFamily::Binary {
            return Err(TypeError::definition(format!("{name} is not a binary type")));
        }
        if max_length == Some(0) {
            return Err(TypeError::constraint(format!(
                "{name} length must be positive"
            )));
        }
        Ok(Self { name, max_length })
    }

    /// Maximum length in bytes, `None` when unbounded.
    #[must_use]
    pub const fn max_length(&self) -> Option<u64> {
        self.max_length
    }

    fn convert(&self, raw: &Value) -> TypeResult<TypedValue> {
        let bytes = match raw {
            Value::Null => return Err(null_mismatch(self.name)),
            Value::String(s) => s.as_bytes().to_vec(),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_i64()
                        .filter(|b| (-128..=255).contains(b))
                        .map(|b| if b < 0 { (b + 256) as u8 } else { b as u8 })
                        .ok_or_else(|| {
                            TypeError::mismatch(format!("{item} is not a byte value"))
                        })
                })
                .collect::<TypeResult<Vec<u8>>>()?,
            _ => return Err(shape_mismatch(self.name, raw)),
        };
        if let Some(max) = self.max_length {
            if bytes.len() as u64 > max {
                return Err(TypeError::constraint(format!(
                    "{} bytes exceed {} maximum length {max}",
                    bytes.len(),
                    self.name
                )));
            }
        }
        Ok(TypedValue::Bytes(bytes))
    }
}

/// Integer, floating point and fixed point numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberType {
    name: TypeName,
    precision: Option<u32>,
    scale: Option<i32>,
    default: Option<TypedValue>,
}

impl NumberType {
    /// Creates a numeric type and validates its precision and scale.
    ///
    /// A fixed-point type with an explicit precision and no scale gets scale 0.
    ///
    /// # Errors
    ///
    /// Returns a constraint violation when the combination is impossible:
    /// precision on a type that takes none, a scale on a non fixed-point type,
    /// a scale without a precision, or values outside the legal ranges.
    pub fn new(name: TypeName, precision: Option<i64>, scale: Option<i64>) -> TypeResult<Self> {
        if name.family() != TypeFamily::Number {
            return Err(TypeError::definition(format!("{name} is not a numeric type")));
        }
        let takes_precision = name.is_fixed_point() || name == TypeName::Float;
        if precision.is_some() && !takes_precision {
            return Err(TypeError::constraint(format!("{name} does not accept a precision")));
        }
        if scale.is_some() && !name.is_fixed_point() {
            return Err(TypeError::constraint(format!("{name} does not accept a scale")));
        }
        if scale.is_some() && precision.is_none() {
            return Err(TypeError::constraint(format!(
                "{name} scale requires a precision"
            )));
        }

        let precision = match precision {
            Some(p) if p <= 0 || p > i64::from(MAX_PRECISION) => {
                return Err(TypeError::constraint(format!(
                    "precision {p} is outside (0, {MAX_PRECISION}]"
                )));
            }
            Some(p) if name == TypeName::Float && p > i64::from(DEFAULT_FLOAT_PRECISION) => {
                return Err(TypeError::constraint(format!(
                    "FLOAT precision {p} exceeds {DEFAULT_FLOAT_PRECISION}"
                )));
            }
            Some(p) => Some(p as u32),
            None => None,
        };
        let scale = match scale {
            Some(s) if s < i64::from(MIN_SCALE) || s > i64::from(MAX_SCALE) => {
                return Err(TypeError::constraint(format!(
                    "scale {s} is outside [{MIN_SCALE}, {MAX_SCALE}]"
                )));
            }
            Some(s) => Some(s as i32),
            None if name.is_fixed_point() && precision.is_some() => Some(0),
            None => None,
        };
        if let (Some(p), Some(s)) = (precision, scale) {
            if s > p as i32 {
                return Err(TypeError::constraint(format!(
                    "scale {s} exceeds precision {p}"
                )));
            }
        }
        Ok(Self {
            name,
            precision,
            scale,
            default: None,
        })
    }

    /// Precision as declared, `None` when it was left implicit.
    #[must_use]
    pub const fn declared_precision(&self) -> Option<u32> {
        self.precision
    }

    /// Precision used for conversion.
    #[must_use]
    pub fn precision(&self) -> u32 {
        match self.name {
            TypeName::Real => DEFAULT_FLOAT_PRECISION,
            TypeName::Float => self.precision.unwrap_or(DEFAULT_FLOAT_PRECISION),
            _ => self.precision.unwrap_or(DEFAULT_DECIMAL_PRECISION),
        }
    }

    /// Declared scale, `None` when unconstrained.
    #[must_use]
    pub const fn scale(&self) -> Option<i32> {
        self.scale
    }

    fn parse_double(&self, literal: &str) -> TypeResult<f64> {
        literal
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(|| TypeError::format("number", format!("'{literal}' is not a valid {}", self.name)))
    }

    fn convert(&self, raw: &Value) -> TypeResult<TypedValue> {
        let literal = match raw {
            Value::Null => return Err(null_mismatch(self.name)),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.trim().to_string(),
            _ => return Err(shape_mismatch(self.name, raw)),
        };
        match self.name {
            TypeName::SmallInt => {
                let value = self.parse_double(&literal)?.trunc() as i64;
                Ok(TypedValue::Integer(value.clamp(i64::from(i16::MIN), i64::from(i16::MAX))))
            }
            TypeName::Int | TypeName::Integer => {
                let value = self.parse_double(&literal)?.trunc() as i64;
                Ok(TypedValue::Integer(value.clamp(i64::from(i32::MIN), i64::from(i32::MAX))))
            }
            TypeName::BigInt | TypeName::Long => {
                Ok(TypedValue::Integer(self.parse_double(&literal)?.trunc() as i64))
            }
            TypeName::Double | TypeName::DoublePrecision => {
                Ok(TypedValue::Float(self.parse_double(&literal)?))
            }
            TypeName::Float | TypeName::Real => {
                let value = literal.parse::<Decimal>()?;
                let rounded = value.round_significant(self.precision()).to_f64();
                if !rounded.is_finite() {
                    return Err(TypeError::constraint(format!(
                        "'{literal}' is out of range for {}",
                        self.name
                    )));
                }
                Ok(TypedValue::Float(rounded))
            }
            _ => {
                let value = literal.parse::<Decimal>()?;
                Ok(TypedValue::Decimal(self.fit(&value)))
            }
        }
    }

    fn fit(&self, value: &Decimal) -> Decimal {
        match value.fit(self.precision(), self.scale) {
            Ok(fitted) => fitted,
            Err(e) => {
                tracing::warn!(
                    value = %value,
                    precision = self.precision(),
                    scale = ?self.scale,
                    error = %e,
                    "numeric precision overflow, storing zero"
                );
                Decimal::zero(self.scale.unwrap_or(0))
            }
        }
    }
}

/// BOOLEAN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BooleanType {
    default: Option<TypedValue>,
}

impl BooleanType {
    fn convert(raw: &Value) -> TypeResult<TypedValue> {
        match raw {
            Value::Null => Err(null_mismatch(TypeName::Boolean)),
            Value::Bool(b) => Ok(TypedValue::Boolean(*b)),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => {
                Ok(TypedValue::Boolean(true))
            }
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => {
                Ok(TypedValue::Boolean(false))
            }
            _ => Err(shape_mismatch(TypeName::Boolean, raw)),
        }
    }
}

/// DATE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateType {
    default: Option<TypedValue>,
}

impl DateType {
    fn convert(raw: &Value) -> TypeResult<TypedValue> {
        match raw {
            Value::Null => Err(null_mismatch(TypeName::Date)),
            Value::String(s) => Ok(TypedValue::Date(temporal::parse_date(s)?)),
            Value::Number(n) => {
                let millis = n.as_i64().ok_or_else(|| shape_mismatch(TypeName::Date, raw))?;
                Ok(TypedValue::Date(temporal::from_epoch_millis(millis)?.date()))
            }
            _ => Err(shape_mismatch(TypeName::Date, raw)),
        }
    }
}

/// TIME.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeType {
    with_zone: bool,
    default: Option<TypedValue>,
}

impl TimeType {
    /// Creates a time type.
    #[must_use]
    pub const fn new(with_zone: bool) -> Self {
        Self {
            with_zone,
            default: None,
        }
    }

    /// Whether the column was declared WITH TIME ZONE.
    #[must_use]
    pub const fn with_zone(&self) -> bool {
        self.with_zone
    }

    fn convert(raw: &Value) -> TypeResult<TypedValue> {
        match raw {
            Value::Null => Err(null_mismatch(TypeName::Time)),
            Value::String(s) => Ok(TypedValue::Time(temporal::parse_time(s)?)),
            Value::Number(n) => {
                let millis = n.as_i64().ok_or_else(|| shape_mismatch(TypeName::Time, raw))?;
                let time = temporal::from_epoch_millis(millis)?.time();
                let whole = NaiveTime::from_hms_opt(time.hour(), time.minute(), time.second())
                    .unwrap_or(time);
                Ok(TypedValue::Time(whole))
            }
            _ => Err(shape_mismatch(TypeName::Time, raw)),
        }
    }
}

/// TIMESTAMP with a fractional-second precision.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampType {
    with_zone: bool,
    precision: u8,
    default: Option<TypedValue>,
}

impl Default for TimestampType {
    fn default() -> Self {
        Self {
            with_zone: false,
            precision: temporal::DEFAULT_TIMESTAMP_PRECISION,
            default: None,
        }
    }
}

impl TimestampType {
    /// Creates a timestamp type.
    ///
    /// # Errors
    ///
    /// Returns a constraint violation if `precision` is not in `0..=9`.
    pub fn new(with_zone: bool, precision: Option<i64>) -> TypeResult<Self> {
        let precision = match precision {
            None => temporal::DEFAULT_TIMESTAMP_PRECISION,
            Some(p) if (0..=i64::from(temporal::MAX_TIMESTAMP_PRECISION)).contains(&p) => p as u8,
            Some(p) => {
                return Err(TypeError::constraint(format!(
                    "timestamp precision {p} is outside [0, {}]",
                    temporal::MAX_TIMESTAMP_PRECISION
                )));
            }
        };
        Ok(Self {
            with_zone,
            precision,
            default: None,
        })
    }

    /// Whether the column was declared WITH TIME ZONE.
    #[must_use]
    pub const fn with_zone(&self) -> bool {
        self.with_zone
    }

    /// Fractional-second digits.
    #[must_use]
    pub const fn precision(&self) -> u8 {
        self.precision
    }

    /// Current time at this type's precision.
    #[must_use]
    pub fn now(&self) -> TypedValue {
        let now = chrono::Utc::now().naive_utc();
        TypedValue::Timestamp {
            value: temporal::round_timestamp(now, self.precision),
            precision: self.precision,
        }
    }

    fn convert(&self, raw: &Value) -> TypeResult<TypedValue> {
        let value = match raw {
            Value::Null => return Err(null_mismatch(TypeName::Timestamp)),
            Value::String(s) => temporal::parse_timestamp(s)?,
            Value::Number(n) => {
                let millis = n
                    .as_i64()
                    .ok_or_else(|| shape_mismatch(TypeName::Timestamp, raw))?;
                temporal::from_epoch_millis(millis)?
            }
            _ => return Err(shape_mismatch(TypeName::Timestamp, raw)),
        };
        Ok(TypedValue::Timestamp {
            value: temporal::round_timestamp(value, self.precision),
            precision: self.precision,
        })
    }
}

/// REF: a `UUID:UUID` pointer into a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceType {
    scope: Option<String>,
}

impl ReferenceType {
    /// Creates a reference type, optionally scoped to a collection.
    #[must_use]
    pub fn new(scope: Option<String>) -> Self {
        Self { scope }
    }

    /// Collection the reference must point into.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    fn is_hyphenated_uuid(part: &str) -> bool {
        part.len() == 36 && uuid::Uuid::try_parse(part).is_ok()
    }

    fn convert(raw: &Value) -> TypeResult<TypedValue> {
        let text = match raw {
            Value::Null => return Err(null_mismatch(TypeName::Ref)),
            Value::String(s) => s.trim(),
            _ => return Err(shape_mismatch(TypeName::Ref, raw)),
        };
        match text.split_once(':') {
            Some((left, right))
                if Self::is_hyphenated_uuid(left) && Self::is_hyphenated_uuid(right) =>
            {
                Ok(TypedValue::Reference(text.to_string()))
            }
            _ => Err(TypeError::format(
                "reference",
                format!("'{text}' does not match UUID:UUID"),
            )),
        }
    }
}

/// ARRAY or MULTISET of a primitive element type.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionType {
    name: TypeName,
    element: Box<FieldType>,
}

impl CollectionType {
    /// Creates a collection type over `element`.
    ///
    /// # Errors
    ///
    /// Returns a definition error if `name` is not ARRAY/MULTISET or the
    /// element is itself a collection, or `Unsupported` for INTERVAL/ROW/XML.
    pub fn new(name: TypeName, element: TypeName) -> TypeResult<Self> {
        if name.family() != TypeFamily::Collection {
            return Err(TypeError::definition(format!("{name} is not a collection type")));
        }
        if element.family() == TypeFamily::Collection {
            return Err(TypeError::definition(format!(
                "{name} elements must be primitive, found {element}"
            )));
        }
        Ok(Self {
            name,
            element: Box::new(FieldType::plain(element)?),
        })
    }

    /// Element type name.
    #[must_use]
    pub fn element(&self) -> TypeName {
        self.element.name()
    }

    fn convert(&self, raw: &Value) -> TypeResult<TypedValue> {
        let items = match raw {
            Value::Null => return Err(null_mismatch(self.name)),
            Value::Array(items) => items,
            _ => return Err(shape_mismatch(self.name, raw)),
        };
        let mut converted: Vec<TypedValue> = Vec::with_capacity(items.len());
        for item in items {
            let value = self.element.convert(item)?;
            if self.name == TypeName::Multiset && converted.contains(&value) {
                continue;
            }
            converted.push(value);
        }
        Ok(TypedValue::List(converted))
    }
}

/// A column's semantic type and constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// Character data.
    String(StringType),
    /// Binary data.
    Binary(BinaryType),
    /// Numbers.
    Number(NumberType),
    /// Booleans.
    Boolean(BooleanType),
    /// Dates.
    Date(DateType),
    /// Times of day.
    Time(TimeType),
    /// Timestamps.
    Timestamp(TimestampType),
    /// Record references.
    Reference(ReferenceType),
    /// ARRAY/MULTISET.
    Collection(CollectionType),
}

impl FieldType {
    /// Unbounded STRING, the type given to inferred columns.
    #[must_use]
    pub fn string() -> Self {
        FieldType::String(StringType::unbounded())
    }

    /// The type for `name` with no constraints.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` for INTERVAL/ROW/XML and a definition error for
    /// ARRAY/MULTISET, which need an element type.
    pub fn plain(name: TypeName) -> TypeResult<Self> {
        Ok(match name.family() {
            TypeFamily::String => FieldType::String(StringType::new(name, None)?),
            TypeFamily::Binary => FieldType::Binary(BinaryType::new(name, None)?),
            TypeFamily::Number => FieldType::Number(NumberType::new(name, None, None)?),
            TypeFamily::Boolean => FieldType::Boolean(BooleanType::default()),
            TypeFamily::Date => FieldType::Date(DateType::default()),
            TypeFamily::Time => FieldType::Time(TimeType::default()),
            TypeFamily::Timestamp => FieldType::Timestamp(TimestampType::default()),
            TypeFamily::Reference => FieldType::Reference(ReferenceType::default()),
            TypeFamily::Collection => {
                return Err(TypeError::definition(format!("{name} requires a sub-type")));
            }
            TypeFamily::Unsupported => {
                return Err(TypeError::Unsupported {
                    name: name.canonical().to_string(),
                });
            }
        })
    }

    /// Type name of this field.
    #[must_use]
    pub fn name(&self) -> TypeName {
        match self {
            FieldType::String(t) => t.name,
            FieldType::Binary(t) => t.name,
            FieldType::Number(t) => t.name,
            FieldType::Boolean(_) => TypeName::Boolean,
            FieldType::Date(_) => TypeName::Date,
            FieldType::Time(_) => TypeName::Time,
            FieldType::Timestamp(_) => TypeName::Timestamp,
            FieldType::Reference(_) => TypeName::Ref,
            FieldType::Collection(t) => t.name,
        }
    }

    /// Family of this field's type name.
    #[must_use]
    pub fn family(&self) -> TypeFamily {
        self.name().family()
    }

    /// Whether values of this type can be named by an index entry.
    #[must_use]
    pub fn is_indexable(&self) -> bool {
        !matches!(self, FieldType::Binary(_) | FieldType::Collection(_))
    }

    /// Converts and validates a raw JSON value.
    ///
    /// # Errors
    ///
    /// Returns `Mismatch` for null or wrongly shaped input, `InvalidFormat` for
    /// malformed literals and `ConstraintViolation` for out-of-range values.
    pub fn convert(&self, raw: &Value) -> TypeResult<TypedValue> {
        match self {
            FieldType::String(t) => t.convert(raw),
            FieldType::Binary(t) => t.convert(raw),
            FieldType::Number(t) => t.convert(raw),
            FieldType::Boolean(_) => BooleanType::convert(raw),
            FieldType::Date(_) => DateType::convert(raw),
            FieldType::Time(_) => TimeType::convert(raw),
            FieldType::Timestamp(t) => t.convert(raw),
            FieldType::Reference(_) => ReferenceType::convert(raw),
            FieldType::Collection(t) => t.convert(raw),
        }
    }

    /// Converts an index key string back into a typed value.
    ///
    /// # Errors
    ///
    /// Same as [`FieldType::convert`].
    pub fn convert_key(&self, key: &str) -> TypeResult<TypedValue> {
        self.convert(&Value::String(key.to_string()))
    }

    /// Whether a default value is declared.
    #[must_use]
    pub fn has_default(&self) -> bool {
        self.default().is_some()
    }

    /// The declared default value.
    #[must_use]
    pub fn default(&self) -> Option<&TypedValue> {
        match self {
            FieldType::String(t) => t.default.as_ref(),
            FieldType::Number(t) => t.default.as_ref(),
            FieldType::Boolean(t) => t.default.as_ref(),
            FieldType::Date(t) => t.default.as_ref(),
            FieldType::Time(t) => t.default.as_ref(),
            FieldType::Timestamp(t) => t.default.as_ref(),
            FieldType::Binary(_) | FieldType::Reference(_) | FieldType::Collection(_) => None,
        }
    }

    /// Sets the default, converting it through this type.
    ///
    /// # Errors
    ///
    /// Returns a definition error for types that take no default, or the
    /// conversion error if the default is not a valid value.
    pub fn with_default(mut self, raw: &Value) -> TypeResult<Self> {
        let value = self.convert(raw)?;
        let name = self.name();
        let slot = match &mut self {
            FieldType::String(t) => &mut t.default,
            FieldType::Number(t) => &mut t.default,
            FieldType::Boolean(t) => &mut t.default,
            FieldType::Date(t) => &mut t.default,
            FieldType::Time(t) => &mut t.default,
            FieldType::Timestamp(t) => &mut t.default,
            FieldType::Binary(_) | FieldType::Reference(_) | FieldType::Collection(_) => {
                return Err(TypeError::definition(format!(
                    "{name} does not accept a default"
                )));
            }
        };
        *slot = Some(value);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decimal(p: i64, s: i64) -> FieldType {
        FieldType::Number(NumberType::new(TypeName::Decimal, Some(p), Some(s)).unwrap())
    }

    #[test]
    fn decimal_rounds_half_up() {
        let t = decimal(10, 2);
        let value = t.convert(&json!(19.999)).unwrap();
        assert_eq!(value.to_json().to_string(), "20.00");
        let value = t.convert(&json!("2.345")).unwrap();
        assert_eq!(value.to_json().to_string(), "2.35");
    }

    #[test]
    fn decimal_overflow_degrades_to_zero() {
        let t = decimal(4, 2);
        let value = t.convert(&json!(123456.7)).unwrap();
        assert_eq!(value.to_json().to_string(), "0.00");
    }

    #[test]
    fn huge_exponents_are_format_errors() {
        let t = decimal(10, 2);
        for literal in ["1e2147483647", "1e1000000000", "-1e-2147483648"] {
            assert!(matches!(
                t.convert(&json!(literal)),
                Err(TypeError::InvalidFormat { .. })
            ));
        }
        let float = FieldType::plain(TypeName::Float).unwrap();
        assert!(float.convert(&json!("1e1000000000")).is_err());
        // Still inside the literal bound, so only the precision check applies.
        assert_eq!(t.convert(&json!("1e4000")).unwrap().to_json().to_string(), "0.00");
    }

    #[test]
    fn decimal_with_precision_only_has_scale_zero() {
        let t = NumberType::new(TypeName::Numeric, Some(5), None).unwrap();
        assert_eq!(t.scale(), Some(0));
        let unconstrained = NumberType::new(TypeName::Numeric, None, None).unwrap();
        assert_eq!(unconstrained.scale(), None);
        assert_eq!(unconstrained.precision(), DEFAULT_DECIMAL_PRECISION);
    }

    #[test]
    fn numeric_definition_rules() {
        assert!(NumberType::new(TypeName::Float, Some(25), None).is_err());
        assert!(NumberType::new(TypeName::Float, Some(24), None).is_ok());
        assert!(NumberType::new(TypeName::Integer, Some(5), None).is_err());
        assert!(NumberType::new(TypeName::Float, Some(5), Some(2)).is_err());
        assert!(NumberType::new(TypeName::Decimal, Some(0), None).is_err());
        assert!(NumberType::new(TypeName::Decimal, Some(128), None).is_err());
        assert!(NumberType::new(TypeName::Decimal, Some(5), Some(6)).is_err());
        assert!(NumberType::new(TypeName::Decimal, Some(5), Some(-85)).is_err());
        assert!(NumberType::new(TypeName::Decimal, Some(5), Some(-84)).is_ok());
    }

    #[test]
    fn integers_truncate() {
        let t = FieldType::plain(TypeName::Integer).unwrap();
        assert_eq!(t.convert(&json!("12.9")).unwrap(), TypedValue::Integer(12));
        assert_eq!(t.convert(&json!(-3.7)).unwrap(), TypedValue::Integer(-3));
        let small = FieldType::plain(TypeName::SmallInt).unwrap();
        assert_eq!(
            small.convert(&json!(100_000)).unwrap(),
            TypedValue::Integer(i64::from(i16::MAX))
        );
        assert!(t.convert(&json!("twelve")).is_err());
        assert!(t.convert(&json!("NaN")).is_err());
    }

    #[test]
    fn float_rounds_significant_digits() {
        let t = FieldType::Number(NumberType::new(TypeName::Float, Some(3), None).unwrap());
        assert_eq!(t.convert(&json!(3.14159)).unwrap(), TypedValue::Float(3.14));
    }

    #[test]
    fn string_length() {
        let t = FieldType::String(StringType::new(TypeName::Varchar, Some(3)).unwrap());
        assert_eq!(t.convert(&json!("abc")).unwrap(), TypedValue::Text("abc".into()));
        assert!(matches!(
            t.convert(&json!("abcd")),
            Err(TypeError::ConstraintViolation { .. })
        ));
        assert_eq!(t.convert(&json!(12)).unwrap(), TypedValue::Text("12".into()));
        assert!(t.convert(&json!(null)).is_err());
        assert!(t.convert(&json!({"a": 1})).is_err());
    }

    #[test]
    fn binary_bytes() {
        let t = FieldType::Binary(BinaryType::new(TypeName::Blob, Some(3)).unwrap());
        assert_eq!(
            t.convert(&json!([1, -1, 255])).unwrap(),
            TypedValue::Bytes(vec![1, 255, 255])
        );
        assert!(t.convert(&json!([1, 2, 3, 4])).is_err());
        assert!(t.convert(&json!([256])).is_err());
    }

    #[test]
    fn booleans() {
        let t = FieldType::Boolean(BooleanType::default());
        assert_eq!(t.convert(&json!("TRUE")).unwrap(), TypedValue::Boolean(true));
        assert_eq!(t.convert(&json!(false)).unwrap(), TypedValue::Boolean(false));
        assert!(t.convert(&json!("yes")).is_err());
    }

    #[test]
    fn references() {
        let t = FieldType::Reference(ReferenceType::default());
        let good = "6f1c2a34-1b2c-4d5e-8f90-123456789abc:0a1b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d";
        assert_eq!(
            t.convert(&json!(good)).unwrap(),
            TypedValue::Reference(good.into())
        );
        assert!(matches!(
            t.convert(&json!("abc:def")),
            Err(TypeError::InvalidFormat { .. })
        ));
        assert!(t
            .convert(&json!("6f1c2a341b2c4d5e8f90123456789abc:0a1b2c3d4e5f4a6b8c7d9e0f1a2b3c4d"))
            .is_err());
    }

    #[test]
    fn timestamp_precision() {
        let t = FieldType::Timestamp(TimestampType::new(false, Some(3)).unwrap());
        let value = t.convert(&json!("2024-05-06 07:08:09.123456")).unwrap();
        assert_eq!(value.to_json(), json!("2024-05-06 07:08:09.123"));
        assert!(TimestampType::new(false, Some(10)).is_err());
    }

    #[test]
    fn multiset_drops_duplicates() {
        let array = FieldType::Collection(
            CollectionType::new(TypeName::Array, TypeName::Integer).unwrap(),
        );
        let multiset = FieldType::Collection(
            CollectionType::new(TypeName::Multiset, TypeName::Integer).unwrap(),
        );
        assert_eq!(array.convert(&json!([1, 1, 2])).unwrap().to_json(), json!([1, 1, 2]));
        assert_eq!(multiset.convert(&json!([1, "1", 2])).unwrap().to_json(), json!([1, 2]));
        assert!(CollectionType::new(TypeName::Array, TypeName::Multiset).is_err());
    }

    #[test]
    fn defaults() {
        let t = FieldType::string().with_default(&json!("n/a")).unwrap();
        assert!(t.has_default());
        assert_eq!(t.default(), Some(&TypedValue::Text("n/a".into())));
        assert!(FieldType::Reference(ReferenceType::default())
            .with_default(&json!("x"))
            .is_err());
        assert!(decimal(3, 0).with_default(&json!("abc")).is_err());
    }

    #[test]
    fn index_keys_convert_back() {
        let types = [
            decimal(10, 2),
            FieldType::plain(TypeName::Integer).unwrap(),
            FieldType::plain(TypeName::Double).unwrap(),
            FieldType::plain(TypeName::Date).unwrap(),
            FieldType::plain(TypeName::Timestamp).unwrap(),
            FieldType::plain(TypeName::Boolean).unwrap(),
        ];
        let raws = [
            json!("12.5"),
            json!(42),
            json!(0.25),
            json!("2024-02-29"),
            json!("2024-02-29 10:00:00.5"),
            json!(true),
        ];
        for (t, raw) in types.iter().zip(raws.iter()) {
            let value = t.convert(raw).unwrap();
            let key = value.index_key().unwrap();
            assert_eq!(t.convert_key(&key).unwrap(), value);
        }

        let unscaled = crate::descriptor::field_type_from_string("DECIMAL").unwrap();
        let value = unscaled.convert(&json!("20.0")).unwrap();
        let key = value.index_key().unwrap();
        assert_eq!(key, "20");
        assert_eq!(
            unscaled.convert_key(&key).unwrap().partial_cmp(&value),
            Some(std::cmp::Ordering::Equal)
        );
    }
}
