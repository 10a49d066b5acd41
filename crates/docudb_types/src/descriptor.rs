//! Structured and compact field type declarations.
//!
//! The structured descriptor is what schemas persist:
//!
//! ```json
//! {"type": "DECIMAL", "precision": 10, "scale": 2, "default": 0}
//! ```
//!
//! The compact form is what a DDL-style caller writes: `DECIMAL(10,2)`,
//! `VARCHAR(4K)`, `TIMESTAMP(with-zone,3)`, `ARRAY(INTEGER)`.

use crate::error::{TypeError, TypeResult};
use crate::field::{
    BinaryType, CollectionType, FieldType, NumberType, ReferenceType, StringType, TimeType,
    TimestampType,
};
use crate::names::{TypeFamily, TypeName};
use serde_json::{Map, Value};

const KEY_TYPE: &str = "type";
const KEY_LENGTH: &str = "length";
const KEY_PRECISION: &str = "precision";
const KEY_SCALE: &str = "scale";
const KEY_WITH_ZONE: &str = "with-zone";
const KEY_SCOPE: &str = "scope";
const KEY_SUB_TYPE: &str = "sub-type";
const KEY_DEFAULT: &str = "default";

/// Length value meaning "no maximum".
pub const UNBOUNDED_LENGTH: i64 = -1;

/// Parses a length literal: digits with an optional `K`, `M` or `G` suffix,
/// or `-1` for unbounded.
///
/// # Errors
///
/// Returns `InvalidFormat` for anything else, including overflow.
pub fn parse_length(literal: &str) -> TypeResult<Option<u64>> {
    let text = literal.trim();
    if text == "-1" {
        return Ok(None);
    }
    let invalid = || TypeError::format("length", format!("'{literal}'"));
    let (digits, multiplier) = match text.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('K') => (&text[..text.len() - 1], 1u64 << 10),
        Some('M') => (&text[..text.len() - 1], 1u64 << 20),
        Some('G') => (&text[..text.len() - 1], 1u64 << 30),
        _ => (text, 1),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .map(Some)
        .ok_or_else(invalid)
}

fn length_of(value: Option<&Value>) -> TypeResult<Option<u64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => parse_length(s),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(UNBOUNDED_LENGTH) => Ok(None),
            Some(n) if n > 0 => Ok(Some(n as u64)),
            Some(0) => Ok(Some(0)),
            _ => Err(TypeError::constraint(format!("invalid length {n}"))),
        },
        Some(other) => Err(TypeError::format("length", other.to_string())),
    }
}

fn int_of(obj: &Map<String, Value>, key: &str) -> TypeResult<Option<i64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| TypeError::format("number", format!("{key} {n} is not an integer"))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TypeError::format("number", format!("{key} '{s}' is not an integer"))),
        Some(other) => Err(TypeError::format("number", format!("{key} {other}"))),
    }
}

fn bool_of(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Builds a field type from its structured descriptor.
///
/// # Errors
///
/// Returns `UnknownType`/`Unsupported` for bad type names and constraint or
/// definition errors for invalid constraints or defaults.
pub fn field_type_from_descriptor(descriptor: &Value) -> TypeResult<FieldType> {
    let obj = descriptor
        .as_object()
        .ok_or_else(|| TypeError::definition(format!("descriptor {descriptor} is not an object")))?;
    let name: TypeName = obj
        .get(KEY_TYPE)
        .and_then(Value::as_str)
        .ok_or_else(|| TypeError::definition("descriptor has no type"))?
        .parse()?;

    let field = match name.family() {
        TypeFamily::String => FieldType::String(StringType::new(name, length_of(obj.get(KEY_LENGTH))?)?),
        TypeFamily::Binary => FieldType::Binary(BinaryType::new(name, length_of(obj.get(KEY_LENGTH))?)?),
        TypeFamily::Number => FieldType::Number(NumberType::new(
            name,
            int_of(obj, KEY_PRECISION)?,
            int_of(obj, KEY_SCALE)?,
        )?),
        TypeFamily::Time => FieldType::Time(TimeType::new(bool_of(obj, KEY_WITH_ZONE))),
        TypeFamily::Timestamp => FieldType::Timestamp(TimestampType::new(
            bool_of(obj, KEY_WITH_ZONE),
            int_of(obj, KEY_PRECISION)?,
        )?),
        TypeFamily::Reference => FieldType::Reference(ReferenceType::new(
            obj.get(KEY_SCOPE).and_then(Value::as_str).map(str::to_string),
        )),
        TypeFamily::Collection => {
            let element: TypeName = obj
                .get(KEY_SUB_TYPE)
                .and_then(Value::as_str)
                .ok_or_else(|| TypeError::definition(format!("{name} requires a sub-type")))?
                .parse()?;
            FieldType::Collection(CollectionType::new(name, element)?)
        }
        TypeFamily::Boolean | TypeFamily::Date | TypeFamily::Unsupported => FieldType::plain(name)?,
    };

    match obj.get(KEY_DEFAULT) {
        Some(default) if !default.is_null() => field.with_default(default),
        _ => Ok(field),
    }
}

fn split_compact(compact: &str) -> TypeResult<(&str, Vec<&str>)> {
    let text = compact.trim();
    let Some(open) = text.find('(') else {
        return Ok((text, Vec::new()));
    };
    let inner = text[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| TypeError::definition(format!("unbalanced parentheses in '{compact}'")))?;
    let args: Vec<&str> = inner.split(',').map(str::trim).collect();
    if args.iter().any(|a| a.is_empty()) {
        return Err(TypeError::definition(format!("empty constraint in '{compact}'")));
    }
    Ok((text[..open].trim(), args))
}

fn int_arg(arg: &str, what: &'static str) -> TypeResult<i64> {
    arg.parse()
        .map_err(|_| TypeError::format(what, format!("'{arg}' is not an integer")))
}

fn arity_error(name: TypeName, expected: &str, found: usize) -> TypeError {
    TypeError::definition(format!(
        "{name} takes {expected} constraint(s), found {found}"
    ))
}

/// Builds a field type from its compact string form, `NAME` or `NAME(c1[,c2])`.
///
/// # Errors
///
/// Returns a definition error when the number of constraints does not fit the
/// type, plus the errors of [`field_type_from_descriptor`].
pub fn field_type_from_string(compact: &str) -> TypeResult<FieldType> {
    let (name, args) = split_compact(compact)?;
    let name: TypeName = name.parse()?;

    match name.family() {
        TypeFamily::String => {
            let length = match args.as_slice() {
                [length] => parse_length(length)?,
                [] if !name.requires_length() => None,
                _ if name.requires_length() => return Err(arity_error(name, "exactly 1", args.len())),
                _ => return Err(arity_error(name, "at most 1", args.len())),
            };
            Ok(FieldType::String(StringType::new(name, length)?))
        }
        TypeFamily::Binary => {
            let length = match args.as_slice() {
                [] => None,
                [length] => parse_length(length)?,
                _ => return Err(arity_error(name, "at most 1", args.len())),
            };
            Ok(FieldType::Binary(BinaryType::new(name, length)?))
        }
        TypeFamily::Number => {
            let (precision, scale) = match args.as_slice() {
                [] => (None, None),
                [p] => (Some(int_arg(p, "precision")?), None),
                [p, s] => (Some(int_arg(p, "precision")?), Some(int_arg(s, "scale")?)),
                _ => return Err(arity_error(name, "1 or 2", args.len())),
            };
            Ok(FieldType::Number(NumberType::new(name, precision, scale)?))
        }
        TypeFamily::Time => match args.as_slice() {
            [] => Ok(FieldType::Time(TimeType::new(false))),
            [zone] if zone.eq_ignore_ascii_case(KEY_WITH_ZONE) => {
                Ok(FieldType::Time(TimeType::new(true)))
            }
            _ => Err(arity_error(name, "only with-zone as", args.len())),
        },
        TypeFamily::Timestamp => {
            let (with_zone, precision) = match args.as_slice() {
                [] => (false, None),
                [zone] if zone.eq_ignore_ascii_case(KEY_WITH_ZONE) => (true, None),
                [p] => (false, Some(int_arg(p, "precision")?)),
                [zone, p] if zone.eq_ignore_ascii_case(KEY_WITH_ZONE) => {
                    (true, Some(int_arg(p, "precision")?))
                }
                _ => return Err(arity_error(name, "(p), (with-zone) or (with-zone,p) as", args.len())),
            };
            Ok(FieldType::Timestamp(TimestampType::new(with_zone, precision)?))
        }
        TypeFamily::Reference => match args.as_slice() {
            [] => Ok(FieldType::Reference(ReferenceType::new(None))),
            [scope] => Ok(FieldType::Reference(ReferenceType::new(Some((*scope).to_string())))),
            _ => Err(arity_error(name, "at most 1", args.len())),
        },
        TypeFamily::Collection => match args.as_slice() {
            [element] => Ok(FieldType::Collection(CollectionType::new(name, element.parse()?)?)),
            _ => Err(arity_error(name, "exactly 1", args.len())),
        },
        TypeFamily::Boolean | TypeFamily::Date | TypeFamily::Unsupported => {
            if !args.is_empty() {
                return Err(arity_error(name, "no", args.len()));
            }
            FieldType::plain(name)
        }
    }
}

impl FieldType {
    /// Structured descriptor persisted in schemas.
    #[must_use]
    pub fn to_descriptor(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(KEY_TYPE.into(), Value::from(self.name().canonical()));
        match self {
            FieldType::String(t) => {
                let length = t.max_length().map_or(UNBOUNDED_LENGTH, |l| l as i64);
                obj.insert(KEY_LENGTH.into(), Value::from(length));
            }
            FieldType::Binary(t) => {
                let length = t.max_length().map_or(UNBOUNDED_LENGTH, |l| l as i64);
                obj.insert(KEY_LENGTH.into(), Value::from(length));
            }
            FieldType::Number(t) => {
                if let Some(precision) = t.declared_precision() {
                    obj.insert(KEY_PRECISION.into(), Value::from(precision));
                }
                if let Some(scale) = t.scale() {
                    obj.insert(KEY_SCALE.into(), Value::from(scale));
                }
            }
            FieldType::Time(t) => {
                obj.insert(KEY_WITH_ZONE.into(), Value::from(t.with_zone()));
            }
            FieldType::Timestamp(t) => {
                obj.insert(KEY_PRECISION.into(), Value::from(t.precision()));
                obj.insert(KEY_WITH_ZONE.into(), Value::from(t.with_zone()));
            }
            FieldType::Reference(t) => {
                if let Some(scope) = t.scope() {
                    obj.insert(KEY_SCOPE.into(), Value::from(scope));
                }
            }
            FieldType::Collection(t) => {
                obj.insert(KEY_SUB_TYPE.into(), Value::from(t.element().canonical()));
            }
            FieldType::Boolean(_) | FieldType::Date(_) => {}
        }
        if let Some(default) = self.default() {
            obj.insert(KEY_DEFAULT.into(), default.to_json());
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lengths() {
        assert_eq!(parse_length("10").unwrap(), Some(10));
        assert_eq!(parse_length("4k").unwrap(), Some(4096));
        assert_eq!(parse_length("2M").unwrap(), Some(2 << 20));
        assert_eq!(parse_length("1G").unwrap(), Some(1 << 30));
        assert_eq!(parse_length("-1").unwrap(), None);
        assert!(parse_length("K").is_err());
        assert!(parse_length("ten").is_err());
    }

    #[test]
    fn compact_forms() {
        let t = field_type_from_string("varchar(4K)").unwrap();
        assert_eq!(t.to_descriptor(), json!({"type": "VARCHAR", "length": 4096}));

        let t = field_type_from_string("DECIMAL(10, 2)").unwrap();
        assert_eq!(
            t.to_descriptor(),
            json!({"type": "DECIMAL", "precision": 10, "scale": 2})
        );

        let t = field_type_from_string("double precision").unwrap();
        assert_eq!(t.name(), TypeName::DoublePrecision);

        let t = field_type_from_string("TIMESTAMP(with-zone,3)").unwrap();
        assert_eq!(
            t.to_descriptor(),
            json!({"type": "TIMESTAMP", "precision": 3, "with-zone": true})
        );

        let t = field_type_from_string("MULTISET(integer)").unwrap();
        assert_eq!(
            t.to_descriptor(),
            json!({"type": "MULTISET", "sub-type": "INTEGER"})
        );
    }

    #[test]
    fn compact_arity() {
        assert!(field_type_from_string("CHAR").is_err());
        assert!(field_type_from_string("CHAR(1,2)").is_err());
        assert!(field_type_from_string("CLOB").is_ok());
        assert!(field_type_from_string("DECIMAL(1,2,3)").is_err());
        assert!(field_type_from_string("INTEGER(5)").is_err());
        assert!(field_type_from_string("ARRAY").is_err());
        assert!(field_type_from_string("VARCHAR(").is_err());
        assert!(field_type_from_string("VARCHAR()").is_err());
        assert!(matches!(
            field_type_from_string("XML"),
            Err(TypeError::Unsupported { .. })
        ));
    }

    #[test]
    fn descriptor_round_trip() {
        let descriptors = [
            json!({"type": "STRING", "length": -1, "default": "none"}),
            json!({"type": "BLOB", "length": 16}),
            json!({"type": "NUMERIC"}),
            json!({"type": "FLOAT", "precision": 10}),
            json!({"type": "DECIMAL", "precision": 10, "scale": 2, "default": 1.50}),
            json!({"type": "BOOLEAN", "default": true}),
            json!({"type": "TIME", "with-zone": true}),
            json!({"type": "REF", "scope": "orders"}),
            json!({"type": "ARRAY", "sub-type": "DATE"}),
        ];
        for descriptor in descriptors {
            let field = field_type_from_descriptor(&descriptor).unwrap();
            let again = field_type_from_descriptor(&field.to_descriptor()).unwrap();
            assert_eq!(field, again);
        }
    }

    #[test]
    fn descriptor_defaults_are_converted() {
        let field = field_type_from_descriptor(
            &json!({"type": "DECIMAL", "precision": 5, "scale": 2, "default": "1.005"}),
        )
        .unwrap();
        assert_eq!(field.to_descriptor()["default"].to_string(), "1.01");
    }

    #[test]
    fn descriptor_rejects_bad_input() {
        assert!(field_type_from_descriptor(&json!("STRING")).is_err());
        assert!(field_type_from_descriptor(&json!({"length": 3})).is_err());
        assert!(field_type_from_descriptor(&json!({"type": "VARCHAR", "length": 0})).is_err());
        assert!(field_type_from_descriptor(&json!({"type": "FLOAT", "precision": 30})).is_err());
        assert!(field_type_from_descriptor(&json!({"type": "MONEY"})).is_err());
    }
}
