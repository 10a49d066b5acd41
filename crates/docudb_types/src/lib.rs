//! # DocuDB Types
//!
//! The field type system for DocuDB.
//!
//! This crate provides:
//! - SQL type names and their families ([`TypeName`], [`TypeFamily`])
//! - Field types with constraint validation ([`FieldType`])
//! - Conversion of raw JSON into typed values ([`TypedValue`])
//! - Structured and compact type declarations
//! - An exact decimal with HALF_UP rounding used for numeric precision
//!
//! ## Usage
//!
//! ```
//! use docudb_types::field_type_from_string;
//! use serde_json::json;
//!
//! let total = field_type_from_string("DECIMAL(10,2)").unwrap();
//! let value = total.convert(&json!(19.999)).unwrap();
//! assert_eq!(value.to_json().to_string(), "20.00");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decimal;
mod descriptor;
mod error;
mod field;
mod names;
pub mod temporal;
mod value;

pub use decimal::Decimal;
pub use descriptor::{
    field_type_from_descriptor, field_type_from_string, parse_length, UNBOUNDED_LENGTH,
};
pub use error::{TypeError, TypeResult};
pub use field::{
    BinaryType, BooleanType, CollectionType, DateType, FieldType, NumberType, ReferenceType,
    StringType, TimeType, TimestampType, DEFAULT_DECIMAL_PRECISION, DEFAULT_FLOAT_PRECISION,
    MAX_PRECISION, MAX_SCALE, MIN_SCALE,
};
pub use names::{TypeFamily, TypeName};
pub use value::TypedValue;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn numeric_literal() -> impl Strategy<Value = String> {
        (any::<bool>(), "[0-9]{1,12}", proptest::option::of("[0-9]{1,8}")).prop_map(
            |(negative, int_part, frac)| {
                let sign = if negative { "-" } else { "" };
                match frac {
                    Some(frac) => format!("{sign}{int_part}.{frac}"),
                    None => format!("{sign}{int_part}"),
                }
            },
        )
    }

    fn decimal_type() -> impl Strategy<Value = FieldType> {
        (1i64..=38).prop_flat_map(|precision| {
            (Just(precision), 0i64..=precision).prop_map(|(precision, scale)| {
                FieldType::Number(
                    NumberType::new(TypeName::Decimal, Some(precision), Some(scale)).unwrap(),
                )
            })
        })
    }

    proptest! {
        #[test]
        fn decimal_scale_never_exceeds_declared(field in decimal_type(), literal in numeric_literal()) {
            let FieldType::Number(number) = &field else { unreachable!() };
            let declared = number.scale().unwrap();
            match field.convert(&Value::String(literal)).unwrap() {
                TypedValue::Decimal(d) => prop_assert!(d.scale() <= declared),
                other => prop_assert!(false, "unexpected {other:?}"),
            }
        }

        #[test]
        fn decimal_convert_is_idempotent(field in decimal_type(), literal in numeric_literal()) {
            let once = field.convert(&Value::String(literal)).unwrap();
            let twice = field.convert(&once.to_json()).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn integer_convert_is_idempotent(literal in numeric_literal()) {
            let field = FieldType::plain(TypeName::BigInt).unwrap();
            let once = field.convert(&Value::String(literal)).unwrap();
            let twice = field.convert(&once.to_json()).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn string_convert_is_idempotent(text in ".{0,40}") {
            let field = field_type_from_string("VARCHAR(64)").unwrap();
            let once = field.convert(&json!(text)).unwrap();
            let twice = field.convert(&once.to_json()).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn timestamp_convert_is_idempotent(
            precision in 0i64..=9,
            millis in 0i64..4_102_444_800_000,
            nanos in 0u32..1_000_000_000,
        ) {
            let field = FieldType::Timestamp(TimestampType::new(false, Some(precision)).unwrap());
            let base = temporal::from_epoch_millis(millis).unwrap();
            let literal = format!("{}.{nanos:09}", temporal::format_timestamp(base, 0));
            let once = field.convert(&json!(literal)).unwrap();
            let twice = field.convert(&once.to_json()).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
