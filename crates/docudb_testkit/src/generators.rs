//! Property-based test generators using proptest.
//!
//! Provides strategies for names, record bodies and numeric literals that
//! respect the rules the engine enforces.

use docudb_core::Record;
use proptest::prelude::*;
use serde_json::Value;

/// Strategy for datastore and collection names the engine accepts.
pub fn identifier_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}")
        .expect("Invalid regex")
        .prop_filter("del is reserved for archives", |s| s != "del")
}

/// Strategy for column names, including characters that need escaping on disk.
pub fn column_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9 _./%-]{0,20}").expect("Invalid regex")
}

/// Strategy for arbitrary non-empty strings, for file name encoding.
pub fn raw_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex(".{1,40}").expect("Invalid regex")
}

/// Strategy for order statuses.
pub fn status_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["new", "paid", "shipped", "cancelled"]).prop_map(str::to_string)
}

/// Strategy for scalar JSON values stored in flexible columns.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        prop::string::string_regex("[a-z0-9 ]{0,12}")
            .expect("Invalid regex")
            .prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
    ]
}

/// Strategy for flat record bodies keyed by generated column names.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    prop::collection::btree_map(column_name_strategy(), scalar_value_strategy(), 0..6)
        .prop_map(|fields| fields.into_iter().collect())
}

/// Strategy for `shop.orders` bodies with a status and a two-digit total.
pub fn order_strategy() -> impl Strategy<Value = Record> {
    (status_strategy(), 0u32..100_000).prop_map(|(status, cents)| {
        let mut record = Record::new();
        record.insert("status".into(), Value::from(status));
        record.insert(
            "total".into(),
            Value::from(format!("{}.{:02}", cents / 100, cents % 100)),
        );
        record
    })
}

/// Strategy for plain decimal literals with up to `integer_digits` digits
/// before the point and up to `fraction_digits` after it.
pub fn decimal_literal_strategy(
    integer_digits: usize,
    fraction_digits: usize,
) -> impl Strategy<Value = String> {
    let pattern = if fraction_digits == 0 {
        format!("-?[1-9][0-9]{{0,{}}}", integer_digits.saturating_sub(1))
    } else {
        format!(
            "-?[1-9][0-9]{{0,{}}}\\.[0-9]{{1,{fraction_digits}}}",
            integer_digits.saturating_sub(1)
        )
    };
    prop::string::string_regex(&pattern).expect("Invalid regex")
}

#[cfg(test)]
mod tests {
    use super::*;
    use docudb_core::naming::is_valid_identifier;

    proptest! {
        #[test]
        fn identifiers_are_valid(name in identifier_strategy()) {
            prop_assert!(is_valid_identifier(&name));
        }

        #[test]
        fn orders_have_both_fields(order in order_strategy()) {
            prop_assert!(order["status"].is_string());
            prop_assert!(order["total"].as_str().unwrap().contains('.'));
        }

        #[test]
        fn decimal_literals_respect_digit_limits(literal in decimal_literal_strategy(3, 2)) {
            let digits = literal.trim_start_matches('-');
            let (int_part, frac_part) = digits.split_once('.').unwrap();
            prop_assert!(int_part.len() <= 3);
            prop_assert!(!frac_part.is_empty() && frac_part.len() <= 2);
        }
    }
}
