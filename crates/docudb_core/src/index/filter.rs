//! Comparison filters evaluated against decoded index values.
//!
//! Index areas name their entries by a value's index key. A range query walks
//! those names, converts each back through the column's field type and tests
//! the typed value, so record bodies are never opened just to filter.

use crate::error::{CoreError, CoreResult};
use docudb_types::{FieldType, TypedValue};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a pattern query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Less than.
    Lt,
    /// Less than or equal.
    LtEq,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    GtEq,
    /// Member of a list.
    In,
    /// Not a member of a list.
    NotIn,
    /// SQL LIKE with `%` and `_` wildcards.
    Like,
}

impl Operator {
    /// Canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Neq => "NEQ",
            Operator::Lt => "LT",
            Operator::LtEq => "LTEQ",
            Operator::Gt => "GT",
            Operator::GtEq => "GTEQ",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::Like => "LIKE",
        }
    }

    /// Whether matches can be found by exact value lookup.
    #[must_use]
    pub const fn is_point_lookup(self) -> bool {
        matches!(self, Operator::Eq | Operator::In)
    }
}

impl FromStr for Operator {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Ok(match normalized.as_str() {
            "EQ" | "=" | "==" => Operator::Eq,
            "NEQ" | "NE" | "!=" | "<>" => Operator::Neq,
            "LT" | "<" => Operator::Lt,
            "LTEQ" | "LTE" | "<=" => Operator::LtEq,
            "GT" | ">" => Operator::Gt,
            "GTEQ" | "GTE" | ">=" => Operator::GtEq,
            "IN" => Operator::In,
            "NOT_IN" | "NOTIN" | "NIN" => Operator::NotIn,
            "LIKE" => Operator::Like,
            _ => {
                return Err(CoreError::InvalidOperator {
                    operator: s.to_string(),
                })
            }
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled SQL LIKE pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikePattern {
    tokens: Vec<LikeToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeToken {
    Literal(char),
    AnyOne,
    AnyMany,
}

impl LikePattern {
    /// Compiles `pattern`. A backslash escapes the next character.
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let mut tokens = Vec::new();
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            let token = match c {
                '%' => LikeToken::AnyMany,
                '_' => LikeToken::AnyOne,
                '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
                other => LikeToken::Literal(other),
            };
            if token == LikeToken::AnyMany && tokens.last() == Some(&LikeToken::AnyMany) {
                continue;
            }
            tokens.push(token);
        }
        Self { tokens }
    }

    /// Whether `text` matches the whole pattern.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();
        let (mut t, mut p) = (0, 0);
        let mut backtrack: Option<(usize, usize)> = None;
        while t < text.len() {
            match self.tokens.get(p) {
                Some(LikeToken::AnyMany) => {
                    backtrack = Some((p, t));
                    p += 1;
                }
                Some(LikeToken::AnyOne) => {
                    p += 1;
                    t += 1;
                }
                Some(LikeToken::Literal(c)) if *c == text[t] => {
                    p += 1;
                    t += 1;
                }
                _ => match backtrack {
                    Some((star, matched)) => {
                        p = star + 1;
                        t = matched + 1;
                        backtrack = Some((star, matched + 1));
                    }
                    None => return false,
                },
            }
        }
        self.tokens[p..].iter().all(|t| *t == LikeToken::AnyMany)
    }
}

/// An operator bound to converted reference values.
#[derive(Debug, Clone)]
pub struct Predicate {
    operator: Operator,
    values: Vec<TypedValue>,
    like: Option<LikePattern>,
}

impl Predicate {
    /// Converts `reference` through `field_type` and binds it to `operator`.
    ///
    /// IN and NOT_IN take an array (a scalar is a one-element list); LIKE
    /// takes a string pattern.
    ///
    /// # Errors
    ///
    /// Returns a `DataType*` error if a reference value does not convert.
    pub fn new(field_type: &FieldType, operator: Operator, reference: &Value) -> CoreResult<Self> {
        if operator == Operator::Like {
            let pattern = match reference {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(Self {
                operator,
                values: Vec::new(),
                like: Some(LikePattern::new(&pattern)),
            });
        }
        let raw: Vec<&Value> = match (operator, reference) {
            (Operator::In | Operator::NotIn, Value::Array(items)) => items.iter().collect(),
            _ => vec![reference],
        };
        let values = raw
            .into_iter()
            .map(|v| field_type.convert(v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            operator,
            values,
            like: None,
        })
    }

    /// The operator.
    #[must_use]
    pub const fn operator(&self) -> Operator {
        self.operator
    }

    /// Index keys of the reference values, for point lookups.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.values.iter().filter_map(TypedValue::index_key).collect()
    }

    /// Tests a typed value.
    #[must_use]
    pub fn matches(&self, value: &TypedValue) -> bool {
        let compare = |reference: &TypedValue| value.partial_cmp(reference);
        let first = self.values.first();
        match self.operator {
            Operator::Eq => first.is_some_and(|r| compare(r) == Some(Ordering::Equal)),
            Operator::Neq => first.is_some_and(|r| compare(r) != Some(Ordering::Equal)),
            Operator::Lt => first.is_some_and(|r| compare(r) == Some(Ordering::Less)),
            Operator::LtEq => first.is_some_and(|r| {
                matches!(compare(r), Some(Ordering::Less | Ordering::Equal))
            }),
            Operator::Gt => first.is_some_and(|r| compare(r) == Some(Ordering::Greater)),
            Operator::GtEq => first.is_some_and(|r| {
                matches!(compare(r), Some(Ordering::Greater | Ordering::Equal))
            }),
            Operator::In => self
                .values
                .iter()
                .any(|r| compare(r) == Some(Ordering::Equal)),
            Operator::NotIn => !self
                .values
                .iter()
                .any(|r| compare(r) == Some(Ordering::Equal)),
            Operator::Like => match (&self.like, value.index_key()) {
                (Some(pattern), Some(key)) => pattern.matches(&key),
                _ => false,
            },
        }
    }

    /// Decodes an index key through `field_type` and tests it.
    ///
    /// Keys that no longer convert (after a retype) never match.
    #[must_use]
    pub fn matches_key(&self, field_type: &FieldType, key: &str) -> bool {
        if self.operator == Operator::Like {
            return self.like.as_ref().is_some_and(|p| p.matches(key));
        }
        field_type
            .convert_key(key)
            .is_ok_and(|value| self.matches(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docudb_types::field_type_from_string;
    use serde_json::json;

    #[test]
    fn operators_parse() {
        assert_eq!(">=".parse::<Operator>().unwrap(), Operator::GtEq);
        assert_eq!("not in".parse::<Operator>().unwrap(), Operator::NotIn);
        assert_eq!("like".parse::<Operator>().unwrap(), Operator::Like);
        let err = "BETWEEN".parse::<Operator>().unwrap_err();
        assert_eq!(err.code(), "INVALID_OPERATOR");
    }

    #[test]
    fn like_patterns() {
        assert!(LikePattern::new("ne%").matches("new"));
        assert!(LikePattern::new("%w").matches("new"));
        assert!(LikePattern::new("n_w").matches("new"));
        assert!(LikePattern::new("%").matches(""));
        assert!(LikePattern::new("a%b%c").matches("axxbyyc"));
        assert!(!LikePattern::new("a%b%c").matches("axxbyy"));
        assert!(LikePattern::new("100\\%").matches("100%"));
        assert!(!LikePattern::new("100\\%").matches("1000"));
    }

    #[test]
    fn numeric_ranges_use_typed_order() {
        let ty = field_type_from_string("INTEGER").unwrap();
        let gt = Predicate::new(&ty, Operator::Gt, &json!(9)).unwrap();
        assert!(gt.matches_key(&ty, "10"));
        assert!(!gt.matches_key(&ty, "9"));
        assert!(!gt.matches_key(&ty, "not-a-number"));

        let lte = Predicate::new(&ty, Operator::LtEq, &json!("9")).unwrap();
        assert!(lte.matches_key(&ty, "9"));
        assert!(lte.matches_key(&ty, "-3"));
    }

    #[test]
    fn decimal_equality_ignores_trailing_zeros() {
        let ty = field_type_from_string("DECIMAL(10,2)").unwrap();
        let eq = Predicate::new(&ty, Operator::Eq, &json!(20)).unwrap();
        assert!(eq.matches_key(&ty, "20.00"));
        assert!(eq.matches_key(&ty, "20"));
        assert_eq!(eq.keys(), ["20"]);
    }

    #[test]
    fn membership() {
        let ty = FieldType::string();
        let within = Predicate::new(&ty, Operator::In, &json!(["new", "paid"])).unwrap();
        assert!(within.matches_key(&ty, "paid"));
        assert!(!within.matches_key(&ty, "void"));
        assert_eq!(within.keys(), ["new", "paid"]);

        let outside = Predicate::new(&ty, Operator::NotIn, &json!(["new"])).unwrap();
        assert!(outside.matches_key(&ty, "paid"));
        assert!(!outside.matches_key(&ty, "new"));
    }

    #[test]
    fn dates_compare_chronologically() {
        let ty = field_type_from_string("DATE").unwrap();
        let before = Predicate::new(&ty, Operator::Lt, &json!("2024-02-01")).unwrap();
        assert!(before.matches_key(&ty, "2024-01-31"));
        assert!(!before.matches_key(&ty, "2024-10-01"));
    }

    #[test]
    fn bad_reference_is_a_type_error() {
        let ty = field_type_from_string("DATE").unwrap();
        let err = Predicate::new(&ty, Operator::Eq, &json!("yesterday")).unwrap_err();
        assert_eq!(err.code(), "DATA_TYPE_FORMAT_INVALID");
    }
}
