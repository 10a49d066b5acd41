//! SQL type names and their families.

use crate::error::{TypeError, TypeResult};
use std::fmt;
use std::str::FromStr;

/// Broad family a [`TypeName`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    /// Character data.
    String,
    /// Binary large objects.
    Binary,
    /// Integers, floating point and fixed point numbers.
    Number,
    /// True/false.
    Boolean,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    Timestamp,
    /// `UUID:UUID` record reference.
    Reference,
    /// ARRAY or MULTISET of a primitive type.
    Collection,
    /// Recognised but not implemented (INTERVAL, ROW, XML).
    Unsupported,
}

macro_rules! type_names {
    ($($variant:ident => $canonical:literal, $sql:literal, $family:ident;)*) => {
        /// Every type name understood by the type system.
        ///
        /// Names are matched case-insensitively, and spaces and underscores are
        /// interchangeable (`double precision` == `DOUBLE_PRECISION`).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(missing_docs)]
        pub enum TypeName {
            $($variant,)*
        }

        impl TypeName {
            /// All known names.
            pub const ALL: &'static [TypeName] = &[$(TypeName::$variant,)*];

            /// Canonical upper-case, underscore-separated name used in descriptors.
            #[must_use]
            pub const fn canonical(self) -> &'static str {
                match self {
                    $(TypeName::$variant => $canonical,)*
                }
            }

            /// SQL spelling, with spaces.
            #[must_use]
            pub const fn sql(self) -> &'static str {
                match self {
                    $(TypeName::$variant => $sql,)*
                }
            }

            /// Family this name belongs to.
            #[must_use]
            pub const fn family(self) -> TypeFamily {
                match self {
                    $(TypeName::$variant => TypeFamily::$family,)*
                }
            }
        }
    };
}

type_names! {
    Char => "CHAR", "CHAR", String;
    Character => "CHARACTER", "CHARACTER", String;
    CharacterVarying => "CHARACTER_VARYING", "CHARACTER VARYING", String;
    CharVarying => "CHAR_VARYING", "CHAR VARYING", String;
    Varchar => "VARCHAR", "VARCHAR", String;
    CharacterLargeObject => "CHARACTER_LARGE_OBJECT", "CHARACTER LARGE OBJECT", String;
    CharLargeObject => "CHAR_LARGE_OBJECT", "CHAR LARGE OBJECT", String;
    Clob => "CLOB", "CLOB", String;
    NationalCharacter => "NATIONAL_CHARACTER", "NATIONAL CHARACTER", String;
    NationalChar => "NATIONAL_CHAR", "NATIONAL CHAR", String;
    Nchar => "NCHAR", "NCHAR", String;
    NationalCharacterVarying => "NATIONAL_CHARACTER_VARYING", "NATIONAL CHARACTER VARYING", String;
    NationalCharVarying => "NATIONAL_CHAR_VARYING", "NATIONAL CHAR VARYING", String;
    NcharVarying => "NCHAR_VARYING", "NCHAR VARYING", String;
    NationalCharacterLargeObject => "NATIONAL_CHARACTER_LARGE_OBJECT", "NATIONAL CHARACTER LARGE OBJECT", String;
    NcharLargeObject => "NCHAR_LARGE_OBJECT", "NCHAR LARGE OBJECT", String;
    Nclob => "NCLOB", "NCLOB", String;
    String => "STRING", "STRING", String;
    BinaryLargeObject => "BINARY_LARGE_OBJECT", "BINARY LARGE OBJECT", Binary;
    Blob => "BLOB", "BLOB", Binary;
    Numeric => "NUMERIC", "NUMERIC", Number;
    Decimal => "DECIMAL", "DECIMAL", Number;
    Dec => "DEC", "DEC", Number;
    SmallInt => "SMALLINT", "SMALLINT", Number;
    Integer => "INTEGER", "INTEGER", Number;
    Int => "INT", "INT", Number;
    BigInt => "BIGINT", "BIGINT", Number;
    Long => "LONG", "LONG", Number;
    Float => "FLOAT", "FLOAT", Number;
    Real => "REAL", "REAL", Number;
    Double => "DOUBLE", "DOUBLE", Number;
    DoublePrecision => "DOUBLE_PRECISION", "DOUBLE PRECISION", Number;
    Boolean => "BOOLEAN", "BOOLEAN", Boolean;
    Date => "DATE", "DATE", Date;
    Time => "TIME", "TIME", Time;
    Timestamp => "TIMESTAMP", "TIMESTAMP", Timestamp;
    Ref => "REF", "REF", Reference;
    Array => "ARRAY", "ARRAY", Collection;
    Multiset => "MULTISET", "MULTISET", Collection;
    Interval => "INTERVAL", "INTERVAL", Unsupported;
    Row => "ROW", "ROW", Unsupported;
    Xml => "XML", "XML", Unsupported;
}

impl TypeName {
    /// Whether a length constraint is mandatory in the compact string form.
    #[must_use]
    pub const fn requires_length(self) -> bool {
        matches!(
            self,
            TypeName::Char
                | TypeName::Character
                | TypeName::CharacterVarying
                | TypeName::CharVarying
                | TypeName::Varchar
                | TypeName::NationalChar
                | TypeName::NationalCharacter
                | TypeName::Nchar
                | TypeName::NationalCharacterVarying
                | TypeName::NationalCharVarying
                | TypeName::NcharVarying
        )
    }

    /// Whether this is one of the fixed-point names (NUMERIC, DECIMAL, DEC).
    #[must_use]
    pub const fn is_fixed_point(self) -> bool {
        matches!(self, TypeName::Numeric | TypeName::Decimal | TypeName::Dec)
    }

    /// Whether this is an integer name.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            TypeName::SmallInt
                | TypeName::Integer
                | TypeName::Int
                | TypeName::BigInt
                | TypeName::Long
        )
    }
}

impl FromStr for TypeName {
    type Err = TypeError;

    fn from_str(s: &str) -> TypeResult<Self> {
        let normalized: String = s
            .trim()
            .split(|c: char| c.is_whitespace() || c == '_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_")
            .to_ascii_uppercase();
        TypeName::ALL
            .iter()
            .copied()
            .find(|name| name.canonical() == normalized)
            .ok_or_else(|| TypeError::UnknownType {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_and_separator_insensitive() {
        assert_eq!(
            "double precision".parse::<TypeName>().unwrap(),
            TypeName::DoublePrecision
        );
        assert_eq!(
            "Character_Varying".parse::<TypeName>().unwrap(),
            TypeName::CharacterVarying
        );
        assert_eq!("  int ".parse::<TypeName>().unwrap(), TypeName::Int);
    }

    #[test]
    fn unknown_name() {
        assert!(matches!(
            "money".parse::<TypeName>(),
            Err(TypeError::UnknownType { .. })
        ));
    }

    #[test]
    fn canonical_round_trip() {
        for name in TypeName::ALL {
            assert_eq!(name.canonical().parse::<TypeName>().unwrap(), *name);
            assert_eq!(name.sql().parse::<TypeName>().unwrap(), *name);
        }
    }

    #[test]
    fn families() {
        assert_eq!(TypeName::Clob.family(), TypeFamily::String);
        assert_eq!(TypeName::Blob.family(), TypeFamily::Binary);
        assert_eq!(TypeName::Real.family(), TypeFamily::Number);
        assert_eq!(TypeName::Multiset.family(), TypeFamily::Collection);
        assert_eq!(TypeName::Xml.family(), TypeFamily::Unsupported);
        assert!(TypeName::Varchar.requires_length());
        assert!(!TypeName::String.requires_length());
    }
}
