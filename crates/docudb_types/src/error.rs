//! Error types for the type system.

use thiserror::Error;

/// Result type for type-system operations.
pub type TypeResult<T> = Result<T, TypeError>;

/// Errors raised while building field types or converting values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// The value cannot be interpreted as the requested type at all.
    #[error("data type mismatch: {message}")]
    Mismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// The value has the right shape but violates a declared constraint.
    #[error("data type constraint violation: {message}")]
    ConstraintViolation {
        /// Description of the violated constraint.
        message: String,
    },

    /// A literal could not be parsed (number, date, time, timestamp, reference, length).
    #[error("invalid {kind} format: {message}")]
    InvalidFormat {
        /// The literal family that failed to parse.
        kind: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// The type declaration itself is invalid (bad constraint combination).
    #[error("invalid data type: {message}")]
    InvalidDefinition {
        /// Description of the problem.
        message: String,
    },

    /// The type name is not known.
    #[error("unknown data type: {name}")]
    UnknownType {
        /// The unrecognised name.
        name: String,
    },

    /// The type is recognised but not supported.
    #[error("data type not supported: {name}")]
    Unsupported {
        /// Name of the unsupported type.
        name: String,
    },
}

impl TypeError {
    /// Creates a mismatch error.
    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::Mismatch {
            message: message.into(),
        }
    }

    /// Creates a constraint violation error.
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
        }
    }

    /// Creates a format error for the given literal family.
    pub fn format(kind: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            kind,
            message: message.into(),
        }
    }

    /// Creates an invalid definition error.
    pub fn definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            message: message.into(),
        }
    }
}
