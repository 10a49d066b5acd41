//! Error types for DocuDB core.
//!
//! Every failure that leaves the crate is one of the [`CoreError`] kinds.
//! I/O, JSON and type-system errors are classified on the way out.

use docudb_types::TypeError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in DocuDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The datastore does not exist.
    #[error("datastore does not exist: {datastore}")]
    DatastoreInvalid {
        /// Datastore name.
        datastore: String,
    },

    /// A datastore with this name already exists.
    #[error("datastore already exists: {datastore}")]
    DuplicateDatastoreName {
        /// Datastore name.
        datastore: String,
    },

    /// The collection does not exist.
    #[error("collection does not exist: {datastore}.{collection}")]
    CollectionInvalid {
        /// Owning datastore.
        datastore: String,
        /// Collection name.
        collection: String,
    },

    /// A collection with this name already exists.
    #[error("collection already exists: {datastore}.{collection}")]
    DuplicateCollectionName {
        /// Owning datastore.
        datastore: String,
        /// Collection name.
        collection: String,
    },

    /// The column does not exist.
    #[error("column {column} does not exist in {collection}")]
    ColumnInvalid {
        /// Collection name.
        collection: String,
        /// Column name.
        column: String,
    },

    /// A column with this name already exists.
    #[error("column {column} already exists in {collection}")]
    DuplicateColumnName {
        /// Collection name.
        collection: String,
        /// Column name.
        column: String,
    },

    /// The collection has no schema file.
    #[error("schema file not found for {datastore}.{collection}")]
    SchemaFileNotFound {
        /// Owning datastore.
        datastore: String,
        /// Collection name.
        collection: String,
    },

    /// The schema is malformed or violates a schema rule.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Description of the problem.
        message: String,
    },

    /// A value has the wrong shape for its column type.
    #[error("data type mismatch: {message}")]
    DataTypeMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// A value violates its column's constraints.
    #[error("data type constraint violation: {message}")]
    DataTypeConstraintViolation {
        /// Description of the violation.
        message: String,
    },

    /// A literal could not be parsed.
    #[error("invalid data format: {message}")]
    DataTypeFormatInvalid {
        /// Description of the failure.
        message: String,
    },

    /// A type declaration is invalid or unsupported.
    #[error("data type error: {message}")]
    DataTypeError {
        /// Description of the problem.
        message: String,
    },

    /// No record exists under the primary key.
    #[error("record {key} not found in {collection}")]
    RecordNotFound {
        /// Collection name.
        collection: String,
        /// Primary key.
        key: String,
    },

    /// The record could not be inserted.
    #[error("insert failed: {message}")]
    InsertError {
        /// Reason for the failure.
        message: String,
    },

    /// The column already has an index.
    #[error("column {column} is already indexed")]
    AlreadyIndexed {
        /// Column name.
        column: String,
    },

    /// The column has no index.
    #[error("column {column} is not indexed")]
    NotIndexed {
        /// Column name.
        column: String,
    },

    /// The primary key's index cannot be dropped.
    #[error("cannot drop the index of primary key column {column}")]
    PrimaryKeyIndexDropRestricted {
        /// Primary key column.
        column: String,
    },

    /// The primary key column cannot be dropped.
    #[error("cannot drop primary key column {column}")]
    PrimaryKeyDropRestricted {
        /// Primary key column.
        column: String,
    },

    /// A unique index already maps the value to another record.
    #[error("value {value} of column {column} is already used by another record")]
    UniqueIndexViolation {
        /// Column name.
        column: String,
        /// The conflicting value.
        value: String,
    },

    /// The comparison operator is not recognised.
    #[error("invalid operator: {operator}")]
    InvalidOperator {
        /// The operator as supplied.
        operator: String,
    },

    /// The operation is not supported in this configuration.
    #[error("operation not supported: {message}")]
    OperationNotSupported {
        /// What was attempted.
        message: String,
    },

    /// No long-running operation has this id.
    #[error("operation not found: {operation_id}")]
    OperationNotFound {
        /// Operation id.
        operation_id: String,
    },

    /// Another engine holds the base directory lock.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The file system refused access.
    #[error("permission denied: {}", path.display())]
    PermissionDenied {
        /// Offending path.
        path: PathBuf,
    },

    /// Any other file system failure.
    #[error("file system error at {}: {source}", path.display())]
    FileSystem {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Unexpected internal failure (serialization, background job).
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Classifies an I/O error that happened at `path`.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::FileSystem { path, source },
        }
    }

    /// Creates a datastore invalid error.
    pub fn datastore_invalid(datastore: impl Into<String>) -> Self {
        Self::DatastoreInvalid {
            datastore: datastore.into(),
        }
    }

    /// Creates a collection invalid error.
    pub fn collection_invalid(datastore: impl Into<String>, collection: impl Into<String>) -> Self {
        Self::CollectionInvalid {
            datastore: datastore.into(),
            collection: collection.into(),
        }
    }

    /// Creates a column invalid error.
    pub fn column_invalid(collection: impl Into<String>, column: impl Into<String>) -> Self {
        Self::ColumnInvalid {
            collection: collection.into(),
            column: column.into(),
        }
    }

    /// Creates a duplicate column error.
    pub fn duplicate_column(collection: impl Into<String>, column: impl Into<String>) -> Self {
        Self::DuplicateColumnName {
            collection: collection.into(),
            column: column.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an insert error.
    pub fn insert(message: impl Into<String>) -> Self {
        Self::InsertError {
            message: message.into(),
        }
    }

    /// Creates an operation not supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::OperationNotSupported {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable upper-snake code naming the error kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatastoreInvalid { .. } => "DATASTORE_INVALID",
            Self::DuplicateDatastoreName { .. } => "DUPLICATE_DATASTORE_NAME",
            Self::CollectionInvalid { .. } => "COLLECTION_INVALID",
            Self::DuplicateCollectionName { .. } => "DUPLICATE_COLLECTION_NAME",
            Self::ColumnInvalid { .. } => "COLUMN_INVALID",
            Self::DuplicateColumnName { .. } => "DUPLICATE_COLUMN_NAME",
            Self::SchemaFileNotFound { .. } => "SCHEMA_FILE_NOT_FOUND",
            Self::InvalidSchema { .. } => "INVALID_SCHEMA",
            Self::DataTypeMismatch { .. } => "DATA_TYPE_MISMATCH",
            Self::DataTypeConstraintViolation { .. } => "DATA_TYPE_CONSTRAINT_VIOLATION",
            Self::DataTypeFormatInvalid { .. } => "DATA_TYPE_FORMAT_INVALID",
            Self::DataTypeError { .. } => "DATA_TYPE_ERROR",
            Self::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            Self::InsertError { .. } => "INSERT_ERROR",
            Self::AlreadyIndexed { .. } => "ALREADY_INDEXED",
            Self::NotIndexed { .. } => "NOT_INDEXED",
            Self::PrimaryKeyIndexDropRestricted { .. } => "PRIMARY_KEY_INDEX_DROP_RESTRICTED",
            Self::PrimaryKeyDropRestricted { .. } => "PRIMARY_KEY_DROP_RESTRICTED",
            Self::UniqueIndexViolation { .. } => "UNIQUE_INDEX_VIOLATION",
            Self::InvalidOperator { .. } => "INVALID_OPERATOR",
            Self::OperationNotSupported { .. } => "OPERATION_NOT_SUPPORTED",
            Self::OperationNotFound { .. } => "OPERATION_NOT_FOUND",
            Self::StoreLocked => "STORE_LOCKED",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::FileSystem { .. } => "FILE_SYSTEM_ERROR",
            Self::Internal { .. } => "INTERNAL_OPERATION_ERROR",
        }
    }
}

impl From<TypeError> for CoreError {
    fn from(err: TypeError) -> Self {
        let message = err.to_string();
        match err {
            TypeError::Mismatch { .. } => Self::DataTypeMismatch { message },
            TypeError::ConstraintViolation { .. } => Self::DataTypeConstraintViolation { message },
            TypeError::InvalidFormat { .. } => Self::DataTypeFormatInvalid { message },
            TypeError::InvalidDefinition { .. }
            | TypeError::UnknownType { .. }
            | TypeError::Unsupported { .. } => Self::DataTypeError { message },
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("json: {err}"))
    }
}

/// Attaches a path to `io::Result` failures.
pub(crate) trait IoResultExt<T> {
    /// Maps the error through [`CoreError::io`].
    fn at(self, path: &Path) -> CoreResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> CoreResult<T> {
        self.map_err(|e| CoreError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_classified() {
        let denied = CoreError::io("/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(denied.code(), "PERMISSION_DENIED");

        let missing = CoreError::io("/x", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(missing, CoreError::FileSystem { .. }));
        assert!(missing.to_string().contains("/x"));
    }

    #[test]
    fn type_errors_map_to_data_type_kinds() {
        let err: CoreError = TypeError::constraint("too long").into();
        assert_eq!(err.code(), "DATA_TYPE_CONSTRAINT_VIOLATION");
        let err: CoreError = TypeError::format("date", "bad").into();
        assert_eq!(err.code(), "DATA_TYPE_FORMAT_INVALID");
        let err: CoreError = TypeError::Unsupported { name: "XML".into() }.into();
        assert_eq!(err.code(), "DATA_TYPE_ERROR");
    }

    #[test]
    fn json_errors_are_internal() {
        let err: CoreError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.code(), "INTERNAL_OPERATION_ERROR");
    }
}
