//! Indexing strategy trait and dispatch.

use super::btree::BtreeStrategy;
use super::cache::ColumnEntries;
use super::hashed::HashedStrategy;
use super::unique::UniqueStrategy;
use crate::error::{CoreError, CoreResult, IoResultExt};
use crate::schema::IndexType;
use std::fs;
use std::path::{Path, PathBuf};

/// The on-disk area of one column's index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexArea {
    dir: PathBuf,
    column: String,
}

impl IndexArea {
    /// Creates an area rooted at `dir` for the viewable column `column`.
    pub fn new(dir: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            column: column.into(),
        }
    }

    /// Root directory of the area.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Viewable name of the indexed column.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }
}

/// Attempts made by [`create_in_dir`] before giving up.
const CREATE_ATTEMPTS: usize = 5;

/// Ensures `dir` exists and runs `create` in it.
///
/// A concurrent remove of the last entry prunes `dir`, so a failure that
/// leaves `dir` missing is retried.
pub(crate) fn create_in_dir<T>(dir: &Path, mut create: impl FnMut() -> CoreResult<T>) -> CoreResult<T> {
    let mut attempt = 1;
    loop {
        fs::create_dir_all(dir).at(dir)?;
        match create() {
            Err(_) if attempt < CREATE_ATTEMPTS && !dir.is_dir() => attempt += 1,
            outcome => return outcome,
        }
    }
}

/// Storage scheme of an index type.
///
/// Values are passed as index keys (see `TypedValue::index_key`) and primary
/// keys as strings; strategies encode both into file names.
pub trait IndexingStrategy: Send + Sync {
    /// Index type this strategy implements.
    fn index_type(&self) -> IndexType;

    /// Creates the area without populating it.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn initialize(&self, area: &IndexArea) -> CoreResult<()> {
        fs::create_dir_all(area.dir()).at(area.dir())
    }

    /// Maps `value` to `primary_key`. Returns false if the entry existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written, or
    /// `UniqueIndexViolation` for a unique index.
    fn index(&self, area: &IndexArea, value: &str, primary_key: &str) -> CoreResult<bool>;

    /// Removes the entry. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn remove(&self, area: &IndexArea, value: &str, primary_key: &str) -> CoreResult<bool>;

    /// Whether `value` maps to `primary_key`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn contains(&self, area: &IndexArea, value: &str, primary_key: &str) -> CoreResult<bool>;

    /// Primary keys holding `value`, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn lookup(&self, area: &IndexArea, value: &str) -> CoreResult<Vec<String>>;

    /// Distinct indexed values.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn cardinality(&self, area: &IndexArea) -> CoreResult<Vec<String>>;

    /// Primary keys of every value `accept` admits.
    ///
    /// # Errors
    ///
    /// Returns `OperationNotSupported` for strategies without ordered values.
    fn scan(&self, area: &IndexArea, accept: &dyn Fn(&str) -> bool) -> CoreResult<Vec<String>> {
        let mut keys = Vec::new();
        for value in self.cardinality(area)? {
            if accept(&value) {
                keys.extend(self.lookup(area, &value)?);
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// Every entry of the area.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn entries(&self, area: &IndexArea) -> CoreResult<ColumnEntries> {
        let mut entries = ColumnEntries::new();
        for value in self.cardinality(area)? {
            let keys = self.lookup(area, &value)?;
            entries.insert(value, keys.into_iter().collect());
        }
        Ok(entries)
    }

    /// Any one primary key holding `value`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn any_entry(&self, area: &IndexArea, value: &str) -> CoreResult<Option<String>> {
        Ok(self.lookup(area, value)?.into_iter().next())
    }
}

static BTREE: BtreeStrategy = BtreeStrategy;
static UNIQUE: UniqueStrategy = UniqueStrategy;
static HASHED: HashedStrategy = HashedStrategy;

/// Strategy implementing `index_type`.
///
/// # Errors
///
/// Returns `OperationNotSupported` for `none` and for index types without an
/// implementation.
pub fn strategy_for(index_type: IndexType) -> CoreResult<&'static dyn IndexingStrategy> {
    match index_type {
        IndexType::Btree => Ok(&BTREE),
        IndexType::Unique => Ok(&UNIQUE),
        IndexType::Hashed => Ok(&HASHED),
        other => Err(CoreError::not_supported(format!("{other} index"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch() {
        assert_eq!(strategy_for(IndexType::Btree).unwrap().index_type(), IndexType::Btree);
        assert_eq!(strategy_for(IndexType::Unique).unwrap().index_type(), IndexType::Unique);
        assert_eq!(strategy_for(IndexType::Hashed).unwrap().index_type(), IndexType::Hashed);
        assert!(strategy_for(IndexType::None).is_err());
        assert!(strategy_for(IndexType::Geo).is_err());
    }
}
