//! Hash bucket index.
//!
//! `index/<column>/<bucket>/<encoded pk>`, where the bucket is a SHA-256
//! prefix of the value and each marker holds the full value, so bucket
//! collisions are filtered on lookup. Values are not ordered, so only
//! equality and membership queries are served.

use super::strategy::{create_in_dir, IndexArea, IndexingStrategy};
use crate::error::{CoreError, CoreResult};
use crate::layout::{list_dirs, list_files, read_optional, write_atomic};
use crate::naming::{decode_name, encode_name};
use crate::schema::IndexType;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Hex digits of the value digest used as the bucket name.
const BUCKET_WIDTH: usize = 16;

/// SHA-256 bucketed markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashedStrategy;

impl HashedStrategy {
    fn bucket(area: &IndexArea, value: &str) -> PathBuf {
        let digest = Sha256::digest(value.as_bytes());
        let hex: String = digest
            .iter()
            .take(BUCKET_WIDTH / 2)
            .map(|b| format!("{b:02x}"))
            .collect();
        area.dir().join(hex)
    }

    fn holder(area: &IndexArea, value: &str, primary_key: &str) -> CoreResult<PathBuf> {
        Ok(Self::bucket(area, value).join(encode_name(primary_key)?))
    }

    fn read_value(path: &std::path::Path) -> CoreResult<Option<String>> {
        Ok(read_optional(path)?.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }
}

impl IndexingStrategy for HashedStrategy {
    fn index_type(&self) -> IndexType {
        IndexType::Hashed
    }

    fn index(&self, area: &IndexArea, value: &str, primary_key: &str) -> CoreResult<bool> {
        let bucket = Self::bucket(area, value);
        let marker = Self::holder(area, value, primary_key)?;
        create_in_dir(&bucket, || {
            if Self::read_value(&marker)?.as_deref() == Some(value) {
                return Ok(false);
            }
            write_atomic(&marker, value.as_bytes())?;
            Ok(true)
        })
    }

    fn remove(&self, area: &IndexArea, value: &str, primary_key: &str) -> CoreResult<bool> {
        let marker = Self::holder(area, value, primary_key)?;
        if Self::read_value(&marker)?.as_deref() != Some(value) {
            return Ok(false);
        }
        match fs::remove_file(&marker) {
            Ok(()) => {
                let bucket = Self::bucket(area, value);
                if list_files(&bucket)?.is_empty() {
                    let _ = fs::remove_dir(&bucket);
                }
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CoreError::io(&marker, e)),
        }
    }

    fn contains(&self, area: &IndexArea, value: &str, primary_key: &str) -> CoreResult<bool> {
        let marker = Self::holder(area, value, primary_key)?;
        Ok(Self::read_value(&marker)?.as_deref() == Some(value))
    }

    fn lookup(&self, area: &IndexArea, value: &str) -> CoreResult<Vec<String>> {
        let bucket = Self::bucket(area, value);
        let mut keys = Vec::new();
        for name in list_files(&bucket)? {
            if Self::read_value(&bucket.join(&name))?.as_deref() == Some(value) {
                keys.push(decode_name(&name)?);
            }
        }
        Ok(keys)
    }

    fn cardinality(&self, area: &IndexArea) -> CoreResult<Vec<String>> {
        let mut values = BTreeSet::new();
        for bucket in list_dirs(area.dir())? {
            let dir = area.dir().join(bucket);
            for name in list_files(&dir)? {
                if let Some(value) = Self::read_value(&dir.join(name))? {
                    values.insert(value);
                }
            }
        }
        Ok(values.into_iter().collect())
    }

    fn scan(&self, area: &IndexArea, _accept: &dyn Fn(&str) -> bool) -> CoreResult<Vec<String>> {
        Err(CoreError::not_supported(format!(
            "range query on hashed index of column {}",
            area.column()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn equality_lookups() {
        let temp = tempdir().unwrap();
        let area = IndexArea::new(temp.path(), "sku");
        let hashed = HashedStrategy;

        assert!(hashed.index(&area, "A-1", "p1").unwrap());
        assert!(!hashed.index(&area, "A-1", "p1").unwrap());
        assert!(hashed.index(&area, "A-1", "p2").unwrap());
        assert!(hashed.index(&area, "B-7", "p3").unwrap());

        assert_eq!(hashed.lookup(&area, "A-1").unwrap(), ["p1", "p2"]);
        assert!(hashed.contains(&area, "B-7", "p3").unwrap());
        assert!(!hashed.contains(&area, "A-1", "p3").unwrap());
        assert_eq!(hashed.cardinality(&area).unwrap(), ["A-1", "B-7"]);

        assert!(hashed.remove(&area, "A-1", "p1").unwrap());
        assert!(!hashed.remove(&area, "B-7", "p1").unwrap());
        assert_eq!(hashed.lookup(&area, "A-1").unwrap(), ["p2"]);
        assert_eq!(hashed.entries(&area).unwrap().len(), 2);
    }

    #[test]
    fn range_scans_are_rejected() {
        let temp = tempdir().unwrap();
        let area = IndexArea::new(temp.path(), "sku");
        let err = HashedStrategy.scan(&area, &|_: &str| true).unwrap_err();
        assert_eq!(err.code(), "OPERATION_NOT_SUPPORTED");
    }
}
