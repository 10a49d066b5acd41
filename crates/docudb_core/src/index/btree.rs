//! Directory-per-value index.
//!
//! `index/<column>/<encoded value>/<encoded pk>`, with empty marker files.
//! Value directories are decoded and filtered for range queries.

use super::strategy::{create_in_dir, IndexArea, IndexingStrategy};
use crate::error::{CoreError, CoreResult, IoResultExt};
use crate::layout::{list_dirs, list_files};
use crate::naming::{decode_name, encode_name};
use crate::schema::IndexType;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Value directories holding primary key markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BtreeStrategy;

impl BtreeStrategy {
    fn value_dir(area: &IndexArea, value: &str) -> CoreResult<PathBuf> {
        Ok(area.dir().join(encode_name(value)?))
    }
}

impl IndexingStrategy for BtreeStrategy {
    fn index_type(&self) -> IndexType {
        IndexType::Btree
    }

    fn index(&self, area: &IndexArea, value: &str, primary_key: &str) -> CoreResult<bool> {
        let dir = Self::value_dir(area, value)?;
        let marker = dir.join(encode_name(primary_key)?);
        create_in_dir(&dir, || {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&marker)
            {
                Ok(_) => Ok(true),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
                Err(e) => Err(CoreError::io(&marker, e)),
            }
        })
    }

    fn remove(&self, area: &IndexArea, value: &str, primary_key: &str) -> CoreResult<bool> {
        let dir = Self::value_dir(area, value)?;
        let marker = dir.join(encode_name(primary_key)?);
        let removed = match fs::remove_file(&marker) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(CoreError::io(&marker, e)),
        };
        // Fails harmlessly if another key was added meanwhile.
        if removed && list_files(&dir)?.is_empty() {
            let _ = fs::remove_dir(&dir);
        }
        Ok(removed)
    }

    fn contains(&self, area: &IndexArea, value: &str, primary_key: &str) -> CoreResult<bool> {
        let marker = Self::value_dir(area, value)?.join(encode_name(primary_key)?);
        marker.try_exists().at(&marker)
    }

    fn lookup(&self, area: &IndexArea, value: &str) -> CoreResult<Vec<String>> {
        list_files(&Self::value_dir(area, value)?)?
            .iter()
            .map(|name| decode_name(name))
            .collect()
    }

    fn cardinality(&self, area: &IndexArea) -> CoreResult<Vec<String>> {
        list_dirs(area.dir())?
            .iter()
            .map(|name| decode_name(name))
            .collect()
    }

    fn any_entry(&self, area: &IndexArea, value: &str) -> CoreResult<Option<String>> {
        let dir = Self::value_dir(area, value)?;
        match list_files(&dir)?.first() {
            Some(name) => Ok(Some(decode_name(name)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn index_lookup_remove() {
        let temp = tempdir().unwrap();
        let area = IndexArea::new(temp.path().join("3"), "status");
        let btree = BtreeStrategy;
        btree.initialize(&area).unwrap();

        assert!(btree.index(&area, "new", "o1").unwrap());
        assert!(!btree.index(&area, "new", "o1").unwrap());
        assert!(btree.index(&area, "new", "o/2").unwrap());
        assert!(btree.index(&area, "paid", "o3").unwrap());

        assert_eq!(btree.lookup(&area, "new").unwrap(), ["o/2", "o1"]);
        assert!(btree.contains(&area, "paid", "o3").unwrap());
        assert_eq!(btree.cardinality(&area).unwrap(), ["new", "paid"]);
        assert!(btree.any_entry(&area, "paid").unwrap().is_some());

        assert!(btree.remove(&area, "paid", "o3").unwrap());
        assert!(!btree.remove(&area, "paid", "o3").unwrap());
        assert_eq!(btree.cardinality(&area).unwrap(), ["new"]);
        assert_eq!(btree.any_entry(&area, "paid").unwrap(), None);
    }

    #[test]
    fn pruned_value_dirs_do_not_lose_entries() {
        let temp = tempdir().unwrap();
        let area = Arc::new(IndexArea::new(temp.path().join("3"), "status"));
        BtreeStrategy.initialize(&area).unwrap();

        // One writer keeps emptying the value directory while others add to it.
        let churn = {
            let area = Arc::clone(&area);
            thread::spawn(move || {
                for _ in 0..300 {
                    BtreeStrategy.index(&area, "new", "churn").unwrap();
                    BtreeStrategy.remove(&area, "new", "churn").unwrap();
                }
            })
        };
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let area = Arc::clone(&area);
                thread::spawn(move || {
                    for i in 0..50 {
                        let pk = format!("w{w}-{i}");
                        assert!(BtreeStrategy.index(&area, "new", &pk).unwrap());
                        assert!(BtreeStrategy.remove(&area, "new", &pk).unwrap());
                    }
                    BtreeStrategy.index(&area, "new", &format!("w{w}-kept")).unwrap();
                })
            })
            .collect();
        churn.join().unwrap();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(
            BtreeStrategy.lookup(&area, "new").unwrap(),
            ["w0-kept", "w1-kept", "w2-kept", "w3-kept"]
        );
    }

    #[test]
    fn scan_filters_decoded_values() {
        let temp = tempdir().unwrap();
        let area = IndexArea::new(temp.path(), "total");
        let btree = BtreeStrategy;
        for (value, pk) in [("5", "a"), ("12", "b"), ("30", "c")] {
            btree.index(&area, value, pk).unwrap();
        }
        let keys = btree
            .scan(&area, &|v: &str| v.parse::<i64>().is_ok_and(|n| n > 10))
            .unwrap();
        assert_eq!(keys, ["b", "c"]);

        let entries = btree.entries(&area).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries["12"].contains("b"));
    }
}
