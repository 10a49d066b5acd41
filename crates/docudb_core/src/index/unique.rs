//! One-record-per-value index.
//!
//! `index/<column>/<encoded value>` is a file whose content is the primary key.

use super::strategy::{IndexArea, IndexingStrategy};
use crate::error::{CoreError, CoreResult, IoResultExt};
use crate::layout::{list_files, read_optional, TEMP_PREFIX};
use crate::naming::{decode_name, encode_name};
use crate::schema::IndexType;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Value files naming their single owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueStrategy;

impl UniqueStrategy {
    fn value_file(area: &IndexArea, value: &str) -> CoreResult<PathBuf> {
        Ok(area.dir().join(encode_name(value)?))
    }

    fn owner(area: &IndexArea, value: &str) -> CoreResult<Option<String>> {
        let path = Self::value_file(area, value)?;
        Ok(read_optional(&path)?.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }
}

impl IndexingStrategy for UniqueStrategy {
    fn index_type(&self) -> IndexType {
        IndexType::Unique
    }

    fn index(&self, area: &IndexArea, value: &str, primary_key: &str) -> CoreResult<bool> {
        let target = Self::value_file(area, value)?;
        fs::create_dir_all(area.dir()).at(area.dir())?;

        // Written aside and hard-linked so the claim and its content appear together.
        let temp = area
            .dir()
            .join(format!("{TEMP_PREFIX}{}", uuid::Uuid::new_v4().simple()));
        fs::write(&temp, primary_key.as_bytes()).at(&temp)?;
        let linked = fs::hard_link(&temp, &target);
        let _ = fs::remove_file(&temp);
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                match Self::owner(area, value)? {
                    Some(owner) if owner == primary_key => Ok(false),
                    _ => Err(CoreError::UniqueIndexViolation {
                        column: area.column().to_string(),
                        value: value.to_string(),
                    }),
                }
            }
            Err(e) => Err(CoreError::io(&target, e)),
        }
    }

    fn remove(&self, area: &IndexArea, value: &str, primary_key: &str) -> CoreResult<bool> {
        if Self::owner(area, value)?.as_deref() != Some(primary_key) {
            return Ok(false);
        }
        let path = Self::value_file(area, value)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CoreError::io(&path, e)),
        }
    }

    fn contains(&self, area: &IndexArea, value: &str, primary_key: &str) -> CoreResult<bool> {
        Ok(Self::owner(area, value)?.as_deref() == Some(primary_key))
    }

    fn lookup(&self, area: &IndexArea, value: &str) -> CoreResult<Vec<String>> {
        Ok(Self::owner(area, value)?.into_iter().collect())
    }

    fn cardinality(&self, area: &IndexArea) -> CoreResult<Vec<String>> {
        list_files(area.dir())?
            .iter()
            .map(|name| decode_name(name))
            .collect()
    }

    fn any_entry(&self, area: &IndexArea, value: &str) -> CoreResult<Option<String>> {
        Self::owner(area, value)
    }
}
