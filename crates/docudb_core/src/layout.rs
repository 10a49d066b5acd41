//! On-disk directory layout.
//!
//! ```text
//! <base>/
//! ├─ LOCK                       # Advisory lock, one engine per base
//! ├─ del/                       # Archived (dropped) datastores
//! └─ <datastore>/
//!    ├─ db/<collection>/
//!    │  ├─ data/                # One JSON file per record
//!    │  ├─ meta/                # schema.json, column-mapping.json, row-count
//!    │  ├─ index/<column>/      # Strategy-specific index entries
//!    │  ├─ index-count/<column>/
//!    │  ├─ ops/                 # Long-running operation files
//!    │  ├─ import/  export/
//!    │  └─ commit-logs/
//!    ├─ del/                    # Archived collections and indexes
//!    ├─ import/  export/
//!    └─ commit-logs/
//! ```
//!
//! Drops never delete: directories are renamed into a `del/` area with a
//! millisecond timestamp suffix.

use crate::error::{CoreError, CoreResult, IoResultExt};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const DB_DIR: &str = "db";
const ARCHIVE_DIR: &str = "del";
const DATA_DIR: &str = "data";
const META_DIR: &str = "meta";
const INDEX_DIR: &str = "index";
const INDEX_COUNT_DIR: &str = "index-count";
const OPS_DIR: &str = "ops";
const SCHEMA_FILE: &str = "schema.json";
const MAPPING_FILE: &str = "column-mapping.json";
const ROW_COUNT_FILE: &str = "row-count";
/// Prefix of temporary files; never produced by name encoding.
pub(crate) const TEMP_PREFIX: &str = "~tmp-";

/// Sub-areas every datastore directory contains.
pub const DATASTORE_AREAS: [&str; 5] = [DB_DIR, ARCHIVE_DIR, "import", "export", "commit-logs"];

/// Sub-areas every collection directory contains.
pub const COLLECTION_AREAS: [&str; 8] = [
    DATA_DIR,
    META_DIR,
    INDEX_DIR,
    INDEX_COUNT_DIR,
    OPS_DIR,
    "import",
    "export",
    "commit-logs",
];

/// Resolves paths under the engine's base directory.
#[derive(Debug, Clone)]
pub struct Layout {
    base: PathBuf,
}

impl Layout {
    /// Creates a layout rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Base directory.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Archive area for dropped datastores.
    #[must_use]
    pub fn datastore_archive(&self) -> PathBuf {
        self.base.join(ARCHIVE_DIR)
    }

    /// Datastore directory.
    #[must_use]
    pub fn datastore(&self, datastore: &str) -> PathBuf {
        self.base.join(datastore)
    }

    /// Parent of a datastore's collection directories.
    #[must_use]
    pub fn collections_dir(&self, datastore: &str) -> PathBuf {
        self.datastore(datastore).join(DB_DIR)
    }

    /// Archive area for a datastore's dropped collections and indexes.
    #[must_use]
    pub fn collection_archive(&self, datastore: &str) -> PathBuf {
        self.datastore(datastore).join(ARCHIVE_DIR)
    }

    /// Collection directory.
    #[must_use]
    pub fn collection(&self, datastore: &str, collection: &str) -> PathBuf {
        self.collections_dir(datastore).join(collection)
    }

    /// Record data directory.
    #[must_use]
    pub fn data_dir(&self, datastore: &str, collection: &str) -> PathBuf {
        self.collection(datastore, collection).join(DATA_DIR)
    }

    /// Schema file.
    #[must_use]
    pub fn schema_file(&self, datastore: &str, collection: &str) -> PathBuf {
        self.collection(datastore, collection)
            .join(META_DIR)
            .join(SCHEMA_FILE)
    }

    /// Column mapping file.
    #[must_use]
    pub fn mapping_file(&self, datastore: &str, collection: &str) -> PathBuf {
        self.collection(datastore, collection)
            .join(META_DIR)
            .join(MAPPING_FILE)
    }

    /// Row count file.
    #[must_use]
    pub fn row_count_file(&self, datastore: &str, collection: &str) -> PathBuf {
        self.collection(datastore, collection)
            .join(META_DIR)
            .join(ROW_COUNT_FILE)
    }

    /// Root of all index areas.
    #[must_use]
    pub fn index_root(&self, datastore: &str, collection: &str) -> PathBuf {
        self.collection(datastore, collection).join(INDEX_DIR)
    }

    /// Root of all index-count areas.
    #[must_use]
    pub fn index_count_root(&self, datastore: &str, collection: &str) -> PathBuf {
        self.collection(datastore, collection).join(INDEX_COUNT_DIR)
    }

    /// Operation tracking directory.
    #[must_use]
    pub fn ops_dir(&self, datastore: &str, collection: &str) -> PathBuf {
        self.collection(datastore, collection).join(OPS_DIR)
    }
}

/// Exclusive advisory lock on `<base>/LOCK`, held for the engine's lifetime.
#[derive(Debug)]
pub struct DirLock {
    _file: File,
}

impl DirLock {
    /// Opens (creating if allowed) the base directory and locks it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another engine holds the lock (returns `StoreLocked`)
    /// - I/O errors occur
    pub fn acquire(base: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !base.exists() {
            if create_if_missing {
                fs::create_dir_all(base).at(base)?;
            } else {
                return Err(CoreError::io(
                    base,
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                ));
            }
        }
        let lock_path = base.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .at(&lock_path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }
        Ok(Self { _file: file })
    }
}

/// Writes `bytes` to `path` atomically (temp file, sync, rename).
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| CoreError::internal(format!("{} has no parent", path.display())))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!("{TEMP_PREFIX}{name}-{}", uuid::Uuid::new_v4().simple()));

    let mut file = File::create(&temp).at(&temp)?;
    file.write_all(bytes).at(&temp)?;
    file.sync_all().at(&temp)?;
    drop(file);

    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(CoreError::io(path, e));
    }
    Ok(())
}

/// Reads a file, returning `None` if it does not exist.
pub(crate) fn read_optional(path: &Path) -> CoreResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CoreError::io(path, e)),
    }
}

/// Creates every directory in `areas` under `root`.
pub(crate) fn create_areas(root: &Path, areas: &[&str]) -> CoreResult<()> {
    for area in areas {
        let dir = root.join(area);
        fs::create_dir_all(&dir).at(&dir)?;
    }
    Ok(())
}

/// Moves `source` into `archive_dir` as `<stem>.<millis>[_n]` and returns the target.
pub(crate) fn archive(source: &Path, archive_dir: &Path, stem: &str) -> CoreResult<PathBuf> {
    fs::create_dir_all(archive_dir).at(archive_dir)?;
    let millis = chrono::Utc::now().timestamp_millis();
    let mut target = archive_dir.join(format!("{stem}.{millis}"));
    let mut counter = 1;
    while target.exists() {
        target = archive_dir.join(format!("{stem}.{millis}_{counter}"));
        counter += 1;
    }
    fs::rename(source, &target).at(source)?;
    Ok(target)
}

/// Names of the sub-directories of `dir` (empty if `dir` is missing).
pub(crate) fn list_dirs(dir: &Path) -> CoreResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CoreError::io(dir, e)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.at(dir)?;
        if entry.file_type().at(dir)?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Names of the regular files in `dir`, skipping temp files (empty if `dir` is missing).
pub(crate) fn list_files(dir: &Path) -> CoreResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CoreError::io(dir, e)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.at(dir)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(TEMP_PREFIX) && entry.file_type().at(dir)?.is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn paths_are_correct() {
        let layout = Layout::new("/data");
        assert_eq!(
            layout.data_dir("shop", "orders"),
            PathBuf::from("/data/shop/db/orders/data")
        );
        assert_eq!(
            layout.schema_file("shop", "orders"),
            PathBuf::from("/data/shop/db/orders/meta/schema.json")
        );
        assert_eq!(
            layout.collection_archive("shop"),
            PathBuf::from("/data/shop/del")
        );
        assert_eq!(layout.datastore_archive(), PathBuf::from("/data/del"));
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let _first = DirLock::acquire(temp.path(), true).unwrap();
        assert!(matches!(
            DirLock::acquire(temp.path(), true),
            Err(CoreError::StoreLocked)
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        {
            let _lock = DirLock::acquire(temp.path(), true).unwrap();
        }
        let _again = DirLock::acquire(temp.path(), true).unwrap();
    }

    #[test]
    fn missing_base_without_create() {
        let temp = tempdir().unwrap();
        assert!(DirLock::acquire(&temp.path().join("absent"), false).is_err());
    }

    #[test]
    fn atomic_write_replaces_content() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("file.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert_eq!(list_files(temp.path()).unwrap(), vec!["file.json"]);
    }

    #[test]
    fn archive_disambiguates_collisions() {
        let temp = tempdir().unwrap();
        let archive_dir = temp.path().join("del");
        let mut targets = Vec::new();
        for _ in 0..3 {
            let source = temp.path().join("orders");
            fs::create_dir(&source).unwrap();
            targets.push(archive(&source, &archive_dir, "orders").unwrap());
        }
        assert_eq!(list_dirs(&archive_dir).unwrap().len(), 3);
        assert!(targets.iter().all(|t| t
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("orders.")));
    }
}
