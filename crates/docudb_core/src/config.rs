//! Engine configuration.

use std::path::{Path, PathBuf};

/// Configuration for opening an [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory holding every datastore.
    pub base_dir: PathBuf,

    /// Whether to create `base_dir` if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether record operations take per-primary-key locks.
    pub record_locking: bool,

    /// Number of lock shards when record locking is enabled.
    pub lock_shards: usize,

    /// Flexible-schema flag given to collections created without one.
    pub default_flexible_schema: bool,

    /// Threads used for per-column index updates (0 = rayon global pool).
    pub index_parallelism: usize,

    /// Records between progress writes of a reindex operation file.
    pub reindex_progress_interval: u64,

    /// Number of change events kept for polling.
    pub change_feed_history: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("docudb-data"),
            create_if_missing: true,
            record_locking: true,
            lock_shards: 64,
            default_flexible_schema: true,
            index_parallelism: 0,
            reindex_progress_interval: 1000,
            change_feed_history: 10_000,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration rooted at `base_dir` with default values.
    #[must_use]
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Sets whether to create the base directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Enables or disables per-primary-key record locking.
    #[must_use]
    pub const fn record_locking(mut self, value: bool) -> Self {
        self.record_locking = value;
        self
    }

    /// Sets the number of lock shards.
    #[must_use]
    pub const fn lock_shards(mut self, shards: usize) -> Self {
        self.lock_shards = shards;
        self
    }

    /// Sets the flexible-schema default for new collections.
    #[must_use]
    pub const fn default_flexible_schema(mut self, value: bool) -> Self {
        self.default_flexible_schema = value;
        self
    }

    /// Sets the size of the dedicated index thread pool.
    #[must_use]
    pub const fn index_parallelism(mut self, threads: usize) -> Self {
        self.index_parallelism = threads;
        self
    }

    /// Sets how often a running reindex records its progress.
    #[must_use]
    pub const fn reindex_progress_interval(mut self, records: u64) -> Self {
        self.reindex_progress_interval = records;
        self
    }

    /// Sets the change feed history limit.
    #[must_use]
    pub const fn change_feed_history(mut self, events: usize) -> Self {
        self.change_feed_history = events;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert!(config.create_if_missing);
        assert!(config.record_locking);
        assert_eq!(config.lock_shards, 64);
        assert!(config.default_flexible_schema);
        assert_eq!(config.index_parallelism, 0);
        assert_eq!(config.reindex_progress_interval, 1000);
        assert_eq!(config.change_feed_history, 10_000);
    }

    #[test]
    fn builder_pattern() {
        let config = EngineConfig::new("/tmp/docudb")
            .record_locking(false)
            .lock_shards(8)
            .index_parallelism(2);

        assert_eq!(config.base_dir, PathBuf::from("/tmp/docudb"));
        assert!(!config.record_locking);
        assert_eq!(config.lock_shards, 8);
        assert_eq!(config.index_parallelism, 2);
    }
}
