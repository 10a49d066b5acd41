//! Engine statistics.
//!
//! Counters are atomic and can be read while operations are in progress.
//! `index_failures` counts index writes that failed and were swallowed, so
//! drift between records and their indexes is observable.
//!
//! # Usage
//!
//! ```rust,ignore
//! let engine = Engine::open(EngineConfig::new("data"))?;
//! // Perform operations...
//! let stats = engine.stats();
//! println!("Inserts: {}", stats.inserts);
//! println!("Index failures: {}", stats.index_failures);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Engine statistics and metrics.
#[derive(Debug, Default)]
pub struct EngineStats {
    reads: AtomicU64,
    inserts: AtomicU64,
    saves: AtomicU64,
    removes: AtomicU64,
    index_writes: AtomicU64,
    index_failures: AtomicU64,
    auto_indexed_columns: AtomicU64,
    reindex_jobs: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl EngineStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_save(&self) {
        self.saves.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_index_write(&self) {
        self.index_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_index_failure(&self) {
        self.index_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_auto_index(&self) {
        self.auto_indexed_columns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reindex_job(&self) {
        self.reindex_jobs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of index writes that failed and were swallowed.
    pub fn index_failures(&self) -> u64 {
        self.index_failures.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            index_writes: self.index_writes.load(Ordering::Relaxed),
            index_failures: self.index_failures(),
            auto_indexed_columns: self.auto_indexed_columns.load(Ordering::Relaxed),
            reindex_jobs: self.reindex_jobs.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of engine statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct StatsSnapshot {
    /// Record selects.
    pub reads: u64,
    /// Record inserts (including saves of new keys).
    pub inserts: u64,
    /// Saves that updated an existing record.
    pub saves: u64,
    /// Record removals.
    pub removes: u64,
    /// Successful per-column index writes and removals.
    pub index_writes: u64,
    /// Index writes that failed and were swallowed.
    pub index_failures: u64,
    /// Columns indexed as a side effect of a query.
    pub auto_indexed_columns: u64,
    /// Full-column reindex jobs run.
    pub reindex_jobs: u64,
    /// Schema and index cache hits.
    pub cache_hits: u64,
    /// Schema and index cache misses.
    pub cache_misses: u64,
}
