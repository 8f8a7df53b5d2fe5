//! Per-type cache statistics.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Monotonic counters for one cached type.
///
/// Every update is a single atomic increment; counters only move
/// backwards through [`CacheStatistics::reset`].
#[derive(Debug, Default)]
pub struct TypeStats {
    hits: AtomicU64,
    misses: AtomicU64,
    updates: AtomicU64,
    validation_failures: AtomicU64,
    indexing_errors: AtomicU64,
}

impl TypeStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    pub fn validation_failures(&self) -> u64 {
        self.validation_failures.load(Ordering::Relaxed)
    }

    pub fn indexing_errors(&self) -> u64 {
        self.indexing_errors.load(Ordering::Relaxed)
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_indexing_error(&self) {
        self.indexing_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> TypeStatsSnapshot {
        TypeStatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            updates: self.updates(),
            validation_failures: self.validation_failures(),
            indexing_errors: self.indexing_errors(),
        }
    }
}

/// Point-in-time counter values for one type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub updates: u64,
    pub validation_failures: u64,
    pub indexing_errors: u64,
}

/// Live, thread-safe statistics keyed by type id.
///
/// Cloning shares the underlying counters.
#[derive(Clone, Default)]
pub struct CacheStatistics {
    types: Arc<DashMap<String, Arc<TypeStats>>>,
}

impl CacheStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for a type, created on first use.
    pub fn for_type(&self, type_id: &str) -> Arc<TypeStats> {
        Arc::clone(
            &self
                .types
                .entry(type_id.to_string())
                .or_insert_with(|| Arc::new(TypeStats::default())),
        )
    }

    /// Snapshot for one type, if any counter was ever touched.
    pub fn get(&self, type_id: &str) -> Option<TypeStatsSnapshot> {
        self.types.get(type_id).map(|s| s.snapshot())
    }

    /// Snapshots for all types.
    pub fn all(&self) -> HashMap<String, TypeStatsSnapshot> {
        self.types
            .iter()
            .map(|e| (e.key().clone(), e.value().snapshot()))
            .collect()
    }

    /// Clear all counters for all types.
    pub fn reset(&self) {
        self.types.clear();
    }
}

impl std::fmt::Debug for CacheStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStatistics")
            .field("types", &self.all())
            .finish()
    }
}
