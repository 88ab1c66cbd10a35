//! Per-kind hit/miss counters and cache occupancy snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;

use crate::domain::QueryKind;

use super::store::ResultCache;

const METRIC_CACHE_HIT_TOTAL: &str = "qcache_cache_hit_total";
const METRIC_CACHE_MISS_TOTAL: &str = "qcache_cache_miss_total";

const KIND_COUNT: usize = QueryKind::ALL.len();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: BTreeMap<QueryKind, u64>,
    pub misses: BTreeMap<QueryKind, u64>,
    pub entry_count: u64,
    pub ttl_seconds: u64,
}

/// Process-lifetime counters. Updates are lock-free and never lost under concurrency.
pub struct HitMissTelemetry {
    hits: [AtomicU64; KIND_COUNT],
    misses: [AtomicU64; KIND_COUNT],
    cache: Arc<ResultCache>,
}

impl HitMissTelemetry {
    pub fn new(cache: Arc<ResultCache>) -> Self {
        Self {
            hits: std::array::from_fn(|_| AtomicU64::new(0)),
            misses: std::array::from_fn(|_| AtomicU64::new(0)),
            cache,
        }
    }

    pub fn record_hit(&self, kind: QueryKind) {
        self.hits[kind.index()].fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_HIT_TOTAL, "kind" => kind.as_str()).increment(1);
    }

    pub fn record_miss(&self, kind: QueryKind) {
        self.misses[kind.index()].fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_MISS_TOTAL, "kind" => kind.as_str()).increment(1);
    }

    pub fn hits(&self, kind: QueryKind) -> u64 {
        self.hits[kind.index()].load(Ordering::Relaxed)
    }

    pub fn misses(&self, kind: QueryKind) -> u64 {
        self.misses[kind.index()].load(Ordering::Relaxed)
    }

    /// Counters for every kind plus a best-effort entry count from the store.
    pub async fn snapshot(&self) -> CacheStats {
        let hits = QueryKind::ALL
            .into_iter()
            .map(|kind| (kind, self.hits(kind)))
            .collect();
        let misses = QueryKind::ALL
            .into_iter()
            .map(|kind| (kind, self.misses(kind)))
            .collect();

        CacheStats {
            hits,
            misses,
            entry_count: self.cache.entry_count().await,
            ttl_seconds: self.cache.ttl().as_secs(),
        }
    }
}
