//! Fail-open result cache over a [`CacheBackend`].
//!
//! Every store round trip is bounded by the configured operation timeout. Errors of any kind are
//! logged, counted, and turned into "no cache": reads miss, writes are dropped.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::counter;
use tracing::{debug, warn};

use crate::domain::QueryResult;

use super::backend::{CacheBackend, CacheBackendError};
use super::config::CacheConfig;
use super::keys::{CacheKey, CacheKeyBuilder};

const METRIC_CACHE_ERROR_TOTAL: &str = "qcache_cache_error_total";
const METRIC_CACHE_FLUSH_TOTAL: &str = "qcache_cache_flush_total";

/// Invalidation generation observed before a source query.
///
/// Handed back to [`ResultCache::fill`] so an entry computed before a flush does not outlive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTicket {
    generation: u64,
}

pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
    keys: CacheKeyBuilder,
    ttl: Duration,
    op_timeout: Duration,
    generation: AtomicU64,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend,
            keys: CacheKeyBuilder::new(config.namespace.clone()),
            ttl: config.ttl,
            op_timeout: config.op_timeout,
            generation: AtomicU64::new(0),
        }
    }

    pub fn keys(&self) -> &CacheKeyBuilder {
        &self.keys
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Look up `key`. Store errors and undecodable payloads read as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<QueryResult> {
        let payload = match self.bounded("get", self.backend.get(key.as_str())).await {
            Ok(payload) => payload?,
            Err(err) => {
                self.report("get", key, &err);
                return None;
            }
        };

        match serde_json::from_str::<QueryResult>(&payload) {
            Ok(result) => Some(result),
            Err(err) => {
                counter!(METRIC_CACHE_ERROR_TOTAL, "op" => "decode").increment(1);
                warn!(
                    target = "qcache::cache",
                    key = %key,
                    error = %err,
                    "Discarding undecodable cache entry"
                );
                None
            }
        }
    }

    /// Store `value` under `key` for `ttl`. Best effort.
    pub async fn set(&self, key: &CacheKey, value: &QueryResult, ttl: Duration) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                counter!(METRIC_CACHE_ERROR_TOTAL, "op" => "encode").increment(1);
                warn!(
                    target = "qcache::cache",
                    key = %key,
                    error = %err,
                    "Skipping cache write for unserializable result"
                );
                return;
            }
        };

        if let Err(err) = self
            .bounded("set", self.backend.set_ex(key.as_str(), payload, ttl))
            .await
        {
            self.report("set", key, &err);
        }
    }

    /// Capture the invalidation generation before running a source query.
    pub fn begin_fill(&self) -> FillTicket {
        FillTicket {
            generation: self.generation.load(Ordering::SeqCst),
        }
    }

    /// Store a freshly computed result with the configured TTL, then drop it again if a flush
    /// ran since `ticket` was taken.
    pub async fn fill(&self, key: &CacheKey, value: &QueryResult, ticket: FillTicket) {
        self.set(key, value, self.ttl).await;

        if self.generation.load(Ordering::SeqCst) == ticket.generation {
            return;
        }
        debug!(
            target = "qcache::cache",
            key = %key,
            "Flush raced with fill; removing refilled entry"
        );
        if let Err(err) = self
            .bounded("delete", self.backend.delete(key.as_str()))
            .await
        {
            self.report("delete", key, &err);
        }
    }

    /// Delete every entry under this cache's namespace.
    ///
    /// Returns `false` when the store could not be reached; the failure is already logged.
    pub async fn flush_namespace(&self) -> bool {
        // Bump first so any fill that started before this point re-checks after writing.
        self.generation.fetch_add(1, Ordering::SeqCst);
        let prefix = self.keys.prefix();
        counter!(METRIC_CACHE_FLUSH_TOTAL).increment(1);

        match self
            .bounded("flush", self.backend.delete_prefix(&prefix))
            .await
        {
            Ok(removed) => {
                debug!(
                    target = "qcache::cache",
                    namespace = self.keys.namespace(),
                    removed,
                    "Cache namespace flushed"
                );
                true
            }
            Err(err) => {
                counter!(METRIC_CACHE_ERROR_TOTAL, "op" => "flush").increment(1);
                warn!(
                    target = "qcache::cache",
                    namespace = self.keys.namespace(),
                    backend = self.backend.name(),
                    error = %err,
                    "Cache flush failed; entries expire by TTL"
                );
                false
            }
        }
    }

    /// Live entries under the namespace, or `0` when the store is unreachable.
    pub async fn entry_count(&self) -> u64 {
        let prefix = self.keys.prefix();
        match self
            .bounded("count", self.backend.count_prefix(&prefix))
            .await
        {
            Ok(count) => count,
            Err(err) => {
                counter!(METRIC_CACHE_ERROR_TOTAL, "op" => "count").increment(1);
                warn!(
                    target = "qcache::cache",
                    backend = self.backend.name(),
                    error = %err,
                    "Cache entry count unavailable"
                );
                0
            }
        }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, CacheBackendError>
    where
        F: Future<Output = Result<T, CacheBackendError>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                debug!(target = "qcache::cache", op, timeout = ?self.op_timeout, "Cache operation timed out");
                Err(CacheBackendError::Timeout(self.op_timeout))
            }
        }
    }

    fn report(&self, op: &'static str, key: &CacheKey, err: &CacheBackendError) {
        counter!(METRIC_CACHE_ERROR_TOTAL, "op" => op).increment(1);
        warn!(
            target = "qcache::cache",
            op,
            key = %key,
            backend = self.backend.name(),
            error = %err,
            "Cache operation failed; continuing without cache"
        );
    }
}
