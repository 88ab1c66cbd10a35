//! Read-through query path and the write path that invalidates it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::histogram;
use thiserror::Error;
use tracing::debug;

use crate::application::executor::QueryExecutor;
use crate::application::repos::{StoreError, StoreSession};
use crate::cache::{
    CacheStats, HitMissTelemetry, InvalidationOutcome, MutationInvalidator, ResultCache,
};
use crate::domain::{QuakeUpdate, QueryRequest, QueryResult, ValidationError};

const METRIC_SOURCE_QUERY_MS: &str = "qcache_source_query_ms";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub result: QueryResult,
    pub cached: bool,
    /// Time spent in the relational store; zero on a hit.
    pub source_elapsed: Duration,
    pub total_elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationOutcome {
    pub updated_rows: u64,
    pub invalidation: InvalidationOutcome,
}

#[derive(Clone)]
pub struct QueryService {
    cache: Arc<ResultCache>,
    executor: Arc<QueryExecutor>,
    telemetry: Arc<HitMissTelemetry>,
    invalidator: MutationInvalidator,
}

impl QueryService {
    pub fn new(cache: Arc<ResultCache>, executor: Arc<QueryExecutor>) -> Self {
        let telemetry = Arc::new(HitMissTelemetry::new(cache.clone()));
        let invalidator = MutationInvalidator::new(cache.clone());
        Self {
            cache,
            executor,
            telemetry,
            invalidator,
        }
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub fn telemetry(&self) -> &HitMissTelemetry {
        &self.telemetry
    }

    /// Serve `request` from the cache, falling back to the store on a miss.
    ///
    /// A connection is only checked out on a miss, and only when `session` is `None` or the
    /// caller's connection fails transiently.
    pub async fn run(
        &self,
        request: &QueryRequest,
        session: Option<&mut Box<dyn StoreSession>>,
    ) -> Result<QueryOutcome, QueryError> {
        let started = Instant::now();
        let kind = request.kind();
        let key = self.cache.keys().key_for(request);

        if let Some(result) = self.cache.get(&key).await {
            self.telemetry.record_hit(kind);
            debug!(target = "qcache::application::query", kind = kind.as_str(), "cache hit");
            return Ok(QueryOutcome {
                result,
                cached: true,
                source_elapsed: Duration::ZERO,
                total_elapsed: started.elapsed(),
            });
        }

        let ticket = self.cache.begin_fill();
        let source_started = Instant::now();
        let result = self.executor.execute(request, session).await?;
        let source_elapsed = source_started.elapsed();
        histogram!(METRIC_SOURCE_QUERY_MS, "kind" => kind.as_str())
            .record(source_elapsed.as_secs_f64() * 1000.0);

        self.cache.fill(&key, &result, ticket).await;
        self.telemetry.record_miss(kind);
        debug!(
            target = "qcache::application::query",
            kind = kind.as_str(),
            rows = result.row_count(),
            source_ms = source_elapsed.as_secs_f64() * 1000.0,
            "cache miss served from store"
        );

        Ok(QueryOutcome {
            result,
            cached: false,
            source_elapsed,
            total_elapsed: started.elapsed(),
        })
    }

    /// Apply `update`, then flush the cache. A write that matched nothing still flushes.
    pub async fn mutate(&self, update: &QuakeUpdate) -> Result<MutationOutcome, QueryError> {
        let updated_rows = self.executor.update(update).await?;
        let invalidation = self.invalidator.after_write(updated_rows).await;
        Ok(MutationOutcome {
            updated_rows,
            invalidation,
        })
    }

    pub async fn stats(&self) -> CacheStats {
        self.telemetry.snapshot().await
    }

    /// Operator-triggered flush; same path as post-write invalidation.
    pub async fn flush(&self) -> bool {
        self.cache.flush_namespace().await
    }
}
