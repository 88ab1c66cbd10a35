#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use qcache::application::benchmark::BenchmarkRunner;
use qcache::application::executor::QueryExecutor;
use qcache::application::query::QueryService;
use qcache::application::repos::{QuakeStore, ReadIsolation, StoreError, StoreSession};
use qcache::cache::{CacheBackend, CacheBackendError, CacheConfig, MemoryBackend, ResultCache};
use qcache::domain::{QuakeUpdate, QueryRequest, QueryResult, Scalar};

pub const TEST_BACKOFF: Duration = Duration::from_millis(5);

/// Shared counters and fault switches behind every [`FakeSession`].
#[derive(Default)]
pub struct FakeState {
    pub acquires: AtomicUsize,
    pub fetches: AtomicUsize,
    pub updates: AtomicUsize,
    pub pings: AtomicUsize,
    /// Number of upcoming fetches that fail with a transient error.
    pub transient_failures: AtomicUsize,
    /// Number of upcoming fetches that fail with a fatal error.
    pub fatal_failures: AtomicUsize,
    /// Acquire ordinal (1-based) of a session whose fetches always fail transiently.
    pub dead_session: AtomicUsize,
    /// Updates fail with a primary key violation.
    pub conflict_on_update: AtomicBool,
    pub fail_acquire: AtomicBool,
    /// Rows reported by the next updates.
    pub rows_per_update: AtomicU64,
    /// Bumped by every update that changes rows; shows up in fetched rows.
    pub version: AtomicU64,
}

#[derive(Clone, Default)]
pub struct FakeStore {
    pub state: Arc<FakeState>,
}

impl FakeStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.state.rows_per_update.store(1, Ordering::SeqCst);
        store
    }

    pub fn fetches(&self) -> usize {
        self.state.fetches.load(Ordering::SeqCst)
    }

    pub fn acquires(&self) -> usize {
        self.state.acquires.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.state.updates.load(Ordering::SeqCst)
    }

    pub fn fail_next_fetches(&self, count: usize) {
        self.state.transient_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_fetches_fatally(&self, count: usize) {
        self.state.fatal_failures.store(count, Ordering::SeqCst);
    }

    /// Every fetch on the `nth` acquired session fails, as on a reset connection.
    pub fn kill_session(&self, nth: usize) {
        self.state.dead_session.store(nth, Ordering::SeqCst);
    }

    pub fn reject_updates_with_conflict(&self) {
        self.state.conflict_on_update.store(true, Ordering::SeqCst);
    }

    pub fn set_rows_per_update(&self, rows: u64) {
        self.state.rows_per_update.store(rows, Ordering::SeqCst);
    }
}

#[async_trait]
impl QuakeStore for FakeStore {
    async fn acquire(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let ordinal = self.state.acquires.fetch_add(1, Ordering::SeqCst) + 1;
        if self.state.fail_acquire.load(Ordering::SeqCst) {
            return Err(StoreError::transient("pool exhausted"));
        }
        Ok(Box::new(FakeSession {
            state: self.state.clone(),
            ordinal,
        }))
    }
}

pub struct FakeSession {
    state: Arc<FakeState>,
    ordinal: usize,
}

#[async_trait]
impl StoreSession for FakeSession {
    async fn ping(&mut self) -> Result<(), StoreError> {
        self.state.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch(
        &mut self,
        request: &QueryRequest,
        _isolation: ReadIsolation,
    ) -> Result<QueryResult, StoreError> {
        self.state.fetches.fetch_add(1, Ordering::SeqCst);
        if self.state.dead_session.load(Ordering::SeqCst) == self.ordinal {
            return Err(StoreError::transient("connection closed"));
        }
        let fatal = self
            .state
            .fatal_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if fatal.is_ok() {
            return Err(StoreError::fatal("column \"mag\" does not exist"));
        }
        let pending = self
            .state
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(StoreError::transient("connection reset by peer"));
        }
        Ok(sample_result(
            request,
            self.state.version.load(Ordering::SeqCst),
        ))
    }

    async fn update(&mut self, _update: &QuakeUpdate) -> Result<u64, StoreError> {
        self.state.updates.fetch_add(1, Ordering::SeqCst);
        if self.state.conflict_on_update.load(Ordering::SeqCst) {
            return Err(StoreError::Constraint {
                constraint: "quakes_pkey".to_string(),
                message: "duplicate key value violates unique constraint".to_string(),
            });
        }
        let rows = self.state.rows_per_update.load(Ordering::SeqCst);
        if rows > 0 {
            self.state.version.fetch_add(1, Ordering::SeqCst);
        }
        Ok(rows)
    }
}

/// Deterministic rows derived from the request and the store version.
pub fn sample_result(request: &QueryRequest, version: u64) -> QueryResult {
    let columns = ["id", "net", "time", "latitude", "longitude"]
        .into_iter()
        .map(str::to_string)
        .collect();
    let (net, time) = match request {
        QueryRequest::TimeRange(range) => ("us".to_string(), range.min_time()),
        QueryRequest::StartNetCount(query) => (query.net().to_string(), query.start_time()),
    };
    QueryResult::new(
        columns,
        vec![vec![
            Scalar::Text(format!("ev-{version}")),
            Scalar::Text(net),
            Scalar::Integer(time),
            Scalar::Float(37.123_456_789),
            Scalar::Null,
        ]],
    )
}

/// Cache store that is never reachable.
pub struct DownBackend;

#[async_trait]
impl CacheBackend for DownBackend {
    fn name(&self) -> &'static str {
        "down"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheBackendError> {
        Err(CacheBackendError::Unavailable("connection refused".into()))
    }

    async fn set_ex(
        &self,
        _key: &str,
        _value: String,
        _ttl: Duration,
    ) -> Result<(), CacheBackendError> {
        Err(CacheBackendError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheBackendError> {
        Err(CacheBackendError::Unavailable("connection refused".into()))
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<u64, CacheBackendError> {
        Err(CacheBackendError::Unavailable("connection refused".into()))
    }

    async fn count_prefix(&self, _prefix: &str) -> Result<u64, CacheBackendError> {
        Err(CacheBackendError::Unavailable("connection refused".into()))
    }
}

pub fn query_service(store: &FakeStore, backend: Arc<dyn CacheBackend>) -> QueryService {
    let cache = Arc::new(ResultCache::new(backend, &CacheConfig::default()));
    let executor = Arc::new(QueryExecutor::new(
        Arc::new(store.clone()),
        ReadIsolation::default(),
        TEST_BACKOFF,
    ));
    QueryService::new(cache, executor)
}

pub fn memory_service(store: &FakeStore) -> QueryService {
    query_service(store, Arc::new(MemoryBackend::new()))
}

pub fn benchmark_runner(queries: &QueryService) -> BenchmarkRunner {
    BenchmarkRunner::new(queries.clone(), 25)
}

pub fn time_range(min: i64, max: i64) -> QueryRequest {
    QueryRequest::time_range(min, max).expect("valid time range")
}

pub fn start_net_count(start: i64, net: &str, count: i64) -> QueryRequest {
    QueryRequest::start_net_count(start, net, count).expect("valid start/net/count")
}
