//! Template execution with a single retry on transient failure.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::warn;

use crate::application::repos::{QuakeStore, ReadIsolation, StoreError, StoreSession};
use crate::domain::{QuakeUpdate, QueryRequest, QueryResult};

const METRIC_STORE_RETRY_TOTAL: &str = "qcache_store_retry_total";
const MAX_READ_ATTEMPTS: u32 = 2;

pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(1000);

pub struct QueryExecutor {
    store: Arc<dyn QuakeStore>,
    isolation: ReadIsolation,
    backoff: Duration,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn QuakeStore>, isolation: ReadIsolation, backoff: Duration) -> Self {
        Self {
            store,
            isolation,
            backoff,
        }
    }

    pub fn isolation(&self) -> ReadIsolation {
        self.isolation
    }

    pub async fn acquire(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        self.store.acquire().await
    }

    /// Run the template for `request`.
    ///
    /// With `session` the first attempt runs on the caller's connection. A transient failure
    /// swaps it for a freshly acquired one before the retry, and the caller keeps the new one.
    /// Without `session` each attempt checks out a fresh connection and returns it before any
    /// backoff.
    pub async fn execute(
        &self,
        request: &QueryRequest,
        mut session: Option<&mut Box<dyn StoreSession>>,
    ) -> Result<QueryResult, StoreError> {
        let mut attempt = 1;
        loop {
            let outcome = match session.as_deref_mut() {
                Some(session) => session.fetch(request, self.isolation).await,
                None => self.fetch_once(request).await,
            };

            match outcome {
                Ok(result) => return Ok(result),
                Err(err) if err.is_transient() && attempt < MAX_READ_ATTEMPTS => {
                    counter!(METRIC_STORE_RETRY_TOTAL, "kind" => request.kind().as_str())
                        .increment(1);
                    warn!(
                        target = "qcache::application::executor",
                        kind = request.kind().as_str(),
                        attempt,
                        backoff_ms = self.backoff.as_millis() as u64,
                        error = %err,
                        "Transient store failure; retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                    if let Some(session) = session.as_deref_mut() {
                        *session = self.store.acquire().await?;
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Apply `update` once. Writes are never retried: a lost acknowledgement must not be replayed.
    pub async fn update(&self, update: &QuakeUpdate) -> Result<u64, StoreError> {
        let mut session = self.store.acquire().await?;
        session.update(update).await
    }

    async fn fetch_once(&self, request: &QueryRequest) -> Result<QueryResult, StoreError> {
        let mut session = self.store.acquire().await?;
        session.fetch(request, self.isolation).await
    }
}
