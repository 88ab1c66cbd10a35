//! Redis-backed cache store.
//!
//! The connection is established on first use so the service starts even when Redis is down;
//! a failed attempt is retried by the next operation.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use tokio::sync::OnceCell;

use super::backend::{CacheBackend, CacheBackendError};

const SCAN_BATCH: usize = 500;

pub struct RedisBackend {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    connect_timeout: Duration,
}

impl RedisBackend {
    /// Parse `url` without connecting.
    pub fn new(url: &str, connect_timeout: Duration) -> Result<Self, CacheBackendError> {
        let client = redis::Client::open(url)
            .map_err(|err| CacheBackendError::Unavailable(format!("invalid redis url: {err}")))?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            connect_timeout,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheBackendError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                tokio::time::timeout(
                    self.connect_timeout,
                    ConnectionManager::new(self.client.clone()),
                )
                .await
                .map_err(|_| CacheBackendError::Timeout(self.connect_timeout))?
                .map_err(map_redis_error)
            })
            .await?;
        Ok(manager.clone())
    }

    /// Walk every key matching `prefix*`, handing each batch to `visit`.
    async fn scan_prefix<F>(&self, prefix: &str, mut visit: F) -> Result<(), CacheBackendError>
    where
        F: FnMut(Vec<String>) -> Option<Vec<String>>,
    {
        let mut conn = self.connection().await?;
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?;

            if let Some(doomed) = visit(keys).filter(|keys| !keys.is_empty()) {
                let _: u64 = conn.del(doomed).await.map_err(map_redis_error)?;
            }

            if next == 0 {
                return Ok(());
            }
            cursor = next;
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheBackendError> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(map_redis_error)
    }

    async fn set_ex(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheBackendError> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(map_redis_error)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheBackendError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await.map_err(map_redis_error)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheBackendError> {
        let mut removed = 0u64;
        self.scan_prefix(prefix, |keys| {
            removed += keys.len() as u64;
            Some(keys)
        })
        .await?;
        Ok(removed)
    }

    async fn count_prefix(&self, prefix: &str) -> Result<u64, CacheBackendError> {
        let mut count = 0u64;
        self.scan_prefix(prefix, |keys| {
            count += keys.len() as u64;
            None
        })
        .await?;
        Ok(count)
    }
}

fn map_redis_error(err: RedisError) -> CacheBackendError {
    if err.is_io_error()
        || err.is_timeout()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
    {
        CacheBackendError::Unavailable(err.to_string())
    } else {
        CacheBackendError::Protocol(err.to_string())
    }
}
