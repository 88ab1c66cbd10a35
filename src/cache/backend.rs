//! Key-value store abstraction behind [`ResultCache`](super::ResultCache).

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheBackendError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("cache protocol error: {0}")]
    Protocol(String),
}

/// A shared, TTL-aware string store. Implementations must be safe to call concurrently; any
/// cross-request synchronisation is the store's own business.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheBackendError>;

    async fn set_ex(&self, key: &str, value: String, ttl: Duration)
    -> Result<(), CacheBackendError>;

    async fn delete(&self, key: &str) -> Result<(), CacheBackendError>;

    /// Remove every key starting with `prefix`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheBackendError>;

    /// Count live keys starting with `prefix`.
    async fn count_prefix(&self, prefix: &str) -> Result<u64, CacheBackendError>;
}
