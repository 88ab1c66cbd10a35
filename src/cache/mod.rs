//! qcache result cache
//!
//! Read-through caching of query results in a shared, TTL-aware store:
//!
//! - **Keys**: `{namespace}:{kind}:{canonical params}`, independent of parameter order
//! - **Store**: Redis in production, an in-process map for single-node runs and tests
//! - **Invalidation**: any write that changes rows flushes the whole namespace
//!
//! The cache never fails a request. An unreachable or slow store degrades every read to a miss.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "redis"
//! redis_url = "redis://127.0.0.1:6379/"
//! ttl_seconds = 120
//! op_timeout_ms = 500
//! namespace = "qcache"
//! ```

mod backend;
mod config;
mod invalidator;
mod keys;
mod memory;
mod redis_backend;
mod store;
mod telemetry;

use std::sync::Arc;

pub use backend::{CacheBackend, CacheBackendError};
pub use config::{CacheBackendKind, CacheConfig};
pub use invalidator::{InvalidationOutcome, MutationInvalidator};
pub use keys::{CacheKey, CacheKeyBuilder, DEFAULT_NAMESPACE};
pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;
pub use store::{FillTicket, ResultCache};
pub use telemetry::{CacheStats, HitMissTelemetry};

/// Build the store selected by `config`. Does not contact the store.
pub fn build_backend(config: &CacheConfig) -> Result<Arc<dyn CacheBackend>, CacheBackendError> {
    match config.backend {
        CacheBackendKind::Memory => Ok(Arc::new(MemoryBackend::new())),
        CacheBackendKind::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                CacheBackendError::Unavailable("cache.redis_url is not set".to_string())
            })?;
            Ok(Arc::new(RedisBackend::new(url, config.op_timeout)?))
        }
    }
}
