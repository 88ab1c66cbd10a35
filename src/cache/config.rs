//! Cache configuration.
//!
//! Controls the result cache store, entry lifetime and per-operation timeout via `qcache.toml`.

use std::time::Duration;

use super::keys::DEFAULT_NAMESPACE;

const DEFAULT_TTL_SECONDS: u64 = 120;
const DEFAULT_OP_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    /// Required when `backend` is `redis`.
    pub redis_url: Option<String>,
    pub ttl: Duration,
    /// Upper bound for a single store round trip, including connection setup.
    pub op_timeout: Duration,
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            redis_url: None,
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            op_timeout: Duration::from_millis(DEFAULT_OP_TIMEOUT_MS),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            backend: settings.backend,
            redis_url: settings.redis_url.clone(),
            ttl: Duration::from_secs(settings.ttl_seconds.get()),
            op_timeout: Duration::from_millis(settings.op_timeout_ms.get()),
            namespace: settings.namespace.clone(),
        }
    }
}

impl CacheConfig {
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.as_secs()
    }
}
