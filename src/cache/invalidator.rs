use std::sync::Arc;

use tracing::{info, warn};

use super::store::ResultCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationOutcome {
    Flushed,
    /// The flush could not reach the store. Stale entries live until their TTL.
    FlushFailed,
}

/// Coarse invalidation: every committed write drops the whole namespace, whatever it matched.
#[derive(Clone)]
pub struct MutationInvalidator {
    cache: Arc<ResultCache>,
}

impl MutationInvalidator {
    pub fn new(cache: Arc<ResultCache>) -> Self {
        Self { cache }
    }

    /// Call after the write has committed. Never fails.
    pub async fn after_write(&self, rows_affected: u64) -> InvalidationOutcome {
        if self.cache.flush_namespace().await {
            info!(
                target = "qcache::cache::invalidator",
                rows_affected, "Cache namespace invalidated after write"
            );
            InvalidationOutcome::Flushed
        } else {
            warn!(
                target = "qcache::cache::invalidator",
                rows_affected,
                ttl_seconds = self.cache.ttl().as_secs(),
                "Invalidation failed; cached results may be stale until expiry"
            );
            InvalidationOutcome::FlushFailed
        }
    }
}
