use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "qcache_cache_hit_total",
            Unit::Count,
            "Reads answered from the result cache, by query kind."
        );
        describe_counter!(
            "qcache_cache_miss_total",
            Unit::Count,
            "Reads answered from the relational store, by query kind."
        );
        describe_counter!(
            "qcache_cache_error_total",
            Unit::Count,
            "Cache store operations that failed or timed out, by operation."
        );
        describe_counter!(
            "qcache_cache_flush_total",
            Unit::Count,
            "Namespace flushes attempted after writes or on operator request."
        );
        describe_counter!(
            "qcache_store_retry_total",
            Unit::Count,
            "Source queries retried after a transient failure, by query kind."
        );
        describe_histogram!(
            "qcache_source_query_ms",
            Unit::Milliseconds,
            "Relational store latency for cache misses in milliseconds."
        );
    });
}
