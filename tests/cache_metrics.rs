mod common;

use std::collections::HashSet;
use std::sync::Arc;

use metrics_util::debugging::DebuggingRecorder;
use qcache::domain::QuakeUpdate;
use serde_json::json;

use common::{DownBackend, FakeStore, memory_service, query_service, time_range};

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Miss, hit, retry, flush through a working cache.
    let store = FakeStore::new();
    store.fail_next_fetches(1);
    let queries = memory_service(&store);
    let request = time_range(1, 2);
    queries.run(&request, None).await.expect("miss");
    queries.run(&request, None).await.expect("hit");

    let updates = json!({"mag": 3.3});
    let update = QuakeUpdate::from_json(&json!(1), updates.as_object().expect("object literal"))
        .expect("valid update");
    queries.mutate(&update).await.expect("update");

    // Store errors through an unreachable cache.
    let degraded = query_service(&FakeStore::new(), Arc::new(DownBackend));
    degraded.run(&request, None).await.expect("fail-open read");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "qcache_cache_hit_total",
        "qcache_cache_miss_total",
        "qcache_cache_error_total",
        "qcache_cache_flush_total",
        "qcache_store_retry_total",
        "qcache_source_query_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
