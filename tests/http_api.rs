mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use qcache::infra::http::{ApiState, REQUEST_ID_HEADER, build_router};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{FakeStore, benchmark_runner, memory_service};

fn app(store: &FakeStore) -> Router {
    let queries = memory_service(store);
    let benchmark = Arc::new(benchmark_runner(&queries));
    build_router(ApiState::new(queries, benchmark))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("request should build");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn time_range_reports_cached_flag_and_timing() {
    let store = FakeStore::new();
    let app = app(&store);
    let body = json!({"min": 1000, "max": 2000});

    let (status, first) = send(&app, Method::POST, "/queries/time-range", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cached"], json!(false));
    assert_eq!(
        first["result"]["columns"],
        json!(["id", "net", "time", "latitude", "longitude"])
    );
    assert_eq!(first["result"]["rows"][0][2], json!(1000));
    assert_eq!(first["result"]["rows"][0][3], json!(37.123_456_789));
    assert!(first["timing"]["source_ms"].is_number());

    let (status, second) = send(&app, Method::POST, "/queries/time-range", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cached"], json!(true));
    assert_eq!(second["timing"]["source_ms"], json!(0.0));
    assert_eq!(second["result"], first["result"]);
    assert_eq!(store.fetches(), 1);
}

#[tokio::test]
async fn start_net_count_accepts_string_integers() {
    let store = FakeStore::new();
    let app = app(&store);

    let (status, body) = send(
        &app,
        Method::POST,
        "/queries/start-net-count",
        Some(json!({"start": "1700000000", "filter": "us", "limit": "25"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["rows"][0][1], json!("us"));
}

#[tokio::test]
async fn invalid_parameters_are_rejected_with_an_error_body() {
    let store = FakeStore::new();
    let app = app(&store);

    let (status, body) = send(
        &app,
        Method::POST,
        "/queries/time-range",
        Some(json!({"min_time": 10, "max_time": 1})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("invalid_input"));
    assert!(
        body["error"]["hint"]
            .as_str()
            .is_some_and(|hint| hint.contains("min_time"))
    );
    assert_eq!(store.acquires(), 0);
}

#[tokio::test]
async fn unknown_parameter_is_rejected() {
    let store = FakeStore::new();
    let app = app(&store);

    let (status, body) = send(
        &app,
        Method::POST,
        "/queries/start-net-count",
        Some(json!({"start_time": 1, "net": "us", "count": 5, "depth": 3})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("invalid_input"));
}

#[tokio::test]
async fn exhausted_retries_map_to_service_unavailable() {
    let store = FakeStore::new();
    store.fail_next_fetches(2);
    let app = app(&store);

    let (status, body) = send(
        &app,
        Method::POST,
        "/queries/time-range",
        Some(json!({"min_time": 1, "max_time": 2})),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], json!("store_unavailable"));
}

#[tokio::test]
async fn fatal_store_error_is_an_internal_error() {
    let store = FakeStore::new();
    store.fail_next_fetches_fatally(1);
    let app = app(&store);

    let (status, body) = send(
        &app,
        Method::POST,
        "/queries/time-range",
        Some(json!({"min_time": 1, "max_time": 2})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], json!("store_error"));
    assert!(body["error"]["hint"].is_null());
    assert_eq!(store.fetches(), 1);
}

#[tokio::test]
async fn constraint_violation_is_a_conflict() {
    let store = FakeStore::new();
    store.reject_updates_with_conflict();
    let app = app(&store);

    let (status, body) = send(
        &app,
        Method::POST,
        "/quakes/update",
        Some(json!({"time": 5, "updates": {"id": "us7000abcd"}})),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!("conflict"));
    assert_eq!(body["error"]["hint"], json!("constraint `quakes_pkey`"));
    assert_eq!(store.updates(), 1);
}

#[tokio::test]
async fn update_flushes_cached_results() {
    let store = FakeStore::new();
    let app = app(&store);
    let query = json!({"min_time": 1, "max_time": 2});

    send(&app, Method::POST, "/queries/time-range", Some(query.clone())).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/quakes/update",
        Some(json!({"match_key": 1, "field_updates": {"mag": "5.5", "net": "nc"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"updated_rows": 1}));

    let (_, reread) = send(&app, Method::POST, "/queries/time-range", Some(query)).await;
    assert_eq!(reread["cached"], json!(false));
    assert_eq!(reread["result"]["rows"][0][0], json!("ev-1"));
}

#[tokio::test]
async fn update_matching_nothing_is_not_found_with_warning() {
    let store = FakeStore::new();
    store.set_rows_per_update(0);
    let app = app(&store);

    let (status, body) = send(
        &app,
        Method::POST,
        "/quakes/update",
        Some(json!({"time": 5, "updates": {"depth": null}})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["updated_rows"], json!(0));
    assert!(body["warning"].is_string());
}

#[tokio::test]
async fn update_matching_nothing_still_flushes_the_cache() {
    let store = FakeStore::new();
    store.set_rows_per_update(0);
    let app = app(&store);
    let query = json!({"min_time": 1, "max_time": 2});

    send(&app, Method::POST, "/queries/time-range", Some(query.clone())).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/quakes/update",
        Some(json!({"time": 5, "updates": {"mag": 3.0}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, reread) = send(&app, Method::POST, "/queries/time-range", Some(query)).await;
    assert_eq!(reread["cached"], json!(false));
    assert_eq!(store.fetches(), 2);
}

#[tokio::test]
async fn update_without_known_fields_is_rejected() {
    let store = FakeStore::new();
    let app = app(&store);

    let (status, _) = send(
        &app,
        Method::POST,
        "/quakes/update",
        Some(json!({"time": 5, "updates": {"colour": "red"}})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.updates(), 0);
}

#[tokio::test]
async fn benchmark_returns_latency_lists() {
    let store = FakeStore::new();
    let app = app(&store);

    let (status, body) = send(
        &app,
        Method::POST,
        "/benchmark",
        Some(json!({
            "T": 5,
            "q10a": {"min_time": 1, "max_time": 2},
            "q10b": {"start_time": 1, "net": "us", "count": 3}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["latencies_a_ms"].as_array().map(Vec::len), Some(5));
    assert_eq!(body["latencies_b_ms"].as_array().map(Vec::len), Some(5));
    assert!(body["total_ms"].is_number());
    assert!(body["last_result_a"]["rows"].is_array());
    assert!(body["last_result_b"]["rows"].is_array());
}

#[tokio::test]
async fn benchmark_rejects_zero_repetitions() {
    let store = FakeStore::new();
    let app = app(&store);

    let (status, body) = send(
        &app,
        Method::POST,
        "/benchmark",
        Some(json!({
            "repetitions": 0,
            "time_range": {"min_time": 1, "max_time": 2},
            "start_net_count": {"start_time": 1, "net": "us", "count": 3}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("invalid_input"));
    assert_eq!(store.acquires(), 0);
}

#[tokio::test]
async fn cache_stats_and_flush() {
    let store = FakeStore::new();
    let app = app(&store);
    let query = json!({"min_time": 1, "max_time": 2});

    send(&app, Method::POST, "/queries/time-range", Some(query.clone())).await;
    send(&app, Method::POST, "/queries/time-range", Some(query)).await;

    let (status, stats) = send(&app, Method::GET, "/cache/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["hits"]["time_range"], json!(1));
    assert_eq!(stats["misses"]["time_range"], json!(1));
    assert_eq!(stats["hits"]["start_net_count"], json!(0));
    assert_eq!(stats["entry_count"], json!(1));
    assert_eq!(stats["ttl_seconds"], json!(120));

    let (status, flushed) = send(&app, Method::DELETE, "/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(flushed, json!({"flushed": true}));

    let (_, stats) = send(&app, Method::GET, "/cache/stats", None).await;
    assert_eq!(stats["entry_count"], json!(0));
}

#[tokio::test]
async fn healthz_pings_the_store() {
    let store = FakeStore::new();
    let app = app(&store);

    let (status, body) = send(&app, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(store.state.pings.load(Ordering::SeqCst), 1);

    store.state.fail_acquire.store(true, Ordering::SeqCst);
    let (status, _) = send(&app, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn request_id_is_echoed_or_minted() {
    let store = FakeStore::new();
    let app = app(&store);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/cache/stats")
        .header(REQUEST_ID_HEADER, "trace-123")
        .body(Body::empty())
        .expect("request should build");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(
        response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok()),
        Some("trace-123")
    );

    let request = Request::builder()
        .method(Method::GET)
        .uri("/cache/stats")
        .body(Body::empty())
        .expect("request should build");
    let response = app.oneshot(request).await.expect("response");
    let minted = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert_eq!(minted.len(), 36);
}
