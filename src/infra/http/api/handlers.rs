use std::collections::BTreeMap;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use qcache_api_types::{
    BenchmarkRequest, BenchmarkResponse, CacheStatsResponse, FlushResponse, HealthResponse,
    JsonObject, QueryResponse, Timing, UpdateRequest, UpdateResponse,
};

use crate::application::benchmark::BenchmarkRun;
use crate::application::query::QueryOutcome;
use crate::domain::{QuakeUpdate, QueryKind, QueryRequest, QueryResult};

use super::error::ApiError;
use super::state::ApiState;

const NO_ROWS_WARNING: &str = "no rows matched the given time";

/// Milliseconds rounded to three decimals.
pub(crate) fn millis(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 1_000_000.0).round() / 1000.0
}

fn query_response(outcome: QueryOutcome) -> QueryResponse<QueryResult> {
    QueryResponse {
        result: outcome.result,
        cached: outcome.cached,
        timing: Timing {
            source_ms: millis(outcome.source_elapsed),
            total_ms: millis(outcome.total_elapsed),
        },
    }
}

/// Wire form of a benchmark run, shared by the HTTP route and the `bench` command.
pub fn benchmark_report(run: BenchmarkRun) -> BenchmarkResponse<QueryResult> {
    BenchmarkResponse {
        latencies_a_ms: run.latencies_a.into_iter().map(millis).collect(),
        latencies_b_ms: run.latencies_b.into_iter().map(millis).collect(),
        total_ms: millis(run.total),
        last_result_a: run.last_result_a,
        last_result_b: run.last_result_b,
    }
}

async fn run_query(
    state: &ApiState,
    kind: QueryKind,
    params: &JsonObject,
) -> Result<QueryResponse<QueryResult>, ApiError> {
    let request = QueryRequest::from_json(kind, params)?;
    let outcome = state.queries.run(&request, None).await?;
    Ok(query_response(outcome))
}

pub async fn time_range(
    State(state): State<ApiState>,
    Json(params): Json<JsonObject>,
) -> Result<impl IntoResponse, ApiError> {
    let response = run_query(&state, QueryKind::TimeRange, &params).await?;
    Ok(Json(response))
}

pub async fn start_net_count(
    State(state): State<ApiState>,
    Json(params): Json<JsonObject>,
) -> Result<impl IntoResponse, ApiError> {
    let response = run_query(&state, QueryKind::StartNetCount, &params).await?;
    Ok(Json(response))
}

pub async fn benchmark(
    State(state): State<ApiState>,
    Json(payload): Json<BenchmarkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let a = QueryRequest::from_json(QueryKind::TimeRange, &payload.time_range)?;
    let b = QueryRequest::from_json(QueryKind::StartNetCount, &payload.start_net_count)?;

    let run = state.benchmark.run(payload.repetitions, &a, &b).await?;
    Ok(Json(benchmark_report(run)))
}

pub async fn update_quakes(
    State(state): State<ApiState>,
    Json(payload): Json<UpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let update = QuakeUpdate::from_json(&payload.time, &payload.updates)?;
    let outcome = state.queries.mutate(&update).await?;

    if outcome.updated_rows == 0 {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(UpdateResponse {
                updated_rows: 0,
                warning: Some(NO_ROWS_WARNING.to_string()),
            }),
        ));
    }

    Ok((
        StatusCode::OK,
        Json(UpdateResponse {
            updated_rows: outcome.updated_rows,
            warning: None,
        }),
    ))
}

pub async fn cache_stats(State(state): State<ApiState>) -> impl IntoResponse {
    let stats = state.queries.stats().await;
    let by_name = |counts: BTreeMap<QueryKind, u64>| {
        counts
            .into_iter()
            .map(|(kind, count)| (kind.as_str().to_string(), count))
            .collect::<BTreeMap<_, _>>()
    };

    Json(CacheStatsResponse {
        hits: by_name(stats.hits),
        misses: by_name(stats.misses),
        entry_count: stats.entry_count,
        ttl_seconds: stats.ttl_seconds,
    })
}

pub async fn flush_cache(State(state): State<ApiState>) -> impl IntoResponse {
    let flushed = state.queries.flush().await;
    Json(FlushResponse { flushed })
}

pub async fn health(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.queries.executor().acquire().await?;
    session.ping().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        database: "reachable".to_string(),
    }))
}
