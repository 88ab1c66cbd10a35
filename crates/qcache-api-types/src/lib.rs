//! Wire types for the qcache HTTP API.
//!
//! Query parameters travel as loosely-typed JSON objects and are validated by the server before
//! any component sees them, so request bodies keep them as [`JsonObject`]. Responses that embed a
//! query result are generic over the result type so this crate stays free of server internals.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Body of `POST /benchmark`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRequest {
    #[serde(alias = "T")]
    pub repetitions: i64,
    #[serde(alias = "q10a")]
    pub time_range: JsonObject,
    #[serde(alias = "q10b")]
    pub start_net_count: JsonObject,
}

/// Body of `POST /quakes/update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(alias = "match_key")]
    pub time: serde_json::Value,
    #[serde(default, alias = "field_updates")]
    pub updates: JsonObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub source_ms: f64,
    pub total_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse<R> {
    pub result: R,
    pub cached: bool,
    pub timing: Timing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResponse<R> {
    pub latencies_a_ms: Vec<f64>,
    pub latencies_b_ms: Vec<f64>,
    pub total_ms: f64,
    pub last_result_a: Option<R>,
    pub last_result_b: Option<R>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub updated_rows: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub hits: BTreeMap<String, u64>,
    pub misses: BTreeMap<String, u64>,
    pub entry_count: u64,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushResponse {
    pub flushed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}
