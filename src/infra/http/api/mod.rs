pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::ApiState;

use axum::{
    Router,
    routing::{delete, get, post},
};

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/queries/time-range", post(handlers::time_range))
        .route("/queries/start-net-count", post(handlers::start_net_count))
        .route("/benchmark", post(handlers::benchmark))
        .route("/quakes/update", post(handlers::update_quakes))
        .route("/cache/stats", get(handlers::cache_stats))
        .route("/cache", delete(handlers::flush_cache))
        .route("/healthz", get(handlers::health))
        .with_state(state)
}
