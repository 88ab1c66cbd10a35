pub mod api;
mod middleware;

pub use api::{ApiError, ApiState};
pub use middleware::{REQUEST_ID_HEADER, RequestContext};

use axum::{Router, middleware as axum_middleware};

use self::middleware::{log_responses, set_request_context};

/// Full application router with request-id and response-logging layers.
pub fn build_router(state: ApiState) -> Router {
    api::build_api_router(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
