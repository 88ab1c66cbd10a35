use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 128;

/// Per-request correlation data, mirrored onto the response.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Reuse a caller-supplied `x-request-id` when it is printable, otherwise mint one.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let ctx = RequestContext { request_id };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    let report = response.extensions_mut().remove::<ErrorReport>();
    let Some(report) = report.filter(|_| is_failure(status)) else {
        if is_failure(status) {
            // Rejections produced by extractors carry no report.
            warn!(
                target = "qcache::http::response",
                status = status.as_u16(),
                method = %method,
                path = %path,
                elapsed_ms,
                request_id = %request_id,
                "request rejected"
            );
        } else {
            debug!(
                target = "qcache::http::response",
                status = status.as_u16(),
                method = %method,
                path = %path,
                elapsed_ms,
                request_id = %request_id,
                "request served"
            );
        }
        return response;
    };

    let detail = report
        .messages
        .first()
        .map(String::as_str)
        .unwrap_or("no diagnostic available");

    if status.is_server_error() {
        error!(
            target = "qcache::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            source = report.source,
            detail,
            chain = ?report.messages,
            request_id = %request_id,
            "request failed"
        );
    } else {
        warn!(
            target = "qcache::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            source = report.source,
            detail,
            chain = ?report.messages,
            request_id = %request_id,
            "client request error"
        );
    }

    response
}

fn is_failure(status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}
