use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use qcache_api_types::{ApiErrorBody, ApiErrorMessage};

use crate::application::error::{AppError, ErrorReport};
use crate::application::query::QueryError;
use crate::application::repos::StoreError;
use crate::domain::ValidationError;

pub mod codes {
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const STORE_UNAVAILABLE: &str = "store_unavailable";
    pub const CONFLICT: &str = "conflict";
    pub const STORE: &str = "store_error";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: ErrorReport,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn from_app_error(source: &'static str, error: AppError) -> Self {
        let status = error.status_code();
        let code = match &error {
            AppError::Validation(_) => codes::INVALID_INPUT,
            AppError::Store(err) if err.is_transient() => codes::STORE_UNAVAILABLE,
            AppError::Store(StoreError::Constraint { .. }) => codes::CONFLICT,
            AppError::Store(_) => codes::STORE,
            AppError::Infra(_) | AppError::Unexpected(_) => codes::INTERNAL,
        };
        let hint = match &error {
            AppError::Validation(err) => Some(err.to_string()),
            AppError::Store(err) if err.is_transient() => Some(err.to_string()),
            AppError::Store(StoreError::Constraint { constraint, .. }) => {
                Some(format!("constraint `{constraint}`"))
            }
            _ => None,
        };
        let report = ErrorReport::from_error(source, status, &error);
        Self {
            status,
            code,
            message: error.presentation_message(),
            hint,
            report,
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(error: QueryError) -> Self {
        Self::from_app_error("infra::http::api::query", AppError::from(error))
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        Self::from_app_error("infra::http::api::validation", AppError::from(error))
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        Self::from_app_error("infra::http::api::store", AppError::from(error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_requests_with_a_hint() {
        let error = ApiError::from(QueryError::Validation(ValidationError::invalid("nope")));
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.code(), codes::INVALID_INPUT);
    }

    #[test]
    fn exhausted_retries_surface_as_service_unavailable() {
        let error = ApiError::from(StoreError::transient("connection reset"));
        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.code(), codes::STORE_UNAVAILABLE);
    }
}
