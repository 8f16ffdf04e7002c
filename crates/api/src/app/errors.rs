use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use warden_core::{FieldErrors, ServiceError};

/// Service error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        service_error_to_response(self.0)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Credential problems collapse into one 401 body and authorization
/// problems into one 403 body, so callers learn nothing about which check
/// failed. Store failures are reported without their cause.
pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::ValidationFailed(fields) => {
            field_error(StatusCode::BAD_REQUEST, "validation_error", "invalid input", fields)
        }
        ServiceError::DuplicateData(fields) => {
            field_error(StatusCode::CONFLICT, "duplicate", "already exists", fields)
        }
        ServiceError::DataNotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        ServiceError::InvalidCredential(_) | ServiceError::MissingCredential => {
            json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid or missing credential")
        }
        ServiceError::PermissionDenied(_) => json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden"),
        ServiceError::RequestCancelled => {
            json_error(StatusCode::REQUEST_TIMEOUT, "request_cancelled", "request cancelled")
        }
        ServiceError::QueryFieldNotAllowed(field) => json_error(
            StatusCode::BAD_REQUEST,
            "query_field_not_allowed",
            format!("field '{field}' cannot be used to filter or sort"),
        ),
        ServiceError::StoreFailure(_) | ServiceError::Internal(_) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

fn field_error(status: StatusCode, code: &'static str, message: &str, fields: FieldErrors) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message,
            "fields": fields,
        })),
    )
        .into_response()
}
