//! Consistent JSON error responses.
//!
//! | `ServiceError` | HTTP |
//! |---|---|
//! | `NotFound` | 404 |
//! | `InvalidState`, `AlreadyConverted`, `Conflict` | 409 |
//! | `Expired` | 410 |
//! | `EmptyDocument`, `Validation` | 422 |
//! | `Timeout` | 504 |
//! | `Internal` | 500 |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use shopdocs_core::DomainError;
use shopdocs_infra::ServiceError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn service_error_to_response(err: ServiceError) -> Response {
    let status = match &err {
        ServiceError::NotFound => StatusCode::NOT_FOUND,
        ServiceError::InvalidState { .. }
        | ServiceError::AlreadyConverted
        | ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Expired { .. } => StatusCode::GONE,
        ServiceError::EmptyDocument | ServiceError::Validation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ServiceError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ServiceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut body = json!({
        "error": err.code(),
        "message": err.to_string(),
    });
    match &err {
        ServiceError::InvalidState { status, .. } => body["status"] = json!(status),
        ServiceError::Expired { valid_until } => body["valid_until"] = json!(valid_until),
        ServiceError::Internal { reference } => body["reference"] = json!(reference),
        _ => {}
    }
    (status, axum::Json(body)).into_response()
}

/// Handler error: a service failure or an already-rendered response.
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    Response(Response),
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        ApiError::Service(value)
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        ApiError::Service(value.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Service(err) => service_error_to_response(err),
            ApiError::Response(resp) => resp,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (ServiceError::NotFound, StatusCode::NOT_FOUND),
            (ServiceError::AlreadyConverted, StatusCode::CONFLICT),
            (
                ServiceError::InvalidState {
                    status: "approved".into(),
                    message: "no edits".into(),
                },
                StatusCode::CONFLICT,
            ),
            (ServiceError::EmptyDocument, StatusCode::UNPROCESSABLE_ENTITY),
            (
                ServiceError::Timeout {
                    operation: "invoice.get",
                    timeout_ms: 10,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(service_error_to_response(err).status(), status);
        }
    }
}
