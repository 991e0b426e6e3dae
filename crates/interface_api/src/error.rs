//! API error handling
//!
//! Registry errors keep their field and user-facing message all the way to
//! the response body, so the console can put the message under the right
//! input.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use domain_registry::RegistryError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Form field the message belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// True when resubmitting the same data may succeed
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorResponse {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            field: None,
            retryable: false,
            details: None,
        }
    }
}

/// Status and body for a registry error
fn registry_response(err: &RegistryError) -> (StatusCode, ErrorResponse) {
    let (status, kind) = match err {
        RegistryError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
        RegistryError::ParentNotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        RegistryError::SequenceExhausted(_) => (StatusCode::CONFLICT, "sequence_exhausted"),
        e if e.is_duplicate() => (StatusCode::CONFLICT, "conflict"),
        e if e.is_retryable() => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
    };

    let mut body = ErrorResponse::new(kind, err.user_message());
    body.field = err.field().map(str::to_string);
    body.retryable = err.is_retryable();
    if let RegistryError::Validation(result) = err {
        body.details = Some(
            result
                .issues
                .iter()
                .map(|issue| format!("{}: {}", issue.field, issue.message))
                .collect(),
        );
    }
    (status, body)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::new("not_found", msg.clone())),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new("bad_request", msg.clone())),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, ErrorResponse::new("unauthorized", "Unauthorized")),
            ApiError::Registry(err) => registry_response(err),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("internal_error", msg.clone()),
            ),
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else if status == StatusCode::CONFLICT {
            warn!(error = %self, "Request conflicted");
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::PortError;
    use domain_registry::ValidationResult;

    #[test]
    fn test_validation_is_unprocessable_with_details() {
        let mut result = ValidationResult::ok();
        result.add_error("phone", "must be exactly 10 digits");
        let (status, body) = registry_response(&RegistryError::Validation(result));

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.field.as_deref(), Some("phone"));
        assert_eq!(body.details.unwrap(), vec!["phone: must be exactly 10 digits".to_string()]);
    }

    #[test]
    fn test_duplicate_phone_is_conflict() {
        let err = RegistryError::DuplicatePhone {
            phone: "9876543210".to_string(),
        };
        let (status, body) = registry_response(&err);
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.message.starts_with("Phone:"));
        assert!(!body.retryable);
    }

    #[test]
    fn test_unavailable_store_is_retryable_503() {
        let err = RegistryError::StoreUnavailable(PortError::timeout("insert customers", 5000));
        let (status, body) = registry_response(&err);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.retryable);

        let unconfirmed = RegistryError::UniquenessUnconfirmed(PortError::connection("reset"));
        assert_eq!(registry_response(&unconfirmed).0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_other_store_errors_are_internal() {
        let err = RegistryError::Store(PortError::internal("boom"));
        assert_eq!(registry_response(&err).0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
