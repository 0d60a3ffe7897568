//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type ApiResult<T> = Result<T, ApiError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(String),
}

/// Error classification attached to 5xx responses as an extension so the
/// audit recorder can log the real failure while the client body stays
/// generic.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub kind: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            ApiError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        let mut response = (status, body).into_response();
        if status.is_server_error() {
            let detail = match &self {
                ApiError::Internal(m) => m.clone(),
                other => other.to_string(),
            };
            response.extensions_mut().insert(ErrorDetail {
                kind: error,
                message: detail,
            });
        }
        response
    }
}

/// Convert a handler panic into the standard 500 response, keeping the
/// panic message observable by the audit recorder.
pub fn panic_response(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "handler panicked".to_string()
    };
    ApiError::Internal(message).into_response()
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => ApiError::NotFound("row not found".into()),
            _ => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<gatehouse_core::auth::AuthError> for ApiError {
    fn from(e: gatehouse_core::auth::AuthError) -> Self {
        use gatehouse_core::auth::AuthError;
        match e {
            AuthError::CredentialError => ApiError::Unauthorized("Invalid credentials".into()),
            AuthError::TokenError(msg) => ApiError::Unauthorized(msg),
            AuthError::ValidationError(msg) => ApiError::Validation(msg),
            AuthError::DbError(e) => ApiError::from(e),
            AuthError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<gatehouse_core::audit::AuditError> for ApiError {
    fn from(e: gatehouse_core::audit::AuditError) -> Self {
        match e {
            gatehouse_core::audit::AuditError::DbError(e) => ApiError::from(e),
        }
    }
}
