//! Application error types.
//!
//! Every handler returns `AppError` on failure; it renders as the standard
//! envelope `{success: false, data: null, error: {code, message, details?}}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::gateway::types::ApiResponse;

/// Stable error codes exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    BadRequest,
    ValidationError,
    Unauthorized,
    Forbidden,
    QuotaExceeded,
    NotFound,
    Conflict,
    BadGateway,
    ServiceUnavailable,
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// Get error name string.
    pub fn name(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::BadGateway => "BAD_GATEWAY",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InternalError => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Get HTTP status code.
    pub fn http_status(self) -> StatusCode {
        match self {
            Self::BadRequest | Self::ValidationError => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::QuotaExceeded => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::BadGateway => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseError | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{message}")]
    QuotaExceeded {
        message: String,
        details: serde_json::Value,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::BadRequest(_) => ErrorCode::BadRequest,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::QuotaExceeded { .. } => ErrorCode::QuotaExceeded,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::BadGateway(_) => ErrorCode::BadGateway,
            Self::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::QuotaExceeded { details, .. } => Some(details.clone()),
            Self::Validation(errors) => serde_json::to_value(errors.field_errors()).ok(),
            _ => None,
        }
    }

    /// Client-facing message; server faults are never described.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        match &self {
            Self::Database(e) => tracing::error!("Database error: {:?}", e),
            Self::Internal(e) => tracing::error!("Internal error: {:?}", e),
            Self::BadGateway(msg) | Self::ServiceUnavailable(msg) => {
                tracing::warn!("Upstream failure: {}", msg)
            }
            _ => {}
        }

        let body = ApiResponse::<()>::error(code.name(), self.public_message(), self.details());
        (code.http_status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names() {
        assert_eq!(ErrorCode::NotFound.name(), "NOT_FOUND");
        assert_eq!(ErrorCode::QuotaExceeded.name(), "QUOTA_EXCEEDED");
        assert_eq!(ErrorCode::InternalError.name(), "INTERNAL_SERVER_ERROR");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(
            AppError::not_found("Product not found").code().http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::QuotaExceeded.http_status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Conflict("Email already registered".into())
                .code()
                .http_status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = AppError::Internal(anyhow::anyhow!("connection string leaked"));
        assert_eq!(err.public_message(), "An unexpected error occurred");
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.public_message(), "An unexpected error occurred");
    }

    #[test]
    fn test_quota_details_are_exposed() {
        let err = AppError::QuotaExceeded {
            message: "Product quota exceeded".into(),
            details: serde_json::json!({"limit": 2, "current": 2, "quota": "max_products"}),
        };
        assert_eq!(err.public_message(), "Product quota exceeded");
        assert_eq!(err.details().unwrap()["limit"], 2);
    }

    #[test]
    fn test_into_response_status() {
        let resp = AppError::forbidden("Gallery access requires Pro or Enterprise plan").into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
