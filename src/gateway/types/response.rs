//! API Response types
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `ApiResult<T>`: Handler return type
//! - `Paged<T>` / `PageMeta`: Paginated list payloads

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - success: true when `data` carries the result
/// - data: actual data (success) or null (error)
/// - error: `{code, message, details?}` (error) or null (success)
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    #[schema(example = true)]
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorBody>,
}

/// Error payload of a failed request
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = "NOT_FOUND")]
    pub code: String,
    #[schema(example = "Product not found")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create error response
    pub fn error(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: code.into(),
                message: message.into(),
                details,
            }),
        }
    }
}

/// Handler result: status plus envelope, or an `AppError`
pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

/// 200 OK with data
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

/// 201 Created with data
pub fn created<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

// ============================================================================
// Pagination
// ============================================================================

/// Pagination metadata
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn new(page: i64, page_size: i64, total: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total + page_size - 1) / page_size
        } else {
            0
        };
        Self {
            page,
            page_size,
            total,
            total_pages,
        }
    }
}

/// Paginated list payload
#[derive(Debug, Serialize, ToSchema)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

/// Simple `{message}` acknowledgement
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Product deleted")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Reference-table listing `{items: [...]}`
#[derive(Debug, Serialize, ToSchema)]
pub struct ItemsResponse<T> {
    pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let json = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], 42);
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_error_envelope_shape() {
        let json =
            serde_json::to_value(ApiResponse::<()>::error("NOT_FOUND", "Job not found", None))
                .unwrap();
        assert_eq!(json["success"], false);
        assert!(json["data"].is_null());
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "Job not found");
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn test_page_meta_rounds_up() {
        assert_eq!(PageMeta::new(1, 20, 41).total_pages, 3);
        assert_eq!(PageMeta::new(1, 20, 40).total_pages, 2);
        assert_eq!(PageMeta::new(1, 20, 0).total_pages, 0);
    }

    #[test]
    fn test_page_meta_camel_case() {
        let json = serde_json::to_value(PageMeta::new(2, 10, 15)).unwrap();
        assert_eq!(json["pageSize"], 10);
        assert_eq!(json["totalPages"], 2);
    }
}
