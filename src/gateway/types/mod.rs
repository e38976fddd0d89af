//! Gateway types module
//!
//! ## Output Types
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`Paged<T>`]: Paginated list payload
//!
//! ## Input Types
//! - [`ValidatedJson<T>`]: Axum extractor running `validator` rules
//! - [`MultipartForm`]: Buffered multipart body
//!
//! ## Submodules
//! - [`response`]: Response types and helpers
//! - [`validated`]: Request validation and identifier parsing
//! - [`multipart`]: Multipart form reader

pub mod multipart;
pub mod response;
pub mod validated;

// Re-export commonly used types at module root
pub use response::{
    ApiResponse, ApiResult, ErrorBody, ItemsResponse, MessageResponse, PageMeta, Paged, created,
    ok,
};
pub use multipart::{MultipartForm, UploadedFile};
pub use validated::{HEX_COLOR, PageWindow, ValidatedJson, page_window, parse_uuid};
