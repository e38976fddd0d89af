//! Request-side helpers: validated JSON extraction, shared patterns and
//! identifier parsing.

use axum::Json;
use axum::extract::{FromRequest, Request};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// `#RRGGBB`
pub static HEX_COLOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("static hex colour pattern")
});

/// JSON body that is deserialized and then checked with `validator`.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value): Json<T> = Json::from_request(req, state)
            .await
            .map_err(|e| AppError::bad_request(format!("Invalid JSON: {}", e.body_text())))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Parse a path identifier, mapping failure to a 400 with the given message.
pub fn parse_uuid(raw: &str, message: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::bad_request(message))
}

/// Validated paging window of a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub page_size: i64,
    /// Rows to skip, `(page - 1) * page_size`
    pub offset: i64,
}

/// Clamp `page`/`pageSize` query values to the accepted window.
pub fn page_window(page: Option<i64>, page_size: Option<i64>) -> Result<PageWindow, AppError> {
    let page = page.unwrap_or(1);
    let page_size = page_size.unwrap_or(20);
    if page < 1 {
        return Err(AppError::bad_request("page must be >= 1"));
    }
    if !(1..=100).contains(&page_size) {
        return Err(AppError::bad_request("pageSize must be between 1 and 100"));
    }
    let offset = (page - 1)
        .checked_mul(page_size)
        .ok_or_else(|| AppError::bad_request("page is out of range"))?;
    Ok(PageWindow {
        page,
        page_size,
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color_pattern() {
        assert!(HEX_COLOR.is_match("#2563EB"));
        assert!(HEX_COLOR.is_match("#abcdef"));
        assert!(!HEX_COLOR.is_match("2563EB"));
        assert!(!HEX_COLOR.is_match("#2563E"));
        assert!(!HEX_COLOR.is_match("#GGGGGG"));
    }

    #[test]
    fn test_parse_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid(&id.to_string(), "bad").unwrap(), id);
        let err = parse_uuid("not-a-uuid", "Invalid productId").unwrap_err();
        assert_eq!(err.to_string(), "Invalid productId");
    }

    #[test]
    fn test_page_window_defaults_and_bounds() {
        let first = page_window(None, None).unwrap();
        assert_eq!((first.page, first.page_size, first.offset), (1, 20, 0));
        let third = page_window(Some(3), Some(100)).unwrap();
        assert_eq!((third.page, third.page_size, third.offset), (3, 100, 200));
        assert!(page_window(Some(0), None).is_err());
        assert!(page_window(None, Some(101)).is_err());
        assert!(page_window(None, Some(0)).is_err());
    }

    #[test]
    fn test_page_window_rejects_offset_overflow() {
        let err = page_window(Some(i64::MAX), Some(100)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(err.to_string(), "page is out of range");
        // largest page whose offset still fits
        let last = page_window(Some(i64::MAX / 100 + 1), Some(100)).unwrap();
        assert_eq!(last.offset, (i64::MAX / 100) * 100);
    }
}
