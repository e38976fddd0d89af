//! Support contact requests.

pub mod handlers;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::db::SafeRow;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SupportCreateRequest {
    #[validate(length(min = 1, max = 255))]
    #[schema(example = "Jane Doe")]
    pub fullname: String,
    #[validate(length(max = 5000))]
    pub comment: Option<String>,
    /// Must be the caller's own id
    pub userid: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SupportResponse {
    pub id: i32,
    pub fullname: String,
    pub comment: Option<String>,
    pub isactive: bool,
    pub created_by: Option<Uuid>,
    pub created_date: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
    pub updated_date: Option<DateTime<Utc>>,
}

/// The payload user id, which must name the authenticated user.
pub fn check_requester(raw: &str, user_id: Uuid) -> Result<Uuid, AppError> {
    let requester = Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::bad_request("Invalid user ID format. Must be a valid UUID."))?;
    if requester != user_id {
        return Err(AppError::forbidden(
            "User ID in request does not match authenticated user.",
        ));
    }
    Ok(requester)
}

pub struct SupportService;

impl SupportService {
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        req: &SupportCreateRequest,
    ) -> Result<SupportResponse, AppError> {
        let user_id = check_requester(&req.userid, user_id)?;
        let row = sqlx::query(
            r#"
            INSERT INTO tbl_support (fullname, comment, isactive, created_by)
            VALUES ($1, $2, TRUE, $3)
            RETURNING id, fullname, comment, isactive, created_by, created_date, updated_by, updated_date
            "#,
        )
        .bind(req.fullname.trim())
        .bind(&req.comment)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let entry = SupportResponse {
            id: row.get("id"),
            fullname: row.get("fullname"),
            comment: row.try_get_opt("comment"),
            isactive: row.get("isactive"),
            created_by: row.try_get_opt("created_by"),
            created_date: row.get("created_date"),
            updated_by: row.try_get_opt("updated_by"),
            updated_date: row.try_get_opt("updated_date"),
        };
        tracing::info!(support_id = entry.id, %user_id, "Support request created");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_requester_must_match() {
        let me = Uuid::new_v4();
        assert_eq!(check_requester(&me.to_string(), me).unwrap(), me);

        let err = check_requester("someone", me).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
        assert!(err.to_string().contains("Must be a valid UUID"));

        let err = check_requester(&Uuid::new_v4().to_string(), me).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[test]
    fn test_request_limits() {
        let req = SupportCreateRequest {
            fullname: String::new(),
            comment: None,
            userid: Uuid::new_v4().to_string(),
        };
        assert!(req.validate().is_err());

        let req = SupportCreateRequest {
            fullname: "Jane".into(),
            comment: Some("x".repeat(5001)),
            userid: Uuid::new_v4().to_string(),
        };
        assert!(req.validate().is_err());
    }
}
