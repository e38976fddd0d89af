//! Users and their sign-in identities.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::db::SafeRow;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    fn from_row(row: &PgRow) -> Self {
        Self {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.try_get_opt("password_hash"),
            name: row.try_get_opt("name"),
            avatar_url: row.try_get_opt("avatar_url"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, name, avatar_url, created_at, updated_at";

pub struct UserRepository;

impl UserRepository {
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM tbl_users WHERE email = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(email.to_lowercase())
            .fetch_optional(pool)
            .await?;
        Ok(row.as_ref().map(UserRow::from_row))
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserRow>, sqlx::Error> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM tbl_users WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
        Ok(row.as_ref().map(UserRow::from_row))
    }

    pub async fn insert(
        conn: &mut PgConnection,
        email: &str,
        password_hash: Option<&str>,
        name: &str,
    ) -> Result<UserRow, sqlx::Error> {
        let sql = format!(
            "INSERT INTO tbl_users (email, password_hash, name) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(email.to_lowercase())
            .bind(password_hash)
            .bind(name)
            .fetch_one(conn)
            .await?;
        Ok(UserRow::from_row(&row))
    }

    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<Option<UserRow>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE tbl_users
            SET name = COALESCE($2, name),
                avatar_url = COALESCE($3, avatar_url),
                updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(name)
            .bind(avatar_url)
            .fetch_optional(pool)
            .await?;
        Ok(row.as_ref().map(UserRow::from_row))
    }

    pub async fn insert_identity(
        conn: &mut PgConnection,
        user_id: Uuid,
        provider: &str,
        provider_user_id: &str,
        email: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO tbl_auth_identities (user_id, provider, provider_user_id, email, last_login_at)
            VALUES ($1, $2, $3, $4, now())
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(provider_user_id)
        .bind(email.to_lowercase())
        .execute(conn)
        .await?;
        Ok(())
    }

    /// User behind a provider identity, if the identity exists and the user is live.
    pub async fn find_by_identity(
        pool: &PgPool,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<UserRow>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.email, u.password_hash, u.name, u.avatar_url, u.created_at, u.updated_at
            FROM tbl_auth_identities ai
            JOIN tbl_users u ON u.id = ai.user_id
            WHERE ai.provider = $1 AND ai.provider_user_id = $2 AND u.deleted_at IS NULL
            "#,
        )
        .bind(provider)
        .bind(provider_user_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.as_ref().map(UserRow::from_row))
    }

    pub async fn touch_identity(
        pool: &PgPool,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tbl_auth_identities SET last_login_at = now() WHERE provider = $1 AND provider_user_id = $2",
        )
        .bind(provider)
        .bind(provider_user_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
