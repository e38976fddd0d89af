use anyhow::{Context, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::google::GoogleProfile;
use super::repository::{UserRepository, UserRow};
use crate::config::AuthConfig;
use crate::error::AppError;
use crate::licensing::LicensingService;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Subject (user id)
    pub exp: usize,  // Expiration time (as UTC timestamp)
    pub iat: usize,  // Issued at
}

/// Password hashing and token issuance.
pub struct AuthService {
    jwt_secret: String,
    access_token_minutes: i64,
    remember_me_days: i64,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            access_token_minutes: config.access_token_expires_minutes,
            remember_me_days: config.remember_me_days,
        }
    }

    /// Argon2 PHC string for a password
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Hashing failed: {}", e))?
            .to_string();
        Ok(hash)
    }

    pub fn verify_password(password: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!("Stored password hash is not a PHC string: {}", e);
                false
            }
        }
    }

    /// Issue a JWT; `remember_me` stretches the lifetime to days.
    pub fn issue_token(&self, user_id: Uuid, remember_me: bool) -> Result<String> {
        let now = Utc::now();
        let ttl = if remember_me {
            Duration::days(self.remember_me_days)
        } else {
            Duration::minutes(self.access_token_minutes)
        };
        let expiration = now
            .checked_add_signed(ttl)
            .context("token expiry overflow")?
            .timestamp();

        let claims = Claims {
            sub: user_id.to_string(),
            exp: expiration as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .context("Failed to generate token")
    }

    /// Verify JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(token, &decoding_key, &validation)?;
        Ok(token_data.claims)
    }
}

// ============================================================================
// Account flows
// ============================================================================

/// Signup Request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(email)]
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(max = 200))]
    pub name: Option<String>,
    #[serde(default)]
    pub remember_me: bool,
}

/// Login Request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

/// Google Sign-In Request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GoogleLoginRequest {
    /// ID token returned by Google Identity Services
    #[validate(length(min = 1))]
    pub credential: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserResponse {
    fn from(u: UserRow) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            avatar_url: u.avatar_url,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Auth Response
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

/// Display name derived from the mailbox part of an address.
pub fn default_display_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl AuthService {
    fn respond(&self, user: UserRow, remember_me: bool) -> Result<AuthResponse, AppError> {
        let token = self.issue_token(user.id, remember_me)?;
        Ok(AuthResponse {
            user: user.into(),
            token,
        })
    }

    /// Create the user, its email identity and the Free license in one transaction.
    pub async fn signup(&self, pool: &PgPool, req: &SignupRequest) -> Result<AuthResponse, AppError> {
        let email = req.email.trim().to_lowercase();
        if UserRepository::find_by_email(pool, &email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".into()));
        }

        let password_hash = Self::hash_password(&req.password)?;
        let name = req
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_display_name(&email));

        let mut tx = pool.begin().await?;
        let user = UserRepository::insert(&mut *tx, &email, Some(&password_hash), &name)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("Email already registered".into())
                } else {
                    e.into()
                }
            })?;
        UserRepository::insert_identity(&mut *tx, user.id, "email", &email, &email).await?;
        LicensingService::create_free_plan_license(&mut *tx, user.id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "User signed up");
        self.respond(user, req.remember_me)
    }

    pub async fn login(&self, pool: &PgPool, req: &LoginRequest) -> Result<AuthResponse, AppError> {
        let invalid = || AppError::Unauthorized("Invalid email or password".into());

        let user = UserRepository::find_by_email(pool, req.email.trim())
            .await?
            .ok_or_else(invalid)?;
        let stored = user.password_hash.as_deref().ok_or_else(invalid)?;
        if !Self::verify_password(&req.password, stored) {
            tracing::info!(user_id = %user.id, "Password mismatch");
            return Err(invalid());
        }

        self.respond(user, req.remember_me)
    }

    /// Resolve a verified Google profile to a user: linked identity, then
    /// matching email (which gets linked), then a brand-new account.
    pub async fn google_login(
        &self,
        pool: &PgPool,
        profile: &GoogleProfile,
        remember_me: bool,
    ) -> Result<(AuthResponse, bool), AppError> {
        let mut created = false;
        let user = match UserRepository::find_by_identity(pool, "google", &profile.sub).await? {
            Some(user) => {
                UserRepository::touch_identity(pool, "google", &profile.sub).await?;
                user
            }
            None => match UserRepository::find_by_email(pool, &profile.email).await? {
                Some(user) => {
                    let mut tx = pool.begin().await?;
                    UserRepository::insert_identity(&mut *tx, user.id, "google", &profile.sub, &profile.email)
                        .await?;
                    tx.commit().await?;
                    tracing::info!(user_id = %user.id, "Linked Google identity to existing user");
                    user
                }
                None => {
                    let name = profile
                        .name
                        .clone()
                        .unwrap_or_else(|| default_display_name(&profile.email));
                    let mut tx = pool.begin().await?;
                    let user = UserRepository::insert(&mut *tx, &profile.email, None, &name).await?;
                    UserRepository::insert_identity(&mut *tx, user.id, "google", &profile.sub, &profile.email)
                        .await?;
                    LicensingService::create_free_plan_license(&mut *tx, user.id).await?;
                    tx.commit().await?;
                    created = true;
                    tracing::info!(user_id = %user.id, "User created from Google sign-in");
                    user
                }
            },
        };

        let user = if profile.name.is_some() || profile.picture.is_some() {
            UserRepository::update_profile(pool, user.id, profile.name.as_deref(), profile.picture.as_deref())
                .await?
                .unwrap_or(user)
        } else {
            user
        };

        Ok((self.respond(user, remember_me)?, created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(&AuthConfig {
            jwt_secret: "test-secret".into(),
            access_token_expires_minutes: 60,
            remember_me_days: 30,
            google_client_id: String::new(),
            public_api_username: String::new(),
            public_api_password: String::new(),
        })
    }

    #[test]
    fn test_password_roundtrip() {
        let hash = AuthService::hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(AuthService::verify_password("correct horse", &hash));
        assert!(!AuthService::verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!AuthService::verify_password("pw", "plaintext"));
    }

    #[test]
    fn test_token_subject_and_lifetime() {
        let svc = service();
        let user = Uuid::new_v4();

        let short = svc.verify_token(&svc.issue_token(user, false).unwrap()).unwrap();
        assert_eq!(short.sub, user.to_string());
        let short_ttl = short.exp - short.iat;
        assert!((3590..=3610).contains(&short_ttl));

        let long = svc.verify_token(&svc.issue_token(user, true).unwrap()).unwrap();
        assert_eq!(long.exp - long.iat, 30 * 24 * 3600);
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let other = AuthService::new(&AuthConfig {
            jwt_secret: "another".into(),
            access_token_expires_minutes: 60,
            remember_me_days: 30,
            google_client_id: String::new(),
            public_api_username: String::new(),
            public_api_password: String::new(),
        });
        let token = other.issue_token(Uuid::new_v4(), false).unwrap();
        assert!(service().verify_token(&token).is_err());
    }

    #[test]
    fn test_default_display_name() {
        assert_eq!(default_display_name("jane.doe@example.com"), "jane.doe");
        assert_eq!(default_display_name("nobody"), "nobody");
    }

    #[test]
    fn test_signup_validation() {
        let req = SignupRequest {
            email: "not-an-email".into(),
            password: "short".into(),
            name: None,
            remember_me: false,
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
