use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;
use uuid::Uuid;

use super::repository::UserRepository;
use crate::error::AppError;
use crate::gateway::state::AppState;

const INVALID_CREDENTIALS: &str = "Could not validate credentials";

/// Authenticated caller, injected into request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    let claims = state
        .auth
        .verify_token(token.trim())
        .map_err(|_| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    let user = UserRepository::find_by_id(state.pool(), user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
        name: user.name,
    });
    Ok(next.run(request).await)
}

/// HTTP Basic guard for the unauthenticated product views.
pub async fn public_basic_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let expected = &state.config.auth;
    let supplied = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_basic);

    let authorized = match supplied {
        Some((user, pass)) if !expected.public_api_username.is_empty() => {
            // Evaluate both halves so timing does not reveal which one failed
            let user_ok = constant_time_eq(user.as_bytes(), expected.public_api_username.as_bytes());
            let pass_ok = constant_time_eq(pass.as_bytes(), expected.public_api_password.as_bytes());
            user_ok & pass_ok
        }
        _ => false,
    };

    if !authorized {
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }
    Ok(next.run(request).await)
}

/// Decode `Basic base64(user:pass)`.
fn parse_basic(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let header = format!("Basic {}", STANDARD.encode("viewer:s3cret:x"));
        let (user, pass) = parse_basic(&header).unwrap();
        assert_eq!(user, "viewer");
        assert_eq!(pass, "s3cret:x");
        assert!(parse_basic("Bearer abc").is_none());
        assert!(parse_basic("Basic !!!").is_none());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
