//! Google Sign-In credential verification through the `tokeninfo` endpoint.

use std::time::Duration;

use serde_json::Value;

use crate::error::AppError;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Verified identity carried by a Google ID token.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

pub struct GoogleVerifier {
    http: reqwest::Client,
    client_id: String,
}

impl GoogleVerifier {
    pub fn new(client_id: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            client_id: client_id.into(),
        }
    }

    pub async fn verify(&self, credential: &str) -> Result<GoogleProfile, AppError> {
        let resp = self
            .http
            .get(TOKENINFO_URL)
            .query(&[("id_token", credential)])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Google tokeninfo unreachable: {}", e);
                AppError::ServiceUnavailable("Unable to verify Google credential".into())
            })?;

        if !resp.status().is_success() {
            tracing::info!("Google tokeninfo rejected credential: {}", resp.status());
            return Err(AppError::Unauthorized("Invalid Google credential".into()));
        }

        let claims: Value = resp
            .json()
            .await
            .map_err(|_| AppError::Unauthorized("Invalid Google credential".into()))?;
        profile_from_claims(&self.client_id, &claims)
    }
}

/// Check audience, required fields and verification flag of a tokeninfo payload.
pub fn profile_from_claims(client_id: &str, claims: &Value) -> Result<GoogleProfile, AppError> {
    let aud = claims.get("aud").and_then(Value::as_str).unwrap_or_default();
    if aud != client_id {
        return Err(AppError::Unauthorized(
            "Google token was not issued for this application".into(),
        ));
    }

    let sub = claims.get("sub").and_then(Value::as_str);
    let email = claims.get("email").and_then(Value::as_str);
    let (Some(sub), Some(email)) = (sub, email) else {
        return Err(AppError::bad_request("Invalid Google credential payload"));
    };

    // tokeninfo reports the flag as a string
    let verified = match claims.get("email_verified") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };
    if !verified {
        return Err(AppError::Unauthorized("Google email is not verified".into()));
    }

    Ok(GoogleProfile {
        sub: sub.to_string(),
        email: email.to_lowercase(),
        name: claims.get("name").and_then(Value::as_str).map(str::to_string),
        picture: claims
            .get("picture")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_claims() {
        let claims = json!({
            "aud": "client-1",
            "sub": "1234",
            "email": "Jane@Example.com",
            "email_verified": "true",
            "name": "Jane",
            "picture": "https://img/j.png"
        });
        let profile = profile_from_claims("client-1", &claims).unwrap();
        assert_eq!(profile.email, "jane@example.com");
        assert_eq!(profile.name.as_deref(), Some("Jane"));
    }

    #[test]
    fn test_wrong_audience() {
        let claims = json!({"aud": "other", "sub": "1", "email": "a@b.c", "email_verified": true});
        let err = profile_from_claims("client-1", &claims).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Google token was not issued for this application"
        );
    }

    #[test]
    fn test_missing_email_is_bad_request() {
        let claims = json!({"aud": "client-1", "sub": "1", "email_verified": true});
        let err = profile_from_claims("client-1", &claims).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_unverified_email() {
        let claims = json!({"aud": "client-1", "sub": "1", "email": "a@b.c", "email_verified": "false"});
        let err = profile_from_claims("client-1", &claims).unwrap_err();
        assert_eq!(err.to_string(), "Google email is not verified");
    }
}
