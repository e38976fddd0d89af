//! HMAC-SHA256 and form-encoding helpers shared by the Azure clients.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey};

/// Standard-alphabet base64 of `HMAC-SHA256(key, message)`.
pub fn hmac_sha256_base64(key: &[u8], message: &str) -> anyhow::Result<String> {
    let signed = jsonwebtoken::crypto::sign(
        message.as_bytes(),
        &EncodingKey::from_secret(key),
        Algorithm::HS256,
    )?;
    // jsonwebtoken emits the JWS (url-safe, unpadded) alphabet
    let raw = URL_SAFE_NO_PAD.decode(signed)?;
    Ok(STANDARD.encode(raw))
}

/// `application/x-www-form-urlencoded` encoding of a single value.
pub fn form_encode(value: &str) -> String {
    reqwest::Url::parse_with_params("http://localhost/", &[("v", value)])
        .ok()
        .and_then(|u| u.query().and_then(|q| q.strip_prefix("v=")).map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_known_vector() {
        // RFC 4231 test case 2
        let sig = hmac_sha256_base64(b"Jefe", "what do ya want for nothing?").unwrap();
        let expected = STANDARD.encode(
            hex::decode("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
                .unwrap(),
        );
        assert_eq!(sig, expected);
    }

    #[test]
    fn test_form_encode() {
        assert_eq!(form_encode("https://ns.servicebus.windows.net/q"), "https%3A%2F%2Fns.servicebus.windows.net%2Fq");
        assert_eq!(form_encode("a b+c"), "a+b%2Bc");
        assert_eq!(form_encode("abc=="), "abc%3D%3D");
    }
}
