//! Auth gate for the notes endpoints.
//!
//! Login exchanges the password for a cookie holding an HMAC-SHA256
//! signature over the password, keyed by the session secret. Every
//! content endpoint verifies that cookie before touching storage.

use actix_web::{HttpRequest, HttpResponse};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Name of the auth cookie set by login and checked by the gate.
pub const AUTH_COOKIE: &str = "auth";

/// Sign the password with the session secret, hex-encoded.
pub fn sign_token(secret: &str, password: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(password.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time verification of a presented token.
pub fn verify_token(secret: &str, password: &str, token: &str) -> bool {
    let Ok(raw) = hex::decode(token) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(password.as_bytes());
    mac.verify_slice(&raw).is_ok()
}

/// Whether the request carries a valid auth cookie.
pub fn is_authorized(state: &AppState, req: &HttpRequest) -> bool {
    req.cookie(AUTH_COOKIE)
        .map(|c| verify_token(&state.config.session_secret, &state.config.password, c.value()))
        .unwrap_or(false)
}

/// Check the auth cookie on a request. Returns the ready-made 401
/// response on failure so handlers can early-return before any storage
/// access.
pub fn require_auth(state: &AppState, req: &HttpRequest) -> Result<(), HttpResponse> {
    if is_authorized(state, req) {
        Ok(())
    } else {
        Err(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Unauthorized"
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let token = sign_token("secret", "focus123");
        assert!(verify_token("secret", "focus123", &token));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let token = sign_token("secret-a", "focus123");
        assert!(!verify_token("secret-b", "focus123", &token));
    }

    #[test]
    fn test_verify_rejects_wrong_password() {
        let token = sign_token("secret", "focus123");
        assert!(!verify_token("secret", "other-password", &token));
    }

    #[test]
    fn test_verify_rejects_garbage_tokens() {
        assert!(!verify_token("secret", "focus123", "not-hex!"));
        assert!(!verify_token("secret", "focus123", ""));
        assert!(!verify_token("secret", "focus123", "deadbeef"));
    }

    #[test]
    fn test_token_is_stable_for_same_inputs() {
        assert_eq!(sign_token("s", "p"), sign_token("s", "p"));
    }
}
