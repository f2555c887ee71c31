// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication for the gateway: signed session tokens, password
//! hashing, and the bearer middleware.
//!
//! Tokens are `base64url(claims JSON) . hex(HMAC-SHA256(payload))` with the
//! expiry embedded in the claims. When no token secret is configured, all
//! authenticated requests are rejected (fail-closed).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use chatportal_core::{PortalError, Role};

type HmacSha256 = Hmac<Sha256>;

/// Signed token claims. `exp` is a unix timestamp in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
}

impl Claims {
    pub fn new(sub: impl Into<String>, role: Role, ttl_hours: u64) -> Self {
        Claims {
            sub: sub.into(),
            role,
            exp: (chrono::Utc::now() + chrono::Duration::hours(ttl_hours as i64)).timestamp(),
        }
    }
}

/// Authentication configuration shared by the middleware and the
/// WebSocket handshake.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC signing secret. `None` disables all authenticated routes.
    pub token_secret: Option<String>,
    /// Token lifetime used when issuing at login.
    pub token_ttl_hours: u64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "token_secret",
                &self.token_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish()
    }
}

/// Sign `claims` into a wire token.
pub fn issue_token(secret: &str, claims: &Claims) -> Result<String, PortalError> {
    let payload = serde_json::to_vec(claims).map_err(|e| PortalError::Gateway {
        message: "failed to encode token claims".to_string(),
        source: Some(Box::new(e)),
    })?;
    let payload = URL_SAFE_NO_PAD.encode(payload);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
        PortalError::Gateway {
            message: "invalid token secret".to_string(),
            source: Some(Box::new(e)),
        }
    })?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(format!("{payload}.{signature}"))
}

/// Verify a wire token's signature and expiry, returning its claims.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, PortalError> {
    let (payload, signature) = token
        .split_once('.')
        .ok_or_else(|| PortalError::Validation("malformed token".to_string()))?;

    let sig_bytes = hex::decode(signature)
        .map_err(|_| PortalError::Validation("malformed token signature".to_string()))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
        PortalError::Gateway {
            message: "invalid token secret".to_string(),
            source: Some(Box::new(e)),
        }
    })?;
    mac.update(payload.as_bytes());
    // Constant-time comparison via the Mac trait.
    mac.verify_slice(&sig_bytes)
        .map_err(|_| PortalError::Validation("token signature mismatch".to_string()))?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| PortalError::Validation("malformed token payload".to_string()))?;
    let claims: Claims = serde_json::from_slice(&payload)
        .map_err(|_| PortalError::Validation("malformed token claims".to_string()))?;

    if claims.exp <= chrono::Utc::now().timestamp() {
        return Err(PortalError::Validation("token expired".to_string()));
    }
    Ok(claims)
}

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, PortalError> {
    use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    argon2::Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PortalError::Internal(format!("password hashing failed: {e}")))
}

/// Check a password against a stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    use argon2::password_hash::{PasswordHash, PasswordVerifier};

    PasswordHash::new(stored_hash)
        .and_then(|parsed| argon2::Argon2::default().verify_password(password.as_bytes(), &parsed))
        .is_ok()
}

/// Middleware validating `Authorization: Bearer <token>` and stashing the
/// verified [`Claims`] in request extensions for the handler.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(ref secret) = auth.token_secret else {
        tracing::error!("gateway has no token secret configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token.map(|t| verify_token(secret, t)) {
        Some(Ok(claims)) => {
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Some(Err(e)) => {
            tracing::debug!(error = %e, "bearer token rejected");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips() {
        let claims = Claims::new("u1", Role::Tester, 1);
        let token = issue_token("secret", &claims).unwrap();
        let verified = verify_token("secret", &token).unwrap();
        assert_eq!(verified.sub, "u1");
        assert_eq!(verified.role, Role::Tester);
    }

    #[test]
    fn token_rejects_wrong_secret_and_tampering() {
        let claims = Claims::new("u1", Role::Admin, 1);
        let token = issue_token("secret", &claims).unwrap();

        assert!(verify_token("other-secret", &token).is_err());

        let mut tampered = token.clone();
        tampered.insert(0, 'x');
        assert!(verify_token("secret", &tampered).is_err());
        assert!(verify_token("secret", "no-dot-here").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            sub: "u1".to_string(),
            role: Role::Tester,
            exp: chrono::Utc::now().timestamp() - 10,
        };
        let token = issue_token("secret", &claims).unwrap();
        assert!(verify_token("secret", &token).is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-hash"));
    }

    #[test]
    fn auth_config_debug_redacts_secret() {
        let config = AuthConfig {
            token_secret: Some("super-secret".to_string()),
            token_ttl_hours: 168,
        };
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("super-secret"));
        assert!(debug_output.contains("[redacted]"));
    }
}
