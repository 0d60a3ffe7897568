//! Access-token signing and verification.
//!
//! Tokens are HS256 JWTs carrying the user id as a decimal `sub` claim plus
//! the primary role. Verification is strict: issuer, audience, signature,
//! and expiry with zero clock-skew leeway. A client whose clock runs fast
//! must refresh proactively instead of relying on server-side tolerance.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::info;

use super::AuthError;
use crate::models::auth::{CallerIdentity, TokenClaims};

/// Signs and verifies access tokens. Built once at startup from config.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    secret: String,
    issuer: String,
    audience: String,
    access_ttl_secs: i64,
}

impl TokenValidator {
    /// Create a validator. An empty secret is a deployment defect and is
    /// rejected here so startup fails fast instead of issuing unverifiable
    /// tokens.
    pub fn new(
        secret: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        access_ttl_secs: i64,
    ) -> Result<Self, AuthError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(AuthError::Internal("JWT secret is empty".into()));
        }
        Ok(Self {
            secret,
            issuer: issuer.into(),
            audience: audience.into(),
            access_ttl_secs,
        })
    }

    /// Issue a signed access token embedding the user id and role.
    pub fn issue(&self, user_id: i64, role: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            role: role.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: (now + Duration::seconds(self.access_ttl_secs)).timestamp(),
            iat: now.timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
    }

    /// Verify an access token, returning the caller identity on success.
    ///
    /// `None` covers every ordinary invalid-token case: malformed input, bad
    /// signature, wrong issuer or audience, expiry in the past (no leeway),
    /// and a `sub` claim that is not a decimal user id.
    pub fn validate(&self, token: &str) -> Option<CallerIdentity> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // `now >= exp` rejects; clients must carry their own refresh margin.
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        let data = decode::<TokenClaims>(token, &key, &validation).ok()?;
        let user_id = data.claims.sub.parse::<i64>().ok()?;
        Some(CallerIdentity {
            user_id,
            role: data.claims.role,
        })
    }

    /// Access token lifetime in seconds, as advertised to clients.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    // Generate and persist
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gatehouse")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> TokenValidator {
        TokenValidator::new("test-secret", "gatehouse", "gatehouse-clients", 900).unwrap()
    }

    /// Encode arbitrary claims with the test secret, bypassing `issue`.
    fn encode_claims(claims: &TokenClaims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims_now(sub: &str, offset_secs: i64) -> TokenClaims {
        let now = Utc::now();
        TokenClaims {
            sub: sub.to_string(),
            role: "admin".to_string(),
            iss: "gatehouse".to_string(),
            aud: "gatehouse-clients".to_string(),
            exp: (now + Duration::seconds(offset_secs)).timestamp(),
            iat: now.timestamp(),
        }
    }

    #[test]
    fn issue_then_validate_roundtrip() {
        let v = validator();
        let token = v.issue(42, "Admin").unwrap();
        let caller = v.validate(&token).expect("token should validate");
        assert_eq!(caller.user_id, 42);
        assert_eq!(caller.role, "Admin");
    }

    #[test]
    fn empty_secret_is_rejected_at_construction() {
        assert!(TokenValidator::new("", "gatehouse", "gatehouse-clients", 900).is_err());
    }

    #[test]
    fn expired_token_is_invalid_even_by_one_second() {
        let v = validator();
        let token = encode_claims(&claims_now("42", -1), "test-secret");
        assert!(v.validate(&token).is_none());
    }

    #[test]
    fn tampered_signature_is_invalid() {
        let v = validator();
        let token = encode_claims(&claims_now("42", 900), "other-secret");
        assert!(v.validate(&token).is_none());
    }

    #[test]
    fn tampered_payload_is_invalid() {
        let v = validator();
        let token = v.issue(42, "member").unwrap();
        // Splice the payload of a differently-privileged token onto the
        // original signature.
        let privileged = encode_claims(&claims_now("42", 900), "test-secret");
        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = privileged.split('.').nth(1).unwrap();
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert!(v.validate(&forged).is_none());
    }

    #[test]
    fn wrong_issuer_is_invalid() {
        let v = validator();
        let mut claims = claims_now("42", 900);
        claims.iss = "somewhere-else".to_string();
        let token = encode_claims(&claims, "test-secret");
        assert!(v.validate(&token).is_none());
    }

    #[test]
    fn wrong_audience_is_invalid() {
        let v = validator();
        let mut claims = claims_now("42", 900);
        claims.aud = "other-clients".to_string();
        let token = encode_claims(&claims, "test-secret");
        assert!(v.validate(&token).is_none());
    }

    #[test]
    fn non_numeric_subject_is_invalid() {
        let v = validator();
        let token = encode_claims(&claims_now("not-a-number", 900), "test-secret");
        assert!(v.validate(&token).is_none());
    }

    #[test]
    fn garbage_token_is_invalid() {
        assert!(validator().validate("garbage").is_none());
    }
}
