//! Authentication domain models.
//!
//! These are internal domain models, distinct from API wire models
//! (which carry `#[serde(rename)]` for camelCase etc.).

use serde::{Deserialize, Serialize};

/// Domain user.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
}

/// JWT claims embedded in access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject — decimal user ID (standard JWT `sub` claim).
    pub sub: String,
    /// Primary role at issue time.
    pub role: String,
    /// Issuer.
    pub iss: String,
    /// Audience.
    pub aud: String,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

/// Identity derived from a validated access token.
///
/// Exists only for the duration of one request's processing; never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: i64,
    pub role: String,
}
