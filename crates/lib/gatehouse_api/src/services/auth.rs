//! Authentication service — login/register/refresh/logout flows delegating
//! to `gatehouse_core::auth`.

use chrono::{Duration, Utc};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::info;

use gatehouse_core::auth::jwt::TokenValidator;
use gatehouse_core::auth::{password, queries};

use crate::error::{ApiError, ApiResult};
use crate::models::{AuthUser, LogoutResponse, TokenResponse};

/// Role granted to every registered user.
const DEFAULT_ROLE: &str = "member";

// ---------------------------------------------------------------------------
// Refresh token generation & hashing
// ---------------------------------------------------------------------------

/// Generate a cryptographically random refresh token (64 alphanumeric chars).
fn generate_refresh_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// SHA-256 hash a refresh token for storage.
fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Role embedded in the access token: `admin` wins, else the first granted
/// role, else the default.
fn primary_role(roles: &[String]) -> &str {
    if roles.iter().any(|r| r == "admin") {
        "admin"
    } else {
        roles.first().map(String::as_str).unwrap_or(DEFAULT_ROLE)
    }
}

/// Build a `TokenResponse` from user data plus a fresh token pair.
fn build_token_response(
    tokens: &TokenValidator,
    user_id: i64,
    email: &str,
    name: Option<&str>,
    roles: &[String],
    access_token: String,
    refresh_token: String,
    refresh_expires_at: chrono::DateTime<Utc>,
) -> TokenResponse {
    TokenResponse {
        access_token,
        refresh_token,
        refresh_token_expires_at: refresh_expires_at,
        expires_in: tokens.access_ttl_secs(),
        token_type: "Bearer".to_string(),
        user: AuthUser {
            id: user_id,
            email: email.to_string(),
            name: name.map(|n| n.to_string()),
            roles: roles.to_vec(),
        },
    }
}

// ---------------------------------------------------------------------------
// Public auth operations
// ---------------------------------------------------------------------------

/// Authenticate with email + password.
pub async fn login(
    pool: &PgPool,
    tokens: &TokenValidator,
    refresh_ttl_days: i64,
    email: &str,
    password_input: &str,
) -> ApiResult<TokenResponse> {
    let row = queries::find_user_by_email(pool, email).await?;

    // Generic error for wrong email and wrong password alike.
    let (user_id, name, pw_hash) = match row {
        None => return Err(ApiError::Unauthorized("Invalid credentials".into())),
        Some(r) => r,
    };

    let pw_hash = match pw_hash {
        None => return Err(ApiError::Unauthorized("Invalid credentials".into())),
        Some(h) => h,
    };

    if !password::verify_password(password_input, &pw_hash)? {
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let roles = queries::get_user_roles(pool, user_id).await?;
    let access_token = tokens.issue(user_id, primary_role(&roles))?;
    let refresh_token = generate_refresh_token();
    let token_hash = hash_refresh_token(&refresh_token);

    let expires_at = Utc::now() + Duration::days(refresh_ttl_days);
    queries::store_refresh_token(pool, &token_hash, user_id, expires_at).await?;

    Ok(build_token_response(
        tokens,
        user_id,
        email,
        name.as_deref(),
        &roles,
        access_token,
        refresh_token,
        expires_at,
    ))
}

/// Register a new user account. Everyone gets the default role; the first
/// user is additionally granted admin.
pub async fn register(
    pool: &PgPool,
    tokens: &TokenValidator,
    refresh_ttl_days: i64,
    email: &str,
    password_input: &str,
    name: Option<&str>,
) -> ApiResult<TokenResponse> {
    if password_input.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }

    if queries::email_exists(pool, email).await? {
        return Err(ApiError::Validation("Email already registered".into()));
    }

    let is_first_user = queries::user_count(pool).await? == 0;

    let pw_hash = password::hash_password(password_input)?;

    let user_id = queries::create_user(pool, email, name, &pw_hash).await?;

    let mut roles = vec![DEFAULT_ROLE.to_string()];
    queries::grant_role(pool, user_id, DEFAULT_ROLE).await?;
    if is_first_user {
        queries::grant_role(pool, user_id, "admin").await?;
        roles.push("admin".to_string());
        info!(email, "first user granted admin role");
    }

    let access_token = tokens.issue(user_id, primary_role(&roles))?;
    let refresh_token = generate_refresh_token();
    let token_hash = hash_refresh_token(&refresh_token);

    let expires_at = Utc::now() + Duration::days(refresh_ttl_days);
    queries::store_refresh_token(pool, &token_hash, user_id, expires_at).await?;

    Ok(build_token_response(
        tokens,
        user_id,
        email,
        name,
        &roles,
        access_token,
        refresh_token,
        expires_at,
    ))
}

/// Refresh an access token using a refresh token (single-use rotation).
pub async fn refresh(
    pool: &PgPool,
    tokens: &TokenValidator,
    refresh_ttl_days: i64,
    refresh_token: &str,
) -> ApiResult<TokenResponse> {
    let token_hash = hash_refresh_token(refresh_token);

    // Find valid, non-revoked, non-expired token
    let row = queries::find_valid_refresh_token(pool, &token_hash).await?;

    let (token_id, user_id) = match row {
        None => return Err(ApiError::Unauthorized("Invalid refresh token".into())),
        Some(r) => r,
    };

    // Rotation: the presented token is spent regardless of what follows.
    queries::revoke_refresh_token(pool, token_id).await?;

    let user = queries::get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    let roles = queries::get_user_roles(pool, user_id).await?;

    // Issue new token pair
    let access_token = tokens.issue(user_id, primary_role(&roles))?;
    let new_refresh = generate_refresh_token();
    let new_hash = hash_refresh_token(&new_refresh);

    let expires_at = Utc::now() + Duration::days(refresh_ttl_days);
    queries::store_refresh_token(pool, &new_hash, user_id, expires_at).await?;

    Ok(build_token_response(
        tokens,
        user_id,
        &user.email,
        user.name.as_deref(),
        &roles,
        access_token,
        new_refresh,
        expires_at,
    ))
}

/// Logout — revoke a specific refresh token.
pub async fn logout(pool: &PgPool, refresh_token: Option<&str>) -> ApiResult<LogoutResponse> {
    if let Some(token) = refresh_token {
        let token_hash = hash_refresh_token(token);
        queries::revoke_refresh_token_by_hash(pool, &token_hash).await?;
    }
    Ok(LogoutResponse { success: true })
}
