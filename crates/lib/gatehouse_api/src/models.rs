//! API wire models (camelCase JSON).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `POST /auth/login` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /auth/register` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// `POST /auth/refresh` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `POST /auth/logout` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Token pair returned by login, register, and refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// When the refresh token stops being exchangeable. Clients check this
    /// before attempting a refresh.
    pub refresh_token_expires_at: DateTime<Utc>,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub token_type: String,
    pub user: AuthUser,
}

/// User profile embedded in token responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub roles: Vec<String>,
}

/// `POST /auth/logout` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub success: bool,
}

/// `GET /api/me` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    /// Role embedded in the presented access token.
    pub role: String,
}

/// Query parameters for `GET /api/admin/audit`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditListQuery {
    pub limit: Option<i64>,
}

/// Error body for all non-2xx responses.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
