//! Authentication request handlers.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::ApiResult;
use crate::models::{
    LoginRequest, LogoutRequest, LogoutResponse, RefreshRequest, RegisterRequest, TokenResponse,
};
use crate::services::auth;

/// `POST /auth/login` — authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let resp = auth::login(
        &state.pool,
        &state.tokens,
        state.config.refresh_ttl_days,
        &body.email,
        &body.password,
    )
    .await?;
    Ok(Json(resp))
}

/// `POST /auth/register` — create a new user account.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let resp = auth::register(
        &state.pool,
        &state.tokens,
        state.config.refresh_ttl_days,
        &body.email,
        &body.password,
        body.name.as_deref(),
    )
    .await?;
    Ok(Json(resp))
}

/// `POST /auth/refresh` — exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let resp = auth::refresh(
        &state.pool,
        &state.tokens,
        state.config.refresh_ttl_days,
        &body.refresh_token,
    )
    .await?;
    Ok(Json(resp))
}

/// `POST /auth/logout` — revoke a refresh token.
pub async fn logout_handler(
    State(state): State<AppState>,
    Json(body): Json<LogoutRequest>,
) -> ApiResult<Json<LogoutResponse>> {
    let resp = auth::logout(&state.pool, body.refresh_token.as_deref()).await?;
    Ok(Json(resp))
}
