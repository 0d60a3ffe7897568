//! Authorization gate — Bearer token extraction, JWT verification, role check.
//!
//! Runs before any handler code. Outcomes: 401 for a missing or invalid
//! credential, 403 for a valid identity without a required role, 500 for
//! authorization infrastructure faults, otherwise the request proceeds with
//! the caller identity attached.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use gatehouse_core::models::auth::CallerIdentity;

use crate::AppState;
use crate::error::ApiError;

/// Role names a route group demands, any one of which admits the caller.
/// Attached as an extension at route registration, outside the gate layer.
#[derive(Debug, Clone, Copy)]
pub struct RequiredRoles(pub &'static [&'static str]);

/// Key used to store the validated `CallerIdentity` in request extensions
/// (for handlers) and response extensions (for the audit recorder).
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub CallerIdentity);

/// Axum middleware enforcing the gate for one route group.
pub async fn authorize(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Registration must layer a role set outside this gate; its absence is
    // a wiring defect, not a caller error.
    let required = request
        .extensions()
        .get::<RequiredRoles>()
        .copied()
        .ok_or_else(|| ApiError::Internal("route registered without a role set".into()))?;

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Invalid authorization scheme".into()))?;

    let caller = state
        .tokens
        .validate(token)
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".into()))?;

    // Roles are re-read from the store on every request instead of trusting
    // the token's role claim, so a revocation locks the holder out before
    // the token expires.
    let held = state
        .roles
        .roles_for(caller.user_id)
        .await
        .map_err(|e| ApiError::Internal(format!("role lookup failed: {e}")))?;

    if !required.0.iter().any(|r| held.iter().any(|h| h == r)) {
        // The identity is known here; attach it so the audit trail records
        // who was refused.
        let mut response = ApiError::Forbidden("Insufficient role".into()).into_response();
        response.extensions_mut().insert(AuthenticatedUser(caller));
        return Ok(response);
    }

    request
        .extensions_mut()
        .insert(AuthenticatedUser(caller.clone()));
    let mut response = next.run(request).await;
    response.extensions_mut().insert(AuthenticatedUser(caller));
    Ok(response)
}
