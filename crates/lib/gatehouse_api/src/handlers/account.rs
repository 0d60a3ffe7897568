//! Account handlers for authenticated callers.

use axum::extract::State;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::ProfileResponse;

/// `GET /api/me` — profile of the authenticated caller.
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
) -> ApiResult<Json<ProfileResponse>> {
    let user = gatehouse_core::auth::queries::get_user_by_id(&state.pool, caller.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user no longer exists".into()))?;
    Ok(Json(ProfileResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        role: caller.role,
    }))
}
