//! Admin audit-trail handlers.

use axum::Json;
use axum::extract::{Query, State};

use gatehouse_core::models::audit::StoredAuditRecord;

use crate::AppState;
use crate::error::ApiResult;
use crate::models::AuditListQuery;

/// Default and maximum page sizes for the audit listing.
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

/// `GET /api/admin/audit` — most recent audit records, newest first.
pub async fn list_audit_handler(
    State(state): State<AppState>,
    Query(params): Query<AuditListQuery>,
) -> ApiResult<Json<Vec<StoredAuditRecord>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let records = gatehouse_core::audit::queries::recent_audit_records(&state.pool, limit).await?;
    Ok(Json(records))
}
