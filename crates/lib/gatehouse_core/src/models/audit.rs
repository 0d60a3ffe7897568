//! Audit domain models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One audit entry describing a single HTTP request/response cycle.
///
/// Built in memory while the request is handled, then persisted once by the
/// background audit writer. Append-only; never updated after insert.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub occurred_at: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    /// Resolved user ID, when the request carried a validated identity.
    pub user_id: Option<i64>,
    /// Captured request body, size-capped. Omitted for sensitive paths.
    pub body: Option<String>,
    pub status: i32,
    pub duration_ms: i64,
    /// Error classification for 5xx responses.
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

/// Persisted audit row, as read back for the admin listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredAuditRecord {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub user_id: Option<i64>,
    pub body: Option<String>,
    pub status: i32,
    pub duration_ms: i64,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}
