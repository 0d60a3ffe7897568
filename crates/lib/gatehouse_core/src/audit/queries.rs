//! Audit-log database queries.

use sqlx::PgPool;

use super::AuditError;
use crate::ids::uuidv7;
use crate::models::audit::{AuditRecord, StoredAuditRecord};

/// Insert one audit record. Called from the background writer only.
pub async fn insert_audit_record(pool: &PgPool, record: &AuditRecord) -> Result<(), AuditError> {
    sqlx::query(
        "INSERT INTO audit_log \
         (id, occurred_at, method, path, query, client_ip, user_agent, user_id, \
          body, status, duration_ms, error_kind, error_message) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(uuidv7())
    .bind(record.occurred_at)
    .bind(&record.method)
    .bind(&record.path)
    .bind(&record.query)
    .bind(&record.client_ip)
    .bind(&record.user_agent)
    .bind(record.user_id)
    .bind(&record.body)
    .bind(record.status)
    .bind(record.duration_ms)
    .bind(&record.error_kind)
    .bind(&record.error_message)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetch the most recent audit records, newest first.
pub async fn recent_audit_records(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<StoredAuditRecord>, AuditError> {
    let rows = sqlx::query_as::<_, StoredAuditRecord>(
        "SELECT id, occurred_at, method, path, query, client_ip, user_agent, user_id, \
                body, status, duration_ms, error_kind, error_message \
         FROM audit_log ORDER BY occurred_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
