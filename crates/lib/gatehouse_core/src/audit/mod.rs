//! Audit trail persistence.
//!
//! One row per handled HTTP request, written by the API layer's background
//! audit writer. The trail is append-only.

pub mod queries;

use thiserror::Error;

/// Audit persistence errors.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}
