//! Liveness handler. Exempt from request auditing.

use axum::Json;

/// `GET /health` — liveness probe.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": gatehouse_core::version(),
    }))
}
