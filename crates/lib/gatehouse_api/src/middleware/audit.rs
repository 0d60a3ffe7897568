//! Request audit recorder — outermost application layer.
//!
//! Produces exactly one `AuditRecord` per non-excluded request and hands it
//! to the background writer. Only observation: the response bytes reaching
//! the client are identical to the unwrapped pipeline's, and a failing audit
//! store can never surface in a response.

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::{Body, to_bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{Method, header};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use gatehouse_core::models::audit::AuditRecord;

use crate::AppState;
use crate::error::ErrorDetail;
use crate::middleware::auth::AuthenticatedUser;

/// Max captured request-body characters.
pub const BODY_CAPTURE_LIMIT: usize = 4000;
/// Max captured user-agent characters.
pub const USER_AGENT_LIMIT: usize = 512;
/// Max captured error-message characters.
pub const ERROR_MESSAGE_LIMIT: usize = 2000;
/// Appended when a captured field exceeds its cap.
pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// Paths whose bodies carry credentials and are never captured.
const SENSITIVE_PATHS: &[&str] = &["/auth/login", "/auth/register", "/auth/refresh"];

/// Axum middleware wrapping the whole pipeline in one audit record.
pub async fn record_request(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_excluded(&path, &state.config.audit_skip_prefixes) {
        return next.run(request).await;
    }

    let occurred_at = Utc::now();
    let started = Instant::now();
    let method = request.method().clone();
    let query = request.uri().query().map(str::to_string);
    let client_ip = client_ip(&request);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| truncate(ua, USER_AGENT_LIMIT));

    let (request, body) = capture_body(request, &method, &path).await;

    let response = next.run(request).await;

    let mut record = AuditRecord {
        occurred_at,
        method: method.to_string(),
        path,
        query,
        client_ip,
        user_agent,
        // Set by the gate for allowed and role-refused requests; absent for
        // pre-auth traffic and credential failures.
        user_id: response
            .extensions()
            .get::<AuthenticatedUser>()
            .map(|u| u.0.user_id),
        body,
        status: i32::from(response.status().as_u16()),
        duration_ms: started.elapsed().as_millis() as i64,
        error_kind: None,
        error_message: None,
    };
    if let Some(detail) = response.extensions().get::<ErrorDetail>() {
        record.error_kind = Some(detail.kind.to_string());
        record.error_message = Some(truncate(&detail.message, ERROR_MESSAGE_LIMIT));
    }
    state.audit.submit(record);

    response
}

/// Operational endpoints and static assets (any dotted path) are not audited.
fn is_excluded(path: &str, skip_prefixes: &[String]) -> bool {
    skip_prefixes.iter().any(|p| path.starts_with(p.as_str())) || path.contains('.')
}

/// Credential-bearing endpoints, matched by substring.
fn is_sensitive(path: &str) -> bool {
    SENSITIVE_PATHS.iter().any(|p| path.contains(p))
}

/// Buffer the request body for capture and hand the handler the full
/// original bytes back. Bodyless methods and sensitive paths are skipped.
async fn capture_body(request: Request, method: &Method, path: &str) -> (Request, Option<String>) {
    let has_body = !matches!(
        *method,
        Method::GET | Method::HEAD | Method::DELETE | Method::OPTIONS
    );
    if !has_body || is_sensitive(path) {
        return (request, None);
    }

    let (parts, body) = request.into_parts();
    match to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            let captured = if bytes.is_empty() {
                None
            } else {
                Some(truncate(&String::from_utf8_lossy(&bytes), BODY_CAPTURE_LIMIT))
            };
            (Request::from_parts(parts, Body::from(bytes)), captured)
        }
        // A broken body stream fails downstream as well; nothing to record.
        Err(_) => (Request::from_parts(parts, Body::empty()), None),
    }
}

/// Prefer the first `X-Forwarded-For` hop, else the transport peer address.
fn client_ip(request: &Request) -> Option<String> {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        && let Some(first) = forwarded.split(',').next()
    {
        let first = first.trim();
        if !first.is_empty() {
            return Some(first.to_string());
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
}

/// Cap `text` at `limit` characters, marking the cut.
fn truncate(text: &str, limit: usize) -> String {
    let mut taken: String = text.chars().take(limit).collect();
    if taken.len() < text.len() {
        taken.push_str(TRUNCATION_MARKER);
    }
    taken
}
