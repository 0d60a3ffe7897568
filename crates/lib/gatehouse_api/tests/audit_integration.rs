//! Request audit recorder tests — one record per request, byte-identical
//! passthrough, exclusions, body capping, and isolation from store failures.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;

use gatehouse_api::AppState;
use gatehouse_api::error::panic_response;
use gatehouse_api::middleware::audit::{
    BODY_CAPTURE_LIMIT, TRUNCATION_MARKER, record_request,
};

use common::{MemoryAuditStore, StaticRoles, test_state};

/// Handler that dies mid-request; the catch-panic layer turns it into a 500.
async fn boom_handler() -> &'static str {
    panic!("boom")
}

/// A small surface under the real recorder: plain GET, echoing POST,
/// panicking GET, a login stand-in, and excluded paths.
fn audited_router(state: AppState) -> Router {
    Router::new()
        .route("/api/ok", get(|| async { "ok" }))
        .route("/api/things", post(|body: String| async move { body }))
        .route("/api/boom", get(boom_handler))
        .route("/auth/login", post(|_body: String| async { "welcome" }))
        .route("/health", get(|| async { "ok" }))
        .route("/assets/app.js", get(|| async { "console.log()" }))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            record_request,
        ))
        .with_state(state)
}

fn fixture() -> (Arc<MemoryAuditStore>, Router) {
    let store = MemoryAuditStore::new();
    let state = test_state(StaticRoles::single(1, "member"), store.clone());
    (store, audited_router(state))
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn one_record_per_request() {
    let (store, app) = fixture();

    for _ in 0..3 {
        let resp = app
            .clone()
            .oneshot(Request::get("/api/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let records = store.wait_for(3).await;
    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!(record.method, "GET");
        assert_eq!(record.path, "/api/ok");
        assert_eq!(record.status, 200);
        assert!(record.duration_ms >= 0);
        assert!(record.user_id.is_none());
    }
}

#[tokio::test]
async fn excluded_paths_produce_no_records() {
    let (store, app) = fixture();

    for uri in ["/health", "/assets/app.js"] {
        let resp = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    // Audited traffic afterwards proves the writer is alive, so the zero
    // count above is a real exclusion and not just a slow drain.
    app.clone()
        .oneshot(Request::get("/api/ok").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let records = store.wait_for(1).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, "/api/ok");
}

#[tokio::test]
async fn sensitive_path_body_is_never_captured() {
    let (store, app) = fixture();

    let big = "p".repeat(50 * 1024);
    let resp = app
        .oneshot(
            Request::post("/auth/login")
                .header("content-type", "text/plain")
                .body(Body::from(big))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let records = store.wait_for(1).await;
    assert_eq!(records[0].path, "/auth/login");
    assert!(records[0].body.is_none());
}

#[tokio::test]
async fn oversize_body_is_capped_with_marker_and_passed_through_whole() {
    let (store, app) = fixture();

    let body: String = (0..10_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    let resp = app
        .oneshot(
            Request::post("/api/things")
                .header("content-type", "text/plain")
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // The handler echoed the body — it must have seen every byte despite
    // the capped capture.
    assert_eq!(body_text(resp).await, body);

    let records = store.wait_for(1).await;
    let captured = records[0].body.as_deref().unwrap();
    let expected: String = body.chars().take(BODY_CAPTURE_LIMIT).collect();
    assert_eq!(captured, format!("{expected}{TRUNCATION_MARKER}"));
}

#[tokio::test]
async fn small_body_is_captured_verbatim() {
    let (store, app) = fixture();

    let resp = app
        .oneshot(
            Request::post("/api/things")
                .body(Body::from("hello audit"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_text(resp).await, "hello audit");

    let records = store.wait_for(1).await;
    assert_eq!(records[0].body.as_deref(), Some("hello audit"));
}

#[tokio::test]
async fn store_failure_leaves_response_unchanged() {
    let failing = MemoryAuditStore::failing();
    let state = test_state(StaticRoles::single(1, "member"), failing);
    let app = audited_router(state);

    let resp = app
        .oneshot(Request::get("/api/ok").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "ok");
}

#[tokio::test]
async fn handler_panic_is_recorded_as_500_with_detail() {
    let (store, app) = fixture();

    let resp = app
        .oneshot(Request::get("/api/boom").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let records = store.wait_for(1).await;
    assert_eq!(records[0].status, 500);
    assert_eq!(records[0].error_kind.as_deref(), Some("internal_error"));
    assert!(records[0].error_message.as_deref().unwrap().contains("boom"));
}

#[tokio::test]
async fn forwarded_for_wins_over_peer_address() {
    let (store, app) = fixture();

    app.oneshot(
        Request::get("/api/ok")
            .header("x-forwarded-for", "10.1.2.3, 70.0.0.1")
            .header("user-agent", "audit-test/1.0")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let records = store.wait_for(1).await;
    assert_eq!(records[0].client_ip.as_deref(), Some("10.1.2.3"));
    assert_eq!(records[0].user_agent.as_deref(), Some("audit-test/1.0"));
}

#[tokio::test]
async fn query_string_is_recorded() {
    let (store, app) = fixture();

    app.oneshot(
        Request::get("/api/ok?page=2&size=10")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let records = store.wait_for(1).await;
    assert_eq!(records[0].query.as_deref(), Some("page=2&size=10"));
}
