//! # gatehouse_api
//!
//! HTTP API library for Gatehouse.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Extension;
use axum::Router;
use axum::routing::{get, post};
use sqlx::PgPool;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};

use gatehouse_core::auth::jwt::TokenValidator;

use crate::config::ApiConfig;
use crate::handlers::{account, audit, auth, health};
use crate::middleware::auth::RequiredRoles;
use crate::services::audit::AuditSink;
use crate::services::roles::RoleLookup;

/// Role sets attached to route groups at registration.
const MEMBER_ROLES: &[&str] = &["admin", "member"];
const ADMIN_ROLES: &[&str] = &["admin"];

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub pool: PgPool,
    /// API configuration.
    pub config: ApiConfig,
    /// Access-token signer/verifier.
    pub tokens: TokenValidator,
    /// Role resolver consulted by the authorization gate.
    pub roles: Arc<dyn RoleLookup>,
    /// Handle to the background audit writer.
    pub audit: AuditSink,
}

/// Run embedded database migrations.
///
/// Delegates to `gatehouse_core::migrate::migrate()` which owns the
/// migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    gatehouse_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes. The role-set extension is layered outside the gate
    // (later route_layer = outermost) so the gate can read it.
    let member = Router::new()
        .route("/api/me", get(account::me_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authorize,
        ))
        .route_layer(Extension(RequiredRoles(MEMBER_ROLES)));

    let admin = Router::new()
        .route("/api/admin/audit", get(audit::list_audit_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authorize,
        ))
        .route_layer(Extension(RequiredRoles(ADMIN_ROLES)));

    // The audit recorder wraps everything below it, including the
    // panic-to-500 conversion, so handler panics are recorded too.
    Router::new()
        .merge(public)
        .merge(member)
        .merge(admin)
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::audit::record_request,
        ))
        .layer(cors)
        .with_state(state)
}
