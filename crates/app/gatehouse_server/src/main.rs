//! Gatehouse API server binary.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;

use gatehouse_api::config::ApiConfig;
use gatehouse_api::services::audit::{PgAuditStore, spawn_audit_writer};
use gatehouse_api::services::roles::{CachedRoleLookup, PgRoleLookup};
use gatehouse_core::auth::jwt::TokenValidator;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "gatehouse_server", about = "Gatehouse API server")]
struct Args {
    /// Address to bind (overrides BIND_ADDR; 0 port = ephemeral).
    #[arg(long)]
    bind_addr: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gatehouse_api=debug,gatehouse_core=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    info!(bind_addr = %config.bind_addr, "starting gatehouse_server");

    // Fails fast on a missing/empty secret — a deployment defect, not
    // something to discover on the first request.
    let tokens = TokenValidator::new(
        config.jwt_secret.clone(),
        config.jwt_issuer.clone(),
        config.jwt_audience.clone(),
        config.access_ttl_secs,
    )?;

    info!(max_connections = args.max_connections, "configuring connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;

    info!("running database migrations");
    gatehouse_api::migrate(&pool).await?;

    let roles = Arc::new(CachedRoleLookup::new(
        PgRoleLookup::new(pool.clone()),
        config.role_cache_ttl_secs,
    ));

    let (audit, audit_writer) = spawn_audit_writer(
        Arc::new(PgAuditStore::new(pool.clone())),
        config.audit_queue_capacity,
    );

    let state = gatehouse_api::AppState {
        pool,
        config: config.clone(),
        tokens,
        roles,
        audit,
    };

    let app = gatehouse_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "REST API listening");

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown_signal.cancel();
        }
    });

    // connect-info makes the transport peer address visible to the audit
    // recorder's client-IP fallback.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await?;

    // The router (and its audit sink) is gone; let the writer drain what
    // is already queued before exiting.
    let _ = audit_writer.await;

    Ok(())
}
