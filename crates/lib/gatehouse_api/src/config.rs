//! API server configuration.

use gatehouse_core::auth::jwt::resolve_jwt_secret;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3200").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// JWT `iss` claim, checked on every validation.
    pub jwt_issuer: String,
    /// JWT `aud` claim, checked on every validation.
    pub jwt_audience: String,
    /// Access token lifetime in seconds.
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in days.
    pub refresh_ttl_days: i64,
    /// TTL for the per-user role cache, in seconds. 0 disables caching and
    /// every request reads roles straight from the database.
    pub role_cache_ttl_secs: i64,
    /// Bound on the in-flight audit queue; records past it are dropped.
    pub audit_queue_capacity: usize,
    /// Path prefixes exempt from request auditing.
    pub audit_skip_prefixes: Vec<String>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                  | Default                          |
    /// |---------------------------|----------------------------------|
    /// | `BIND_ADDR`               | `127.0.0.1:3200`                 |
    /// | `DATABASE_URL`            | `postgres://localhost:5432/gatehouse` |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file |
    /// | `JWT_ISSUER`              | `gatehouse`                      |
    /// | `JWT_AUDIENCE`            | `gatehouse-clients`              |
    /// | `ACCESS_TOKEN_TTL_SECS`   | `900`                            |
    /// | `REFRESH_TOKEN_TTL_DAYS`  | `30`                             |
    /// | `ROLE_CACHE_TTL_SECS`     | `5`                              |
    /// | `AUDIT_QUEUE_CAPACITY`    | `1024`                           |
    /// | `AUDIT_SKIP_PREFIXES`     | `/health,/docs` (comma-separated)|
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3200".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/gatehouse".into()),
            jwt_secret: resolve_jwt_secret(),
            jwt_issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "gatehouse".into()),
            jwt_audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "gatehouse-clients".into()),
            access_ttl_secs: env_i64("ACCESS_TOKEN_TTL_SECS", 900),
            refresh_ttl_days: env_i64("REFRESH_TOKEN_TTL_DAYS", 30),
            role_cache_ttl_secs: env_i64("ROLE_CACHE_TTL_SECS", 5),
            audit_queue_capacity: env_i64("AUDIT_QUEUE_CAPACITY", 1024) as usize,
            audit_skip_prefixes: std::env::var("AUDIT_SKIP_PREFIXES")
                .unwrap_or_else(|_| "/health,/docs".into())
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
