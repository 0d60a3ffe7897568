//! Role lookup for the authorization gate.
//!
//! The gate consults the store on every request; the optional TTL cache
//! bounds that cost while keeping revocation latency at most one TTL.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sqlx::PgPool;

use gatehouse_core::auth::AuthError;

/// Resolves the role set a user currently holds.
#[async_trait]
pub trait RoleLookup: Send + Sync {
    async fn roles_for(&self, user_id: i64) -> Result<Vec<String>, AuthError>;
}

/// Postgres-backed lookup against `user_roles`.
pub struct PgRoleLookup {
    pool: PgPool,
}

impl PgRoleLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleLookup for PgRoleLookup {
    async fn roles_for(&self, user_id: i64) -> Result<Vec<String>, AuthError> {
        gatehouse_core::auth::queries::get_user_roles(&self.pool, user_id).await
    }
}

/// TTL cache wrapped around another lookup. A zero TTL passes every call
/// through, preserving immediate revocation.
pub struct CachedRoleLookup<L> {
    inner: L,
    ttl: Duration,
    entries: DashMap<i64, CachedRoles>,
}

#[derive(Clone)]
struct CachedRoles {
    roles: Vec<String>,
    expires_at: DateTime<Utc>,
}

impl<L> CachedRoleLookup<L> {
    pub fn new(inner: L, ttl_secs: i64) -> Self {
        Self {
            inner,
            ttl: Duration::seconds(ttl_secs),
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl<L: RoleLookup> RoleLookup for CachedRoleLookup<L> {
    async fn roles_for(&self, user_id: i64) -> Result<Vec<String>, AuthError> {
        if self.ttl.is_zero() {
            return self.inner.roles_for(user_id).await;
        }
        if let Some(entry) = self.entries.get(&user_id)
            && Utc::now() < entry.expires_at
        {
            return Ok(entry.roles.clone());
        }
        let roles = self.inner.roles_for(user_id).await?;
        self.entries.insert(
            user_id,
            CachedRoles {
                roles: roles.clone(),
                expires_at: Utc::now() + self.ttl,
            },
        );
        Ok(roles)
    }
}
