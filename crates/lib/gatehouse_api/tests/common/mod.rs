//! Shared helpers for router-level tests: an `AppState` backed by a lazy
//! (never-connected) pool, a static role lookup, and an in-memory audit
//! store.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;

use gatehouse_api::AppState;
use gatehouse_api::config::ApiConfig;
use gatehouse_api::services::audit::{AuditStore, spawn_audit_writer};
use gatehouse_api::services::roles::RoleLookup;
use gatehouse_core::audit::AuditError;
use gatehouse_core::auth::AuthError;
use gatehouse_core::auth::jwt::TokenValidator;
use gatehouse_core::models::audit::AuditRecord;

pub const TEST_SECRET: &str = "test-secret";
pub const TEST_ISSUER: &str = "gatehouse";
pub const TEST_AUDIENCE: &str = "gatehouse-clients";

/// Role lookup answering from a fixed map.
pub struct StaticRoles(pub HashMap<i64, Vec<String>>);

impl StaticRoles {
    pub fn single(user_id: i64, role: &str) -> Arc<Self> {
        let mut map = HashMap::new();
        map.insert(user_id, vec![role.to_string()]);
        Arc::new(Self(map))
    }
}

#[async_trait]
impl RoleLookup for StaticRoles {
    async fn roles_for(&self, user_id: i64) -> Result<Vec<String>, AuthError> {
        Ok(self.0.get(&user_id).cloned().unwrap_or_default())
    }
}

/// Role lookup simulating an unavailable backing store.
pub struct FailingRoles;

#[async_trait]
impl RoleLookup for FailingRoles {
    async fn roles_for(&self, _user_id: i64) -> Result<Vec<String>, AuthError> {
        Err(AuthError::Internal("role store unavailable".into()))
    }
}

/// Audit store collecting records in memory; optionally failing every insert.
pub struct MemoryAuditStore {
    pub records: Mutex<Vec<AuditRecord>>,
    pub fail: bool,
}

impl MemoryAuditStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Wait for the detached writer to drain `expected` records.
    pub async fn wait_for(&self, expected: usize) -> Vec<AuditRecord> {
        for _ in 0..200 {
            if self.len() >= expected {
                return self.records.lock().unwrap().clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "audit writer drained {} records, expected {expected}",
            self.len()
        );
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn insert(&self, record: &AuditRecord) -> Result<(), AuditError> {
        if self.fail {
            return Err(AuditError::DbError(sqlx::Error::PoolClosed));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Build an `AppState` that needs no live database. The pool is lazy and
/// only errors if a test actually reaches a query.
pub fn test_state(
    roles: Arc<dyn RoleLookup>,
    store: Arc<dyn AuditStore>,
) -> AppState {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://127.0.0.1:1/unused")
        .expect("lazy pool");
    let tokens = TokenValidator::new(TEST_SECRET, TEST_ISSUER, TEST_AUDIENCE, 900).unwrap();
    let (audit, _writer) = spawn_audit_writer(store, 64);
    AppState {
        pool,
        config: ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            database_url: "postgres://127.0.0.1:1/unused".into(),
            jwt_secret: TEST_SECRET.into(),
            jwt_issuer: TEST_ISSUER.into(),
            jwt_audience: TEST_AUDIENCE.into(),
            access_ttl_secs: 900,
            refresh_ttl_days: 30,
            role_cache_ttl_secs: 0,
            audit_queue_capacity: 64,
            audit_skip_prefixes: vec!["/health".into(), "/docs".into()],
        },
        tokens,
        roles,
        audit,
    }
}

/// Issue a valid access token with the state's signing setup.
pub fn access_token(user_id: i64, role: &str) -> String {
    TokenValidator::new(TEST_SECRET, TEST_ISSUER, TEST_AUDIENCE, 900)
        .unwrap()
        .issue(user_id, role)
        .unwrap()
}

/// Issue an access token that expired ten seconds ago.
pub fn expired_access_token(user_id: i64, role: &str) -> String {
    TokenValidator::new(TEST_SECRET, TEST_ISSUER, TEST_AUDIENCE, -10)
        .unwrap()
        .issue(user_id, role)
        .unwrap()
}
