//! Background audit persistence.
//!
//! The recorder middleware hands finished records to an `AuditSink`; a
//! detached writer task drains the bounded queue into the store. The
//! response path never waits on storage I/O, a full queue drops the record
//! (with a warning, so drops are observable), and a failing store is logged
//! and discarded.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use gatehouse_core::audit::AuditError;
use gatehouse_core::models::audit::AuditRecord;

/// Destination for audit records.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Postgres-backed store writing to `audit_log`.
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn insert(&self, record: &AuditRecord) -> Result<(), AuditError> {
        gatehouse_core::audit::queries::insert_audit_record(&self.pool, record).await
    }
}

/// Cloneable handle the recorder middleware submits records through.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<AuditRecord>,
}

impl AuditSink {
    /// Enqueue a record without waiting. Queue pressure sheds records
    /// rather than slowing the response path.
    pub fn submit(&self, record: AuditRecord) {
        if let Err(e) = self.tx.try_send(record) {
            warn!("dropping audit record: {e}");
        }
    }
}

/// Start the detached writer. The task ends when every sink clone is gone
/// and the queue has drained.
pub fn spawn_audit_writer(
    store: Arc<dyn AuditStore>,
    capacity: usize,
) -> (AuditSink, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<AuditRecord>(capacity);
    let handle = tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            if let Err(e) = store.insert(&record).await {
                warn!("failed to persist audit record: {e}");
            }
        }
    });
    (AuditSink { tx }, handle)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    struct MemoryStore {
        records: Mutex<Vec<AuditRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl AuditStore for MemoryStore {
        async fn insert(&self, record: &AuditRecord) -> Result<(), AuditError> {
            if self.fail {
                return Err(AuditError::DbError(sqlx::Error::PoolClosed));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn record(path: &str) -> AuditRecord {
        AuditRecord {
            occurred_at: Utc::now(),
            method: "GET".into(),
            path: path.into(),
            query: None,
            client_ip: None,
            user_agent: None,
            user_id: None,
            body: None,
            status: 200,
            duration_ms: 1,
            error_kind: None,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn writer_drains_queue_into_store() {
        let store = Arc::new(MemoryStore {
            records: Mutex::new(Vec::new()),
            fail: false,
        });
        let (sink, handle) = spawn_audit_writer(store.clone(), 16);
        sink.submit(record("/a"));
        sink.submit(record("/b"));
        drop(sink);
        handle.await.unwrap();
        let written = store.records.lock().unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].path, "/a");
        assert_eq!(written[1].path, "/b");
    }

    #[tokio::test]
    async fn store_failure_is_swallowed() {
        let store = Arc::new(MemoryStore {
            records: Mutex::new(Vec::new()),
            fail: true,
        });
        let (sink, handle) = spawn_audit_writer(store, 16);
        sink.submit(record("/a"));
        drop(sink);
        // The writer must finish cleanly despite every insert failing.
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn submit_after_writer_stops_does_not_panic() {
        let store = Arc::new(MemoryStore {
            records: Mutex::new(Vec::new()),
            fail: false,
        });
        let (sink, handle) = spawn_audit_writer(store, 1);
        handle.abort();
        let _ = handle.await;
        sink.submit(record("/late"));
    }
}
