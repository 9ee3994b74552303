//! SQLite-backed implementations of the pipeline's collaborator seams.

use pulse_db::{db_ping, insert_records, DbPool, NewRecord};
use pulse_observe::{record_or_warn, LogLevel};
use pulse_realtime::{AuditSink, PersistenceError, RecordSink};
use pulse_types::TelemetryEvent;

/// Persists flush batches into the `records` table.
pub struct SqliteRecordSink {
    pool: DbPool,
    threshold: f64,
}

impl SqliteRecordSink {
    pub fn new(pool: DbPool, threshold: f64) -> Self {
        Self { pool, threshold }
    }
}

impl RecordSink for SqliteRecordSink {
    fn batch_insert(
        &self,
        actor_id: i64,
        rows: &[TelemetryEvent],
    ) -> Result<usize, PersistenceError> {
        let conn = self
            .pool
            .get()
            .map_err(|e| PersistenceError(e.to_string()))?;
        let records: Vec<NewRecord> = rows.iter().map(NewRecord::from).collect();
        insert_records(&conn, actor_id, self.threshold, &records)
            .map_err(|e| PersistenceError(e.to_string()))
    }

    fn ping(&self) -> bool {
        db_ping(&self.pool)
    }
}

/// Writes audit entries into the `system_log` table. Failures are absorbed
/// as warnings — a degraded audit path never fails the work being audited.
pub struct SqliteAuditSink {
    pool: DbPool,
}

impl SqliteAuditSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl AuditSink for SqliteAuditSink {
    fn record(
        &self,
        level: &str,
        event_type: &str,
        message: &str,
        detail: Option<&str>,
        actor_user_id: Option<i64>,
    ) {
        match self.pool.get() {
            Ok(conn) => record_or_warn(
                &conn,
                LogLevel::from_str_lossy(level),
                event_type,
                message,
                detail,
                actor_user_id,
            ),
            Err(e) => {
                tracing::warn!(event_type, "audit sink could not borrow a connection: {}", e);
            }
        }
    }
}
