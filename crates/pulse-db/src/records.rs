//! Record persistence: the batch-insert path behind the flush scheduler.

use chrono::{DateTime, Utc};
use pulse_types::{anomaly::is_anomaly, TelemetryEvent};
use rusqlite::{params, Connection};
use thiserror::Error;

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// A row to be persisted into the `records` table.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub title: String,
    pub value: f64,
    pub category: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&TelemetryEvent> for NewRecord {
    fn from(event: &TelemetryEvent) -> Self {
        Self {
            title: event.title.clone(),
            value: event.value,
            category: event.category.clone(),
            timestamp: event.timestamp,
        }
    }
}

/// Persists a batch of records in a single transaction, attributed to
/// `created_by`.
///
/// The anomaly flag is stamped here from the shared classification rule
/// against `threshold` — every write path produces the same flag for the
/// same value. The batch is all-or-nothing: any row failing rolls the whole
/// transaction back, so callers can safely re-queue the entire batch.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns `StoreError::Database` on any SQL failure.
pub fn insert_records(
    conn: &Connection,
    created_by: i64,
    threshold: f64,
    rows: &[NewRecord],
) -> Result<usize, StoreError> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO records (title, value, category, timestamp, is_anomaly, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for row in rows {
            stmt.execute(params![
                row.title,
                row.value,
                row.category,
                row.timestamp.to_rfc3339(),
                is_anomaly(row.value, threshold),
                created_by,
            ])?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ensure_system_user, run_migrations};

    fn test_conn() -> (Connection, i64) {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("migrations should succeed");
        let actor = ensure_system_user(&conn).expect("system user bootstrap should succeed");
        (conn, actor)
    }

    fn row(value: f64) -> NewRecord {
        NewRecord {
            title: "realtime_sensor".to_string(),
            value,
            category: "A".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn batch_insert_stamps_anomaly_from_the_shared_rule() {
        let (conn, actor) = test_conn();
        let rows = vec![row(10.0), row(90.0), row(80.0)];
        let inserted = insert_records(&conn, actor, 80.0, &rows).expect("insert should succeed");
        assert_eq!(inserted, 3);

        let flags: Vec<bool> = conn
            .prepare("SELECT is_anomaly FROM records ORDER BY id")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn batch_insert_attributes_rows_to_the_actor() {
        let (conn, actor) = test_conn();
        insert_records(&conn, actor, 80.0, &[row(1.0)]).expect("insert should succeed");

        let created_by: i64 = conn
            .query_row("SELECT created_by FROM records", [], |r| r.get(0))
            .unwrap();
        assert_eq!(created_by, actor);
    }

    #[test]
    fn unknown_actor_fails_the_whole_batch() {
        let (conn, _) = test_conn();
        let result = insert_records(&conn, 9_999, 80.0, &[row(1.0), row(2.0)]);
        assert!(result.is_err(), "foreign key violation should surface");

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0, "no partial batch should remain");
    }
}
