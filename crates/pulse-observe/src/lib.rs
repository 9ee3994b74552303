//! Audit logging for the Pulse monitoring platform.
//!
//! Persists high-signal system events (flush outcomes, auth decisions,
//! admin actions) into the `system_log` table for later filtering and
//! auditing. Only operationally meaningful events belong here — request
//! tracing stays in the `tracing` layer, which has its own sinks.
//!
//! From the pipeline's perspective audit writes are fire-and-forget: the
//! [`record_or_warn`] wrapper absorbs storage failures as warnings so a
//! degraded audit path never degrades the work being audited.

use rusqlite::{params, Connection};

/// Errors that can occur during audit log operations.
#[derive(Debug, thiserror::Error)]
pub enum ObserveError {
    /// A database operation failed.
    #[error("audit log database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Severity levels for audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the canonical string label for this level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    /// Attempts to convert a string label to a `LogLevel`.
    /// Unrecognized labels fall back to `Info` rather than failing —
    /// an audit write must not be refused over a label typo.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "WARN" => Self::Warn,
            "ERROR" => Self::Error,
            _ => Self::Info,
        }
    }
}

/// A persisted audit entry as read back from the log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub id: i64,
    pub level: String,
    pub event_type: String,
    pub message: String,
    pub detail: Option<String>,
    pub actor_user_id: Option<i64>,
    pub created_at: String,
}

/// Writes a single entry to the audit log, returning its row id.
///
/// # Errors
///
/// Returns `ObserveError::Database` on SQL failure.
pub fn write_log(
    conn: &Connection,
    level: LogLevel,
    event_type: &str,
    message: &str,
    detail: Option<&str>,
    actor_user_id: Option<i64>,
) -> Result<i64, ObserveError> {
    conn.execute(
        "INSERT INTO system_log (level, event_type, message, detail, actor_user_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![level.as_str(), event_type, message, detail, actor_user_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fire-and-forget variant of [`write_log`]: failures are logged as
/// warnings and never propagate to the caller.
pub fn record_or_warn(
    conn: &Connection,
    level: LogLevel,
    event_type: &str,
    message: &str,
    detail: Option<&str>,
    actor_user_id: Option<i64>,
) {
    if let Err(e) = write_log(conn, level, event_type, message, detail, actor_user_id) {
        tracing::warn!(event_type, "failed to write audit entry: {}", e);
    }
}

/// Returns the most recent audit entries, newest first, bounded by `limit`.
///
/// # Errors
///
/// Returns `ObserveError::Database` on SQL failure.
pub fn recent_logs(conn: &Connection, limit: i64) -> Result<Vec<LogEntry>, ObserveError> {
    let mut stmt = conn.prepare(
        "SELECT id, level, event_type, message, detail, actor_user_id, created_at
         FROM system_log ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok(LogEntry {
                id: row.get(0)?,
                level: row.get(1)?,
                event_type: row.get(2)?,
                message: row.get(3)?,
                detail: row.get(4)?,
                actor_user_id: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
