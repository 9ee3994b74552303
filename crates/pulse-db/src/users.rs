//! System-actor bootstrap.

use pulse_types::{Role, SYSTEM_USER_EMAIL};
use rusqlite::Connection;

use crate::records::StoreError;

/// Ensures the system service account exists and returns its id.
///
/// Generator-produced records are attributed to this account so the
/// `records.created_by` constraint holds without relying on auto-increment
/// ordering. Safe to call on every startup.
///
/// # Errors
///
/// Returns `StoreError::Database` on any SQL failure.
pub fn ensure_system_user(conn: &Connection) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO users (email, role, active) VALUES (?1, ?2, 1)",
        rusqlite::params![SYSTEM_USER_EMAIL, Role::Service.label()],
    )?;

    let id = conn.query_row(
        "SELECT id FROM users WHERE email = ?1",
        [SYSTEM_USER_EMAIL],
        |row| row.get(0),
    )?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_migrations;

    #[test]
    fn bootstrap_is_idempotent() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("migrations should succeed");

        let first = ensure_system_user(&conn).expect("first bootstrap should succeed");
        let second = ensure_system_user(&conn).expect("second bootstrap should succeed");
        assert_eq!(first, second);

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE email = ?1",
                [SYSTEM_USER_EMAIL],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn system_user_carries_the_service_role() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("migrations should succeed");
        ensure_system_user(&conn).expect("bootstrap should succeed");

        let role: String = conn
            .query_row(
                "SELECT role FROM users WHERE email = ?1",
                [SYSTEM_USER_EMAIL],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(role, "SERVICE");
    }
}
