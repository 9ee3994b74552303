//! User lookup for token-subject resolution.

use pulse_types::Role;
use rusqlite::Connection;

use crate::AuthError;

/// A user account row as seen by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub active: bool,
}

/// Retrieves a user by id.
///
/// # Errors
///
/// Returns [`AuthError::UnknownUser`] if no row exists,
/// [`AuthError::Database`] on any other SQL failure. Callers are expected
/// to veto inactive accounts themselves — lookup reports state, admission
/// policy lives at the boundary.
pub fn get_user(conn: &Connection, user_id: i64) -> Result<User, AuthError> {
    conn.query_row(
        "SELECT id, email, role, active FROM users WHERE id = ?1",
        [user_id],
        |row| {
            let role_str: String = row.get(2)?;
            let role = Role::from_label(&role_str).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            Ok(User {
                id: row.get(0)?,
                email: row.get(1)?,
                role,
                active: row.get(3)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AuthError::UnknownUser(user_id),
        other => AuthError::Database(other),
    })
}
