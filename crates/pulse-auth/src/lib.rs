//! Bearer-token authentication for the Pulse monitoring platform.
//!
//! Tokens are HMAC-SHA256 signed and carry the subject user id, role, and
//! expiry. Token format: `base64url(sub|role|expires_unix_secs|hmac_hex)`.
//! The signature binds the subject and role to a time window, preventing
//! both impersonation (different subject/role) and replay (after expiry).
//!
//! Decoding collapses every failure — malformed envelope, bad signature,
//! unknown role, expiry — into [`AuthError::InvalidToken`]; callers get no
//! oracle into which check failed.

mod token;
mod users;

pub use token::{decode_token, derive_token_secret, issue_token, Claims};
pub use users::{get_user, User};

/// Errors that can occur during authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token is malformed, forged, expired, or otherwise unusable.
    #[error("invalid token")]
    InvalidToken,

    /// No user row exists for the token subject.
    #[error("unknown user: {0}")]
    UnknownUser(i64),

    /// A database operation failed during user lookup.
    #[error("auth database error: {0}")]
    Database(#[from] rusqlite::Error),
}
