//! HMAC-SHA256 signed bearer tokens.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use hmac::{Hmac, Mac};
use pulse_types::Role;
use sha2::{Digest, Sha256};

use crate::AuthError;

/// Verified claims extracted from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// The authenticated user id.
    pub subject: i64,
    /// The role embedded at issue time.
    pub role: Role,
}

/// Derives a 32-byte HMAC key from the configured secret string.
///
/// Uses SHA-256 with a domain-separation prefix so the derived key is
/// independent of any other use of the same configuration value.
pub fn derive_token_secret(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"pulse-token-v1:");
    hasher.update(secret.as_bytes());
    let result = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&result);
    key
}

/// Issues a signed bearer token for `subject` with the given role and TTL.
pub fn issue_token(subject: i64, role: Role, secret: &[u8; 32], ttl: Duration) -> String {
    let expires = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        + ttl.as_secs();

    let payload = format!("{}|{}|{}", subject, role.label(), expires);

    let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("HMAC key length is valid");
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let token_bytes = format!("{}|{}", payload, hex::encode(signature));
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token_bytes.as_bytes())
}

/// Verifies a signed bearer token and returns its claims.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] on any failure: undecodable
/// envelope, wrong field count, signature mismatch, unknown role label,
/// unparsable or elapsed expiry.
pub fn decode_token(token: &str, secret: &[u8; 32]) -> Result<Claims, AuthError> {
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(token.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;

    let token_str = String::from_utf8(decoded).map_err(|_| AuthError::InvalidToken)?;

    // Parse: sub|role|expires|signature_hex
    let parts: Vec<&str> = token_str.splitn(4, '|').collect();
    if parts.len() != 4 {
        return Err(AuthError::InvalidToken);
    }

    let (sub_str, role_str, expires_str, sig_hex) = (parts[0], parts[1], parts[2], parts[3]);

    // Verify HMAC before trusting any field.
    let payload = format!("{}|{}|{}", sub_str, role_str, expires_str);
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("HMAC key length is valid");
    mac.update(payload.as_bytes());
    let expected_sig = mac.finalize().into_bytes();
    let provided_sig = hex::decode(sig_hex).map_err(|_| AuthError::InvalidToken)?;

    if expected_sig.as_slice() != provided_sig.as_slice() {
        return Err(AuthError::InvalidToken);
    }

    let expires: u64 = expires_str.parse().map_err(|_| AuthError::InvalidToken)?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    if now > expires {
        return Err(AuthError::InvalidToken);
    }

    let subject: i64 = sub_str.parse().map_err(|_| AuthError::InvalidToken)?;
    let role = Role::from_label(role_str).map_err(|_| AuthError::InvalidToken)?;

    Ok(Claims { subject, role })
}
