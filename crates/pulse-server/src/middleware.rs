//! Bearer-token authentication middleware.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use pulse_auth::{decode_token, get_user, User};
use std::sync::Arc;

use crate::AppState;

/// Wrapper for the authenticated [`User`] stored in request extensions.
#[derive(Clone, Debug)]
pub struct AuthContext(pub User);

/// Middleware authenticating requests via `Authorization: Bearer <token>`.
///
/// The token signature and expiry are verified first, then the subject is
/// resolved against the users table. The stored role — not the token's
/// embedded claim — is what downstream handlers authorize against, so a
/// role change takes effect without waiting for token expiry. Inactive
/// accounts are vetoed here. Every failure maps to `401 UNAUTHORIZED`
/// without distinguishing the cause.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let token = match req.headers().get("Authorization") {
        Some(val) => {
            let val_str = val.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;
            match val_str.strip_prefix("Bearer ") {
                Some(token) => token.to_string(),
                None => return Err(StatusCode::UNAUTHORIZED),
            }
        }
        None => return Err(StatusCode::UNAUTHORIZED),
    };

    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    let claims =
        decode_token(&token, &state.token_secret).map_err(|_| StatusCode::UNAUTHORIZED)?;

    // Resolve the subject (blocking DB operation).
    let pool = state.pool.clone();
    let user = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        get_user(&conn, claims.subject).map_err(|_| StatusCode::UNAUTHORIZED)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    if !user.active {
        return Err(StatusCode::UNAUTHORIZED);
    }

    req.extensions_mut().insert(AuthContext(user));

    Ok(next.run(req).await)
}
