//! Admin runtime-status endpoint.

use axum::{extract::Extension, http::StatusCode, Json};
use pulse_realtime::RuntimeStatus;
use pulse_types::Role;
use std::sync::Arc;

use crate::middleware::AuthContext;
use crate::AppState;

/// `GET /api/system/runtime` — operational snapshot of the realtime
/// pipeline.
///
/// Requires an ADMIN account (authentication itself happens in
/// `auth_middleware`). The snapshot is read-only: serving this endpoint
/// never perturbs the pipeline it reports on.
pub async fn runtime_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(AuthContext(user)): Extension<AuthContext>,
) -> Result<Json<RuntimeStatus>, StatusCode> {
    if user.role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(Json(state.status.snapshot().await))
}
