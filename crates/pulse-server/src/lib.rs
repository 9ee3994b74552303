//! Pulse server library logic.
//!
//! Wires the realtime pipeline to its HTTP/WebSocket surface: observer
//! admission, the admin runtime-status endpoint, bearer-token middleware,
//! and the SQLite-backed sink implementations the pipeline's seams consume.

pub mod api_status;
pub mod api_ws;
pub mod config;
pub mod middleware;
pub mod sink;

use axum::{routing::get, Extension, Json, Router};
use pulse_db::DbPool;
use pulse_realtime::{Broadcaster, EventBuffer, FlushScheduler, Generator, StatusReporter};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across all request handlers.
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Derived HMAC key for bearer tokens.
    pub token_secret: [u8; 32],
    /// Live observer registry.
    pub broadcaster: Arc<Broadcaster>,
    /// Pending-persistence event buffer.
    pub buffer: Arc<EventBuffer>,
    /// Synthetic telemetry generator.
    pub generator: Arc<Generator>,
    /// Periodic flush scheduler.
    pub flush: Arc<FlushScheduler>,
    /// Read-only runtime status aggregator.
    pub status: Arc<StatusReporter>,
}

/// Health check handler.
///
/// Returns `200 OK` with server status and version. Used by load balancers,
/// monitoring, and CI to verify the server is running.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/system/runtime",
            get(api_status::runtime_status_handler),
        )
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(protected_routes)
        .route("/ws/realtime", get(api_ws::ws_realtime_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
