//! Pulse server binary — the main entry point for the monitoring platform.
//!
//! Starts an axum HTTP/WebSocket server with structured logging, database
//! initialization, the realtime pipeline's background loops, and graceful
//! shutdown on SIGTERM/SIGINT.

use pulse_realtime::{
    AuditSink, Broadcaster, EventBuffer, FlushScheduler, Generator, RecordSink, StatusReporter,
};
use pulse_server::sink::{SqliteAuditSink, SqliteRecordSink};
use pulse_server::{app, config, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("PULSE_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Initialize database
    let pool = pulse_db::create_pool(
        &config.database.path,
        pulse_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to create database pool — check database.path in config");

    let system_user_id = {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied = pulse_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
        pulse_db::ensure_system_user(&conn).expect("failed to bootstrap system user")
    };

    let token_secret = pulse_auth::derive_token_secret(&config.auth.token_secret);

    // Assemble the realtime pipeline
    let buffer = Arc::new(EventBuffer::new(config.realtime.buffer_max_size));
    let broadcaster = Arc::new(Broadcaster::new());
    let generator = Arc::new(Generator::new(
        config.realtime.alert_threshold,
        Duration::from_secs(config.realtime.generator_interval_secs),
    ));
    let flush = Arc::new(FlushScheduler::new(
        Duration::from_secs(config.realtime.flush_interval_secs),
        system_user_id,
    ));
    let record_sink: Arc<dyn RecordSink> = Arc::new(SqliteRecordSink::new(
        pool.clone(),
        config.realtime.alert_threshold,
    ));
    let audit_sink: Arc<dyn AuditSink> = Arc::new(SqliteAuditSink::new(pool.clone()));
    let status = Arc::new(StatusReporter::new(
        Arc::clone(&generator),
        Arc::clone(&broadcaster),
        Arc::clone(&buffer),
        Arc::clone(&flush),
        Arc::clone(&record_sink),
    ));

    // Spawn the supervised background loops
    let generator_task = tokio::spawn({
        let generator = Arc::clone(&generator);
        let broadcaster = Arc::clone(&broadcaster);
        let buffer = Arc::clone(&buffer);
        async move { generator.run(broadcaster, buffer).await }
    });
    let flush_task = tokio::spawn({
        let flush = Arc::clone(&flush);
        let buffer = Arc::clone(&buffer);
        let record_sink = Arc::clone(&record_sink);
        let audit_sink = Arc::clone(&audit_sink);
        async move { flush.run(buffer, record_sink, audit_sink).await }
    });

    // Build application
    let state = AppState {
        pool,
        token_secret,
        broadcaster,
        buffer,
        generator: Arc::clone(&generator),
        flush: Arc::clone(&flush),
        status,
    };
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting pulse server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");

    // Cooperative stop: each loop observes its flag at the next cadence
    // boundary, so the join grace must cover one full sleep interval.
    generator.stop();
    flush.stop();
    let grace = Duration::from_secs(config.realtime.flush_interval_secs.max(
        config.realtime.generator_interval_secs,
    ) + 1);
    join_or_abort("generator", generator_task, grace).await;
    join_or_abort("flush", flush_task, grace).await;

    tracing::info!("pulse server shut down");
}

/// Awaits a background task for up to `grace`, aborting it on expiry.
async fn join_or_abort(name: &str, handle: JoinHandle<()>, grace: Duration) {
    let abort = handle.abort_handle();
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(())) => tracing::info!(task = name, "background task joined"),
        Ok(Err(e)) => tracing::error!(task = name, "background task panicked: {}", e),
        Err(_) => {
            tracing::warn!(task = name, "background task did not stop in time, aborting");
            abort.abort();
        }
    }
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
