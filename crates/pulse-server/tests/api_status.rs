//! Integration tests for the health and admin runtime-status endpoints.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use pulse_auth::{derive_token_secret, issue_token};
use pulse_realtime::{
    Broadcaster, EventBuffer, FlushScheduler, Generator, RecordSink, StatusReporter,
};
use pulse_server::sink::SqliteRecordSink;
use pulse_server::AppState;
use pulse_types::Role;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt; // for oneshot

struct TestServer {
    _dir: TempDir,
    router: Router,
    secret: [u8; 32],
    admin_id: i64,
    user_id: i64,
    inactive_id: i64,
}

fn seed_user(conn: &rusqlite::Connection, email: &str, role: &str, active: bool) -> i64 {
    conn.execute(
        "INSERT INTO users (email, role, active) VALUES (?1, ?2, ?3)",
        rusqlite::params![email, role, active],
    )
    .unwrap();
    conn.last_insert_rowid()
}

fn make_server() -> TestServer {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("pulse.db");
    let pool = pulse_db::create_pool(
        db_path.to_str().unwrap(),
        pulse_db::DbRuntimeSettings::default(),
    )
    .unwrap();

    let system_user_id = {
        let conn = pool.get().unwrap();
        pulse_db::run_migrations(&conn).unwrap();
        pulse_db::ensure_system_user(&conn).unwrap()
    };

    let (admin_id, user_id, inactive_id) = {
        let conn = pool.get().unwrap();
        (
            seed_user(&conn, "admin@pulse.local", "ADMIN", true),
            seed_user(&conn, "user@pulse.local", "USER", true),
            seed_user(&conn, "retired@pulse.local", "ADMIN", false),
        )
    };

    let secret = derive_token_secret("test_secret");
    let buffer = Arc::new(EventBuffer::new(100));
    let broadcaster = Arc::new(Broadcaster::new());
    let generator = Arc::new(Generator::new(80.0, Duration::from_secs(1)));
    let flush = Arc::new(FlushScheduler::new(Duration::from_secs(5), system_user_id));
    let record_sink: Arc<dyn RecordSink> = Arc::new(SqliteRecordSink::new(pool.clone(), 80.0));
    let status = Arc::new(StatusReporter::new(
        Arc::clone(&generator),
        Arc::clone(&broadcaster),
        Arc::clone(&buffer),
        Arc::clone(&flush),
        Arc::clone(&record_sink),
    ));

    let router = pulse_server::app(AppState {
        pool,
        token_secret: secret,
        broadcaster,
        buffer,
        generator,
        flush,
        status,
    });

    TestServer {
        _dir: dir,
        router,
        secret,
        admin_id,
        user_id,
        inactive_id,
    }
}

fn bearer(server: &TestServer, user_id: i64, role: Role) -> String {
    format!(
        "Bearer {}",
        issue_token(user_id, role, &server.secret, Duration::from_secs(60))
    )
}

async fn get_runtime(server: &TestServer, auth: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().uri("/api/system/runtime");
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    let response = server
        .router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_check_returns_ok() {
    let server = make_server();
    let response = server
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn runtime_status_requires_a_token() {
    let server = make_server();
    let (status, _) = get_runtime(&server, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn runtime_status_rejects_garbage_tokens() {
    let server = make_server();
    let (status, _) = get_runtime(&server, Some("Bearer not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get_runtime(&server, Some("Basic abc")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn runtime_status_rejects_inactive_accounts() {
    let server = make_server();
    let auth = bearer(&server, server.inactive_id, Role::Admin);
    let (status, _) = get_runtime(&server, Some(&auth)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn runtime_status_requires_the_admin_role() {
    let server = make_server();
    let auth = bearer(&server, server.user_id, Role::User);
    let (status, _) = get_runtime(&server, Some(&auth)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn stored_role_outranks_the_token_claim() {
    let server = make_server();
    // A token claiming ADMIN for a USER account must not escalate.
    let auth = bearer(&server, server.user_id, Role::Admin);
    let (status, _) = get_runtime(&server, Some(&auth)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn runtime_status_reports_a_coherent_snapshot() {
    let server = make_server();
    let auth = bearer(&server, server.admin_id, Role::Admin);
    let (status, json) = get_runtime(&server, Some(&auth)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["generator_running"], false);
    assert_eq!(json["ws_clients"], 0);
    assert_eq!(json["buffer_size"], 0);
    assert_eq!(json["flush_interval_secs"], 5);
    assert_eq!(json["last_flush_count"], 0);
    assert_eq!(json["last_flush_success"], true);
    assert!(json["last_flush_time"].is_null());
    assert_eq!(json["db_connected"], true);
}
