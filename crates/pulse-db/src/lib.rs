//! Database layer for the Pulse monitoring platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, the record batch-insert path used by the flush
//! scheduler, and the system-actor bootstrap. Every table is created through
//! versioned migrations managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: no external database process required. WAL
//!   allows concurrent readers with a single writer, which matches the Pulse
//!   access pattern (one flush writer, many status readers).
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, ensuring migrations ship with the server and cannot
//!   drift from the code that depends on them.

mod migrations;
mod pool;
mod records;
mod users;

pub use migrations::run_migrations;
pub use pool::{create_pool, db_ping, DbPool, DbRuntimeSettings};
pub use records::{insert_records, NewRecord, StoreError};
pub use users::ensure_system_user;
