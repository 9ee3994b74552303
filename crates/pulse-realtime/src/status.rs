//! Read-only runtime status aggregation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::broadcast::Broadcaster;
use crate::buffer::EventBuffer;
use crate::flush::{FlushScheduler, RecordSink};
use crate::generator::Generator;

/// Point-in-time operational snapshot of the realtime pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub generator_running: bool,
    pub ws_clients: usize,
    pub buffer_size: usize,
    pub flush_interval_secs: u64,
    pub last_flush_time: Option<DateTime<Utc>>,
    pub last_flush_count: usize,
    pub last_flush_success: bool,
    pub db_connected: bool,
}

/// Composes pipeline state into a [`RuntimeStatus`] for operational
/// visibility.
///
/// Constructed at composition time with direct references to every
/// component it reads — no ambient registration or late-bound lookup.
/// Snapshotting never mutates any component; a failing connectivity probe
/// degrades to `db_connected = false` rather than erroring.
pub struct StatusReporter {
    generator: Arc<Generator>,
    broadcaster: Arc<Broadcaster>,
    buffer: Arc<EventBuffer>,
    flush: Arc<FlushScheduler>,
    sink: Arc<dyn RecordSink>,
}

impl StatusReporter {
    pub fn new(
        generator: Arc<Generator>,
        broadcaster: Arc<Broadcaster>,
        buffer: Arc<EventBuffer>,
        flush: Arc<FlushScheduler>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            generator,
            broadcaster,
            buffer,
            flush,
            sink,
        }
    }

    /// Produces a snapshot of the pipeline's current state.
    ///
    /// Individual fields are read independently; the snapshot is internally
    /// consistent per field but not frozen across components.
    pub async fn snapshot(&self) -> RuntimeStatus {
        let db_connected = {
            let sink = Arc::clone(&self.sink);
            tokio::task::spawn_blocking(move || sink.ping())
                .await
                .unwrap_or(false)
        };

        let stats = self.flush.stats();
        RuntimeStatus {
            generator_running: self.generator.running(),
            ws_clients: self.broadcaster.count(),
            buffer_size: self.buffer.size(),
            flush_interval_secs: self.flush.interval().as_secs(),
            last_flush_time: stats.last_flush_time,
            last_flush_count: stats.last_flush_count,
            last_flush_success: stats.last_flush_success,
            db_connected,
        }
    }
}
