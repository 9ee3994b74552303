//! Periodic flush of buffered events into durable storage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use pulse_types::TelemetryEvent;
use serde::Serialize;

use crate::buffer::EventBuffer;

/// Opaque storage fault reported by the persistence collaborator.
///
/// The transactional boundary is one flush batch: a batch either reports
/// fully inserted or the scheduler treats it as fully failed and re-queues
/// it whole.
#[derive(Debug, Clone, thiserror::Error)]
#[error("persistence failure: {0}")]
pub struct PersistenceError(pub String);

/// Persistence collaborator consumed by the flush scheduler.
///
/// Implementations are synchronous — the scheduler drives them through
/// `spawn_blocking`, matching how the rest of the platform runs its storage
/// layer from async context.
pub trait RecordSink: Send + Sync + 'static {
    /// Persists an entire batch as one unit, attributed to `actor_id`.
    /// Returns the number of rows inserted.
    fn batch_insert(
        &self,
        actor_id: i64,
        rows: &[TelemetryEvent],
    ) -> Result<usize, PersistenceError>;

    /// Cheap connectivity check. Must not mutate anything.
    fn ping(&self) -> bool;
}

/// Audit-log collaborator. Fire-and-forget: implementations absorb their
/// own failures rather than propagating them back into the flush cycle.
pub trait AuditSink: Send + Sync + 'static {
    fn record(
        &self,
        level: &str,
        event_type: &str,
        message: &str,
        detail: Option<&str>,
        actor_user_id: Option<i64>,
    );
}

/// Outcome of the most recent flush cycle.
///
/// Overwritten after every cycle, including "nothing to flush" cycles, so
/// the record doubles as a liveness signal for the scheduler itself.
#[derive(Debug, Clone, Serialize)]
pub struct FlushStats {
    pub last_flush_time: Option<DateTime<Utc>>,
    pub last_flush_count: usize,
    pub last_flush_success: bool,
}

impl Default for FlushStats {
    fn default() -> Self {
        Self {
            last_flush_time: None,
            last_flush_count: 0,
            last_flush_success: true,
        }
    }
}

/// Drains the event buffer into the persistence collaborator at a fixed
/// interval, tracking last-run statistics and re-queueing failed batches.
///
/// Persistence retry is at-least-once: a failed batch is re-offered to the
/// buffer in original order for the next cycle (subject to the same
/// drop-oldest capacity policy), so repeated failures under a full buffer
/// shed the oldest pending items first. The live broadcast is never
/// repeated — only persistence is retried.
pub struct FlushScheduler {
    interval: Duration,
    actor_id: i64,
    running: AtomicBool,
    stats: Mutex<FlushStats>,
}

impl FlushScheduler {
    /// Creates a stopped scheduler flushing every `interval`, attributing
    /// persisted rows to the system actor `actor_id`.
    pub fn new(interval: Duration, actor_id: i64) -> Self {
        Self {
            interval,
            actor_id,
            running: AtomicBool::new(false),
            stats: Mutex::new(FlushStats::default()),
        }
    }

    /// The configured flush interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// A copy of the most recent flush statistics.
    pub fn stats(&self) -> FlushStats {
        match self.stats.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Whether the flush loop is currently running.
    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Requests a cooperative stop. No further cycles are scheduled; an
    /// in-progress cycle is allowed to finish.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Runs the periodic flush loop until [`FlushScheduler::stop`].
    pub async fn run(
        &self,
        buffer: Arc<EventBuffer>,
        sink: Arc<dyn RecordSink>,
        audit: Arc<dyn AuditSink>,
    ) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("flush scheduler already running, ignoring duplicate run");
            return;
        }
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "flush scheduler started"
        );

        loop {
            tokio::time::sleep(self.interval).await;
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.flush_once(&buffer, &sink, &audit).await;
        }

        tracing::info!("flush scheduler stopped");
    }

    /// Executes one flush cycle: drain, persist, record statistics.
    ///
    /// An empty drain is a success, not a skip — the stats still advance so
    /// status reflects scheduler liveness even when idle.
    pub async fn flush_once(
        &self,
        buffer: &EventBuffer,
        sink: &Arc<dyn RecordSink>,
        audit: &Arc<dyn AuditSink>,
    ) {
        let batch = buffer.drain();
        if batch.is_empty() {
            self.record_outcome(0, true);
            return;
        }

        let batch_len = batch.len();
        let result = {
            let sink = Arc::clone(sink);
            let rows = batch.clone();
            let actor_id = self.actor_id;
            tokio::task::spawn_blocking(move || sink.batch_insert(actor_id, &rows)).await
        };

        match result {
            Ok(Ok(inserted)) => {
                self.record_outcome(batch_len, true);
                audit.record(
                    "INFO",
                    "DB",
                    "Batch flush success",
                    Some(&format!("inserted={inserted}")),
                    Some(self.actor_id),
                );
                tracing::debug!(inserted, "batch flush succeeded");
            }
            Ok(Err(e)) => {
                self.requeue(buffer, batch);
                self.record_outcome(batch_len, false);
                tracing::error!(batch_len, "batch flush failed, re-queued: {}", e);
            }
            Err(e) => {
                self.requeue(buffer, batch);
                self.record_outcome(batch_len, false);
                tracing::error!(batch_len, "batch flush task failed, re-queued: {}", e);
            }
        }
    }

    /// Re-offers a failed batch in original order for the next attempt.
    fn requeue(&self, buffer: &EventBuffer, batch: Vec<TelemetryEvent>) {
        for event in batch {
            buffer.offer(event);
        }
    }

    fn record_outcome(&self, count: usize, success: bool) {
        let mut stats = match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        stats.last_flush_time = Some(Utc::now());
        stats.last_flush_count = count;
        stats.last_flush_success = success;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    fn event(value: f64) -> TelemetryEvent {
        TelemetryEvent {
            title: "realtime_sensor".to_string(),
            value,
            category: "C".to_string(),
            timestamp: Utc::now(),
            is_anomaly: false,
            source: "test".to_string(),
        }
    }

    /// Sink double that records inserted batches, optionally failing.
    #[derive(Default)]
    struct MemorySink {
        inserted: Mutex<Vec<TelemetryEvent>>,
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl RecordSink for MemorySink {
        fn batch_insert(
            &self,
            _actor_id: i64,
            rows: &[TelemetryEvent],
        ) -> Result<usize, PersistenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(PersistenceError("storage offline".to_string()));
            }
            self.inserted.lock().unwrap().extend_from_slice(rows);
            Ok(rows.len())
        }

        fn ping(&self) -> bool {
            !self.fail.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct MemoryAudit {
        entries: Mutex<Vec<(String, String, String)>>,
    }

    impl AuditSink for MemoryAudit {
        fn record(
            &self,
            level: &str,
            event_type: &str,
            message: &str,
            _detail: Option<&str>,
            _actor_user_id: Option<i64>,
        ) {
            self.entries.lock().unwrap().push((
                level.to_string(),
                event_type.to_string(),
                message.to_string(),
            ));
        }
    }

    fn sinks() -> (Arc<MemorySink>, Arc<dyn RecordSink>, Arc<dyn AuditSink>) {
        let sink = Arc::new(MemorySink::default());
        (
            Arc::clone(&sink),
            sink.clone() as Arc<dyn RecordSink>,
            Arc::new(MemoryAudit::default()) as Arc<dyn AuditSink>,
        )
    }

    #[tokio::test]
    async fn successful_flush_persists_and_records_stats() {
        let buffer = EventBuffer::new(10);
        buffer.offer(event(1.0));
        buffer.offer(event(2.0));
        let (sink, record_sink, audit) = sinks();
        let scheduler = FlushScheduler::new(Duration::from_secs(5), 42);

        scheduler.flush_once(&buffer, &record_sink, &audit).await;

        assert_eq!(buffer.size(), 0);
        assert_eq!(sink.inserted.lock().unwrap().len(), 2);
        let stats = scheduler.stats();
        assert!(stats.last_flush_time.is_some());
        assert_eq!(stats.last_flush_count, 2);
        assert!(stats.last_flush_success);
    }

    #[tokio::test]
    async fn failed_flush_requeues_the_batch_in_order() {
        let buffer = EventBuffer::new(10);
        for v in [1.0, 2.0, 3.0] {
            buffer.offer(event(v));
        }
        let (sink, record_sink, audit) = sinks();
        sink.fail.store(true, Ordering::SeqCst);
        let scheduler = FlushScheduler::new(Duration::from_secs(5), 42);

        scheduler.flush_once(&buffer, &record_sink, &audit).await;

        let stats = scheduler.stats();
        assert_eq!(stats.last_flush_count, 3);
        assert!(!stats.last_flush_success);

        // The buffer contains exactly the drained elements, original order.
        let requeued: Vec<f64> = buffer.drain().iter().map(|e| e.value).collect();
        assert_eq!(requeued, vec![1.0, 2.0, 3.0]);
        assert!(sink.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_flush_still_advances_stats() {
        let buffer = EventBuffer::new(10);
        let (_, record_sink, audit) = sinks();
        let scheduler = FlushScheduler::new(Duration::from_secs(5), 42);
        assert!(scheduler.stats().last_flush_time.is_none());

        scheduler.flush_once(&buffer, &record_sink, &audit).await;

        let stats = scheduler.stats();
        assert!(stats.last_flush_time.is_some());
        assert_eq!(stats.last_flush_count, 0);
        assert!(stats.last_flush_success);
    }

    #[tokio::test]
    async fn recovery_persists_the_requeued_batch() {
        let buffer = EventBuffer::new(10);
        buffer.offer(event(7.0));
        let (sink, record_sink, audit) = sinks();
        sink.fail.store(true, Ordering::SeqCst);
        let scheduler = FlushScheduler::new(Duration::from_secs(5), 42);

        scheduler.flush_once(&buffer, &record_sink, &audit).await;
        assert_eq!(buffer.size(), 1);

        sink.fail.store(false, Ordering::SeqCst);
        scheduler.flush_once(&buffer, &record_sink, &audit).await;

        assert_eq!(buffer.size(), 0);
        assert_eq!(sink.inserted.lock().unwrap().len(), 1);
        assert!(scheduler.stats().last_flush_success);
    }

    #[tokio::test]
    async fn stop_halts_the_loop() {
        let buffer = Arc::new(EventBuffer::new(10));
        let (_, record_sink, audit) = sinks();
        let scheduler = Arc::new(FlushScheduler::new(Duration::from_millis(5), 42));

        let handle = {
            let scheduler = Arc::clone(&scheduler);
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move { scheduler.run(buffer, record_sink, audit).await })
        };

        // Let at least one cycle complete so stats show liveness.
        while scheduler.stats().last_flush_time.is_none() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        scheduler.stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop should exit after stop")
            .expect("loop task should not panic");
        assert!(!scheduler.running());
    }
}
