//! Synthetic telemetry generator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pulse_types::TelemetryEvent;
use rand::Rng;

use crate::anomaly::is_anomaly;
use crate::broadcast::Broadcaster;
use crate::buffer::EventBuffer;

/// Category labels assigned to synthetic measurements.
const CATEGORIES: [&str; 3] = ["A", "B", "C"];

/// Upper bound (inclusive) of the synthetic value range.
const VALUE_RANGE_MAX: f64 = 120.0;

/// Produces one telemetry event per tick and offers it to both the live
/// broadcast path and the persistence buffer.
///
/// The generator is a two-state machine: `Stopped` (initial) and `Running`.
/// [`Generator::stop`] is cooperative — the running loop observes it at the
/// next cadence boundary, so an in-flight tick always completes. After a
/// stop, [`Generator::run`] may be invoked again.
pub struct Generator {
    threshold: f64,
    interval: Duration,
    running: AtomicBool,
}

impl Generator {
    /// Creates a stopped generator classifying against `threshold` and
    /// ticking every `interval`.
    pub fn new(threshold: f64, interval: Duration) -> Self {
        Self {
            threshold,
            interval,
            running: AtomicBool::new(false),
        }
    }

    /// Whether the generation loop is currently running.
    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Requests a cooperative stop; the loop exits at its next boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Runs the generation loop until [`Generator::stop`] is called.
    ///
    /// Each iteration synthesizes one event, publishes it to every live
    /// observer, offers the same event into the buffer, then suspends for
    /// the configured interval. The loop never returns an error: transient
    /// faults in either sink are absorbed there.
    pub async fn run(&self, broadcaster: Arc<Broadcaster>, buffer: Arc<EventBuffer>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("generator already running, ignoring duplicate run");
            return;
        }
        tracing::info!(
            threshold = self.threshold,
            interval_ms = self.interval.as_millis() as u64,
            "generator started"
        );

        while self.running.load(Ordering::SeqCst) {
            self.tick(&broadcaster, &buffer);
            tokio::time::sleep(self.interval).await;
        }

        tracing::info!("generator stopped");
    }

    /// Performs a single generation tick: synthesize, broadcast, buffer.
    ///
    /// The same event value reaches both sinks — timestamp and anomaly flag
    /// can never diverge between the live stream and the persisted batch.
    pub fn tick(&self, broadcaster: &Broadcaster, buffer: &EventBuffer) {
        let event = self.synthesize();
        broadcaster.publish(&event);
        buffer.offer(event);
    }

    fn synthesize(&self) -> TelemetryEvent {
        let mut rng = rand::thread_rng();
        let value = (rng.gen_range(0.0..=VALUE_RANGE_MAX) * 100.0).round() / 100.0;
        let category = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];

        TelemetryEvent {
            title: "realtime_sensor".to_string(),
            value,
            category: category.to_string(),
            timestamp: Utc::now(),
            is_anomaly: is_anomaly(value, self.threshold),
            source: "generator".to_string(),
        }
    }
}
