//! Bounded in-memory buffer for not-yet-persisted telemetry events.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use pulse_types::TelemetryEvent;

/// A bounded FIFO holding area shared by the generator (writer) and the
/// flush scheduler (drainer).
///
/// Admission control is drop-oldest: once the buffer is at capacity, each
/// new offer evicts the head element before appending. Eviction is silent —
/// bounded memory under a sustained persistence outage is bought at the cost
/// of completeness, never surfaced as an error.
///
/// Uses a `std::sync::Mutex` intentionally: every operation is a brief
/// queue manipulation that never spans an `.await` point, making a
/// synchronous lock safe and more efficient than `tokio::sync::Mutex`.
pub struct EventBuffer {
    items: Mutex<VecDeque<TelemetryEvent>>,
    capacity: usize,
}

impl EventBuffer {
    /// Creates a buffer holding at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Appends an event to the tail, evicting the oldest entry first if the
    /// buffer is at capacity. Never fails.
    pub fn offer(&self, event: TelemetryEvent) {
        let mut items = self.lock();
        while items.len() >= self.capacity {
            items.pop_front();
        }
        items.push_back(event);
    }

    /// Atomically removes and returns the entire current contents in FIFO
    /// order, leaving the buffer empty. Returns an empty vector if the
    /// buffer was already empty.
    pub fn drain(&self) -> Vec<TelemetryEvent> {
        let mut items = self.lock();
        std::mem::take(&mut *items).into()
    }

    /// Current number of buffered events.
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// The fixed maximum capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<TelemetryEvent>> {
        match self.items.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // A panicked holder cannot leave the queue in a torn state
                // (all mutations complete before unlock), so recover rather
                // than propagate poisoning into a pipeline that must not fail.
                tracing::error!("event buffer lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(value: f64) -> TelemetryEvent {
        TelemetryEvent {
            title: "realtime_sensor".to_string(),
            value,
            category: "A".to_string(),
            timestamp: Utc::now(),
            is_anomaly: false,
            source: "test".to_string(),
        }
    }

    #[test]
    fn offers_below_capacity_preserve_order() {
        let buffer = EventBuffer::new(5);
        for v in [1.0, 2.0, 3.0] {
            buffer.offer(event(v));
        }
        assert_eq!(buffer.size(), 3);
        let drained = buffer.drain();
        let values: Vec<f64> = drained.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn saturation_drops_oldest_first() {
        let buffer = EventBuffer::new(3);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            buffer.offer(event(v));
        }
        assert_eq!(buffer.size(), 3);
        let values: Vec<f64> = buffer.drain().iter().map(|e| e.value).collect();
        // The last C offered elements survive in original relative order.
        assert_eq!(values, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn drain_empties_the_buffer() {
        let buffer = EventBuffer::new(4);
        buffer.offer(event(7.0));
        buffer.offer(event(8.0));

        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(buffer.size(), 0);

        // A second drain observes nothing.
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let buffer = EventBuffer::new(2);
        for v in 0..100 {
            buffer.offer(event(f64::from(v)));
            assert!(buffer.size() <= buffer.capacity());
        }
    }

    #[test]
    fn concurrent_offers_respect_the_bound() {
        use std::sync::Arc;

        let buffer = Arc::new(EventBuffer::new(16));
        let mut handles = Vec::new();
        for t in 0..8 {
            let buffer = Arc::clone(&buffer);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    buffer.offer(event(f64::from(t * 100 + i)));
                }
            }));
        }
        for handle in handles {
            handle.join().expect("offer thread should not panic");
        }
        assert_eq!(buffer.size(), 16);
    }
}
