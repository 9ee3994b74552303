//! Fan-out broadcaster for live observer connections.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pulse_types::{RealtimeFrame, TelemetryEvent};
use uuid::Uuid;

/// Errors that can occur delivering a frame to a single observer.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The remote end is gone; no further frames can be delivered.
    #[error("observer connection closed")]
    Closed,
    /// The underlying transport reported a fault.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Narrow capability interface for a live observer connection.
///
/// Any concrete transport (WebSocket session, test double) implements
/// exactly these two operations. `send` must be non-blocking: a slow
/// consumer is the implementation's concern (drop or queue), while a
/// *dead* consumer is reported as an error so the broadcaster can evict it.
pub trait ObserverConnection: Send + Sync {
    /// Attempts to deliver one serialized frame.
    fn send(&self, frame: &str) -> Result<(), DeliveryError>;

    /// Tears the connection down. Idempotent.
    fn close(&self);
}

/// Handle identifying a registered observer.
pub type ObserverId = Uuid;

/// Registry of live observer connections with fan-out publish.
///
/// Delivery is independent per connection: one observer failing never
/// prevents delivery to the others, and a failed observer is unregistered
/// and closed automatically so the registry cannot accumulate dead entries.
///
/// Uses a `std::sync::RwLock` intentionally: all lock acquisitions are
/// brief map operations that never span `.await` points.
#[derive(Default)]
pub struct Broadcaster {
    observers: RwLock<HashMap<ObserverId, Arc<dyn ObserverConnection>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to the registry and returns its handle.
    pub fn register(&self, connection: Arc<dyn ObserverConnection>) -> ObserverId {
        let id = Uuid::new_v4();
        self.write().insert(id, connection);
        tracing::debug!(observer_id = %id, "observer registered");
        id
    }

    /// Removes a connection from the registry. No-op if absent.
    pub fn unregister(&self, id: ObserverId) {
        if self.write().remove(&id).is_some() {
            tracing::debug!(observer_id = %id, "observer unregistered");
        }
    }

    /// Number of currently registered observers.
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Delivers `event` to every currently registered observer.
    ///
    /// The registry is snapshotted under the read lock and deliveries happen
    /// outside it, so observers may register or unregister concurrently; the
    /// polled set is the membership at snapshot time. Failed deliveries are
    /// not retried — the failing observers are evicted and closed after all
    /// deliveries have been attempted.
    pub fn publish(&self, event: &TelemetryEvent) {
        let frame = match serde_json::to_string(&RealtimeFrame::realtime_data(event.clone())) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("failed to serialize realtime frame: {}", e);
                return;
            }
        };

        let snapshot: Vec<(ObserverId, Arc<dyn ObserverConnection>)> = self
            .read()
            .iter()
            .map(|(id, conn)| (*id, Arc::clone(conn)))
            .collect();

        let mut dead = Vec::new();
        for (id, conn) in &snapshot {
            if let Err(e) = conn.send(&frame) {
                tracing::warn!(observer_id = %id, "evicting observer after delivery failure: {}", e);
                dead.push(*id);
            }
        }

        if !dead.is_empty() {
            let mut observers = self.write();
            for id in dead {
                if let Some(conn) = observers.remove(&id) {
                    conn.close();
                }
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ObserverId, Arc<dyn ObserverConnection>>> {
        self.observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ObserverId, Arc<dyn ObserverConnection>>> {
        self.observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
