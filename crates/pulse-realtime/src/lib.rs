//! Realtime event pipeline for the Pulse monitoring platform.
//!
//! Implements the continuously running telemetry generator, the bounded
//! in-memory event buffer with drop-oldest admission control, the fan-out
//! broadcaster pushing events to live observer connections, and the periodic
//! flush scheduler that drains the buffer into durable storage with failure
//! recovery.
//!
//! # Control flow
//!
//! ```text
//! Generator ──tick──▶ Broadcaster::publish ──▶ observer connections
//!              └────▶ EventBuffer::offer
//!
//! FlushScheduler ──cycle──▶ EventBuffer::drain ──▶ RecordSink::batch_insert
//!                                  ▲                      │ on failure
//!                                  └──── re-offer ────────┘
//! ```
//!
//! The crate is transport- and storage-agnostic: live connections enter
//! through the [`ObserverConnection`] capability trait and persistence
//! through the [`RecordSink`] / [`AuditSink`] seams, both implemented by the
//! server crate. Nothing here is fatal to the process — every failure is
//! absorbed, logged, or reflected in status.

pub mod broadcast;
pub mod buffer;
pub mod flush;
pub mod generator;
pub mod status;

/// Anomaly classification rule, re-exported from `pulse-types` so pipeline
/// callers and storage write paths share one definition.
pub mod anomaly {
    pub use pulse_types::anomaly::is_anomaly;
}

pub use broadcast::{Broadcaster, DeliveryError, ObserverConnection, ObserverId};
pub use buffer::EventBuffer;
pub use flush::{AuditSink, FlushScheduler, FlushStats, PersistenceError, RecordSink};
pub use generator::Generator;
pub use status::{RuntimeStatus, StatusReporter};
