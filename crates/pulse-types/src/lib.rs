//! Shared types and constants for the Pulse monitoring platform.
//!
//! This crate provides the foundational types used across all Pulse crates:
//! the telemetry event value type, the live broadcast frame envelope, user
//! role codes, and the anomaly classification rule.
//!
//! No crate in the workspace depends on anything *except* `pulse-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod anomaly;

/// The `event` discriminator carried by every live broadcast frame.
pub const REALTIME_DATA_EVENT: &str = "realtime_data";

/// The email address of the bootstrap system actor that owns
/// generator-produced records.
pub const SYSTEM_USER_EMAIL: &str = "system@pulse.local";

/// A single telemetry measurement produced by the realtime pipeline.
///
/// Events are immutable once created: the same value is handed to both the
/// live broadcast path and the persistence buffer, so the two sinks can
/// never diverge on timestamp or anomaly classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Human-readable measurement name (e.g. `realtime_sensor`).
    pub title: String,
    /// The numeric measurement.
    pub value: f64,
    /// Category label drawn from a small fixed set.
    pub category: String,
    /// Instant the measurement was taken (RFC 3339 on the wire).
    pub timestamp: DateTime<Utc>,
    /// Whether the value exceeded the configured alert threshold.
    pub is_anomaly: bool,
    /// Origin of the event (e.g. `generator`).
    pub source: String,
}

/// The envelope pushed to every live observer connection.
///
/// Wire shape: `{"event": "realtime_data", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeFrame {
    /// Frame discriminator; always [`REALTIME_DATA_EVENT`] for telemetry.
    pub event: String,
    /// The telemetry event being delivered.
    pub data: TelemetryEvent,
}

impl RealtimeFrame {
    /// Wraps a telemetry event in the `realtime_data` envelope.
    pub fn realtime_data(data: TelemetryEvent) -> Self {
        Self {
            event: REALTIME_DATA_EVENT.to_string(),
            data,
        }
    }
}

/// User role codes for authorization decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Full administrative access, including runtime status.
    #[serde(rename = "ADMIN")]
    Admin,
    /// Regular authenticated user.
    #[serde(rename = "USER")]
    User,
    /// Internal platform service (owns generated records).
    #[serde(rename = "SERVICE")]
    Service,
}

impl Role {
    /// Returns the canonical string label for this role.
    pub fn label(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
            Self::Service => "SERVICE",
        }
    }

    /// Attempts to convert a string label to a `Role`.
    pub fn from_label(label: &str) -> Result<Self, ParseRoleError> {
        match label {
            "ADMIN" => Ok(Self::Admin),
            "USER" => Ok(Self::User),
            "SERVICE" => Ok(Self::Service),
            _ => Err(ParseRoleError(label.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s)
    }
}

/// Error returned when parsing an unknown role label.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown role label: {0}")]
pub struct ParseRoleError(pub String);
