//! Telemetry publisher for the linkguard watchdog.
//!
//! Assembles the per-invocation event payload from whichever signals were
//! evaluated and delivers it to the monitoring backend with bounded retries.

pub mod delivery;
pub mod payload;

pub use delivery::{
    DeliveryOutcome, DeliveryPolicy, HttpTransport, TelemetryPublisher, TelemetryTransport,
    TransportError,
};
pub use payload::{build_payload, Signals, TelemetryPayload};

use thiserror::Error;

/// Telemetry errors
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Nothing to report: every signal was gated off or indeterminate")]
    EmptyPayload,

    #[error("Telemetry token is not configured")]
    MissingToken,

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
