use linkguard_core::ConfigError;
use linkguard_relay::RelayError;
use linkguard_sensors::ProbeError;
use linkguard_telemetry::TelemetryError;
use thiserror::Error;

use crate::run_state::StateError;

/// Errors that abort an invocation
#[derive(Debug, Error)]
pub enum WatchdogError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Run state error: {0}")]
    State(#[from] StateError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}
