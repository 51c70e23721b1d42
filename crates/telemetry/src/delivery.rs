//! Telemetry delivery with bounded retries.
//!
//! Two failure kinds are kept apart: a backend that cannot be reached at all
//! (expected while the very outage being monitored is in progress) resolves
//! silently, while a backend that answers with the wrong status is a hard
//! error.

use crate::{TelemetryError, TelemetryPayload};
use linkguard_core::config::TelemetryConfig;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{info, warn};

/// No HTTP response was obtained.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Sends one serialized payload and reports the HTTP status code.
pub trait TelemetryTransport {
    fn post(&self, body: &str) -> Result<u16, TransportError>;
}

/// `POST {url}/api/v1/{token}/telemetry` over reqwest.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let token = config
            .token
            .as_ref()
            .filter(|token| !token.is_blank())
            .ok_or(TelemetryError::MissingToken)?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| TelemetryError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint_for(&config.url, token.expose()),
        })
    }
}

/// Endpoint path template with the access token embedded.
pub fn endpoint_for(base_url: &str, token: &str) -> String {
    format!("{}/api/v1/{}/telemetry", base_url.trim_end_matches('/'), token)
}

impl TelemetryTransport for HttpTransport {
    fn post(&self, body: &str) -> Result<u16, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .map_err(|e| {
                // The URL carries the token; describe the failure without it.
                let kind = if e.is_timeout() {
                    "timed out"
                } else if e.is_connect() {
                    "connection failed"
                } else {
                    "request failed"
                };
                TransportError(kind.to_string())
            })?;

        Ok(response.status().as_u16())
    }
}

/// Retry policy for one delivery.
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    pub attempts: u32,
    pub retry_delay: Duration,
    pub expected_status: u16,
}

impl DeliveryPolicy {
    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            expected_status: config.expected_status,
        }
    }
}

/// Result of a delivery after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Backend accepted the payload
    Delivered { status: u16, attempts: u32 },
    /// No response on the final attempt; resolved silently
    Unreachable { attempts: u32, error: String },
    /// Backend answered with an unexpected status on the final attempt
    Rejected { status: u16, attempts: u32 },
}

impl DeliveryOutcome {
    /// Operator-visible failure.
    pub fn is_error(&self) -> bool {
        matches!(self, DeliveryOutcome::Rejected { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts, .. }
            | DeliveryOutcome::Unreachable { attempts, .. }
            | DeliveryOutcome::Rejected { attempts, .. } => *attempts,
        }
    }
}

pub struct TelemetryPublisher<T: TelemetryTransport> {
    transport: T,
    policy: DeliveryPolicy,
}

impl<T: TelemetryTransport> TelemetryPublisher<T> {
    pub fn new(transport: T, policy: DeliveryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// POST the payload, retrying on transport errors and unexpected status
    /// codes up to the configured number of attempts.
    pub fn deliver(&self, payload: &TelemetryPayload) -> Result<DeliveryOutcome, TelemetryError> {
        if payload.is_empty() {
            return Err(TelemetryError::EmptyPayload);
        }
        let body = payload.to_json()?;
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = match self.transport.post(&body) {
                Ok(status) if status == self.policy.expected_status => {
                    info!(status, attempt, "Telemetry delivered");
                    return Ok(DeliveryOutcome::Delivered {
                        status,
                        attempts: attempt,
                    });
                }
                Ok(status) => {
                    warn!(status, attempt, attempts, "Telemetry rejected");
                    DeliveryOutcome::Rejected {
                        status,
                        attempts: attempt,
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt, attempts, "Telemetry endpoint unreachable");
                    DeliveryOutcome::Unreachable {
                        attempts: attempt,
                        error: e.0,
                    }
                }
            };

            if attempt >= attempts {
                return Ok(outcome);
            }
            if !self.policy.retry_delay.is_zero() {
                std::thread::sleep(self.policy.retry_delay);
            }
            attempt += 1;
        }
    }
}
