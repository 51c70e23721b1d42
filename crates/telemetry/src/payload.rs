//! Telemetry payload assembly.
//!
//! A field is present only when its signal was evaluated this invocation;
//! gated signals are left out entirely rather than sent as `null`.

use crate::TelemetryError;
use linkguard_core::{AuxDeviceState, ConnectivityState, PowerState};
use serde::ser::{Serialize, SerializeMap, Serializer};

pub const POWER_FIELD: &str = "powerSupply";
pub const CONNECTIVITY_FIELD: &str = "inetConnect";
pub const RELAY_FIELD: &str = "inetRelay";

/// Everything the pipeline evaluated in one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signals {
    pub power: PowerState,
    /// `None` when the probe was gated off (power not on mains)
    pub connectivity: Option<ConnectivityState>,
    /// The toggle flag; `None` when the state machine did not run
    pub relay_toggled: Option<bool>,
    /// Named aux device readings, in configuration order
    pub aux: Vec<(String, AuxDeviceState)>,
}

impl Signals {
    /// Only the power reading; everything downstream gated off.
    pub fn power_only(power: PowerState) -> Self {
        Self {
            power,
            connectivity: None,
            relay_toggled: None,
            aux: Vec::new(),
        }
    }
}

/// Ordered set of boolean telemetry fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryPayload {
    fields: Vec<(String, bool)>,
}

impl TelemetryPayload {
    pub fn fields(&self) -> &[(String, bool)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| *value)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn push(&mut self, name: &str, value: bool) {
        self.fields.push((name.to_string(), value));
    }

    pub fn to_json(&self) -> Result<String, TelemetryError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for TelemetryPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Build the payload in field order power, connectivity, relay toggle, aux.
///
/// Fails with [`TelemetryError::EmptyPayload`] when nothing was evaluated.
pub fn build_payload(signals: &Signals) -> Result<TelemetryPayload, TelemetryError> {
    let mut payload = TelemetryPayload::default();

    if let Some(online) = signals.power.as_online() {
        payload.push(POWER_FIELD, online);
    }

    // Everything below is meaningless without mains power.
    if signals.power == PowerState::Mains {
        if let Some(connectivity) = signals.connectivity {
            payload.push(CONNECTIVITY_FIELD, connectivity.is_up());

            if let Some(toggled) = signals.relay_toggled {
                payload.push(RELAY_FIELD, toggled);
            }

            if connectivity.is_up() {
                for (name, state) in &signals.aux {
                    payload.push(name, *state == AuxDeviceState::Up);
                }
            }
        }
    }

    if payload.is_empty() {
        return Err(TelemetryError::EmptyPayload);
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_signals() -> Signals {
        Signals {
            power: PowerState::Mains,
            connectivity: Some(ConnectivityState::Up),
            relay_toggled: Some(true),
            aux: vec![
                ("cameraFront".to_string(), AuxDeviceState::Up),
                ("cameraBack".to_string(), AuxDeviceState::Down),
            ],
        }
    }

    #[test]
    fn test_full_payload_order() {
        let payload = build_payload(&full_signals()).unwrap();
        assert_eq!(
            payload.to_json().unwrap(),
            r#"{"powerSupply":true,"inetConnect":true,"inetRelay":true,"cameraFront":true,"cameraBack":false}"#
        );
    }

    #[test]
    fn test_battery_reports_power_only() {
        // Stale downstream values must not leak into the payload.
        let mut signals = full_signals();
        signals.power = PowerState::Battery;

        let payload = build_payload(&signals).unwrap();
        assert_eq!(payload.to_json().unwrap(), r#"{"powerSupply":false}"#);
    }

    #[test]
    fn test_down_omits_aux() {
        let mut signals = full_signals();
        signals.connectivity = Some(ConnectivityState::Down);
        signals.relay_toggled = Some(false);

        let payload = build_payload(&signals).unwrap();
        assert_eq!(payload.get(CONNECTIVITY_FIELD), Some(false));
        assert_eq!(payload.get(RELAY_FIELD), Some(false));
        assert_eq!(payload.get("cameraFront"), None);
        assert_eq!(payload.fields().len(), 3);
    }

    #[test]
    fn test_unknown_power_is_empty() {
        let result = build_payload(&Signals::power_only(PowerState::Unknown));
        assert!(matches!(result, Err(TelemetryError::EmptyPayload)));
    }
}
