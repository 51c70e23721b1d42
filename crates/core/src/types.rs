//! Signal and actuator state types shared by every linkguard crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host power source as seen by the kernel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    /// Primary AC supply is present
    Mains,
    /// Host is running from its backup battery
    Battery,
    /// No recognized power source on this platform
    Unknown,
}

impl PowerState {
    /// Boolean form used in telemetry; `None` when indeterminate.
    pub fn as_online(self) -> Option<bool> {
        match self {
            PowerState::Mains => Some(true),
            PowerState::Battery => Some(false),
            PowerState::Unknown => None,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PowerState::Mains => "mains",
            PowerState::Battery => "battery",
            PowerState::Unknown => "unknown",
        })
    }
}

/// Internet reachability derived from ICMP probes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    /// At least one probe host answered
    Up,
    /// Every probe host failed
    Down,
}

impl ConnectivityState {
    /// `true` for [`ConnectivityState::Up`].
    pub fn is_up(self) -> bool {
        self == ConnectivityState::Up
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_up() { "up" } else { "down" })
    }
}

impl From<bool> for ConnectivityState {
    fn from(reachable: bool) -> Self {
        if reachable {
            ConnectivityState::Up
        } else {
            ConnectivityState::Down
        }
    }
}

/// Reachability of one auxiliary device (camera, NVR, ...).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuxDeviceState {
    /// Device answered
    Up,
    /// Device did not answer
    Down,
}

impl fmt::Display for AuxDeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuxDeviceState::Up => f.write_str("up"),
            AuxDeviceState::Down => f.write_str("down"),
        }
    }
}

impl From<bool> for AuxDeviceState {
    fn from(reachable: bool) -> Self {
        if reachable {
            AuxDeviceState::Up
        } else {
            AuxDeviceState::Down
        }
    }
}

/// Logical state of the relay coil.
///
/// The router is fed through the Normally Closed contact: a de-energized
/// relay passes power, an energized relay cuts it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    /// Coil energized, router power cut
    Energized,
    /// Coil released, router powered
    #[default]
    #[serde(rename = "deenergized")]
    DeEnergized,
}

impl RelayState {
    /// The opposite state.
    pub fn flipped(self) -> Self {
        match self {
            RelayState::Energized => RelayState::DeEnergized,
            RelayState::DeEnergized => RelayState::Energized,
        }
    }

    /// Token used in the persisted run-state record.
    pub fn as_str(self) -> &'static str {
        match self {
            RelayState::Energized => "energized",
            RelayState::DeEnergized => "deenergized",
        }
    }

    /// Parse the persisted token.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "energized" => Some(RelayState::Energized),
            "deenergized" => Some(RelayState::DeEnergized),
            _ => None,
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a probe obtains its value.
///
/// Forced modes never touch the environment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMode {
    /// Read the real signal
    #[default]
    Auto,
    /// Report the positive value (Mains / Up)
    ForceUp,
    /// Report the negative value (Battery / Down)
    ForceDown,
}

impl ProbeMode {
    /// The forced boolean, or `None` in [`ProbeMode::Auto`].
    pub fn forced(self) -> Option<bool> {
        match self {
            ProbeMode::Auto => None,
            ProbeMode::ForceUp => Some(true),
            ProbeMode::ForceDown => Some(false),
        }
    }
}
