//! Core functionality for linkguard, the router power-cycle watchdog.
//!
//! This crate provides the signal types, the layered configuration, logging
//! initialization and the heartbeat status sink shared by every other crate.

pub mod config;
pub mod logging;
pub mod status;
pub mod types;

pub use config::{
    AuxDeviceConfig, Config, ConfigError, ConfigLayer, LayerSource, Secret,
    DEFAULT_CONFIG_PATH, DEFAULT_CREDENTIALS_PATH,
};
pub use status::{StatusMode, StatusSink};
pub use types::{AuxDeviceState, ConnectivityState, PowerState, ProbeMode, RelayState};
