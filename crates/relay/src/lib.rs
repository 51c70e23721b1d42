//! Relay board control for router power cycling.
//!
//! The router is wired through the board's Normally Closed contacts, so the
//! logical [`linkguard_core::RelayState`] is tracked separately from the raw
//! control byte. Both channels are driven together as one switch.

pub mod actuator;
pub mod device;

pub use actuator::{RelayActuator, RelaySettings, Suppression};
pub use device::{DeviceFile, RelayDevice};

use std::path::PathBuf;
use thiserror::Error;

/// Relay errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Relay device {path} does not exist")]
    DeviceMissing { path: PathBuf },

    #[error("Failed to write relay device {device}: {source}")]
    Write {
        device: String,
        source: std::io::Error,
    },
}
