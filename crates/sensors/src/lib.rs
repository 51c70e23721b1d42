//! # linkguard-sensors
//!
//! Raw signal probes for the watchdog:
//! - **Power** - mains vs. battery from the kernel power-supply class
//! - **Connectivity** - ICMP reachability of an ordered list of external hosts
//! - **Auxiliary devices** - ICMP reachability of cameras and similar gear
//!
//! Every probe accepts a [`linkguard_core::ProbeMode`]; the forced modes
//! return immediately without touching the environment so the rest of the
//! pipeline can be exercised deterministically.

mod error;
pub mod network;
pub mod power;

pub use error::ProbeError;
pub use network::{probe_aux, probe_connectivity, Pinger, SystemPing};
pub use power::{
    detect_host_power_source, detect_power_source, probe_power, MainsScan, NoPowerSource,
    PowerSourceReader, SysfsOnline,
};
