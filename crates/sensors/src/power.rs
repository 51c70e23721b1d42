//! Mains / battery detection via `/sys/class/power_supply/`.
//!
//! Each platform exposes its AC supply differently, so the reader is a small
//! capability selected once at startup by [`detect_power_source`] instead of
//! branching inside the probe.

use linkguard_core::{PowerState, ProbeMode};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default sysfs root for power supplies.
pub const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// Kernel identification string used for platform detection.
pub const PROC_VERSION_PATH: &str = "/proc/version";

/// Source of the host's mains-online signal.
pub trait PowerSourceReader {
    /// Current power state. Unreadable sources report [`PowerState::Unknown`].
    fn read(&self) -> PowerState;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Reads a single sysfs `online` attribute (`1` mains, `0` battery).
#[derive(Debug, Clone)]
pub struct SysfsOnline {
    path: PathBuf,
}

impl SysfsOnline {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PowerSourceReader for SysfsOnline {
    fn read(&self) -> PowerState {
        read_online(&self.path)
    }

    fn describe(&self) -> String {
        format!("sysfs online attribute {}", self.path.display())
    }
}

/// Scans a power-supply directory for the first supply of type `Mains`.
#[derive(Debug, Clone)]
pub struct MainsScan {
    root: PathBuf,
}

impl MainsScan {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn find_mains(&self) -> Option<PathBuf> {
        let mut supplies: Vec<PathBuf> = std::fs::read_dir(&self.root)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        supplies.sort();

        supplies.into_iter().find(|supply| {
            std::fs::read_to_string(supply.join("type"))
                .map(|kind| kind.trim() == "Mains")
                .unwrap_or(false)
        })
    }
}

impl PowerSourceReader for MainsScan {
    fn read(&self) -> PowerState {
        match self.find_mains() {
            Some(supply) => read_online(&supply.join("online")),
            None => {
                debug!(root = %self.root.display(), "No mains supply found");
                PowerState::Unknown
            }
        }
    }

    fn describe(&self) -> String {
        format!("first Mains supply under {}", self.root.display())
    }
}

/// Platform without a usable power-supply class.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPowerSource;

impl PowerSourceReader for NoPowerSource {
    fn read(&self) -> PowerState {
        PowerState::Unknown
    }

    fn describe(&self) -> String {
        "no power source on this platform".to_string()
    }
}

fn read_online(path: &Path) -> PowerState {
    match std::fs::read_to_string(path) {
        Ok(content) => match content.trim() {
            "1" => PowerState::Mains,
            "0" => PowerState::Battery,
            other => {
                debug!(path = %path.display(), value = other, "Unexpected online value");
                PowerState::Unknown
            }
        },
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Power source unreadable");
            PowerState::Unknown
        }
    }
}

/// Pick the reader for this platform.
///
/// An explicit `online_path` wins. Otherwise the kernel version string
/// decides: WSL has no host supply, Allwinner (`sunxi`) boards expose the
/// AXP PMIC's AC input, and everything else is scanned for a `Mains` supply.
pub fn detect_power_source(
    online_path: Option<&Path>,
    proc_version: &str,
    sysfs_root: &Path,
) -> Box<dyn PowerSourceReader> {
    if let Some(path) = online_path {
        return Box::new(SysfsOnline::new(path));
    }

    let version = proc_version.to_ascii_lowercase();
    if version.contains("microsoft") {
        Box::new(NoPowerSource)
    } else if version.contains("sunxi") {
        Box::new(SysfsOnline::new(sysfs_root.join("axp20x-ac").join("online")))
    } else {
        Box::new(MainsScan::new(sysfs_root))
    }
}

/// [`detect_power_source`] against the running host.
pub fn detect_host_power_source(online_path: Option<&Path>) -> Box<dyn PowerSourceReader> {
    let proc_version = std::fs::read_to_string(PROC_VERSION_PATH).unwrap_or_default();
    detect_power_source(online_path, &proc_version, Path::new(POWER_SUPPLY_ROOT))
}

/// Resolve the power state; forced modes never touch the reader.
pub fn probe_power(mode: ProbeMode, reader: &dyn PowerSourceReader) -> PowerState {
    match mode.forced() {
        Some(true) => PowerState::Mains,
        Some(false) => PowerState::Battery,
        None => reader.read(),
    }
}
