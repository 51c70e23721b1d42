//! Layered configuration for linkguard.
//!
//! The effective [`Config`] is built once at startup by applying, in order,
//! built-in defaults, the general configuration file, the credentials file
//! and command-line overrides. Every file layer is plain TOML parsed into
//! [`ConfigLayer`]; unknown keys are rejected and nothing in a file is ever
//! executed. The resulting value is immutable and handed to each component.

use crate::types::ProbeMode;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/linkguard/linkguard.toml";
pub const DEFAULT_CREDENTIALS_PATH: &str = "/etc/linkguard/credentials.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// A secret string (telemetry access token) that is wiped on drop and never
/// printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("<redacted>")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub watchdog: WatchdogConfig,
    pub power: PowerConfig,
    pub connectivity: ConnectivityConfig,
    pub aux_devices: Vec<AuxDeviceConfig>,
    pub relay: RelayConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchdogConfig {
    /// Consecutive Down evaluations before the relay toggles
    pub countdown_threshold: u32,
    pub state_file: PathBuf,
    pub status_file: PathBuf,
    /// Echo status lines to stdout
    pub verbose: bool,
    /// 0 none, 1 error, 2 warning, 3 info, 4 full
    pub log_level: u8,
    pub json_logs: bool,
    /// Dry run: no relay writes, no telemetry sent; state still persisted
    pub simulate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PowerConfig {
    pub mode: ProbeMode,
    /// Explicit sysfs `online` attribute; skips platform detection when set
    pub online_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityConfig {
    pub mode: ProbeMode,
    /// Probed in order, first reply wins
    pub hosts: Vec<String>,
    pub ping_count: u32,
    pub ping_wait_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuxDeviceConfig {
    /// Telemetry field name, e.g. `cameraFront`
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub mode: ProbeMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelayConfig {
    pub device: PathBuf,
    /// Hex bytes written one at a time to arm the board
    pub init_sequence: Vec<String>,
    /// Hex byte that energizes both channels
    pub energize_byte: String,
    /// Hex byte that releases both channels
    pub release_byte: String,
    pub settle_ms: u64,
    /// Leave the hardware alone while still tracking logical state
    pub ignore: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub url: String,
    pub token: Option<Secret>,
    pub expected_status: u16,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watchdog: WatchdogConfig {
                countdown_threshold: 3,
                state_file: PathBuf::from("/var/lib/linkguard/runstate"),
                status_file: PathBuf::from("/var/tmp/linkguard.status"),
                verbose: false,
                log_level: 3,
                json_logs: false,
                simulate: false,
            },
            power: PowerConfig {
                mode: ProbeMode::Auto,
                online_path: None,
            },
            connectivity: ConnectivityConfig {
                mode: ProbeMode::Auto,
                hosts: vec![
                    "1.1.1.1".to_string(),
                    "8.8.8.8".to_string(),
                    "9.9.9.9".to_string(),
                ],
                ping_count: 1,
                ping_wait_secs: 5,
            },
            aux_devices: Vec::new(),
            relay: RelayConfig {
                device: PathBuf::from("/dev/ttyUSB0"),
                init_sequence: vec!["50".to_string(), "51".to_string()],
                energize_byte: "00".to_string(),
                release_byte: "ff".to_string(),
                settle_ms: 1000,
                ignore: false,
            },
            telemetry: TelemetryConfig {
                enabled: true,
                url: "http://localhost:8080".to_string(),
                token: None,
                expected_status: 200,
                connect_timeout_secs: 3,
                request_timeout_secs: 10,
                attempts: 4,
                retry_delay_secs: 15,
            },
        }
    }
}

/// One override layer. Every field is optional; only present fields are
/// applied.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub watchdog: Option<WatchdogLayer>,
    pub power: Option<PowerLayer>,
    pub connectivity: Option<ConnectivityLayer>,
    pub aux_devices: Option<Vec<AuxDeviceConfig>>,
    pub relay: Option<RelayLayer>,
    pub telemetry: Option<TelemetryLayer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchdogLayer {
    pub countdown_threshold: Option<u32>,
    pub state_file: Option<PathBuf>,
    pub status_file: Option<PathBuf>,
    pub verbose: Option<bool>,
    pub log_level: Option<u8>,
    pub json_logs: Option<bool>,
    pub simulate: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerLayer {
    pub mode: Option<ProbeMode>,
    pub online_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectivityLayer {
    pub mode: Option<ProbeMode>,
    pub hosts: Option<Vec<String>>,
    pub ping_count: Option<u32>,
    pub ping_wait_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayLayer {
    pub device: Option<PathBuf>,
    pub init_sequence: Option<Vec<String>>,
    pub energize_byte: Option<String>,
    pub release_byte: Option<String>,
    pub settle_ms: Option<u64>,
    pub ignore: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryLayer {
    pub enabled: Option<bool>,
    pub url: Option<String>,
    pub token: Option<Secret>,
    pub expected_status: Option<u16>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub attempts: Option<u32>,
    pub retry_delay_secs: Option<u64>,
}

/// The credentials file may only carry the telemetry token.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CredentialsLayer {
    telemetry: Option<CredentialsTelemetry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CredentialsTelemetry {
    token: Option<Secret>,
}

impl From<CredentialsLayer> for ConfigLayer {
    fn from(credentials: CredentialsLayer) -> Self {
        ConfigLayer {
            telemetry: credentials.telemetry.map(|t| TelemetryLayer {
                token: t.token,
                ..TelemetryLayer::default()
            }),
            ..ConfigLayer::default()
        }
    }
}

impl ConfigLayer {
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Parse a credentials document; anything besides `[telemetry] token`
    /// is rejected.
    pub fn credentials_from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        let credentials: CredentialsLayer = toml::from_str(contents)?;
        Ok(credentials.into())
    }
}

/// Where a file layer comes from.
#[derive(Debug, Clone)]
pub struct LayerSource {
    pub path: PathBuf,
    /// Explicitly requested files must exist; default locations may be absent.
    pub required: bool,
}

impl LayerSource {
    pub fn optional(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: false,
        }
    }

    pub fn required(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: true,
        }
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

impl Config {
    /// Defaults, then the general file, then the credentials file.
    pub fn load(general: &LayerSource, credentials: &LayerSource) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(contents) = read_source(general)? {
            let layer = ConfigLayer::from_toml(&contents).map_err(|source| ConfigError::Parse {
                path: general.path.clone(),
                source,
            })?;
            config.apply(layer);
        }

        if let Some(contents) = read_source(credentials)? {
            let layer = ConfigLayer::credentials_from_toml(&contents).map_err(|source| {
                ConfigError::Parse {
                    path: credentials.path.clone(),
                    source,
                }
            })?;
            config.apply(layer);
        }

        Ok(config)
    }

    /// Apply one override layer on top of the current values.
    pub fn apply(&mut self, layer: ConfigLayer) {
        if let Some(w) = layer.watchdog {
            set(&mut self.watchdog.countdown_threshold, w.countdown_threshold);
            set(&mut self.watchdog.state_file, w.state_file);
            set(&mut self.watchdog.status_file, w.status_file);
            set(&mut self.watchdog.verbose, w.verbose);
            set(&mut self.watchdog.log_level, w.log_level);
            set(&mut self.watchdog.json_logs, w.json_logs);
            set(&mut self.watchdog.simulate, w.simulate);
        }

        if let Some(p) = layer.power {
            set(&mut self.power.mode, p.mode);
            if p.online_path.is_some() {
                self.power.online_path = p.online_path;
            }
        }

        if let Some(c) = layer.connectivity {
            set(&mut self.connectivity.mode, c.mode);
            set(&mut self.connectivity.hosts, c.hosts);
            set(&mut self.connectivity.ping_count, c.ping_count);
            set(&mut self.connectivity.ping_wait_secs, c.ping_wait_secs);
        }

        set(&mut self.aux_devices, layer.aux_devices);

        if let Some(r) = layer.relay {
            set(&mut self.relay.device, r.device);
            set(&mut self.relay.init_sequence, r.init_sequence);
            set(&mut self.relay.energize_byte, r.energize_byte);
            set(&mut self.relay.release_byte, r.release_byte);
            set(&mut self.relay.settle_ms, r.settle_ms);
            set(&mut self.relay.ignore, r.ignore);
        }

        if let Some(t) = layer.telemetry {
            set(&mut self.telemetry.enabled, t.enabled);
            set(&mut self.telemetry.url, t.url);
            if t.token.is_some() {
                self.telemetry.token = t.token;
            }
            set(&mut self.telemetry.expected_status, t.expected_status);
            set(
                &mut self.telemetry.connect_timeout_secs,
                t.connect_timeout_secs,
            );
            set(
                &mut self.telemetry.request_timeout_secs,
                t.request_timeout_secs,
            );
            set(&mut self.telemetry.attempts, t.attempts);
            set(&mut self.telemetry.retry_delay_secs, t.retry_delay_secs);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watchdog.countdown_threshold == 0 {
            return Err(ConfigError::Validation(
                "watchdog.countdown_threshold must be greater than 0".to_string(),
            ));
        }

        if self.watchdog.log_level > 4 {
            return Err(ConfigError::Validation(format!(
                "watchdog.log_level must be between 0 and 4 (got {})",
                self.watchdog.log_level
            )));
        }

        if self.connectivity.mode == ProbeMode::Auto && self.connectivity.hosts.is_empty() {
            return Err(ConfigError::Validation(
                "connectivity.hosts cannot be empty".to_string(),
            ));
        }

        if self.connectivity.hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "connectivity.hosts cannot contain empty entries".to_string(),
            ));
        }

        if self.connectivity.ping_count == 0 {
            return Err(ConfigError::Validation(
                "connectivity.ping_count must be greater than 0".to_string(),
            ));
        }

        if self.connectivity.ping_wait_secs == 0 {
            return Err(ConfigError::Validation(
                "connectivity.ping_wait_secs must be greater than 0".to_string(),
            ));
        }

        for (index, device) in self.aux_devices.iter().enumerate() {
            if device.name.trim().is_empty() || device.address.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "aux_devices[{}] needs both a name and an address",
                    index
                )));
            }
            if self.aux_devices[..index]
                .iter()
                .any(|other| other.name == device.name)
            {
                return Err(ConfigError::Validation(format!(
                    "duplicate aux device name '{}'",
                    device.name
                )));
            }
        }

        self.relay.init_bytes()?;
        self.relay.energize()?;
        self.relay.release()?;

        if self.telemetry.attempts == 0 {
            return Err(ConfigError::Validation(
                "telemetry.attempts must be greater than 0".to_string(),
            ));
        }

        // A zero timeout fails every request as a transport error, which
        // would be reported as an unreachable backend.
        if self.telemetry.connect_timeout_secs == 0 || self.telemetry.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "telemetry timeouts must be greater than 0".to_string(),
            ));
        }

        if self.telemetry.enabled {
            let endpoint = url::Url::parse(&self.telemetry.url).map_err(|e| {
                ConfigError::Validation(format!("Invalid telemetry.url: {}", e))
            })?;
            if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
                return Err(ConfigError::Validation(
                    "telemetry.url must use http:// or https:// protocol".to_string(),
                ));
            }

            // A dry run never sends, so it may run without credentials.
            match &self.telemetry.token {
                Some(token) if !token.is_blank() => {}
                _ if self.watchdog.simulate => {}
                _ => {
                    return Err(ConfigError::Validation(
                        "telemetry.token is required when telemetry is enabled".to_string(),
                    ))
                }
            }
        }

        Ok(())
    }
}

impl RelayConfig {
    pub fn init_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        if self.init_sequence.is_empty() {
            return Err(ConfigError::Validation(
                "relay.init_sequence cannot be empty".to_string(),
            ));
        }
        self.init_sequence
            .iter()
            .map(|text| parse_hex_byte(text, "relay.init_sequence"))
            .collect()
    }

    pub fn energize(&self) -> Result<u8, ConfigError> {
        parse_hex_byte(&self.energize_byte, "relay.energize_byte")
    }

    pub fn release(&self) -> Result<u8, ConfigError> {
        parse_hex_byte(&self.release_byte, "relay.release_byte")
    }
}

/// Decode a single hex-encoded byte such as `ff` or `0x51`.
pub fn parse_hex_byte(text: &str, field: &str) -> Result<u8, ConfigError> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let bytes = hex::decode(digits)
        .map_err(|e| ConfigError::Validation(format!("{} '{}': {}", field, text, e)))?;

    match bytes.as_slice() {
        [byte] => Ok(*byte),
        _ => Err(ConfigError::Validation(format!(
            "{} '{}' must encode exactly one byte",
            field, text
        ))),
    }
}

fn read_source(source: &LayerSource) -> Result<Option<String>, ConfigError> {
    read_optional(&source.path, source.required)
}

fn read_optional(path: &Path, required: bool) -> Result<Option<String>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => Ok(None),
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
