//! Command-line surface and its mapping onto configuration overrides.

use clap::{Parser, Subcommand, ValueEnum};
use linkguard_core::config::{ConnectivityLayer, PowerLayer, RelayLayer, WatchdogLayer};
use linkguard_core::{
    Config, ConfigError, ConfigLayer, LayerSource, ProbeMode, DEFAULT_CONFIG_PATH,
    DEFAULT_CREDENTIALS_PATH,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "linkguard",
    about = "Mains, internet and camera watchdog that power-cycles a stuck router",
    version
)]
pub struct Cli {
    /// General configuration file [default: /etc/linkguard/linkguard.toml]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Credentials file holding the telemetry token
    /// [default: /etc/linkguard/credentials.toml]
    #[arg(long, global = true)]
    pub credentials: Option<PathBuf>,

    /// Power probe mode
    #[arg(long, value_enum, global = true)]
    pub power: Option<ModeArg>,

    /// Internet probe mode
    #[arg(long, value_enum, global = true)]
    pub inet: Option<ModeArg>,

    /// Probe mode for every auxiliary device
    #[arg(long, value_enum, global = true)]
    pub aux: Option<ModeArg>,

    /// Dry run: no relay writes and no telemetry sent
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Track relay state without writing to the board
    #[arg(long, global = true)]
    pub ignore_relay: bool,

    /// Echo status lines to stdout
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging intensity: 0 none, 1 error, 2 warning, 3 info, 4 full
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub log_level: Option<u8>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run one watchdog invocation (default)
    Run,
    /// Load and validate configuration, then print it with secrets redacted
    CheckConfig,
    /// Print the persisted run state
    ShowState,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Probe the real signal
    Auto,
    /// Report mains / up without probing
    Up,
    /// Report battery / down without probing
    Down,
}

impl From<ModeArg> for ProbeMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => ProbeMode::Auto,
            ModeArg::Up => ProbeMode::ForceUp,
            ModeArg::Down => ProbeMode::ForceDown,
        }
    }
}

fn flag(set: bool) -> Option<bool> {
    set.then_some(true)
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }

    /// Explicitly named files must exist; default locations are optional.
    fn sources(&self) -> (LayerSource, LayerSource) {
        let general = match &self.config {
            Some(path) => LayerSource::required(path),
            None => LayerSource::optional(DEFAULT_CONFIG_PATH),
        };
        let credentials = match &self.credentials {
            Some(path) => LayerSource::required(path),
            None => LayerSource::optional(DEFAULT_CREDENTIALS_PATH),
        };
        (general, credentials)
    }

    /// The top configuration layer built from flags.
    pub fn overrides(&self) -> ConfigLayer {
        ConfigLayer {
            watchdog: Some(WatchdogLayer {
                verbose: flag(self.verbose),
                log_level: self.log_level,
                json_logs: flag(self.json_logs),
                simulate: flag(self.simulate),
                ..WatchdogLayer::default()
            }),
            power: Some(PowerLayer {
                mode: self.power.map(ProbeMode::from),
                ..PowerLayer::default()
            }),
            connectivity: Some(ConnectivityLayer {
                mode: self.inet.map(ProbeMode::from),
                ..ConnectivityLayer::default()
            }),
            relay: Some(RelayLayer {
                ignore: flag(self.ignore_relay),
                ..RelayLayer::default()
            }),
            ..ConfigLayer::default()
        }
    }

    /// Defaults, files, then flags; validated.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let (general, credentials) = self.sources();
        let mut config = Config::load(&general, &credentials)?;
        config.apply(self.overrides());

        if let Some(mode) = self.aux {
            for device in &mut config.aux_devices {
                device.mode = mode.into();
            }
        }

        config.validate()?;
        Ok(config)
    }
}
