//! # linkguard
//!
//! Scheduler-driven watchdog for small sites: checks mains power, internet
//! reachability and cameras, power-cycles a stuck router through a USB
//! relay board and reports to a telemetry backend.
//!
//! ## Usage
//! ```bash
//! # One invocation, normally from cron every few minutes
//! linkguard --config /etc/linkguard/linkguard.toml
//!
//! # Exercise the pipeline without touching the relay or the backend
//! linkguard --simulate --inet down -v
//!
//! # Inspect configuration and the persisted outage state
//! linkguard check-config
//! linkguard show-state
//! ```

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use linkguard_core::{logging, Config, StatusSink};
use linkguard_relay::{DeviceFile, RelayActuator, RelaySettings};
use linkguard_sensors::{detect_host_power_source, SystemPing};
use linkguard_telemetry::{DeliveryPolicy, HttpTransport, TelemetryPublisher};
use linkguard_watchdog::{RunStateStore, Watchdog};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.log_level.unwrap_or(3), cli.json_logs);
            error!(error = %e, "Configuration rejected");
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.watchdog.log_level, config.watchdog.json_logs);

    let result = match cli.command() {
        Command::Run => run(config),
        Command::CheckConfig => check_config(&config),
        Command::ShowState => show_state(&config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("Fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(intensity: u8, json: bool) {
    if json {
        logging::init_json(intensity);
    } else {
        logging::init(intensity);
    }
}

fn run(config: Config) -> anyhow::Result<u8> {
    let status = StatusSink::new(&config.watchdog.status_file, config.watchdog.verbose);

    let mut watchdog = match build_watchdog(config) {
        Ok(watchdog) => watchdog,
        Err(e) => {
            status.reset();
            status.append(&format!("fatal: {e:#}"));
            return Err(e);
        }
    };

    match watchdog.run() {
        Ok(report) => {
            info!(
                power = %report.power,
                connectivity = ?report.connectivity,
                action = ?report.action,
                telemetry = ?report.telemetry,
                "Invocation complete"
            );
            Ok(report.exit_code())
        }
        Err(e) => {
            status.append(&format!("fatal: {e}"));
            Err(e.into())
        }
    }
}

fn build_watchdog(config: Config) -> anyhow::Result<Watchdog<DeviceFile, HttpTransport>> {
    let settings = RelaySettings::from_config(&config)?;
    let device = match settings.suppression {
        Some(reason) => {
            info!(?reason, device = %config.relay.device.display(), "Relay writes suppressed");
            DeviceFile::new(&config.relay.device)
        }
        None => DeviceFile::open_checked(&config.relay.device)?,
    };

    let publisher = if config.telemetry.enabled && !config.watchdog.simulate {
        let transport = HttpTransport::new(&config.telemetry)?;
        Some(TelemetryPublisher::new(
            transport,
            DeliveryPolicy::from_config(&config.telemetry),
        ))
    } else {
        None
    };

    let power = detect_host_power_source(config.power.online_path.as_deref());
    let pinger = SystemPing::new(
        config.connectivity.ping_count,
        config.connectivity.ping_wait_secs,
    );

    let watchdog = Watchdog::new(
        config,
        power,
        Box::new(pinger),
        RelayActuator::new(device, settings),
        publisher,
    );
    watchdog
        .store()
        .prepare()
        .context("Run state cannot be persisted")?;
    Ok(watchdog)
}

fn check_config(config: &Config) -> anyhow::Result<u8> {
    println!("{}", render_config(config)?);
    Ok(0)
}

fn show_state(config: &Config) -> anyhow::Result<u8> {
    println!("{}", render_state(config)?);
    Ok(0)
}

/// Effective configuration as JSON; the token serializes redacted.
fn render_config(config: &Config) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}

fn render_state(config: &Config) -> anyhow::Result<String> {
    let store = RunStateStore::new(
        &config.watchdog.state_file,
        config.watchdog.countdown_threshold,
    );
    let state = store
        .try_load()
        .with_context(|| format!("Reading {}", store.path().display()))?;
    match state {
        Some(state) => Ok(serde_json::to_string_pretty(&state)?),
        None => Ok("no outage in progress".to_string()),
    }
}
