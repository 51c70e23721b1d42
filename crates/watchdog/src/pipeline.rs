//! One watchdog invocation, end to end.
//!
//! Signals are evaluated in dependency order and each stage is gated on the
//! one before it: nothing past the power probe runs on battery, and aux
//! devices are only probed while the internet is reachable (their own link
//! is assumed to share the router).

use linkguard_core::{AuxDeviceState, Config, ConnectivityState, PowerState, StatusSink};
use linkguard_relay::{RelayActuator, RelayDevice};
use linkguard_sensors::{probe_aux, probe_connectivity, probe_power, Pinger, PowerSourceReader};
use linkguard_telemetry::{
    build_payload, DeliveryOutcome, Signals, TelemetryError, TelemetryPublisher,
    TelemetryTransport,
};
use tracing::{debug, error, info, warn};

use crate::machine::{PowerCycleAction, PowerCycleMachine};
use crate::run_state::{RunState, RunStateStore};
use crate::WatchdogError;

/// What happened to this invocation's telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryReport {
    /// Telemetry is switched off in configuration
    Disabled,
    /// Dry run; the payload was only logged
    Simulated { payload: String },
    /// Every signal was gated off or indeterminate
    NothingToReport,
    /// A delivery was attempted
    Sent(DeliveryOutcome),
}

/// Summary of one invocation.
#[derive(Debug)]
pub struct RunReport {
    pub power: PowerState,
    /// `None` when gated off by the power reading
    pub connectivity: Option<ConnectivityState>,
    pub aux: Vec<(String, AuxDeviceState)>,
    /// Run state after the step; `None` when the machine did not run
    pub state: Option<RunState>,
    pub action: Option<PowerCycleAction>,
    /// Relay write failure, already logged
    pub relay_error: Option<String>,
    pub telemetry: TelemetryReport,
}

impl RunReport {
    fn new(power: PowerState) -> Self {
        Self {
            power,
            connectivity: None,
            aux: Vec::new(),
            state: None,
            action: None,
            relay_error: None,
            telemetry: TelemetryReport::NothingToReport,
        }
    }

    /// Signals as seen by the telemetry payload builder.
    pub fn signals(&self) -> Signals {
        Signals {
            power: self.power,
            connectivity: self.connectivity,
            relay_toggled: self.state.map(|state| state.toggled),
            aux: self.aux.clone(),
        }
    }

    /// Process exit status: non-zero only for errors an operator must see.
    ///
    /// An unreachable telemetry endpoint is expected during the outages
    /// being monitored and does not count.
    pub fn exit_code(&self) -> u8 {
        let rejected = matches!(
            &self.telemetry,
            TelemetryReport::Sent(outcome) if outcome.is_error()
        );
        if self.relay_error.is_some() || rejected {
            1
        } else {
            0
        }
    }
}

/// The watchdog with all of its collaborators wired in.
pub struct Watchdog<D: RelayDevice, T: TelemetryTransport> {
    config: Config,
    power: Box<dyn PowerSourceReader>,
    pinger: Box<dyn Pinger>,
    relay: RelayActuator<D>,
    publisher: Option<TelemetryPublisher<T>>,
    machine: PowerCycleMachine,
    store: RunStateStore,
    status: StatusSink,
}

impl<D: RelayDevice, T: TelemetryTransport> Watchdog<D, T> {
    /// `publisher` is `None` when telemetry is disabled.
    pub fn new(
        config: Config,
        power: Box<dyn PowerSourceReader>,
        pinger: Box<dyn Pinger>,
        relay: RelayActuator<D>,
        publisher: Option<TelemetryPublisher<T>>,
    ) -> Self {
        let threshold = config.watchdog.countdown_threshold;
        let store = RunStateStore::new(config.watchdog.state_file.clone(), threshold);
        let status = StatusSink::new(config.watchdog.status_file.clone(), config.watchdog.verbose);

        Self {
            config,
            power,
            pinger,
            relay,
            publisher,
            machine: PowerCycleMachine::new(threshold),
            store,
            status,
        }
    }

    pub fn publisher(&self) -> Option<&TelemetryPublisher<T>> {
        self.publisher.as_ref()
    }

    pub fn store(&self) -> &RunStateStore {
        &self.store
    }

    pub fn run(&mut self) -> Result<RunReport, WatchdogError> {
        self.status.reset();
        self.status.append("watchdog run started");
        if self.config.watchdog.simulate {
            self.status.append("simulation: relay and telemetry are not touched");
        }

        let power = probe_power(self.config.power.mode, self.power.as_ref());
        info!(%power, source = %self.power.describe(), "Power probed");
        self.status.append(&format!("power supply: {power}"));

        let mut report = RunReport::new(power);
        if power == PowerState::Mains {
            self.evaluate_network(&mut report)?;
        } else {
            info!(%power, "Not on mains power, skipping connectivity checks");
            self.status.append("not on mains power, connectivity checks skipped");
        }

        report.telemetry = self.publish(&report)?;
        self.status.append("watchdog run complete");
        Ok(report)
    }

    fn evaluate_network(&mut self, report: &mut RunReport) -> Result<(), WatchdogError> {
        let probes = &self.config.connectivity;
        let connectivity = probe_connectivity(probes.mode, self.pinger.as_ref(), &probes.hosts)?;
        info!(%connectivity, "Internet probed");
        self.status.append(&format!("internet: {connectivity}"));

        if connectivity.is_up() {
            for device in &self.config.aux_devices {
                let state = probe_aux(device.mode, self.pinger.as_ref(), &device.address)?;
                debug!(name = %device.name, address = %device.address, %state, "Aux device probed");
                self.status.append(&format!("{}: {state}", device.name));
                report.aux.push((device.name.clone(), state));
            }
        }

        let mut state = self.store.load();
        let outcome = self.machine.step(&mut state, connectivity, &mut self.relay);
        self.status.append(&format!("relay: {}", outcome.action.describe()));
        if let Some(e) = &outcome.relay_error {
            self.status.append(&format!("relay write failed: {e}"));
            report.relay_error = Some(e.to_string());
        }

        self.store.save(&state, connectivity)?;

        report.connectivity = Some(connectivity);
        report.state = Some(state);
        report.action = Some(outcome.action);
        Ok(())
    }

    fn publish(&self, report: &RunReport) -> Result<TelemetryReport, WatchdogError> {
        let payload = match build_payload(&report.signals()) {
            Ok(payload) => payload,
            Err(TelemetryError::EmptyPayload) => {
                warn!("Nothing to report, telemetry skipped");
                self.status.append("telemetry: nothing to report");
                return Ok(TelemetryReport::NothingToReport);
            }
            Err(e) => return Err(e.into()),
        };
        let body = payload.to_json()?;

        if self.config.watchdog.simulate {
            info!(payload = %body, "Simulation, telemetry not sent");
            self.status.append(&format!("telemetry: simulated {body}"));
            return Ok(TelemetryReport::Simulated { payload: body });
        }

        let Some(publisher) = &self.publisher else {
            debug!(payload = %body, "Telemetry disabled");
            self.status.append("telemetry: disabled");
            return Ok(TelemetryReport::Disabled);
        };

        self.status.append(&format!("telemetry: sending {body}"));
        let outcome = publisher.deliver(&payload)?;
        match &outcome {
            DeliveryOutcome::Delivered { status, attempts } => {
                self.status.append(&format!(
                    "telemetry: delivered (HTTP {status}, attempt {attempts})"
                ));
            }
            DeliveryOutcome::Unreachable { attempts, error } => {
                info!(attempts, %error, "Telemetry endpoint unreachable, giving up");
                self.status.append(&format!(
                    "telemetry: endpoint unreachable after {attempts} attempts"
                ));
            }
            DeliveryOutcome::Rejected { status, attempts } => {
                error!(status, attempts, "Telemetry rejected by backend");
                self.status.append(&format!(
                    "telemetry: rejected with HTTP {status} after {attempts} attempts"
                ));
            }
        }
        Ok(TelemetryReport::Sent(outcome))
    }
}
