//! ICMP reachability probes.

use crate::ProbeError;
use linkguard_core::{AuxDeviceState, ConnectivityState, ProbeMode};
use std::process::{Command, Stdio};
use tracing::debug;

/// Answers whether a single address replies to an echo request.
pub trait Pinger {
    /// `Ok(false)` for a host that did not answer in time; `Err` only when
    /// the probe itself could not be carried out.
    fn ping(&self, address: &str) -> Result<bool, ProbeError>;
}

/// Runs the system `ping` utility.
#[derive(Debug, Clone)]
pub struct SystemPing {
    program: String,
    count: u32,
    wait_secs: u64,
}

impl SystemPing {
    pub fn new(count: u32, wait_secs: u64) -> Self {
        Self {
            program: "ping".to_string(),
            count,
            wait_secs,
        }
    }

    /// Use a different executable with the same `-c`/`-W` interface.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl Pinger for SystemPing {
    fn ping(&self, address: &str) -> Result<bool, ProbeError> {
        let status = Command::new(&self.program)
            .arg("-c")
            .arg(self.count.to_string())
            .arg("-W")
            .arg(self.wait_secs.to_string())
            .arg(address)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| ProbeError::CommandUnavailable {
                command: self.program.clone(),
                source,
            })?;

        debug!(address, success = status.success(), "ping finished");
        Ok(status.success())
    }
}

/// Probe the hosts in order; Up on the first reply, Down once all failed.
pub fn probe_connectivity(
    mode: ProbeMode,
    pinger: &dyn Pinger,
    hosts: &[String],
) -> Result<ConnectivityState, ProbeError> {
    if let Some(forced) = mode.forced() {
        return Ok(ConnectivityState::from(forced));
    }

    for host in hosts {
        if pinger.ping(host)? {
            debug!(host = %host, "Internet reachable");
            return Ok(ConnectivityState::Up);
        }
    }

    Ok(ConnectivityState::Down)
}

/// Probe one auxiliary device.
pub fn probe_aux(
    mode: ProbeMode,
    pinger: &dyn Pinger,
    address: &str,
) -> Result<AuxDeviceState, ProbeError> {
    if let Some(forced) = mode.forced() {
        return Ok(AuxDeviceState::from(forced));
    }
    Ok(AuxDeviceState::from(pinger.ping(address)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Scripted {
        reachable: Vec<&'static str>,
        calls: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(reachable: Vec<&'static str>) -> Self {
            Self {
                reachable,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Pinger for Scripted {
        fn ping(&self, address: &str) -> Result<bool, ProbeError> {
            self.calls.borrow_mut().push(address.to_string());
            Ok(self.reachable.contains(&address))
        }
    }

    fn hosts(list: &[&str]) -> Vec<String> {
        list.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn test_first_success_wins() {
        let pinger = Scripted::new(vec!["8.8.8.8", "9.9.9.9"]);
        let state = probe_connectivity(
            ProbeMode::Auto,
            &pinger,
            &hosts(&["1.1.1.1", "8.8.8.8", "9.9.9.9"]),
        )
        .unwrap();

        assert_eq!(state, ConnectivityState::Up);
        assert_eq!(*pinger.calls.borrow(), vec!["1.1.1.1", "8.8.8.8"]);
    }

    #[test]
    fn test_down_only_after_all_fail() {
        let pinger = Scripted::new(vec![]);
        let state =
            probe_connectivity(ProbeMode::Auto, &pinger, &hosts(&["1.1.1.1", "8.8.8.8"])).unwrap();

        assert_eq!(state, ConnectivityState::Down);
        assert_eq!(pinger.calls.borrow().len(), 2);
    }

    #[test]
    fn test_empty_host_list_is_down() {
        let pinger = Scripted::new(vec![]);
        let state = probe_connectivity(ProbeMode::Auto, &pinger, &[]).unwrap();
        assert_eq!(state, ConnectivityState::Down);
    }

    #[test]
    fn test_forced_modes_skip_io() {
        let pinger = Scripted::new(vec![]);
        let list = hosts(&["1.1.1.1"]);

        assert_eq!(
            probe_connectivity(ProbeMode::ForceUp, &pinger, &list).unwrap(),
            ConnectivityState::Up
        );
        assert_eq!(
            probe_aux(ProbeMode::ForceDown, &pinger, "192.168.1.20").unwrap(),
            AuxDeviceState::Down
        );
        assert!(pinger.calls.borrow().is_empty());
    }

    #[test]
    fn test_aux_probe() {
        let pinger = Scripted::new(vec!["192.168.1.20"]);
        assert_eq!(
            probe_aux(ProbeMode::Auto, &pinger, "192.168.1.20").unwrap(),
            AuxDeviceState::Up
        );
        assert_eq!(
            probe_aux(ProbeMode::Auto, &pinger, "192.168.1.21").unwrap(),
            AuxDeviceState::Down
        );
    }

    #[test]
    fn test_system_ping_exit_status() {
        // `true` and `false` ignore their arguments, standing in for a reply
        // and a timeout.
        assert!(SystemPing::new(1, 1).with_program("true").ping("192.0.2.1").unwrap());
        assert!(!SystemPing::new(1, 1).with_program("false").ping("192.0.2.1").unwrap());
    }

    #[test]
    fn test_missing_ping_binary() {
        let result = SystemPing::new(1, 1)
            .with_program("/nonexistent/bin/ping")
            .ping("192.0.2.1");
        assert!(matches!(result, Err(ProbeError::CommandUnavailable { .. })));
    }
}
