//! Power-cycle countdown.
//!
//! Each invocation is one step. While connectivity stays down the counter
//! runs from the threshold to zero, then the relay toggles and the counter
//! starts over: one outage of sufficient length alternates between cutting
//! and restoring router power. As soon as connectivity is back a cut router
//! is powered again immediately.

use linkguard_core::{ConnectivityState, RelayState};
use linkguard_relay::{RelayActuator, RelayDevice, RelayError};
use tracing::{error, info};

use crate::run_state::RunState;

/// What a step decided to do with the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerCycleAction {
    /// Nothing to do
    Hold,
    /// Still waiting; `remaining` Down evaluations before the next toggle
    CountDown { remaining: u32 },
    /// Energize the relay, cutting router power
    CutPower,
    /// De-energize the relay, restoring router power
    RestorePower,
}

impl PowerCycleAction {
    pub fn toggles(&self) -> bool {
        matches!(self, PowerCycleAction::CutPower | PowerCycleAction::RestorePower)
    }

    pub fn describe(&self) -> String {
        match self {
            PowerCycleAction::Hold => "relay unchanged".to_string(),
            PowerCycleAction::CountDown { remaining } => {
                format!("countdown {remaining} before power cycle")
            }
            PowerCycleAction::CutPower => "cutting router power".to_string(),
            PowerCycleAction::RestorePower => "restoring router power".to_string(),
        }
    }
}

/// Result of one step against the hardware.
#[derive(Debug)]
pub struct StepOutcome {
    pub action: PowerCycleAction,
    /// Set when a relay write failed; the logical state was still advanced
    pub relay_error: Option<RelayError>,
}

#[derive(Debug, Clone, Copy)]
pub struct PowerCycleMachine {
    threshold: u32,
}

impl PowerCycleMachine {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    /// Advance `state` for this invocation's connectivity reading and drive
    /// the relay accordingly.
    pub fn step<D: RelayDevice>(
        &self,
        state: &mut RunState,
        connectivity: ConnectivityState,
        actuator: &mut RelayActuator<D>,
    ) -> StepOutcome {
        let (next, action) = transition(*state, connectivity, self.threshold);

        let relay_error = if action.toggles() {
            info!(from = %state.relay, to = %next.relay, "{}", action.describe());
            match drive(actuator, state.relay, action) {
                Ok(()) => None,
                Err(e) => {
                    error!(error = %e, "Relay write failed, keeping logical state");
                    Some(e)
                }
            }
        } else {
            None
        };

        *state = next;
        StepOutcome {
            action,
            relay_error,
        }
    }
}

fn drive<D: RelayDevice>(
    actuator: &mut RelayActuator<D>,
    current: RelayState,
    action: PowerCycleAction,
) -> Result<(), RelayError> {
    // An unpowered board forgets it was armed; arm it before every cut.
    if action == PowerCycleAction::CutPower {
        actuator.initialize_device()?;
    }
    let (_, byte) = actuator.toggle(current);
    actuator.apply(byte)
}

/// Pure transition for one evaluation.
pub fn transition(
    state: RunState,
    connectivity: ConnectivityState,
    threshold: u32,
) -> (RunState, PowerCycleAction) {
    let mut next = RunState {
        toggled: false,
        ..state
    };

    match connectivity {
        ConnectivityState::Down => {
            next.countdown = state.countdown.saturating_sub(1);
            if next.countdown > 0 {
                let remaining = next.countdown;
                return (next, PowerCycleAction::CountDown { remaining });
            }
            let action = match state.relay {
                RelayState::DeEnergized => PowerCycleAction::CutPower,
                RelayState::Energized => PowerCycleAction::RestorePower,
            };
            (toggled(next, threshold), action)
        }
        ConnectivityState::Up => match state.relay {
            RelayState::DeEnergized => (next, PowerCycleAction::Hold),
            RelayState::Energized => (toggled(next, threshold), PowerCycleAction::RestorePower),
        },
    }
}

fn toggled(state: RunState, threshold: u32) -> RunState {
    RunState {
        relay: state.relay.flipped(),
        countdown: threshold,
        toggled: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkguard_core::Config;
    use linkguard_relay::RelaySettings;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        writes: Vec<u8>,
        fail: bool,
    }

    impl RelayDevice for Recorder {
        fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
            if self.fail {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "unplugged",
                ));
            }
            self.writes.extend_from_slice(bytes);
            Ok(())
        }

        fn describe(&self) -> String {
            "recorder".to_string()
        }
    }

    fn actuator(fail: bool) -> RelayActuator<Recorder> {
        let mut settings = RelaySettings::from_config(&Config::default()).unwrap();
        settings.settle = Duration::ZERO;
        RelayActuator::new(
            Recorder {
                writes: Vec::new(),
                fail,
            },
            settings,
        )
    }

    #[test]
    fn test_countdown_below_threshold() {
        let mut state = RunState::initial(3);
        for _ in 0..2 {
            state = transition(state, ConnectivityState::Down, 3).0;
        }
        assert_eq!(state.countdown, 1);
        assert_eq!(state.relay, RelayState::DeEnergized);
        assert!(!state.toggled);
    }

    #[test]
    fn test_threshold_reached_cuts_power() {
        let state = RunState {
            countdown: 1,
            ..RunState::initial(3)
        };
        let (next, action) = transition(state, ConnectivityState::Down, 3);

        assert_eq!(action, PowerCycleAction::CutPower);
        assert_eq!(next.relay, RelayState::Energized);
        assert_eq!(next.countdown, 3);
        assert!(next.toggled);
    }

    #[test]
    fn test_up_restores_immediately() {
        let state = RunState {
            relay: RelayState::Energized,
            countdown: 3,
            toggled: true,
        };
        let (next, action) = transition(state, ConnectivityState::Up, 3);

        assert_eq!(action, PowerCycleAction::RestorePower);
        assert_eq!(next.relay, RelayState::DeEnergized);
        assert!(next.toggled);
    }

    #[test]
    fn test_up_while_powered_is_idempotent() {
        let state = RunState::initial(3);
        let (next, action) = transition(state, ConnectivityState::Up, 3);
        assert_eq!(action, PowerCycleAction::Hold);
        assert_eq!(next, state);

        let (again, action) = transition(next, ConnectivityState::Up, 3);
        assert_eq!(action, PowerCycleAction::Hold);
        assert_eq!(again, state);
    }

    #[test]
    fn test_toggle_flag_cleared_next_step() {
        let state = RunState {
            relay: RelayState::Energized,
            countdown: 3,
            toggled: true,
        };
        let (next, _) = transition(state, ConnectivityState::Down, 3);
        assert!(!next.toggled);
        assert_eq!(next.countdown, 2);
    }

    #[test]
    fn test_zero_countdown_does_not_underflow() {
        let state = RunState {
            countdown: 0,
            ..RunState::initial(2)
        };
        let (next, action) = transition(state, ConnectivityState::Down, 2);
        assert_eq!(action, PowerCycleAction::CutPower);
        assert_eq!(next.countdown, 2);
    }

    #[test]
    fn test_step_arms_board_before_cut() {
        let machine = PowerCycleMachine::new(1);
        let mut actuator = actuator(false);
        let mut state = RunState::initial(1);

        let outcome = machine.step(&mut state, ConnectivityState::Down, &mut actuator);
        assert_eq!(outcome.action, PowerCycleAction::CutPower);
        assert_eq!(actuator.device().writes, vec![0x50, 0x51, 0x00]);

        let outcome = machine.step(&mut state, ConnectivityState::Up, &mut actuator);
        assert_eq!(outcome.action, PowerCycleAction::RestorePower);
        assert_eq!(actuator.device().writes, vec![0x50, 0x51, 0x00, 0xFF]);
    }

    #[test]
    fn test_write_failure_still_advances_state() {
        let machine = PowerCycleMachine::new(1);
        let mut actuator = actuator(true);
        let mut state = RunState::initial(1);

        let outcome = machine.step(&mut state, ConnectivityState::Down, &mut actuator);
        assert!(matches!(outcome.relay_error, Some(RelayError::Write { .. })));
        assert_eq!(state.relay, RelayState::Energized);
        assert!(state.toggled);
    }
}
