//! Relay actuator: logical state transitions plus the single hardware write
//! path.

use crate::device::RelayDevice;
use crate::RelayError;
use linkguard_core::{Config, ConfigError, RelayState};
use std::time::Duration;
use tracing::{debug, info};

/// Why hardware writes are being skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// Dry run of the whole pipeline
    Simulation,
    /// Operator asked to leave the relay alone
    IgnoreRelay,
}

/// Decoded relay settings.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub init_sequence: Vec<u8>,
    pub energize_byte: u8,
    pub release_byte: u8,
    pub settle: Duration,
    pub suppression: Option<Suppression>,
}

impl RelaySettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let suppression = if config.watchdog.simulate {
            Some(Suppression::Simulation)
        } else if config.relay.ignore {
            Some(Suppression::IgnoreRelay)
        } else {
            None
        };

        let relay = &config.relay;
        Ok(Self {
            init_sequence: relay.init_bytes()?,
            energize_byte: relay.energize()?,
            release_byte: relay.release()?,
            settle: Duration::from_millis(relay.settle_ms),
            suppression,
        })
    }
}

pub struct RelayActuator<D: RelayDevice> {
    device: D,
    settings: RelaySettings,
}

impl<D: RelayDevice> RelayActuator<D> {
    pub fn new(device: D, settings: RelaySettings) -> Self {
        Self { device, settings }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Raw byte that puts both channels into `state`.
    pub fn control_byte(&self, state: RelayState) -> u8 {
        match state {
            RelayState::Energized => self.settings.energize_byte,
            RelayState::DeEnergized => self.settings.release_byte,
        }
    }

    /// Pure transition: the flipped state and the byte that selects it.
    pub fn toggle(&self, current: RelayState) -> (RelayState, u8) {
        let next = current.flipped();
        (next, self.control_byte(next))
    }

    /// Arm the board with its init sequence, then wait for it to settle.
    ///
    /// Boards that lost power come back unarmed and ignore control bytes, so
    /// this runs before every power cut.
    pub fn initialize_device(&mut self) -> Result<(), RelayError> {
        for byte in self.settings.init_sequence.clone() {
            self.apply(byte)?;
        }
        if self.settings.suppression.is_none() && !self.settings.settle.is_zero() {
            std::thread::sleep(self.settings.settle);
        }
        Ok(())
    }

    /// Write one control byte. Skipped without error when suppressed.
    pub fn apply(&mut self, byte: u8) -> Result<(), RelayError> {
        let encoded = hex::encode([byte]);

        if let Some(reason) = self.settings.suppression {
            info!(byte = %encoded, ?reason, "Relay write suppressed");
            return Ok(());
        }

        debug!(byte = %encoded, device = %self.device.describe(), "Writing relay byte");
        self.device
            .write_bytes(&[byte])
            .map_err(|source| RelayError::Write {
                device: self.device.describe(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkguard_core::Config;

    #[derive(Default)]
    struct Recorder {
        writes: Vec<u8>,
        fail: bool,
    }

    impl RelayDevice for Recorder {
        fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
            if self.fail {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
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

    fn settings(suppression: Option<Suppression>) -> RelaySettings {
        let mut settings = RelaySettings::from_config(&Config::default()).unwrap();
        settings.settle = Duration::ZERO;
        settings.suppression = suppression;
        settings
    }

    #[test]
    fn test_settings_from_defaults() {
        let settings = RelaySettings::from_config(&Config::default()).unwrap();
        assert_eq!(settings.init_sequence, vec![0x50, 0x51]);
        assert_eq!(settings.energize_byte, 0x00);
        assert_eq!(settings.release_byte, 0xFF);
        assert_eq!(settings.settle, Duration::from_secs(1));
        assert_eq!(settings.suppression, None);
    }

    #[test]
    fn test_simulation_takes_precedence() {
        let mut config = Config::default();
        config.watchdog.simulate = true;
        config.relay.ignore = true;
        let settings = RelaySettings::from_config(&config).unwrap();
        assert_eq!(settings.suppression, Some(Suppression::Simulation));
    }

    #[test]
    fn test_toggle_is_pure() {
        let actuator = RelayActuator::new(Recorder::default(), settings(None));

        assert_eq!(
            actuator.toggle(RelayState::DeEnergized),
            (RelayState::Energized, 0x00)
        );
        assert_eq!(
            actuator.toggle(RelayState::Energized),
            (RelayState::DeEnergized, 0xFF)
        );
        assert!(actuator.device().writes.is_empty());
    }

    #[test]
    fn test_initialize_then_apply() {
        let mut actuator = RelayActuator::new(Recorder::default(), settings(None));
        actuator.initialize_device().unwrap();
        let (_, byte) = actuator.toggle(RelayState::DeEnergized);
        actuator.apply(byte).unwrap();

        assert_eq!(actuator.device().writes, vec![0x50, 0x51, 0x00]);
    }

    #[test]
    fn test_suppressed_writes() {
        for reason in [Suppression::Simulation, Suppression::IgnoreRelay] {
            let mut actuator = RelayActuator::new(Recorder::default(), settings(Some(reason)));
            actuator.initialize_device().unwrap();
            actuator.apply(0x00).unwrap();
            assert!(actuator.device().writes.is_empty());
        }
    }

    #[test]
    fn test_write_failure_surfaces() {
        let device = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let mut actuator = RelayActuator::new(device, settings(None));
        assert!(matches!(
            actuator.apply(0xFF),
            Err(RelayError::Write { .. })
        ));
    }
}
