//! Run state persisted between invocations.
//!
//! The record only exists while connectivity is down: a healthy invocation
//! deletes it, so the next outage starts from the initial state. The format
//! is plain `key=value` lines; nothing in the file is ever executed.

use linkguard_core::{ConnectivityState, RelayState};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const RELAY_KEY: &str = "relay";
const COUNTDOWN_KEY: &str = "countdown";
const TOGGLED_KEY: &str = "toggled";

/// Run state errors
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to write run state {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to remove run state {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },

    #[error("Run state directory {path} is not usable: {source}")]
    Directory { path: PathBuf, source: io::Error },

    #[error("Corrupt run state: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunState {
    pub relay: RelayState,
    /// Down evaluations left before the next toggle
    pub countdown: u32,
    /// Whether the last invocation toggled the relay
    pub toggled: bool,
}

impl RunState {
    /// State of a fresh outage: router powered, full countdown.
    pub fn initial(threshold: u32) -> Self {
        Self {
            relay: RelayState::default(),
            countdown: threshold,
            toggled: false,
        }
    }

    fn to_record(&self) -> String {
        format!(
            "{RELAY_KEY}={}\n{COUNTDOWN_KEY}={}\n{TOGGLED_KEY}={}\n",
            self.relay.as_str(),
            self.countdown,
            self.toggled
        )
    }

    fn from_record(text: &str) -> Result<Self, StateError> {
        let mut relay = None;
        let mut countdown = None;
        let mut toggled = None;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| StateError::Corrupt(format!("malformed line '{line}'")))?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                RELAY_KEY => {
                    relay = Some(RelayState::parse(value).ok_or_else(|| {
                        StateError::Corrupt(format!("unknown relay state '{value}'"))
                    })?)
                }
                COUNTDOWN_KEY => {
                    countdown = Some(value.parse::<u32>().map_err(|_| {
                        StateError::Corrupt(format!("countdown '{value}' is not a number"))
                    })?)
                }
                TOGGLED_KEY => {
                    toggled = Some(value.parse::<bool>().map_err(|_| {
                        StateError::Corrupt(format!("toggled '{value}' is not a boolean"))
                    })?)
                }
                other => return Err(StateError::Corrupt(format!("unknown key '{other}'"))),
            }
        }

        match (relay, countdown, toggled) {
            (Some(relay), Some(countdown), Some(toggled)) => Ok(Self {
                relay,
                countdown,
                toggled,
            }),
            _ => Err(StateError::Corrupt("missing keys".to_string())),
        }
    }
}

/// File-backed store for [`RunState`].
#[derive(Debug, Clone)]
pub struct RunStateStore {
    path: PathBuf,
    threshold: u32,
}

impl RunStateStore {
    pub fn new(path: impl Into<PathBuf>, threshold: u32) -> Self {
        Self {
            path: path.into(),
            threshold,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make sure the state directory exists and is writable, so an outage is
    /// never tracked by a store that cannot save.
    pub fn prepare(&self) -> Result<(), StateError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let directory_error = |source| StateError::Directory {
            path: dir.to_path_buf(),
            source,
        };

        fs::create_dir_all(dir).map_err(directory_error)?;
        let check = self.sibling("check");
        fs::write(&check, b"").map_err(directory_error)?;
        fs::remove_file(&check).map_err(directory_error)
    }

    /// The persisted record if present, otherwise the initial state.
    ///
    /// An unreadable or corrupt record is logged and treated as absent.
    pub fn load(&self) -> RunState {
        match self.try_load() {
            Ok(Some(state)) => state,
            Ok(None) => RunState::initial(self.threshold),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Discarding run state");
                RunState::initial(self.threshold)
            }
        }
    }

    /// Like [`load`](Self::load) but surfaces what was found on disk.
    pub fn try_load(&self) -> Result<Option<RunState>, StateError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StateError::Corrupt(e.to_string())),
        };
        if text.trim().is_empty() {
            return Ok(None);
        }

        let mut state = RunState::from_record(&text)?;
        // The threshold may have been lowered since the record was written.
        state.countdown = state.countdown.min(self.threshold);
        Ok(Some(state))
    }

    /// Persist while down, forget while up.
    pub fn save(
        &self,
        state: &RunState,
        connectivity: ConnectivityState,
    ) -> Result<(), StateError> {
        match connectivity {
            ConnectivityState::Down => self.write(state),
            ConnectivityState::Up => self.clear(),
        }
    }

    /// Delete the record; an absent record is not an error.
    pub fn clear(&self) -> Result<(), StateError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Run state cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Hidden scratch file next to the record, e.g. `.runstate.tmp`. Never
    /// collides with the record itself, whatever its extension.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "runstate".to_string());
        self.path.with_file_name(format!(".{name}.{suffix}"))
    }

    fn write(&self, state: &RunState) -> Result<(), StateError> {
        let tmp = self.sibling("tmp");
        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(state.to_record().as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();

        result.map_err(|source| {
            let _ = fs::remove_file(&tmp);
            StateError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        debug!(path = %self.path.display(), ?state, "Run state saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(threshold: u32) -> RunStateStore {
        let dir = std::env::temp_dir().join(format!("linkguard-state-{}", uuid::Uuid::new_v4()));
        RunStateStore::new(dir.join("runstate"), threshold)
    }

    #[test]
    fn test_missing_record_is_initial() {
        let store = store(3);
        assert_eq!(store.load(), RunState::initial(3));
        assert_eq!(store.load().relay, RelayState::DeEnergized);
    }

    #[test]
    fn test_round_trip_while_down() {
        let store = store(3);
        store.prepare().unwrap();
        let state = RunState {
            relay: RelayState::Energized,
            countdown: 2,
            toggled: true,
        };

        store.save(&state, ConnectivityState::Down).unwrap();
        assert_eq!(store.load(), state);
        assert!(!store.sibling("tmp").exists());
    }

    #[test]
    fn test_up_deletes_record() {
        let store = store(3);
        store.prepare().unwrap();
        store
            .save(&RunState::initial(3), ConnectivityState::Down)
            .unwrap();
        assert!(store.path().exists());

        store
            .save(&RunState::initial(3), ConnectivityState::Up)
            .unwrap();
        assert!(!store.path().exists());

        // Absent record stays absent without error.
        store
            .save(&RunState::initial(3), ConnectivityState::Up)
            .unwrap();
    }

    #[test]
    fn test_record_format() {
        let state = RunState {
            relay: RelayState::Energized,
            countdown: 3,
            toggled: false,
        };
        assert_eq!(
            state.to_record(),
            "relay=energized\ncountdown=3\ntoggled=false\n"
        );
    }

    #[test]
    fn test_corrupt_record_falls_back() {
        let store = store(3);
        store.prepare().unwrap();

        for text in [
            "relay=energized\ncountdown=3\ntoggled=false\nrm -rf /=1\n",
            "relay=sideways\ncountdown=3\ntoggled=false\n",
            "relay=energized\ncountdown=-1\ntoggled=false\n",
            "relay=energized\n",
            "garbage",
        ] {
            fs::write(store.path(), text).unwrap();
            assert!(store.try_load().is_err(), "accepted {text:?}");
            assert_eq!(store.load(), RunState::initial(3));
        }
    }

    #[test]
    fn test_prepare_creates_directory() {
        let store = store(3);
        store.prepare().unwrap();

        let dir = store.path().parent().unwrap();
        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(dir).unwrap().count(), 0);
    }

    #[test]
    fn test_scratch_files_never_touch_record() {
        let dir = std::env::temp_dir().join(format!("linkguard-state-{}", uuid::Uuid::new_v4()));
        let state = RunState {
            relay: RelayState::Energized,
            countdown: 2,
            toggled: false,
        };

        // Record names that a bare extension swap would turn into scratch names.
        for name in ["runstate.check", "runstate.tmp"] {
            let store = RunStateStore::new(dir.join(name), 3);
            store.prepare().unwrap();
            store.save(&state, ConnectivityState::Down).unwrap();
            store.prepare().unwrap();
            store.save(&state, ConnectivityState::Down).unwrap();

            assert_eq!(store.try_load().unwrap(), Some(state), "lost {name}");
            assert_eq!(store.sibling("tmp"), dir.join(format!(".{name}.tmp")));
        }
    }

    #[test]
    fn test_countdown_clamped_to_threshold() {
        let store = store(2);
        store.prepare().unwrap();
        fs::write(store.path(), "relay=deenergized\ncountdown=9\ntoggled=false\n").unwrap();
        assert_eq!(store.load().countdown, 2);
    }
}
