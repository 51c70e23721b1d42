//! Probe error types

use thiserror::Error;

/// Errors that abort a probe outright.
///
/// A host that does not answer is not an error; it is a Down reading.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe utility could not be started at all
    #[error("probe command '{command}' is unavailable: {source}")]
    CommandUnavailable {
        /// Program that failed to spawn
        command: String,
        /// Underlying spawn error
        source: std::io::Error,
    },
}
