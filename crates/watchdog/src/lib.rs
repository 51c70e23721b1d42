//! # linkguard-watchdog
//!
//! Ties the probes, the relay and the telemetry publisher together into one
//! invocation of the watchdog. The process is short-lived and driven by an
//! external scheduler; everything that must survive between invocations
//! lives in the run-state file.

mod error;
pub mod machine;
pub mod pipeline;
pub mod run_state;

pub use error::WatchdogError;
pub use machine::{transition, PowerCycleAction, PowerCycleMachine, StepOutcome};
pub use pipeline::{RunReport, TelemetryReport, Watchdog};
pub use run_state::{RunState, RunStateStore, StateError};
