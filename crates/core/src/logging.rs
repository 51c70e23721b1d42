//! Structured logging for linkguard.
//!
//! The watchdog's 0-4 logging intensity selects the default filter; the
//! `RUST_LOG` environment variable still overrides it. Output goes to stderr,
//! where cron or the systemd journal picks it up as the system log.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Map the configured logging intensity to a level filter.
///
/// 0 none, 1 error, 2 warning, 3 info, 4 full.
pub fn level_for(intensity: u8) -> LevelFilter {
    match intensity {
        0 => LevelFilter::OFF,
        1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        _ => LevelFilter::TRACE,
    }
}

fn filter_for(intensity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(intensity).to_string()))
}

/// Initialize human-readable logging.
///
/// # Example
/// ```no_run
/// use linkguard_core::logging;
///
/// logging::init(3);
/// tracing::info!("watchdog started");
/// ```
pub fn init(intensity: u8) {
    let _ = tracing_subscriber::registry()
        .with(filter_for(intensity))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init();
}

/// Initialize JSON logging for hosts that ship logs to an aggregator.
pub fn init_json(intensity: u8) {
    let _ = tracing_subscriber::registry()
        .with(filter_for(intensity))
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intensity_mapping() {
        assert_eq!(level_for(0), LevelFilter::OFF);
        assert_eq!(level_for(1), LevelFilter::ERROR);
        assert_eq!(level_for(2), LevelFilter::WARN);
        assert_eq!(level_for(3), LevelFilter::INFO);
        assert_eq!(level_for(4), LevelFilter::TRACE);
        assert_eq!(level_for(9), LevelFilter::TRACE);
    }

    #[test]
    fn test_init_doesnt_panic() {
        // Only the first initialization in a process installs a subscriber
        init(2);
        init_json(2);
    }
}
