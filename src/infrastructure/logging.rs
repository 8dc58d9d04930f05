//! Logging system configuration and initialization
//!
//! Builds a tracing subscriber with an env-filter derived from
//! `RUST_LOG` (falling back to the configured level). Installation is
//! best-effort so repeated initialization, e.g. across tests, is harmless.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

pub use super::config::LoggingConfig;

/// Initialize the logging system with default configuration
pub fn init_logging() {
    init_logging_with_config(&LoggingConfig::default());
}

/// Initialize the logging system from configuration
pub fn init_logging_with_config(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    if config.json_output {
        let _ = Registry::default()
            .with(filter)
            .with(fmt::layer().json())
            .try_init();
    } else {
        let _ = Registry::default()
            .with(filter)
            .with(fmt::layer())
            .try_init();
    }
}
