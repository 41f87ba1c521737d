//! Diagnostic logging through `tracing`.
//!
//! Logs go to stderr. `RUST_LOG` wins over the verbosity-derived default.

use crate::config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Builds the filter: `RUST_LOG` when set and valid, otherwise the verbosity default.
#[must_use]
pub fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter()))
}

/// Installs the global subscriber. Calling it twice is harmless.
pub fn init_logging(config: &Config) {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.is_verbose())
        .without_time();

    let _ = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(console)
        .try_init();
}
