//! Logging bootstrap for binaries and tests embedding the metrics core.

use crate::core::config::LoggingConfig;
use crate::core::{MetricsError, Result};

/// Environment variable overriding the configured log filter.
pub const LOG_ENV_VAR: &str = "URPO_METRICS_LOG";

/// Initialize a global tracing subscriber from `config`.
///
/// `URPO_METRICS_LOG` (then `RUST_LOG`) takes precedence over the configured
/// level. Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let fmt_layer = if config.structured {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .compact()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .compact()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| MetricsError::config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}
