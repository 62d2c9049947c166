//! Structured logging.
//!
//! The library only emits `tracing` events; installing a subscriber is up
//! to the embedding binary. Logs go to stderr so stdout stays free for
//! command output.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?,
    }

    tracing::debug!(
        log_level = %config.log_level,
        log_format = ?config.log_format,
        "Logging initialized"
    );
    Ok(())
}
