//! Logging initialization using the `tracing` ecosystem.
//!
//! Provides:
//! - Console output (colored human-readable, or JSON lines)
//! - File output (daily rotation via `tracing-appender`)
//! - Configurable log level via env var `RUST_LOG` or [`LoggingConfig::level`]

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;
use crate::error::{FhubError, Result};

/// Initialize the global tracing subscriber.
///
/// Should be called once at program start by the application, never by the
/// library. A second call returns [`FhubError::Config`] instead of panicking.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let console_layer = if config.json {
        fmt::layer().json().with_target(true).with_thread_ids(true).boxed()
    } else {
        fmt::layer().with_target(true).with_thread_ids(true).with_ansi(true).boxed()
    };

    let file_layer = config.log_dir.as_deref().map(|dir| {
        let file_appender = tracing_appender::rolling::daily(dir, &config.module_name);
        fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| FhubError::Config(format!("logging already initialized: {e}")))
}
