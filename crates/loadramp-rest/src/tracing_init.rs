//! Logging initialization
//!
//! Installs a global `tracing` subscriber configured from the `[logging]`
//! section. `RUST_LOG`, when set, takes precedence over the configured level.
//!
//! # Example
//! ```no_run
//! use loadramp_rest::tracing_init;
//! use loadramp_service::LoggingConfig;
//!
//! tracing_init::init_tracing(&LoggingConfig::default())
//!     .expect("Failed to initialize tracing");
//! ```

use loadramp_service::LoggingConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Filter directives for `level`: the given level for everything, plus the
/// same level for the loadramp crates.
pub fn filter_directives(level: &str) -> String {
    format!("{level},loadramp_service={level},loadramp_storage={level}")
}

/// Initialize the global subscriber.
///
/// # Errors
///
/// Fails if the filter cannot be parsed or a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(&config.level))?,
    };

    let registry = Registry::default().with(env_filter);

    if config.format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(true),
            )
            .try_init()?;
    }

    Ok(())
}
