//! Ramp execution for loadramp: load drivers, the ramp engine, run
//! recording and the service facade used by the REST API.

mod config;
pub mod driver;
mod engine;
mod error;
mod recorder;
mod service;

pub use config::{
    Config, ConfigError, DriverSettings, LoggingConfig, ServerConfig, StorageConfig,
    DEFAULT_CONFIG_FILE,
};
pub use driver::{DriverConfig, HttpLoadDriver, LoadDriver};
pub use engine::{RampEngine, RampOutcome, RampRun};
pub use error::{CancelCause, RampError, ServiceError};
pub use recorder::RunRecorder;
pub use service::RampService;

// Cancellation tokens are part of the public API.
pub use tokio_util::sync::CancellationToken;
