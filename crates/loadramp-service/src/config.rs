//! Configuration management for the loadramp server.
//!
//! Supports multiple configuration sources with precedence:
//! 1. Environment variables (highest priority)
//! 2. TOML configuration file
//! 3. Default values (lowest priority)

use crate::driver::DriverConfig;
use loadramp_storage::{S3Config, StoreBackend};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "loadramp.toml";

/// Main configuration structure.
///
/// Can be loaded from TOML file or constructed with defaults.
/// Environment variables override TOML settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// Where run results are kept
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP load driver settings
    #[serde(default)]
    pub driver: DriverSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration (host, port)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// REST API port (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Run store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend: memory, filesystem or mirrored (default: "filesystem")
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Directory holding one JSON file per run (default: "./runs")
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    /// S3 bucket receiving mirrored runs (mirrored backend only)
    #[serde(default)]
    pub bucket: Option<String>,

    /// AWS region (default: "us-east-1")
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom S3-compatible endpoint, e.g. MinIO
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    /// Object key prefix for mirrored runs
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Load driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverSettings {
    /// Upper bound on requests issued by one step (default: 1_000_000)
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,

    /// Per-request timeout in seconds (default: 20)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Highest concurrency a ramp may reach (default: 10_000)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty (default: "pretty")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_backend() -> String {
    "filesystem".to_string()
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./runs")
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_max_requests() -> u64 {
    DriverConfig::default().max_requests
}

fn default_request_timeout() -> u64 {
    DriverConfig::default().request_timeout.as_secs()
}

fn default_max_concurrency() -> usize {
    DriverConfig::default().max_concurrency
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_storage_path(),
            bucket: None,
            region: default_region(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            prefix: None,
        }
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            request_timeout_secs: default_request_timeout(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file doesn't exist or has invalid TOML syntax.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::TomlError { path, source: e })
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Reads the file named by `LOADRAMP_CONFIG`, else `loadramp.toml` if it
    /// exists, else starts from defaults. See [`Config::apply_env_overrides`]
    /// for the supported variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("LOADRAMP_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            Err(_) => Self::default(),
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `LOADRAMP_HOST`, `LOADRAMP_PORT`
    /// - `LOADRAMP_STORAGE_BACKEND`, `LOADRAMP_STORAGE_PATH`
    /// - `LOADRAMP_S3_BUCKET`, `LOADRAMP_S3_REGION`, `LOADRAMP_S3_ENDPOINT`,
    ///   `LOADRAMP_S3_ACCESS_KEY`, `LOADRAMP_S3_SECRET_KEY`, `LOADRAMP_S3_PREFIX`
    /// - `LOADRAMP_MAX_REQUESTS`, `LOADRAMP_REQUEST_TIMEOUT_SECS`,
    ///   `LOADRAMP_MAX_CONCURRENCY`
    /// - `LOADRAMP_LOG_LEVEL`, `LOADRAMP_LOG_FORMAT`
    ///
    /// Numeric values that fail to parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("LOADRAMP_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("LOADRAMP_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(backend) = std::env::var("LOADRAMP_STORAGE_BACKEND") {
            self.storage.backend = backend;
        }

        if let Ok(path) = std::env::var("LOADRAMP_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }

        if let Ok(bucket) = std::env::var("LOADRAMP_S3_BUCKET") {
            self.storage.bucket = Some(bucket);
        }

        if let Ok(region) = std::env::var("LOADRAMP_S3_REGION") {
            self.storage.region = region;
        }

        if let Ok(endpoint) = std::env::var("LOADRAMP_S3_ENDPOINT") {
            self.storage.endpoint = Some(endpoint);
        }

        if let Ok(access_key) = std::env::var("LOADRAMP_S3_ACCESS_KEY") {
            self.storage.access_key = Some(access_key);
        }

        if let Ok(secret_key) = std::env::var("LOADRAMP_S3_SECRET_KEY") {
            self.storage.secret_key = Some(secret_key);
        }

        if let Ok(prefix) = std::env::var("LOADRAMP_S3_PREFIX") {
            self.storage.prefix = Some(prefix);
        }

        if let Ok(max) = std::env::var("LOADRAMP_MAX_REQUESTS") {
            if let Ok(max) = max.parse() {
                self.driver.max_requests = max;
            }
        }

        if let Ok(timeout) = std::env::var("LOADRAMP_REQUEST_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse() {
                self.driver.request_timeout_secs = timeout;
            }
        }

        if let Ok(max) = std::env::var("LOADRAMP_MAX_CONCURRENCY") {
            if let Ok(max) = max.parse() {
                self.driver.max_concurrency = max;
            }
        }

        if let Ok(level) = std::env::var("LOADRAMP_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("LOADRAMP_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be non-zero".to_string(),
            ));
        }

        let valid_backends = ["memory", "filesystem", "mirrored"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "storage.backend must be one of: {}",
                valid_backends.join(", ")
            )));
        }

        if self.storage.backend != "memory" && self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.path cannot be empty".to_string(),
            ));
        }

        if self.storage.backend == "mirrored"
            && self.storage.bucket.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::ValidationError(
                "storage.bucket is required for the mirrored backend".to_string(),
            ));
        }

        if self.driver.max_requests == 0 {
            return Err(ConfigError::ValidationError(
                "driver.max_requests must be > 0".to_string(),
            ));
        }

        if self.driver.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "driver.request_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.driver.max_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "driver.max_concurrency must be > 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be one of: {}",
                valid_formats.join(", ")
            )));
        }

        Ok(())
    }

    /// Run store selected by the `[storage]` section.
    pub fn store_backend(&self) -> Result<StoreBackend, ConfigError> {
        let storage = &self.storage;
        match storage.backend.as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "filesystem" => Ok(StoreBackend::Filesystem {
                path: storage.path.clone(),
            }),
            "mirrored" => {
                let bucket = storage.bucket.clone().ok_or_else(|| {
                    ConfigError::ValidationError(
                        "storage.bucket is required for the mirrored backend".to_string(),
                    )
                })?;
                let s3 = S3Config {
                    bucket,
                    region: storage.region.clone(),
                    endpoint: storage.endpoint.clone(),
                    access_key: storage.access_key.clone(),
                    secret_key: storage.secret_key.clone(),
                    prefix: storage.prefix.clone(),
                };
                Ok(StoreBackend::Mirrored {
                    path: storage.path.clone(),
                    s3,
                })
            }
            other => Err(ConfigError::ValidationError(format!(
                "unknown storage.backend `{}`",
                other
            ))),
        }
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            max_requests: self.driver.max_requests,
            request_timeout: Duration::from_secs(self.driver.request_timeout_secs),
            max_concurrency: self.driver.max_concurrency,
        }
    }

    /// `host:port` the server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file
    #[error("Failed to read config file {path:?}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("Failed to parse TOML in {path:?}: {source}")]
    TomlError {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Validation error
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, "filesystem");
        assert_eq!(config.driver.request_timeout_secs, 20);
        assert_eq!(config.driver.max_concurrency, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [storage]
            backend = "mirrored"
            path = "/var/lib/loadramp"
            bucket = "ramps"
            endpoint = "http://localhost:9000"
            prefix = "nightly"

            [driver]
            max_requests = 5000
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.driver.max_requests, 5000);
        assert_eq!(config.driver.request_timeout_secs, 20);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());

        match config.store_backend().unwrap() {
            StoreBackend::Mirrored { path, s3 } => {
                assert_eq!(path, PathBuf::from("/var/lib/loadramp"));
                assert_eq!(s3.bucket, "ramps");
                assert_eq!(s3.region, "us-east-1");
                assert_eq!(s3.full_key("a.json"), "nightly/a.json");
            }
            other => panic!("expected mirrored backend, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.store_backend().unwrap(),
            StoreBackend::Filesystem {
                path: PathBuf::from("./runs")
            }
        );
    }

    #[test]
    fn test_validation_rejects_unknown_backend() {
        let mut config = Config::default();
        config.storage.backend = "redis".to_string();

        let result = config.validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("storage.backend must be one of"));
        assert!(config.store_backend().is_err());
    }

    #[test]
    fn test_validation_requires_bucket_for_mirror() {
        let mut config = Config::default();
        config.storage.backend = "mirrored".to_string();
        assert!(config.validate().is_err());

        config.storage.bucket = Some("ramps".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        let result = config.validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("logging.format must be"));
    }

    #[test]
    fn test_driver_config() {
        let mut config = Config::default();
        config.driver.max_requests = 10;
        config.driver.request_timeout_secs = 3;
        config.driver.max_concurrency = 200;

        let driver = config.driver_config();
        assert_eq!(driver.max_requests, 10);
        assert_eq!(driver.request_timeout, Duration::from_secs(3));
        assert_eq!(driver.max_concurrency, 200);

        config.driver.max_requests = 0;
        assert!(config.validate().is_err());

        config.driver.max_requests = 10;
        config.driver.max_concurrency = 0;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("driver.max_concurrency must be > 0"));
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file("/nonexistent/loadramp.toml");
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }

    #[test]
    fn test_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("loadramp.toml");
        std::fs::write(&path, "[storage]\nbackend = \"memory\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.store_backend().unwrap(), StoreBackend::Memory);

        std::fs::write(&path, "[storage\n").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::TomlError { .. })
        ));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("LOADRAMP_PORT", "9999");
        std::env::set_var("LOADRAMP_STORAGE_BACKEND", "memory");
        std::env::set_var("LOADRAMP_MAX_REQUESTS", "not-a-number");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.server.port, 9999);
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.driver.max_requests, default_max_requests());

        // Clean up
        std::env::remove_var("LOADRAMP_PORT");
        std::env::remove_var("LOADRAMP_STORAGE_BACKEND");
        std::env::remove_var("LOADRAMP_MAX_REQUESTS");
    }
}
