//! Logging subsystem for SealText
//!
//! A `tracing` subscriber with an `EnvFilter` (honouring `RUST_LOG`) and a
//! `fmt` layer writing to stderr, in plain text or JSON. Standard output is
//! left to the presentation layer.

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

/// Configuration for the logging subsystem
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// The minimum log level to display
    pub level: LogLevel,
    /// Whether to include timestamps
    pub with_timestamp: bool,
    /// Whether to include target module information
    pub with_target: bool,
    /// Whether to use JSON formatting
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamp: true,
            with_target: true,
            json_format: false,
        }
    }
}

impl LogConfig {
    /// Create a new LogConfig with specified level
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Build from the `[logging]` section of the configuration file
    pub fn from_settings(settings: &LoggingConfig) -> Result<Self, LoggingError> {
        let level = LogLevel::from_str(&settings.level).ok_or_else(|| {
            LoggingError::InvalidConfiguration(format!("unknown level {:?}", settings.level))
        })?;
        Ok(Self::new(level)
            .with_timestamp(settings.with_timestamp)
            .with_target(settings.with_target)
            .json_format(settings.json_format))
    }

    /// Set whether to include timestamps
    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.with_timestamp = enabled;
        self
    }

    /// Set whether to include target information
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Set whether to use JSON formatting
    pub fn json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }
}

/// Initialize the logging subsystem with default configuration
///
/// # Example
/// ```
/// use sealtext_core::logging::init_logging;
///
/// init_logging().expect("Failed to initialize logging");
/// ```
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize the logging subsystem with custom configuration
///
/// # Example
/// ```
/// use sealtext_core::logging::{init_logging_with_config, LogConfig, LogLevel};
///
/// let config = LogConfig::new(LogLevel::Debug)
///     .with_timestamp(true)
///     .with_target(false);
///
/// init_logging_with_config(config).expect("Failed to initialize logging");
/// ```
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let base = fmt::layer().with_writer(std::io::stderr).with_target(config.with_target);
    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> =
        match (config.json_format, config.with_timestamp) {
            (true, true) => base.json().boxed(),
            (true, false) => base.json().without_time().boxed(),
            (false, true) => base.boxed(),
            (false, false) => base.without_time().boxed(),
        };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}
