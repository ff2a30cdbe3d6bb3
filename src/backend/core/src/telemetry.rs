//! Structured logging with JSON/pretty formats.
//!
//! JSON format for production environments, pretty format for development,
//! and an `EnvFilter`-driven level configuration (`RUST_LOG` wins over the
//! configured level).

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty, or compact)
    #[serde(default)]
    pub format: LogFormat,

    /// Whether to include target (module path)
    #[serde(default = "default_include_target")]
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            include_target: default_include_target(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for production/structured logging
    #[default]
    Json,
    /// Pretty format for development
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<&crate::config::ObservabilityConfig> for LoggingConfig {
    fn from(config: &crate::config::ObservabilityConfig) -> Self {
        Self {
            level: config.log_level.clone(),
            format: if config.json_logging {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
            include_target: default_include_target(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_include_target() -> bool {
    true
}

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once; only the first call installs a subscriber
/// (subsequent calls are no-ops, which keeps tests independent).
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.include_target);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized; keeping existing subscriber");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_json_info() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.include_target);
    }

    #[test]
    fn format_deserializes_lowercase() {
        let config: LoggingConfig =
            serde_json::from_value(serde_json::json!({"level": "debug", "format": "pretty"}))
                .unwrap();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn observability_config_maps_onto_logging_config() {
        let mut observability = crate::config::ObservabilityConfig::default();
        observability.log_level = "debug".to_string();
        observability.json_logging = false;

        let config = LoggingConfig::from(&observability);
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn repeated_initialization_does_not_panic() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
