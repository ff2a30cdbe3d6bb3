//! Configuration management.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main ledger configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerConfig {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path of the append-only event log file
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Directory holding one snapshot file per aggregate
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

impl StorageConfig {
    /// Storage layout rooted under a single data directory.
    pub fn rooted_at(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            log_path: dir.join("events.jsonl"),
            snapshot_dir: dir.join("snapshots"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
        }
    }
}

// Default value functions
fn default_log_path() -> PathBuf { PathBuf::from("data/events.jsonl") }
fn default_snapshot_dir() -> PathBuf { PathBuf::from("data/snapshots") }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("LEDGER").separator("__"))
            .build()?;

        let cfg: LedgerConfig = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("LEDGER").separator("__"))
            .build()?;

        let cfg: LedgerConfig = config.try_deserialize()?;
        Ok(cfg)
    }
}
