//! TOML configuration loading
//!
//! ```toml
//! [queue]
//! max_capacity = 5000
//! retry_base_interval_ms = 500
//!
//! [manager]
//! idle_wait_ms = 50
//!
//! [delivery]
//! endpoint = "https://collector.example/ingest"
//! batch_mode = true
//!
//! [logging]
//! level = "debug"
//! format = "json"
//!
//! [pipeline]
//! drain_timeout_ms = 60000
//! ```
//!
//! Missing tables and keys fall back to their defaults. Command-line flags
//! are applied on top with [`AppConfig::apply_args`].

use crate::app::args::{Args, StatsFormat};
use crate::app::error::{AppError, AppResult};
use crate::processor::api::HttpDeliveryConfig;
use crate::queue::api::{ManagerConfig, QueueConfig};
use crate::queue::config::duration_ms;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_DIR_NAME: &str = "outflow";
pub const CONFIG_FILE_NAME: &str = "outflow.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<String>,
    pub color: Option<bool>,
}

/// Settings for the stdin pipeline itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Attempts to enqueue a record into a full queue before dropping it
    pub enqueue_attempts: usize,
    #[serde(rename = "enqueue_retry_delay_ms", with = "duration_ms")]
    pub enqueue_retry_delay: Duration,
    /// Bound on waiting for in-flight and retrying records after input ends
    #[serde(rename = "drain_timeout_ms", with = "duration_ms")]
    pub drain_timeout: Duration,
    /// Zero disables periodic statistics
    #[serde(rename = "stats_interval_ms", with = "duration_ms")]
    pub stats_interval: Duration,
    #[serde(skip)]
    pub stats_format: StatsFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enqueue_attempts: 5,
            enqueue_retry_delay: Duration::from_millis(200),
            drain_timeout: Duration::from_secs(30),
            stats_interval: Duration::from_secs(10),
            stats_format: StatsFormat::Table,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub queue: QueueConfig,
    pub manager: ManagerConfig,
    pub delivery: HttpDeliveryConfig,
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::named("outbound"),
            manager: ManagerConfig::default(),
            delivery: HttpDeliveryConfig::default(),
            logging: LoggingConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// `<config dir>/outflow/outflow.toml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

impl AppConfig {
    /// Load from `path`, or from the default location when it exists
    ///
    /// An explicitly named file must exist; a missing default file yields the
    /// built-in defaults.
    pub async fn load(path: Option<&Path>) -> AppResult<Self> {
        let path = match path {
            Some(path) if !path.exists() => {
                return Err(AppError::ConfigNotFound {
                    path: path.to_path_buf(),
                })
            }
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        log::debug!("Loading configuration from {}", path.display());
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| AppError::ConfigRead {
                path: path.clone(),
                source,
            })?;
        Self::from_toml_str(&contents).map_err(|message| AppError::ConfigParse { path, message })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    /// Command-line values win over file values
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(endpoint) = &args.endpoint {
            self.delivery.endpoint = endpoint.clone();
        }
        if let Some(token) = &args.bearer_token {
            self.delivery.bearer_token = Some(token.clone());
        }
        if args.batch {
            self.delivery.batch_mode = true;
        }
        if let Some(capacity) = args.capacity {
            self.queue.max_capacity = capacity;
        }
        if let Some(batch_size) = args.batch_size {
            self.queue.batch_size = batch_size;
        }
        if let Some(workers) = args.workers {
            self.queue.worker_count = workers;
        }
        if let Some(max_retries) = args.max_retries {
            self.queue.max_retries = max_retries;
        }
        if let Some(seconds) = args.drain_timeout {
            self.pipeline.drain_timeout = Duration::from_secs(seconds);
        }
        if let Some(seconds) = args.stats_interval {
            self.pipeline.stats_interval = Duration::from_secs(seconds);
        }
        if let Some(format) = args.stats_format {
            self.pipeline.stats_format = format;
        }
        if args.log_level.is_some() {
            self.logging.level = args.log_level.clone();
        }
        if args.log_format.is_some() {
            self.logging.format = args.log_format.clone();
        }
        if args.log_file.is_some() {
            self.logging.file = args.log_file.clone();
        }
        if let Some(color) = args.color_override() {
            self.logging.color = Some(color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.queue.name, "outbound");
    }

    #[test]
    fn test_tables_override_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [queue]
            max_capacity = 250
            retry_base_interval_ms = 250
            retry_max_interval_ms = 4000
            priority_enabled = true

            [manager]
            stop_timeout_ms = 1500

            [delivery]
            endpoint = "https://collector.example/ingest"
            batch_mode = true

            [logging]
            level = "debug"
            format = "json"

            [pipeline]
            drain_timeout_ms = 2000
            stats_interval_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.queue.max_capacity, 250);
        assert_eq!(config.queue.retry_base_interval, Duration::from_millis(250));
        assert_eq!(config.queue.retry_max_interval, Some(Duration::from_secs(4)));
        assert!(config.queue.priority_enabled);
        assert_eq!(config.queue.batch_size, QueueConfig::default().batch_size);
        assert_eq!(config.manager.stop_timeout, Duration::from_millis(1500));
        assert!(config.delivery.batch_mode);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        assert_eq!(config.pipeline.drain_timeout, Duration::from_secs(2));
        assert_eq!(config.pipeline.stats_interval, Duration::ZERO);
    }

    #[test]
    fn test_parse_error_reported() {
        let err = AppConfig::from_toml_str("[queue]\nmax_capacity = \"lots\"").unwrap_err();
        assert!(err.contains("invalid type"), "{}", err);
    }

    #[test]
    fn test_args_override_file_values() {
        let mut config = AppConfig::from_toml_str(
            "[queue]\nmax_capacity = 100\n[delivery]\nendpoint = \"http://file.example/in\"",
        )
        .unwrap();
        let args = Args::try_parse_from([
            "outflow",
            "--endpoint",
            "http://cli.example/in",
            "--capacity",
            "7",
            "--drain-timeout",
            "3",
            "--color",
        ])
        .unwrap();

        config.apply_args(&args);

        assert_eq!(config.delivery.endpoint, "http://cli.example/in");
        assert_eq!(config.queue.max_capacity, 7);
        assert_eq!(config.pipeline.drain_timeout, Duration::from_secs(3));
        assert_eq!(config.logging.color, Some(true));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[queue]\nworker_count = 3").unwrap();

        let config = AppConfig::load(Some(file.path())).await.unwrap();
        assert_eq!(config.queue.worker_count, 3);
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");

        match AppConfig::load(Some(&missing)).await {
            Err(AppError::ConfigNotFound { path }) => assert_eq!(path, missing),
            other => panic!("Expected ConfigNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_default_path_layout() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("outflow/outflow.toml"));
        }
    }
}
