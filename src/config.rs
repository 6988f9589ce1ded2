use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::cache::{DEFAULT_MAX_ENTRIES, ENTITY_TTL_SECS};
use crate::queue::QueueConfig;
use crate::settlement::{RetryPolicy, SweepConfig, WorkerConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL. Absent: in-process store and queue.
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub worker: WorkerSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    pub entity_ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entity_ttl_secs: ENTITY_TTL_SECS,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Settlement worker and queue tuning
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WorkerSettings {
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    pub max_conflict_retries: u32,
    pub stale_threshold_secs: u64,
    pub sweep_interval_secs: u64,
    pub result_ttl_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval_ms: 200,
            max_conflict_retries: 3,
            stale_threshold_secs: 300,
            sweep_interval_secs: 30,
            result_ttl_secs: 3600,
        }
    }
}

impl WorkerSettings {
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            concurrency: self.concurrency,
        }
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            result_ttl: Duration::from_secs(self.result_ttl_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_conflict_retries: self.max_conflict_retries,
            ..RetryPolicy::default()
        }
    }

    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            stale_threshold: Duration::from_secs(self.stale_threshold_secs),
        }
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        Self::from_file(format!("config/{}.yaml", env))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().display().to_string();
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .map_err(|source| ConfigError::Parse { path, source })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.concurrency == 0 {
            return Err(ConfigError::Invalid("worker.concurrency must be > 0".into()));
        }
        if self.worker.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "worker.poll_interval_ms must be > 0".into(),
            ));
        }
        if self.cache.entity_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache.entity_ttl_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
log_level: info
log_dir: ./logs
log_file: stocksettle.log
use_json: false
rotation: daily
gateway:
  host: 0.0.0.0
  port: 8080
"#;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert!(config.postgres_url.is_none());
        assert_eq!(config.cache.entity_ttl_secs, 60);
        assert_eq!(config.worker.result_ttl_secs, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_worker_section() {
        let yaml = format!("{}worker:\n  concurrency: 8\n", MINIMAL);
        let config: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.worker.concurrency, 8);
        assert_eq!(config.worker.stale_threshold_secs, 300);
        assert_eq!(
            config.worker.sweep_config().stale_threshold,
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let yaml = format!("{}worker:\n  concurrency: 0\n", MINIMAL);
        let config: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file("config/does-not-exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_repo_dev_config_parses() {
        let config = AppConfig::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/config/dev.yaml"))
            .unwrap();
        assert_eq!(config.gateway.port, 8080);
    }
}
