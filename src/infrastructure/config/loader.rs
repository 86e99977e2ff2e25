use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Upper bound on poll workers per wait.
pub const MAX_PARALLELISM: usize = 256;

/// Configuration error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid poller.timeout_secs: must be greater than zero")]
    ZeroTimeout,

    #[error("Invalid poller.poll_interval_ms: must be greater than zero")]
    ZeroPollInterval,

    #[error("Invalid poller.parallelism: {0}. Must be between 1 and {MAX_PARALLELISM}")]
    InvalidParallelism(usize),

    #[error("Invalid poller.request_timeout_ms: must be greater than zero")]
    ZeroRequestTimeout,

    #[error("Invalid metrics.monitor_interval_secs: must be greater than zero")]
    ZeroMonitorInterval,

    #[error("Invalid metrics.job_concurrency: must be at least 1")]
    ZeroJobConcurrency,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .batchwatch/config.yaml (project config)
    /// 3. .batchwatch/local.yaml (local overrides, optional)
    /// 4. Environment variables (BATCHWATCH_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".batchwatch/config.yaml"))
            .merge(Yaml::file(".batchwatch/local.yaml"))
            .merge(Env::prefixed("BATCHWATCH_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let poller = &config.poller;
        if poller.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if poller.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if poller.parallelism == 0 || poller.parallelism > MAX_PARALLELISM {
            return Err(ConfigError::InvalidParallelism(poller.parallelism));
        }
        if poller.request_timeout_ms == 0 {
            return Err(ConfigError::ZeroRequestTimeout);
        }

        if config.metrics.monitor_interval_secs == 0 {
            return Err(ConfigError::ZeroMonitorInterval);
        }
        if config.metrics.job_concurrency == 0 {
            return Err(ConfigError::ZeroJobConcurrency);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}
