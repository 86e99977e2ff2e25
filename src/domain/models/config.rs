use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::infrastructure::logging::LogConfig;

/// Main configuration structure for batchwatch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Convergence poller defaults
    #[serde(default)]
    pub poller: PollerConfig,

    /// Metric monitor settings
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LogConfig,
}

/// Defaults applied to every convergence wait
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PollerConfig {
    /// Global deadline for a wait, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay before re-polling a not-yet-converged entity, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of concurrent poll workers (1-256)
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Deadline for a single state request, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

const fn default_timeout_secs() -> u64 {
    300
}

const fn default_poll_interval_ms() -> u64 {
    5_000
}

const fn default_parallelism() -> usize {
    5
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            parallelism: default_parallelism(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl PollerConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Metric monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricsConfig {
    /// Interval between collection passes, in seconds
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,

    /// Allowance for clock skew between this host and the service, in seconds
    #[serde(default = "default_max_clock_skew_secs")]
    pub max_clock_skew_secs: u64,

    /// Jobs collected concurrently within one pass
    #[serde(default = "default_job_concurrency")]
    pub job_concurrency: usize,
}

const fn default_monitor_interval_secs() -> u64 {
    60
}

const fn default_max_clock_skew_secs() -> u64 {
    30
}

const fn default_job_concurrency() -> usize {
    4
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            monitor_interval_secs: default_monitor_interval_secs(),
            max_clock_skew_secs: default_max_clock_skew_secs(),
            job_concurrency: default_job_concurrency(),
        }
    }
}
