use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prefix of every file the rolling appender writes; retention only touches
/// files named `batchwatch.log*`.
pub const LOG_FILE_PREFIX: &str = "batchwatch.log";

/// `logging` section of the batchwatch config.
///
/// Stdout follows `format`. The file layer, when `log_dir` is set, always
/// writes JSON lines regardless of `format`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum level; `RUST_LOG` directives refine it per target
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Stdout rendering only
    #[serde(default = "default_format")]
    pub format: LogFormat,

    /// Where `batchwatch.log*` files go; stdout is forced on when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Also log to stdout when writing files
    #[serde(default = "default_true")]
    pub enable_stdout: bool,

    /// How often the appender starts a new file
    #[serde(default)]
    pub rotation: RotationPolicy,

    /// Rolled files older than this are removed by `LogRetention` at startup
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

/// Stdout rendering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// File rollover cadence for `tracing-appender`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            log_dir: None,
            enable_stdout: true,
            rotation: RotationPolicy::default(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_format() -> LogFormat {
    LogFormat::Pretty
}

const fn default_true() -> bool {
    true
}

const fn default_retention_days() -> u32 {
    30
}
