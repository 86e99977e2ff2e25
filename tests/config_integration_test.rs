//! Configuration loading from files and environment.

use batchwatch::infrastructure::config::{ConfigError, ConfigLoader};
use batchwatch::infrastructure::logging::LogFormat;
use batchwatch::services::WaitOptions;
use batchwatch::EntityState;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_file_config_feeds_wait_options() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    fs::write(
        &path,
        "poller:\n  timeout_secs: 30\n  poll_interval_ms: 100\n  parallelism: 8\nlogging:\n  format: json\n",
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    let options = WaitOptions::from_config(&config.poller, EntityState::Completed);
    assert_eq!(options.timeout, Duration::from_secs(30));
    assert_eq!(options.poll_interval, Duration::from_millis(100));
    assert_eq!(options.degree_of_parallelism, 8);
    assert!(options.validate().is_ok());
}

#[test]
fn test_unknown_log_format_fails_extraction() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    fs::write(&path, "logging:\n  format: xml\n").unwrap();

    assert!(ConfigLoader::load_from_file(&path).is_err());
}

#[test]
fn test_env_parallelism_out_of_range() {
    temp_env::with_var("BATCHWATCH_POLLER__PARALLELISM", Some("1000"), || {
        let err = ConfigLoader::load().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::InvalidParallelism(1000))
        );
    });
}
