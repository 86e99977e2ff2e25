//! Retention cleanup for rolled log files

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use tracing::{debug, info, warn};

use super::config::LOG_FILE_PREFIX;

/// Deletes rolled log files older than the retention period
#[derive(Debug, Clone, Copy)]
pub struct LogRetention {
    retention_days: u32,
}

impl LogRetention {
    pub const fn new(retention_days: u32) -> Self {
        Self { retention_days }
    }

    /// Delete log files in `log_dir` last modified before the cutoff
    ///
    /// Only files named after the rolling appender's prefix are considered.
    ///
    /// # Returns
    /// Number of files deleted
    pub async fn cleanup(&self, log_dir: impl AsRef<Path>) -> Result<usize> {
        let log_dir = log_dir.as_ref();

        if !log_dir.exists() {
            warn!(path = %log_dir.display(), "log directory does not exist");
            return Ok(0);
        }

        let cutoff = Utc::now() - Duration::days(i64::from(self.retention_days));
        let mut deleted = 0;

        let mut entries = tokio::fs::read_dir(log_dir)
            .await
            .context("failed to read log directory")?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .context("failed to read directory entry")?
        {
            let path = entry.path();
            let is_log = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
            if !is_log {
                continue;
            }

            let modified: DateTime<Utc> = entry
                .metadata()
                .await
                .context("failed to get file metadata")?
                .modified()
                .context("failed to get file modification time")?
                .into();

            if modified < cutoff {
                tokio::fs::remove_file(&path)
                    .await
                    .context("failed to delete old log file")?;
                debug!(path = %path.display(), "deleted old log file");
                deleted += 1;
            }
        }

        if deleted > 0 {
            info!(count = deleted, "cleaned up old log files");
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration as StdDuration, SystemTime};
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, age_days: u64) {
        let file = File::create(dir.join(name)).unwrap();
        let modified = SystemTime::now() - StdDuration::from_secs(age_days * 86_400);
        file.set_modified(modified).unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_old_log_files() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "batchwatch.log.2020-01-01", 40);
        touch(temp_dir.path(), "batchwatch.log.2026-10-15", 1);
        touch(temp_dir.path(), "notes.txt", 40);

        let deleted = LogRetention::new(30).cleanup(temp_dir.path()).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(!temp_dir.path().join("batchwatch.log.2020-01-01").exists());
        assert!(temp_dir.path().join("batchwatch.log.2026-10-15").exists());
        assert!(temp_dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_cleanup_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert_eq!(LogRetention::new(7).cleanup(&missing).await.unwrap(), 0);
    }
}
