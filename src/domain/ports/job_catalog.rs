use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::SourceError;
use crate::domain::models::{EntityId, EntityState};

/// Port for listing jobs and their task states, consumed by the metric monitor
///
/// `changed_since` lets the monitor fetch only tasks whose state changed after a
/// point in time once it has seen a job's full task list.
#[async_trait]
pub trait JobCatalog: Send + Sync {
    /// List the ids of every job in the account
    async fn list_jobs(&self) -> Result<Vec<String>, SourceError>;

    /// List task ids and states for a job
    ///
    /// # Arguments
    ///
    /// * `job` - Job to list
    /// * `changed_since` - When set, only tasks whose state changed after this time
    async fn list_tasks(
        &self,
        job: &str,
        changed_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<(EntityId, EntityState)>, SourceError>;
}
