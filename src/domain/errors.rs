//! Domain errors for the batchwatch system.

use std::time::Duration;

use thiserror::Error;

use super::models::EntityId;

/// Errors reported by a remote entity state source or job catalog.
///
/// Sources are expected to tell "not visible yet" apart from "gone": the
/// retry classifier never guesses between the two.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The entity exists but has not produced observable state yet.
    #[error("Entity {0} has no observable state yet")]
    NotYetVisible(EntityId),

    /// The entity was deleted or never existed.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The resource the entity lives in (pool, job) is gone.
    #[error("Parent resource not found: {0}")]
    ParentNotFound(String),

    /// A service error carrying the remote error code.
    #[error("Service error {code}: {message}")]
    Service { code: String, message: String },

    /// The request did not complete within the per-request timeout.
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// The request never reached the service.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The source does not implement the requested operation.
    #[error("Operation not supported by this source: {0}")]
    Unsupported(&'static str),
}

impl SourceError {
    /// Build a service error from a code and message.
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Remote error code, when the error carries one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Errors raised by the convergence monitor itself.
///
/// Timeouts and per-entity failures are data on the result, not errors. These
/// cover invalid arguments and failures to seed the wait.
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("Invalid timeout: {0:?}. Must be greater than zero")]
    InvalidTimeout(Duration),

    #[error("Invalid poll interval: {0:?}. Must be greater than zero")]
    InvalidPollInterval(Duration),

    #[error("Invalid degree of parallelism: {0}. Must be at least 1")]
    InvalidParallelism(usize),

    #[error("Invalid request timeout: {0:?}. Must be greater than zero")]
    InvalidRequestTimeout(Duration),

    #[error("Failed to list entities for seeding: {0}")]
    Listing(#[source] SourceError),

    #[error("Blocking wait called from inside an async runtime")]
    BlockingInsideRuntime,

    #[error("Failed to build runtime for blocking wait: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Errors raised by the metric monitor.
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("Invalid monitor interval: {0:?}. Must be greater than zero")]
    InvalidInterval(Duration),

    #[error("Invalid job concurrency: {0}. Must be at least 1")]
    InvalidJobConcurrency(usize),

    #[error("Failed to list jobs: {0}")]
    ListJobs(#[source] SourceError),

    #[error("Failed to list tasks for job {job}: {source}")]
    ListTasks {
        job: String,
        #[source]
        source: SourceError,
    },
}

pub type PollerResult<T> = Result<T, PollerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_code() {
        let err = SourceError::service("PoolNotFound", "pool p1 was deleted");
        assert_eq!(err.code(), Some("PoolNotFound"));
        assert_eq!(err.to_string(), "Service error PoolNotFound: pool p1 was deleted");
        assert_eq!(SourceError::Transport("reset".into()).code(), None);
    }

    #[test]
    fn test_list_tasks_error_message() {
        let err = MetricError::ListTasks {
            job: "job-1".to_string(),
            source: SourceError::ParentNotFound("job-1".to_string()),
        };
        assert!(err.to_string().contains("job-1"));
    }
}
