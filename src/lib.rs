//! Batchwatch - convergence polling for batch compute services
//!
//! Waits until a set of remote entities (tasks, compute nodes) reach a target
//! state, fail, or run out of time, and tracks per-job task state counts.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and the ports remote services implement
//! - **Service Layer** (`services`): Convergence monitor, poll workers and metric monitor
//! - **Infrastructure Layer** (`infrastructure`): Configuration, logging and scripted adapters
//! - **CLI Layer** (`cli`): Table rendering for the demo binary
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use batchwatch::{wait_all, EntityState, EntityStateSource};
//!
//! # async fn example(source: Arc<dyn EntityStateSource>) -> anyhow::Result<()> {
//! let result = wait_all(
//!     source,
//!     ["task-1", "task-2"],
//!     EntityState::Completed,
//!     Duration::from_secs(60),
//! )
//! .await?;
//! println!("{} of {} completed", result.succeeded_count, result.total_seeded);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{MetricError, PollerError, PollerResult, SourceError};
pub use domain::models::{
    Config, ConvergenceResult, EntityFilter, EntityId, EntityState, MetricEvent, Observation,
    PollEvent, StateCounts, Termination,
};
pub use domain::ports::{EntityStateSource, JobCatalog};
pub use infrastructure::config::ConfigLoader;
pub use infrastructure::logging::{LogConfig, LoggerImpl};
pub use services::{
    wait_all, CodeClassifier, ConvergenceMonitor, MetricMonitor, MetricMonitorHandle,
    RetryClassifier, WaitOptions,
};
