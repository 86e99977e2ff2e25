//! Service layer
//!
//! Convergence polling (retry classifier, work queue, poll workers, monitor)
//! and task-state metric collection.

pub mod convergence_monitor;
pub mod metric_monitor;
pub mod poll_worker;
pub mod retry_classifier;
pub mod state_cache;
pub mod work_queue;

pub use convergence_monitor::{wait_all, ConvergenceMonitor, WaitOptions};
pub use metric_monitor::{MetricMonitor, MetricMonitorConfig, MetricMonitorHandle};
pub use poll_worker::{CountPredicate, PollRules, Tally};
pub use retry_classifier::{CodeClassifier, ErrorClass, RetryClassifier};
pub use state_cache::StateCache;
pub use work_queue::{QueueCancelled, WorkItem, WorkQueue};
