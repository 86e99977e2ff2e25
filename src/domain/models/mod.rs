//! Domain models
//!
//! Entities, poll outcomes, metric snapshots and configuration structs.

pub mod config;
pub mod entity;
pub mod metrics;
pub mod outcome;

pub use config::{Config, MetricsConfig, PollerConfig};
pub use entity::{EntityFilter, EntityId, EntityState, Observation};
pub use metrics::{JobMetrics, Latency, MetricEvent, StateCounts};
pub use outcome::{ConvergenceResult, MonitorPhase, PollEvent, PollOutcome, Termination};
