//! Domain layer for batchwatch
//!
//! This module contains the core types and the ports to remote services.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{MetricError, PollerError, PollerResult, SourceError};
