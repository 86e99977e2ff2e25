//! Common test utilities for integration tests
//!
//! Provides shared fixtures used across multiple integration test files.

use std::sync::Arc;

use batchwatch::domain::models::{EntityState, Observation};
use batchwatch::infrastructure::simulation::{ScriptedSource, Step};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[allow(dead_code)]
pub fn state(state: EntityState) -> Step {
    Ok(Observation::new(state))
}

/// Source where every id returns `steps` in order.
#[allow(dead_code)]
pub fn uniform_source(ids: &[&str], steps: &[Step]) -> Arc<ScriptedSource> {
    let source = ids
        .iter()
        .fold(ScriptedSource::new(), |source, id| source.entity(*id, steps.to_vec()));
    Arc::new(source)
}
