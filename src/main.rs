//! Batchwatch demo entry point.
//!
//! Replays a job-preparation rollout over a scripted pool of nodes and a small
//! metrics pass over a scripted job catalog.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use batchwatch::cli::display::{render_metrics, render_result};
use batchwatch::domain::models::{EntityFilter, EntityState, Observation};
use batchwatch::infrastructure::config::ConfigLoader;
use batchwatch::infrastructure::logging::{LogRetention, LoggerImpl};
use batchwatch::infrastructure::simulation::{ScriptedCatalog, ScriptedSource, Step};
use batchwatch::services::retry_classifier::JOB_PREP_NOT_RUN_ON_NODE;
use batchwatch::services::{ConvergenceMonitor, MetricMonitor, MetricMonitorConfig, WaitOptions};
use batchwatch::SourceError;

const DEMO_POOL: &str = "pool-demo";
const DEMO_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let _logger = LoggerImpl::init(&config.logging).context("Failed to initialize logging")?;

    if let Some(log_dir) = &config.logging.log_dir {
        LogRetention::new(config.logging.retention_days)
            .cleanup(log_dir)
            .await
            .context("Failed to clean up old log files")?;
    }

    let source = Arc::new(demo_pool());
    let (events_tx, mut events_rx) = mpsc::channel(64);
    let progress = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            debug!(?event, "progress");
        }
    });

    let options = WaitOptions::from_config(&config.poller, EntityState::Completed)
        .poll_interval(config.poller.poll_interval().min(DEMO_POLL_INTERVAL))
        .stop_when(|succeeded, failed| succeeded >= 2 || failed > 0)
        .succeed_when(|succeeded, _| succeeded >= 2)
        .events(events_tx);

    let result = ConvergenceMonitor::new(source.clone(), options)?
        .wait_listed(&EntityFilter::in_parent(DEMO_POOL))
        .await
        .context("Job preparation wait failed")?;
    progress.await.context("Progress reporter panicked")?;

    info!(
        succeeded = result.succeeded_count,
        failed = result.failed_count,
        reads = source.total_calls(),
        "job preparation wait finished"
    );
    println!("{}\n", render_result(&result));
    println!("{}\n", serde_json::to_string_pretty(&result)?);

    let catalog = Arc::new(demo_catalog());
    let mut metrics = MetricMonitor::new(catalog, MetricMonitorConfig::from(&config.metrics))?;
    let event = metrics.collect_once().await;
    println!("{}", render_metrics(&event));

    Ok(())
}

/// Four nodes: two finish preparation quickly, one is still running and one
/// has not started the preparation task yet.
fn demo_pool() -> ScriptedSource {
    let not_run = || -> Step {
        Err(SourceError::service(
            JOB_PREP_NOT_RUN_ON_NODE,
            "job preparation has not run on this node",
        ))
    };
    let running = || -> Step { Ok(Observation::new(EntityState::Running)) };
    let done = || -> Step { Ok(Observation::with_exit_code(EntityState::Completed, 0)) };

    ScriptedSource::new()
        .child(DEMO_POOL, "node-1", vec![running(), done()])
        .child(DEMO_POOL, "node-2", vec![not_run(), running(), running(), done()])
        .child(DEMO_POOL, "node-3", vec![not_run()])
        .child(DEMO_POOL, "node-4", vec![running()])
}

fn demo_catalog() -> ScriptedCatalog {
    let catalog = ScriptedCatalog::new();
    for i in 0..6 {
        let state = if i < 4 { EntityState::Completed } else { EntityState::Running };
        catalog.set_task("render-job", format!("frame-{i}"), state);
    }
    catalog.set_task("ingest-job", "shard-0", EntityState::Failed);
    catalog.set_task("ingest-job", "shard-1", EntityState::Pending);
    catalog
}
