//! Metric monitor passes against the scripted job catalog.

mod common;

use std::sync::Arc;
use std::time::Duration;

use batchwatch::domain::models::EntityState;
use batchwatch::infrastructure::simulation::ScriptedCatalog;
use batchwatch::services::{MetricMonitor, MetricMonitorConfig};

use common::setup_test_logging;

fn config() -> MetricMonitorConfig {
    MetricMonitorConfig {
        monitor_interval: Duration::from_millis(20),
        max_clock_skew: Duration::from_secs(30),
        job_concurrency: 2,
    }
}

#[tokio::test]
async fn test_counts_follow_task_changes() {
    setup_test_logging();
    let catalog = Arc::new(ScriptedCatalog::new());
    for i in 0..4 {
        catalog.set_task("job-a", format!("t{i}"), EntityState::Running);
    }
    catalog.set_task("job-b", "t0", EntityState::Pending);

    let mut monitor = MetricMonitor::new(catalog.clone(), config()).unwrap();
    let first = monitor.collect_once().await;
    assert!(!first.is_error());
    assert_eq!(first.jobs["job-a"].counts.get(EntityState::Running), 4);
    assert_eq!(first.totals().total(), 5);

    catalog.set_task("job-a", "t0", EntityState::Completed);
    catalog.set_task("job-a", "t4", EntityState::Pending);
    let second = monitor.collect_once().await;
    let job_a = &second.jobs["job-a"].counts;
    assert_eq!(job_a.get(EntityState::Running), 3);
    assert_eq!(job_a.get(EntityState::Completed), 1);
    assert_eq!(job_a.get(EntityState::Pending), 1);
    assert_eq!(job_a.total(), 5);

    // First listing per job is full, later ones are bounded
    let listings = catalog.listings();
    assert!(listings
        .iter()
        .filter(|(job, _)| job == "job-a")
        .take(1)
        .all(|(_, since)| since.is_none()));
    assert!(listings
        .iter()
        .filter(|(job, _)| job == "job-a")
        .skip(1)
        .all(|(_, since)| since.is_some()));
}

#[tokio::test]
async fn test_failed_listing_recovers() {
    let catalog = Arc::new(ScriptedCatalog::new());
    catalog.set_task("job-a", "t0", EntityState::Running);
    catalog.fail_job("job-a", true);

    let mut monitor = MetricMonitor::new(catalog.clone(), config()).unwrap();
    let failed = monitor.collect_once().await;
    assert!(failed.is_error());
    assert!(failed.jobs.is_empty());

    catalog.fail_job("job-a", false);
    let recovered = monitor.collect_once().await;
    assert!(!recovered.is_error());
    assert_eq!(recovered.jobs["job-a"].counts.total(), 1);

    // A failed pass leaves no listing mark, so the retry is a full listing
    let last = catalog.listings().pop().unwrap();
    assert_eq!(last, ("job-a".to_string(), None));
}

#[tokio::test]
async fn test_removed_jobs_are_dropped() {
    let catalog = Arc::new(ScriptedCatalog::new());
    catalog.set_task("keep", "t0", EntityState::Completed);
    catalog.set_task("gone", "t0", EntityState::Completed);

    let mut monitor = MetricMonitor::new(catalog.clone(), config()).unwrap();
    monitor.collect_once().await;
    assert_eq!(monitor.tracked_jobs(), 2);

    catalog.remove_job("gone");
    let event = monitor.collect_once().await;
    assert_eq!(monitor.tracked_jobs(), 1);
    assert!(!event.jobs.contains_key("gone"));
}

#[tokio::test]
async fn test_handle_publishes_updates() {
    let catalog = Arc::new(ScriptedCatalog::new());
    catalog.set_task("job-a", "t0", EntityState::Running);

    let handle = MetricMonitor::new(catalog.clone(), config()).unwrap().start();
    let mut updates = handle.subscribe();

    tokio::time::timeout(Duration::from_secs(5), updates.wait_for(Option::is_some))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        handle.current().unwrap().jobs["job-a"].counts.get(EntityState::Running),
        1
    );

    catalog.set_task("job-a", "t0", EntityState::Completed);
    tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|event| {
            event
                .as_ref()
                .is_some_and(|e| e.jobs["job-a"].counts.get(EntityState::Completed) == 1)
        }),
    )
    .await
    .unwrap()
    .unwrap();

    handle.shutdown().await;
}
