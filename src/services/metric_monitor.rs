//! Periodic task-state metrics for every job in an account.
//!
//! Each pass lists the jobs, then lists task states per job. The first pass over
//! a job fetches every task; later passes only fetch tasks whose state changed
//! since the previous listing of that job started, minus an allowance for clock
//! skew. Cached states are aggregated into per-state counts and published as a
//! [`MetricEvent`] through a `watch` channel.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::errors::{MetricError, SourceError};
use crate::domain::models::{JobMetrics, Latency, MetricEvent, MetricsConfig};
use crate::domain::ports::JobCatalog;
use crate::services::state_cache::StateCache;

/// Configuration for the metric monitor.
#[derive(Debug, Clone)]
pub struct MetricMonitorConfig {
    /// Interval between collection passes.
    pub monitor_interval: Duration,
    /// Allowance for clock skew when asking for changed tasks.
    pub max_clock_skew: Duration,
    /// Jobs listed concurrently within one pass.
    pub job_concurrency: usize,
}

impl Default for MetricMonitorConfig {
    fn default() -> Self {
        Self::from(&MetricsConfig::default())
    }
}

impl From<&MetricsConfig> for MetricMonitorConfig {
    fn from(config: &MetricsConfig) -> Self {
        Self {
            monitor_interval: Duration::from_secs(config.monitor_interval_secs),
            max_clock_skew: Duration::from_secs(config.max_clock_skew_secs),
            job_concurrency: config.job_concurrency,
        }
    }
}

/// Collects job metrics from a [`JobCatalog`].
pub struct MetricMonitor {
    catalog: Arc<dyn JobCatalog>,
    config: MetricMonitorConfig,
    clock_skew: chrono::Duration,
    caches: HashMap<String, StateCache>,
}

struct JobPass {
    job: String,
    cache: StateCache,
    result: Result<Duration, SourceError>,
}

impl MetricMonitor {
    pub fn new(
        catalog: Arc<dyn JobCatalog>,
        config: MetricMonitorConfig,
    ) -> Result<Self, MetricError> {
        if config.monitor_interval.is_zero() {
            return Err(MetricError::InvalidInterval(config.monitor_interval));
        }
        if config.job_concurrency == 0 {
            return Err(MetricError::InvalidJobConcurrency(config.job_concurrency));
        }
        let clock_skew = chrono::Duration::from_std(config.max_clock_skew)
            .unwrap_or_else(|_| chrono::Duration::zero());

        Ok(Self {
            catalog,
            config,
            clock_skew,
            caches: HashMap::new(),
        })
    }

    /// Number of jobs with cached task states.
    pub fn tracked_jobs(&self) -> usize {
        self.caches.len()
    }

    /// Run one collection pass.
    ///
    /// Failures are reported inside the returned event rather than as an error.
    pub async fn collect_once(&mut self) -> MetricEvent {
        let started = Utc::now();
        match self.collect(started).await {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "metric collection failed");
                MetricEvent::failed(started, err)
            }
        }
    }

    async fn collect(&mut self, started: DateTime<Utc>) -> Result<MetricEvent, MetricError> {
        let total_timer = Instant::now();

        let list_jobs_timer = Instant::now();
        let jobs = self.catalog.list_jobs().await.map_err(MetricError::ListJobs)?;
        let list_jobs_latency = list_jobs_timer.elapsed();
        debug!(jobs = jobs.len(), latency = ?list_jobs_latency, "listed jobs");

        // Jobs that disappeared from the account are forgotten.
        let mut previous = std::mem::take(&mut self.caches);
        let work: Vec<(String, StateCache)> = jobs
            .into_iter()
            .map(|job| {
                let cache = previous.remove(&job).unwrap_or_default();
                (job, cache)
            })
            .collect();

        let catalog = self.catalog.clone();
        let clock_skew = self.clock_skew;
        let passes: Vec<JobPass> = stream::iter(work)
            .map(move |(job, cache)| Self::collect_job(catalog.clone(), clock_skew, job, cache))
            .buffer_unordered(self.config.job_concurrency)
            .collect()
            .await;

        let mut job_metrics = BTreeMap::new();
        let mut first_error = None;
        for pass in passes {
            match pass.result {
                Ok(latency) => {
                    job_metrics.insert(
                        pass.job.clone(),
                        JobMetrics {
                            list_tasks_latency: latency,
                            counts: pass.cache.counts(),
                        },
                    );
                }
                Err(source) => {
                    if first_error.is_none() {
                        first_error = Some(MetricError::ListTasks {
                            job: pass.job.clone(),
                            source,
                        });
                    }
                }
            }
            self.caches.insert(pass.job, pass.cache);
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        Ok(MetricEvent {
            collection_started: started,
            collection_completed: Utc::now(),
            latency: Latency {
                total: total_timer.elapsed(),
                list_jobs: list_jobs_latency,
            },
            jobs: job_metrics,
            error: None,
        })
    }

    async fn collect_job(
        catalog: Arc<dyn JobCatalog>,
        clock_skew: chrono::Duration,
        job: String,
        mut cache: StateCache,
    ) -> JobPass {
        let since = cache.last_listed().map(|at| at - clock_skew);
        let listing_started = Utc::now();
        let timer = Instant::now();

        let result = match catalog.list_tasks(&job, since).await {
            Ok(tasks) => {
                let latency = timer.elapsed();
                debug!(job = %job, changed = tasks.len(), full = since.is_none(), "listed tasks");
                for (id, state) in tasks {
                    cache.update(id, state);
                }
                cache.mark_listed(listing_started);
                Ok(latency)
            }
            Err(err) => Err(err),
        };

        JobPass { job, cache, result }
    }

    /// Start the periodic collection loop.
    pub fn start(self) -> MetricMonitorHandle {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(self.run(tx, cancel.clone()));

        MetricMonitorHandle {
            cancel,
            current: rx,
            task: Some(task),
        }
    }

    async fn run(mut self, tx: watch::Sender<Option<MetricEvent>>, cancel: CancellationToken) {
        info!(
            interval_secs = self.config.monitor_interval.as_secs(),
            "metric monitor started"
        );

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = self.collect_once() => event,
            };

            if event.error.is_none() {
                info!(
                    jobs = event.jobs.len(),
                    total_ms = u64::try_from(event.latency.total.as_millis()).unwrap_or(u64::MAX),
                    "metrics updated"
                );
            }
            tx.send_replace(Some(event));

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.monitor_interval) => {}
            }
        }

        info!("metric monitor stopped");
    }
}

/// Handle to a running metric monitor. Dropping it stops the monitor.
pub struct MetricMonitorHandle {
    cancel: CancellationToken,
    current: watch::Receiver<Option<MetricEvent>>,
    task: Option<JoinHandle<()>>,
}

impl MetricMonitorHandle {
    /// Metrics from the latest pass, or `None` before the first pass completes.
    pub fn current(&self) -> Option<MetricEvent> {
        self.current.borrow().clone()
    }

    /// Receiver that is notified on every update.
    pub fn subscribe(&self) -> watch::Receiver<Option<MetricEvent>> {
        self.current.clone()
    }

    /// Stop the monitor and wait for its loop to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "metric monitor task ended abnormally");
            }
        }
    }
}

impl Drop for MetricMonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
