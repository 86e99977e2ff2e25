//! Convergence monitor.
//!
//! Waits until a set of remote entities all reach a target state, a caller
//! supplied stop condition fires, or a global deadline passes. Polling runs on a
//! bounded pool of workers sharing one work queue; every wait owns its own queue,
//! tally and cancellation token, and nothing it spawns outlives the call.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use batchwatch::domain::models::EntityState;
//! use batchwatch::domain::ports::EntityStateSource;
//! use batchwatch::services::{ConvergenceMonitor, WaitOptions};
//!
//! # async fn example(source: Arc<dyn EntityStateSource>) -> anyhow::Result<()> {
//! let options = WaitOptions::new(EntityState::Completed)
//!     .timeout(Duration::from_secs(300))
//!     .degree_of_parallelism(10)
//!     .stop_when(|succeeded, failed| succeeded >= 2 || failed > 0)
//!     .succeed_when(|succeeded, _| succeeded >= 2);
//!
//! let result = ConvergenceMonitor::new(source, options)?
//!     .wait(["node-1", "node-2", "node-3"])
//!     .await?;
//! if !result.success {
//!     anyhow::bail!("not enough nodes prepared");
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::domain::errors::{PollerError, PollerResult};
use crate::domain::models::{
    ConvergenceResult, EntityFilter, EntityId, EntityState, MonitorPhase, PollEvent,
    PollerConfig, Termination,
};
use crate::domain::ports::EntityStateSource;
use crate::services::poll_worker::{run_worker, CountPredicate, PollContext, PollRules, Tally};
use crate::services::retry_classifier::{CodeClassifier, RetryClassifier};
use crate::services::work_queue::WorkQueue;

/// Options for one convergence wait.
#[derive(Clone)]
pub struct WaitOptions {
    pub target_state: EntityState,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub degree_of_parallelism: usize,
    pub request_timeout: Duration,
    pub failure_states: Vec<EntityState>,
    pub fail_on_nonzero_exit: bool,
    stop_condition: CountPredicate,
    success_condition: Option<CountPredicate>,
    classifier: Arc<dyn RetryClassifier>,
    events: Option<mpsc::Sender<PollEvent>>,
}

impl fmt::Debug for WaitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitOptions")
            .field("target_state", &self.target_state)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("degree_of_parallelism", &self.degree_of_parallelism)
            .field("request_timeout", &self.request_timeout)
            .field("failure_states", &self.failure_states)
            .field("fail_on_nonzero_exit", &self.fail_on_nonzero_exit)
            .field("custom_success_condition", &self.success_condition.is_some())
            .field("events", &self.events.is_some())
            .finish_non_exhaustive()
    }
}

impl WaitOptions {
    /// Defaults: 5 minute timeout, 5 second poll interval, 5 workers.
    pub fn new(target_state: EntityState) -> Self {
        Self::from_config(&PollerConfig::default(), target_state)
    }

    /// Options seeded from the `poller` configuration section.
    pub fn from_config(config: &PollerConfig, target_state: EntityState) -> Self {
        Self {
            target_state,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            degree_of_parallelism: config.parallelism,
            request_timeout: config.request_timeout(),
            failure_states: vec![EntityState::Failed],
            fail_on_nonzero_exit: true,
            stop_condition: Arc::new(|_, _| false),
            success_condition: None,
            classifier: Arc::new(CodeClassifier::default()),
            events: None,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn degree_of_parallelism(mut self, workers: usize) -> Self {
        self.degree_of_parallelism = workers;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn failure_states(mut self, states: impl Into<Vec<EntityState>>) -> Self {
        self.failure_states = states.into();
        self
    }

    #[must_use]
    pub fn fail_on_nonzero_exit(mut self, fail: bool) -> Self {
        self.fail_on_nonzero_exit = fail;
        self
    }

    /// Stop polling early once `predicate(succeeded, failed)` holds.
    #[must_use]
    pub fn stop_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(usize, usize) -> bool + Send + Sync + 'static,
    {
        self.stop_condition = Arc::new(predicate);
        self
    }

    /// Decide [`ConvergenceResult::success`] from the final counts.
    ///
    /// Without one, success means every seeded entity succeeded in time.
    #[must_use]
    pub fn succeed_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(usize, usize) -> bool + Send + Sync + 'static,
    {
        self.success_condition = Some(Arc::new(predicate));
        self
    }

    #[must_use]
    pub fn classifier(mut self, classifier: impl RetryClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Send progress events to `events`. Events are dropped when the channel is full.
    #[must_use]
    pub fn events(mut self, events: mpsc::Sender<PollEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn validate(&self) -> PollerResult<()> {
        if self.timeout.is_zero() {
            return Err(PollerError::InvalidTimeout(self.timeout));
        }
        if self.poll_interval.is_zero() {
            return Err(PollerError::InvalidPollInterval(self.poll_interval));
        }
        if self.degree_of_parallelism == 0 {
            return Err(PollerError::InvalidParallelism(self.degree_of_parallelism));
        }
        if self.request_timeout.is_zero() {
            return Err(PollerError::InvalidRequestTimeout(self.request_timeout));
        }
        Ok(())
    }

    fn rules(&self) -> PollRules {
        PollRules {
            target_state: self.target_state,
            failure_states: self.failure_states.clone(),
            fail_on_nonzero_exit: self.fail_on_nonzero_exit,
            poll_interval: self.poll_interval,
            request_timeout: self.request_timeout,
        }
    }
}

/// Single-use convergence wait over an entity state source.
pub struct ConvergenceMonitor {
    source: Arc<dyn EntityStateSource>,
    options: WaitOptions,
    wait_id: Uuid,
}

impl ConvergenceMonitor {
    /// Create a monitor, rejecting invalid options up front.
    pub fn new(source: Arc<dyn EntityStateSource>, options: WaitOptions) -> PollerResult<Self> {
        options.validate()?;
        Ok(Self {
            source,
            options,
            wait_id: Uuid::new_v4(),
        })
    }

    /// Identifier attached to this wait's log span.
    pub const fn wait_id(&self) -> Uuid {
        self.wait_id
    }

    /// Wait for `ids` to converge. Duplicate ids are polled once.
    pub async fn wait<I, T>(self, ids: I) -> PollerResult<ConvergenceResult>
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityId>,
    {
        let mut seen = HashSet::new();
        let unique: Vec<EntityId> = ids
            .into_iter()
            .map(Into::<EntityId>::into)
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let span = info_span!(
            "convergence_wait",
            wait_id = %self.wait_id,
            target = %self.options.target_state,
            total = unique.len(),
        );
        self.run(unique).instrument(span).await
    }

    /// Seed the wait from a listing instead of a fixed id list.
    pub async fn wait_listed(self, filter: &EntityFilter) -> PollerResult<ConvergenceResult> {
        let ids = self
            .source
            .list_entities(filter)
            .await
            .map_err(PollerError::Listing)?;
        info!(
            wait_id = %self.wait_id,
            parent = filter.parent.as_deref().unwrap_or("-"),
            listed = ids.len(),
            "seeding wait from listing"
        );
        self.wait(ids).await
    }

    /// Blocking wrapper for synchronous entry points.
    ///
    /// Builds its own runtime, so it must not be called from async code.
    pub fn wait_blocking<I, T>(self, ids: I) -> PollerResult<ConvergenceResult>
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityId>,
    {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(PollerError::BlockingInsideRuntime);
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.wait(ids))
    }

    async fn run(self, ids: Vec<EntityId>) -> PollerResult<ConvergenceResult> {
        if ids.is_empty() {
            info!("nothing to wait for");
            return Ok(ConvergenceResult::empty());
        }

        let started = Instant::now();
        let deadline = started + self.options.timeout;
        let total = ids.len();
        let cancel = CancellationToken::new();
        let tally = Arc::new(Tally::new(
            total,
            self.options.stop_condition.clone(),
            cancel.clone(),
        ));
        let queue = Arc::new(WorkQueue::new());

        info!(phase = %MonitorPhase::Seeding, total, "seeding work queue");
        for id in ids {
            queue.enqueue(id);
        }
        if let Some(events) = &self.options.events {
            let _ = events.try_send(PollEvent::Seeded { total });
        }

        let tasks = TaskTracker::new();
        let ctx = Arc::new(PollContext {
            source: self.source,
            classifier: self.options.classifier.clone(),
            queue,
            tally: tally.clone(),
            rules: self.options.rules(),
            cancel: cancel.clone(),
            tasks: tasks.clone(),
            events: self.options.events.clone(),
        });

        info!(
            phase = %MonitorPhase::Polling,
            workers = self.options.degree_of_parallelism,
            "starting poll workers"
        );
        for worker in 0..self.options.degree_of_parallelism {
            tasks.spawn(run_worker(ctx.clone(), worker));
        }
        tasks.close();
        drop(ctx);

        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep_until(deadline) => {
                tally.finish(Termination::TimedOut);
            }
        }

        let termination = tally.termination().unwrap_or(Termination::TimedOut);
        let (_, failed_at_stop) = tally.counts();
        info!(
            phase = %MonitorPhase::after_polling(termination, failed_at_stop),
            "polling stopped, draining workers"
        );

        tasks.wait().await;
        info!(phase = %MonitorPhase::Drained, "all workers exited");

        let snapshot = tally.snapshot();
        let timed_out = termination == Termination::TimedOut;
        let success = self.options.success_condition.as_ref().map_or(
            !timed_out && snapshot.succeeded == total,
            |condition| condition(snapshot.succeeded, snapshot.failed),
        );

        if let Some(events) = &self.options.events {
            let _ = events.try_send(PollEvent::Stopped { termination });
        }

        let result = ConvergenceResult {
            succeeded_count: snapshot.succeeded,
            failed_count: snapshot.failed,
            timed_out,
            per_entity_final_state: snapshot.final_states,
            fatal_errors: snapshot.fatal_errors,
            total_seeded: total,
            termination,
            elapsed: started.elapsed(),
            success,
        };

        info!(
            phase = %MonitorPhase::Done,
            succeeded = result.succeeded_count,
            failed = result.failed_count,
            timed_out = result.timed_out,
            success = result.success,
            elapsed_ms = u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            "wait finished"
        );
        Ok(result)
    }
}

/// Wait for every id to reach `target` within `timeout`, using default options.
pub async fn wait_all<I, T>(
    source: Arc<dyn EntityStateSource>,
    ids: I,
    target: EntityState,
    timeout: Duration,
) -> PollerResult<ConvergenceResult>
where
    I: IntoIterator<Item = T>,
    T: Into<EntityId>,
{
    ConvergenceMonitor::new(source, WaitOptions::new(target).timeout(timeout))?
        .wait(ids)
        .await
}
