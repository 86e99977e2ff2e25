//! Poll workers and the shared tally of terminal outcomes.
//!
//! Each worker drains the work queue, reads the entity's state, and either
//! records a terminal outcome or schedules a delayed re-enqueue. Re-enqueues are
//! tracked tasks so the monitor can wait for them during drain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::domain::errors::SourceError;
use crate::domain::models::{EntityId, EntityState, Observation, PollEvent, PollOutcome, Termination};
use crate::domain::ports::EntityStateSource;
use crate::services::retry_classifier::{ErrorClass, RetryClassifier};
use crate::services::work_queue::WorkQueue;

/// Predicate over `(succeeded, failed)` counts.
pub type CountPredicate = Arc<dyn Fn(usize, usize) -> bool + Send + Sync>;

/// What a single observation means for the wait.
#[derive(Debug, Clone)]
pub struct PollRules {
    pub target_state: EntityState,
    /// Terminal states that count as failure.
    pub failure_states: Vec<EntityState>,
    /// Treat reaching the target with a non-zero exit code as failure.
    pub fail_on_nonzero_exit: bool,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl PollRules {
    /// Turn the result of one state read into a poll outcome.
    pub fn evaluate(
        &self,
        read: Result<Observation, SourceError>,
        classifier: &dyn RetryClassifier,
    ) -> PollOutcome {
        match read {
            Ok(obs) if obs.state == self.target_state => {
                if self.fail_on_nonzero_exit && obs.exited_nonzero() {
                    PollOutcome::TerminalFailure(obs.state)
                } else {
                    PollOutcome::Converged(obs.state)
                }
            }
            Ok(obs) if self.failure_states.contains(&obs.state) => {
                PollOutcome::TerminalFailure(obs.state)
            }
            Ok(obs) => PollOutcome::Transient(format!(
                "state {} not yet at target state {}",
                obs.state, self.target_state
            )),
            Err(err) => match classifier.classify(&err) {
                ErrorClass::Transient => PollOutcome::Transient(err.to_string()),
                ErrorClass::Fatal => PollOutcome::Fatal(err),
            },
        }
    }
}

#[derive(Debug, Clone)]
enum TerminalRecord {
    Succeeded(EntityState),
    Failed(EntityState),
    Errored(String),
}

/// Snapshot of the tally taken once polling has drained.
#[derive(Debug, Clone, Default)]
pub struct TallySnapshot {
    pub succeeded: usize,
    pub failed: usize,
    pub final_states: HashMap<EntityId, EntityState>,
    pub fatal_errors: HashMap<EntityId, String>,
    pub termination: Option<Termination>,
}

/// Shared counters and terminal records for one wait.
///
/// Counters only move through atomic increments, and only when the entity had
/// no terminal record yet.
pub struct Tally {
    total: usize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    records: Mutex<HashMap<EntityId, TerminalRecord>>,
    stop_condition: CountPredicate,
    termination: OnceLock<Termination>,
    cancel: CancellationToken,
}

impl Tally {
    pub fn new(total: usize, stop_condition: CountPredicate, cancel: CancellationToken) -> Self {
        Self {
            total,
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            records: Mutex::new(HashMap::new()),
            stop_condition,
            termination: OnceLock::new(),
            cancel,
        }
    }

    fn records(&self) -> MutexGuard<'_, HashMap<EntityId, TerminalRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn counts(&self) -> (usize, usize) {
        (
            self.succeeded.load(Ordering::SeqCst),
            self.failed.load(Ordering::SeqCst),
        )
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination.get().copied()
    }

    /// Record why polling stopped and cancel the wait.
    ///
    /// Only the first reason sticks; later calls just re-cancel.
    pub fn finish(&self, termination: Termination) {
        if self.termination.set(termination).is_ok() {
            let (succeeded, failed) = self.counts();
            info!(
                termination = %termination,
                succeeded,
                failed,
                total = self.total,
                "signalling cancellation"
            );
        }
        self.cancel.cancel();
    }

    fn record(&self, id: &EntityId, record: TerminalRecord) -> bool {
        let succeeded = matches!(record, TerminalRecord::Succeeded(_));

        // Counters only move under the records lock, so (s, f) is a consistent pair.
        let stop = {
            let mut records = self.records();
            if records.contains_key(id) {
                return false;
            }
            records.insert(id.clone(), record);

            let (s, f) = if succeeded {
                let s = self.succeeded.fetch_add(1, Ordering::SeqCst) + 1;
                (s, self.failed.load(Ordering::SeqCst))
            } else {
                let f = self.failed.fetch_add(1, Ordering::SeqCst) + 1;
                (self.succeeded.load(Ordering::SeqCst), f)
            };

            if s + f >= self.total {
                Some(Termination::AllTerminal)
            } else if (self.stop_condition)(s, f) {
                Some(Termination::StopCondition)
            } else {
                None
            }
        };

        if let Some(termination) = stop {
            self.finish(termination);
        }
        true
    }

    pub fn record_success(&self, id: &EntityId, state: EntityState) -> bool {
        self.record(id, TerminalRecord::Succeeded(state))
    }

    pub fn record_failure(&self, id: &EntityId, state: EntityState) -> bool {
        self.record(id, TerminalRecord::Failed(state))
    }

    pub fn record_error(&self, id: &EntityId, error: &SourceError) -> bool {
        self.record(id, TerminalRecord::Errored(error.to_string()))
    }

    pub fn snapshot(&self) -> TallySnapshot {
        let records = self.records();
        let mut snapshot = TallySnapshot {
            termination: self.termination(),
            ..TallySnapshot::default()
        };
        for (id, record) in records.iter() {
            match record {
                TerminalRecord::Succeeded(state) => {
                    snapshot.succeeded += 1;
                    snapshot.final_states.insert(id.clone(), *state);
                }
                TerminalRecord::Failed(state) => {
                    snapshot.failed += 1;
                    snapshot.final_states.insert(id.clone(), *state);
                }
                TerminalRecord::Errored(error) => {
                    snapshot.failed += 1;
                    snapshot.fatal_errors.insert(id.clone(), error.clone());
                }
            }
        }
        snapshot
    }
}

/// Everything a worker needs, shared behind one `Arc`.
pub struct PollContext {
    pub source: Arc<dyn EntityStateSource>,
    pub classifier: Arc<dyn RetryClassifier>,
    pub queue: Arc<WorkQueue>,
    pub tally: Arc<Tally>,
    pub rules: PollRules,
    pub cancel: CancellationToken,
    pub tasks: TaskTracker,
    pub events: Option<mpsc::Sender<PollEvent>>,
}

impl PollContext {
    fn emit(&self, event: PollEvent) {
        if let Some(events) = &self.events {
            // Progress is best effort; a slow subscriber never stalls polling.
            let _ = events.try_send(event);
        }
    }

    /// Read one entity's state under the per-request timeout.
    pub async fn poll_once(&self, id: &EntityId) -> PollOutcome {
        let read = match tokio::time::timeout(self.rules.request_timeout, self.source.get_state(id))
            .await
        {
            Ok(read) => read,
            Err(_) => Err(SourceError::RequestTimeout(self.rules.request_timeout)),
        };
        self.rules.evaluate(read, self.classifier.as_ref())
    }

    /// Put `id` back on the queue after the poll interval unless the wait is cancelled.
    fn schedule_requeue(self: &Arc<Self>, id: EntityId) {
        if self.cancel.is_cancelled() {
            trace!(entity = %id, "wait cancelled, not requeueing");
            return;
        }

        let ctx = Arc::clone(self);
        self.tasks.spawn(async move {
            tokio::select! {
                () = ctx.cancel.cancelled() => {
                    trace!(entity = %id, "requeue dropped after cancellation");
                }
                () = tokio::time::sleep(ctx.rules.poll_interval) => {
                    if ctx.cancel.is_cancelled() {
                        return;
                    }
                    debug!(entity = %id, "adding entity back to queue");
                    if ctx.queue.enqueue(id.clone()) {
                        ctx.emit(PollEvent::Requeued { id });
                    }
                }
            }
        });
    }
}

/// Worker loop: runs until the wait is cancelled.
pub async fn run_worker(ctx: Arc<PollContext>, worker: usize) {
    trace!(worker, "poll worker started");

    while let Ok(item) = ctx.queue.dequeue(&ctx.cancel).await {
        let id = item.id;
        debug!(worker, entity = %id, queued_for = ?item.enqueued_at.elapsed(), "polling entity");

        let outcome = ctx.poll_once(&id).await;
        ctx.emit(PollEvent::Polled {
            id: id.clone(),
            outcome: outcome.label(),
        });

        match outcome {
            PollOutcome::Converged(state) => {
                debug!(worker, entity = %id, state = %state, "entity converged");
                if ctx.tally.record_success(&id, state) {
                    ctx.emit(PollEvent::Terminal { id, succeeded: true });
                }
            }
            PollOutcome::TerminalFailure(state) => {
                warn!(worker, entity = %id, state = %state, "entity reached a failed terminal state");
                if ctx.tally.record_failure(&id, state) {
                    ctx.emit(PollEvent::Terminal { id, succeeded: false });
                }
            }
            PollOutcome::Fatal(err) => {
                warn!(worker, entity = %id, error = %err, "fatal error polling entity");
                if ctx.tally.record_error(&id, &err) {
                    ctx.emit(PollEvent::Terminal { id, succeeded: false });
                }
            }
            PollOutcome::Transient(reason) => {
                debug!(worker, entity = %id, reason = %reason, "entity not terminal yet");
                ctx.schedule_requeue(id);
            }
        }
    }

    trace!(worker, "poll worker stopped");
}
