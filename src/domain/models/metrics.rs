use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::EntityState;

/// Number of tasks in each [`EntityState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    counts: [usize; EntityState::ALL.len()],
}

impl StateCounts {
    pub fn increment(&mut self, state: EntityState) {
        self.counts[state.index()] += 1;
    }

    pub const fn get(&self, state: EntityState) -> usize {
        self.counts[state.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Non-zero counts, in state order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityState, usize)> + '_ {
        EntityState::ALL
            .iter()
            .map(|state| (*state, self.get(*state)))
            .filter(|(_, count)| *count > 0)
    }
}

/// Aggregate information about one job at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetrics {
    pub list_tasks_latency: Duration,
    pub counts: StateCounts,
}

/// How long a collection pass took.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Latency {
    pub total: Duration,
    pub list_jobs: Duration,
}

/// One metrics snapshot produced by the metric monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricEvent {
    pub collection_started: DateTime<Utc>,
    pub collection_completed: DateTime<Utc>,
    pub latency: Latency,
    pub jobs: BTreeMap<String, JobMetrics>,
    /// Set when the pass failed; `jobs` is empty in that case.
    pub error: Option<String>,
}

impl MetricEvent {
    /// Event recording a failed collection pass.
    pub fn failed(started: DateTime<Utc>, error: impl ToString) -> Self {
        Self {
            collection_started: started,
            collection_completed: Utc::now(),
            latency: Latency::default(),
            jobs: BTreeMap::new(),
            error: Some(error.to_string()),
        }
    }

    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Time spent listing tasks for `job`, if it was collected.
    pub fn list_tasks_latency(&self, job: &str) -> Option<Duration> {
        self.jobs.get(job).map(|m| m.list_tasks_latency)
    }

    /// Counts summed across every job.
    pub fn totals(&self) -> StateCounts {
        let mut totals = StateCounts::default();
        for metrics in self.jobs.values() {
            for (state, count) in metrics.counts.iter() {
                totals.counts[state.index()] += count;
            }
        }
        totals
    }
}
