//! Scripted in-memory adapters for the state source and job catalog ports.
//!
//! Each entity replays a fixed script of responses, one per read, repeating the
//! last step once the script runs out. Used by the demo binary and the tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::SourceError;
use crate::domain::models::{EntityFilter, EntityId, EntityState, Observation};
use crate::domain::ports::{EntityStateSource, JobCatalog};

/// One scripted response.
pub type Step = Result<Observation, SourceError>;

#[derive(Debug, Default)]
struct ScriptedEntity {
    parent: Option<String>,
    script: Vec<Step>,
    cursor: usize,
    calls: usize,
}

impl ScriptedEntity {
    fn peek(&self) -> Option<&Step> {
        let last = self.script.len().checked_sub(1)?;
        self.script.get(self.cursor.min(last))
    }
}

/// Entity state source replaying per-entity scripts.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    entities: Mutex<HashMap<EntityId, ScriptedEntity>>,
    parents: HashSet<String>,
    latency: Duration,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity with no parent.
    pub fn entity(self, id: impl Into<EntityId>, script: Vec<Step>) -> Self {
        self.insert(id.into(), None, script)
    }

    /// Add an entity listed under `parent`.
    pub fn child(
        mut self,
        parent: impl Into<String>,
        id: impl Into<EntityId>,
        script: Vec<Step>,
    ) -> Self {
        let parent = parent.into();
        self.parents.insert(parent.clone());
        self.insert(id.into(), Some(parent), script)
    }

    /// Register a parent with no children so listing it returns nothing.
    pub fn empty_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.insert(parent.into());
        self
    }

    /// Delay every state read by `latency`.
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn insert(self, id: EntityId, parent: Option<String>, script: Vec<Step>) -> Self {
        self.lock().insert(
            id,
            ScriptedEntity {
                parent,
                script,
                ..ScriptedEntity::default()
            },
        );
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EntityId, ScriptedEntity>> {
        self.entities.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of reads issued for `id` so far.
    pub fn calls(&self, id: impl Into<EntityId>) -> usize {
        self.lock().get(&id.into()).map_or(0, |e| e.calls)
    }

    /// Reads issued across every entity.
    pub fn total_calls(&self) -> usize {
        self.lock().values().map(|e| e.calls).sum()
    }
}

#[async_trait]
impl EntityStateSource for ScriptedSource {
    async fn get_state(&self, id: &EntityId) -> Result<Observation, SourceError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut entities = self.lock();
        let entity = entities
            .get_mut(id)
            .ok_or_else(|| SourceError::EntityNotFound(id.clone()))?;
        entity.calls += 1;
        let step = entity
            .peek()
            .cloned()
            .unwrap_or_else(|| Err(SourceError::NotYetVisible(id.clone())));
        entity.cursor += 1;
        step
    }

    async fn list_entities(&self, filter: &EntityFilter) -> Result<Vec<EntityId>, SourceError> {
        if let Some(parent) = &filter.parent {
            if !self.parents.contains(parent) {
                return Err(SourceError::ParentNotFound(parent.clone()));
            }
        }

        let entities = self.lock();
        let mut ids: Vec<EntityId> = entities
            .iter()
            .filter(|(_, e)| filter.parent.is_none() || e.parent == filter.parent)
            .filter(|(_, e)| match e.peek() {
                Some(Ok(obs)) => filter.matches(obs.state),
                _ => filter.states.is_empty(),
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Debug, Clone)]
struct TaskRecord {
    state: EntityState,
    changed_at: DateTime<Utc>,
}

/// In-memory job catalog whose task states are set by the caller.
#[derive(Debug, Default)]
pub struct ScriptedCatalog {
    jobs: Mutex<BTreeMap<String, BTreeMap<EntityId, TaskRecord>>>,
    failing_jobs: Mutex<HashSet<String>>,
    listings: Mutex<Vec<(String, Option<DateTime<Utc>>)>>,
}

impl ScriptedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update a task, stamping it as changed now.
    pub fn set_task(&self, job: &str, task: impl Into<EntityId>, state: EntityState) {
        self.set_task_at(job, task, state, Utc::now());
    }

    pub fn set_task_at(
        &self,
        job: &str,
        task: impl Into<EntityId>,
        state: EntityState,
        changed_at: DateTime<Utc>,
    ) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.entry(job.to_string())
            .or_default()
            .insert(task.into(), TaskRecord { state, changed_at });
    }

    pub fn remove_job(&self, job: &str) {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job);
    }

    /// Make task listings for `job` fail until cleared.
    pub fn fail_job(&self, job: &str, failing: bool) {
        let mut failing_jobs = self
            .failing_jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if failing {
            failing_jobs.insert(job.to_string());
        } else {
            failing_jobs.remove(job);
        }
    }

    /// Every task listing issued so far, with its `changed_since` bound.
    pub fn listings(&self) -> Vec<(String, Option<DateTime<Utc>>)> {
        self.listings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl JobCatalog for ScriptedCatalog {
    async fn list_jobs(&self) -> Result<Vec<String>, SourceError> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(jobs.keys().cloned().collect())
    }

    async fn list_tasks(
        &self,
        job: &str,
        changed_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<(EntityId, EntityState)>, SourceError> {
        self.listings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((job.to_string(), changed_since));

        if self
            .failing_jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(job)
        {
            return Err(SourceError::service("ServerBusy", format!("listing {job} failed")));
        }

        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let tasks = jobs
            .get(job)
            .ok_or_else(|| SourceError::ParentNotFound(job.to_string()))?;
        Ok(tasks
            .iter()
            .filter(|(_, record)| changed_since.is_none_or(|since| record.changed_at > since))
            .map(|(id, record)| (id.clone(), record.state))
            .collect())
    }
}
