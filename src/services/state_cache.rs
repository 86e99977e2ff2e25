//! Per-job cache of task states used by the metric monitor.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::models::{EntityId, EntityState, StateCounts};

/// Latest known state of every task in one job.
#[derive(Debug, Clone, Default)]
pub struct StateCache {
    states: HashMap<EntityId, EntityState>,
    last_listed: Option<DateTime<Utc>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the cached state of one task.
    pub fn update(&mut self, id: EntityId, state: EntityState) {
        self.states.insert(id, state);
    }

    pub fn get(&self, id: &EntityId) -> Option<EntityState> {
        self.states.get(id).copied()
    }

    /// Aggregate the cached states into per-state counts.
    pub fn counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for state in self.states.values() {
            counts.increment(*state);
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// When the last successful listing of this job started, if any.
    pub const fn last_listed(&self) -> Option<DateTime<Utc>> {
        self.last_listed
    }

    pub fn mark_listed(&mut self, at: DateTime<Utc>) {
        self.last_listed = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_update_overwrites() {
        let mut cache = StateCache::new();
        cache.update("t1".into(), EntityState::Running);
        cache.update("t1".into(), EntityState::Completed);
        cache.update("t2".into(), EntityState::Running);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"t1".into()), Some(EntityState::Completed));

        let counts = cache.counts();
        assert_eq!(counts.get(EntityState::Completed), 1);
        assert_eq!(counts.get(EntityState::Running), 1);
    }

    #[test]
    fn test_mark_listed() {
        let mut cache = StateCache::new();
        assert!(cache.last_listed().is_none());
        let now = Utc::now();
        cache.mark_listed(now);
        assert_eq!(cache.last_listed(), Some(now));
    }

    fn state_strategy() -> impl Strategy<Value = EntityState> {
        prop::sample::select(EntityState::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn counts_total_equals_distinct_tasks(
            updates in prop::collection::vec((0u8..20, state_strategy()), 0..200)
        ) {
            let mut cache = StateCache::new();
            let mut latest = HashMap::new();
            for (task, state) in &updates {
                let id = EntityId::new(format!("t{task}"));
                cache.update(id.clone(), *state);
                latest.insert(id, *state);
            }

            let counts = cache.counts();
            prop_assert_eq!(counts.total(), latest.len());
            for state in EntityState::ALL {
                let expected = latest.values().filter(|s| **s == state).count();
                prop_assert_eq!(counts.get(state), expected);
            }
        }
    }
}
