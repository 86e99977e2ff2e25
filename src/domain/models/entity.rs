use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a polled entity (a task or a compute node).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle state of a remote entity as reported by the batch service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// Queued, not yet scheduled.
    Pending,
    /// Node is running its preparation step.
    Preparing,
    Running,
    Completed,
    Failed,
}

impl EntityState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Preparing,
        Self::Running,
        Self::Completed,
        Self::Failed,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Dense index used by per-state counters.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single successful read of an entity's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub state: EntityState,
    /// Exit code of the entity's process once it has finished, if any.
    pub exit_code: Option<i32>,
}

impl Observation {
    pub const fn new(state: EntityState) -> Self {
        Self {
            state,
            exit_code: None,
        }
    }

    pub const fn with_exit_code(state: EntityState, exit_code: i32) -> Self {
        Self {
            state,
            exit_code: Some(exit_code),
        }
    }

    /// True when an exit code was reported and it is not zero.
    pub fn exited_nonzero(&self) -> bool {
        self.exit_code.is_some_and(|code| code != 0)
    }
}

impl From<EntityState> for Observation {
    fn from(state: EntityState) -> Self {
        Self::new(state)
    }
}

/// Filter used when seeding a wait from a listing instead of a fixed id list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFilter {
    /// Container to list within (pool id for nodes, job id for tasks).
    pub parent: Option<String>,
    /// Only list entities currently in one of these states; empty means any.
    #[serde(default)]
    pub states: Vec<EntityState>,
}

impl EntityFilter {
    pub fn in_parent(parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            states: Vec::new(),
        }
    }

    pub fn matches(&self, state: EntityState) -> bool {
        self.states.is_empty() || self.states.contains(&state)
    }
}
