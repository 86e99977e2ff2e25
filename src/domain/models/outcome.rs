use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::entity::{EntityId, EntityState};
use crate::domain::errors::SourceError;

/// Result of one poll attempt for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The entity reached the target state.
    Converged(EntityState),
    /// The entity reached a terminal state that does not count as success.
    TerminalFailure(EntityState),
    /// Not terminal yet; poll again later.
    Transient(String),
    /// Non-retryable source error for this entity.
    Fatal(SourceError),
}

impl PollOutcome {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Transient(_))
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Converged(_) => "converged",
            Self::TerminalFailure(_) => "terminal_failure",
            Self::Transient(_) => "transient",
            Self::Fatal(_) => "fatal",
        }
    }
}

/// Why a wait stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Nothing was seeded.
    Empty,
    /// Every seeded entity reached a terminal outcome.
    AllTerminal,
    /// The caller's stop condition fired first.
    StopCondition,
    /// The global deadline elapsed first.
    TimedOut,
}

impl Termination {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::AllTerminal => "all_terminal",
            Self::StopCondition => "stop_condition",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phases a single wait moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    Seeding,
    Polling,
    Converged,
    PartiallyFailed,
    TimedOut,
    Drained,
    Done,
}

impl MonitorPhase {
    /// Terminal label reached once polling stops.
    pub const fn after_polling(termination: Termination, failed: usize) -> Self {
        match termination {
            Termination::TimedOut => Self::TimedOut,
            _ if failed > 0 => Self::PartiallyFailed,
            _ => Self::Converged,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Seeding => "seeding",
            Self::Polling => "polling",
            Self::Converged => "converged",
            Self::PartiallyFailed => "partially_failed",
            Self::TimedOut => "timed_out",
            Self::Drained => "drained",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate returned by a convergence wait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceResult {
    pub succeeded_count: usize,
    pub failed_count: usize,
    pub timed_out: bool,
    /// Final observed state of every entity that reached a terminal state.
    pub per_entity_final_state: HashMap<EntityId, EntityState>,
    /// Entities that failed on a fatal source error, with the error text.
    pub fatal_errors: HashMap<EntityId, String>,
    /// Unique entities seeded into the wait.
    pub total_seeded: usize,
    pub termination: Termination,
    pub elapsed: Duration,
    /// Outcome of the caller's success condition on the final counts.
    pub success: bool,
}

impl ConvergenceResult {
    /// Result for a wait that had nothing to poll.
    pub fn empty() -> Self {
        Self {
            succeeded_count: 0,
            failed_count: 0,
            timed_out: false,
            per_entity_final_state: HashMap::new(),
            fatal_errors: HashMap::new(),
            total_seeded: 0,
            termination: Termination::Empty,
            elapsed: Duration::ZERO,
            success: true,
        }
    }

    /// Seeded entities with no terminal outcome.
    pub const fn pending_count(&self) -> usize {
        self.total_seeded
            .saturating_sub(self.succeeded_count + self.failed_count)
    }

    pub const fn all_succeeded(&self) -> bool {
        !self.timed_out && self.succeeded_count == self.total_seeded
    }
}

/// Progress notification emitted while a wait runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    Seeded { total: usize },
    Polled { id: EntityId, outcome: &'static str },
    Requeued { id: EntityId },
    Terminal { id: EntityId, succeeded: bool },
    Stopped { termination: Termination },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result() {
        let result = ConvergenceResult::empty();
        assert_eq!(result.succeeded_count, 0);
        assert_eq!(result.failed_count, 0);
        assert!(!result.timed_out);
        assert_eq!(result.termination, Termination::Empty);
        assert_eq!(result.pending_count(), 0);
    }

    #[test]
    fn test_phase_after_polling() {
        assert_eq!(
            MonitorPhase::after_polling(Termination::TimedOut, 0),
            MonitorPhase::TimedOut
        );
        assert_eq!(
            MonitorPhase::after_polling(Termination::AllTerminal, 2),
            MonitorPhase::PartiallyFailed
        );
        assert_eq!(
            MonitorPhase::after_polling(Termination::StopCondition, 0),
            MonitorPhase::Converged
        );
    }

    #[test]
    fn test_outcome_terminal() {
        assert!(PollOutcome::Converged(EntityState::Completed).is_terminal());
        assert!(PollOutcome::Fatal(SourceError::Transport("x".into())).is_terminal());
        assert!(!PollOutcome::Transient("running".into()).is_terminal());
    }
}
