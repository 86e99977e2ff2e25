//! Retry classification for entity state source errors.
//!
//! Decides whether a failed state read should be retried later or recorded as a
//! terminal failure for that entity. Unknown errors fail closed.

use std::collections::HashSet;

use crate::domain::errors::SourceError;

/// Service code returned while a node has not run the job preparation step yet.
pub const JOB_PREP_NOT_RUN_ON_NODE: &str = "JobPreparationTaskNotRunOnNode";
/// Service code returned while a task's state has not been computed yet.
pub const TASK_STATE_NOT_COMPUTED: &str = "TaskStateNotComputed";
/// Service code returned while a node is still being allocated.
pub const NODE_NOT_READY: &str = "NodeNotReady";

/// Classification of a source error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Expected to resolve with time; poll the entity again.
    Transient,
    /// Will not resolve; stop polling the entity.
    Fatal,
}

/// Decides whether a source error is worth retrying.
pub trait RetryClassifier: Send + Sync {
    fn classify(&self, error: &SourceError) -> ErrorClass;
}

/// Classifier driven by a set of transient service error codes.
#[derive(Debug, Clone)]
pub struct CodeClassifier {
    transient_codes: HashSet<String>,
    tolerate_missing_entities: bool,
}

impl Default for CodeClassifier {
    fn default() -> Self {
        Self {
            transient_codes: [JOB_PREP_NOT_RUN_ON_NODE, TASK_STATE_NOT_COMPUTED, NODE_NOT_READY]
                .into_iter()
                .map(str::to_string)
                .collect(),
            tolerate_missing_entities: false,
        }
    }
}

impl CodeClassifier {
    /// Classifier with no transient service codes at all.
    pub fn strict() -> Self {
        Self {
            transient_codes: HashSet::new(),
            tolerate_missing_entities: false,
        }
    }

    /// Treat an additional service code as transient.
    pub fn with_transient_code(mut self, code: impl Into<String>) -> Self {
        self.transient_codes.insert(code.into());
        self
    }

    /// Retry entities reported as not found instead of failing them.
    pub fn tolerate_missing_entities(mut self, tolerate: bool) -> Self {
        self.tolerate_missing_entities = tolerate;
        self
    }

    pub fn is_transient_code(&self, code: &str) -> bool {
        self.transient_codes.contains(code)
    }
}

impl RetryClassifier for CodeClassifier {
    fn classify(&self, error: &SourceError) -> ErrorClass {
        match error {
            SourceError::NotYetVisible(_) | SourceError::RequestTimeout(_) => ErrorClass::Transient,
            SourceError::EntityNotFound(_) if self.tolerate_missing_entities => {
                ErrorClass::Transient
            }
            SourceError::Service { code, .. } if self.is_transient_code(code) => {
                ErrorClass::Transient
            }
            SourceError::EntityNotFound(_)
            | SourceError::ParentNotFound(_)
            | SourceError::Service { .. }
            | SourceError::Transport(_)
            | SourceError::Unsupported(_) => ErrorClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::EntityId;
    use std::time::Duration;

    #[test]
    fn test_not_yet_visible_is_transient() {
        let classifier = CodeClassifier::default();
        let err = SourceError::NotYetVisible(EntityId::from("t1"));
        assert_eq!(classifier.classify(&err), ErrorClass::Transient);
    }

    #[test]
    fn test_default_transient_codes() {
        let classifier = CodeClassifier::default();
        for code in [JOB_PREP_NOT_RUN_ON_NODE, TASK_STATE_NOT_COMPUTED, NODE_NOT_READY] {
            let err = SourceError::service(code, "not yet");
            assert_eq!(classifier.classify(&err), ErrorClass::Transient, "{code}");
        }
    }

    #[test]
    fn test_parent_not_found_is_fatal() {
        let classifier = CodeClassifier::default();
        let err = SourceError::ParentNotFound("pool-1".to_string());
        assert_eq!(classifier.classify(&err), ErrorClass::Fatal);

        let err = SourceError::service("PoolNotFound", "pool-1 deleted");
        assert_eq!(classifier.classify(&err), ErrorClass::Fatal);
    }

    #[test]
    fn test_unknown_errors_fail_closed() {
        let classifier = CodeClassifier::default();
        assert_eq!(
            classifier.classify(&SourceError::service("InternalError", "boom")),
            ErrorClass::Fatal
        );
        assert_eq!(
            classifier.classify(&SourceError::Transport("connection reset".into())),
            ErrorClass::Fatal
        );
        assert_eq!(
            classifier.classify(&SourceError::Unsupported("list_entities")),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn test_missing_entity_policy() {
        let err = SourceError::EntityNotFound(EntityId::from("t9"));
        assert_eq!(CodeClassifier::default().classify(&err), ErrorClass::Fatal);

        let tolerant = CodeClassifier::default().tolerate_missing_entities(true);
        assert_eq!(tolerant.classify(&err), ErrorClass::Transient);
    }

    #[test]
    fn test_request_timeout_is_transient() {
        let err = SourceError::RequestTimeout(Duration::from_secs(30));
        assert_eq!(CodeClassifier::strict().classify(&err), ErrorClass::Transient);
    }

    #[test]
    fn test_custom_codes() {
        let classifier = CodeClassifier::strict().with_transient_code("ServerBusy");
        assert!(classifier.is_transient_code("ServerBusy"));
        assert!(!classifier.is_transient_code(JOB_PREP_NOT_RUN_ON_NODE));
        assert_eq!(
            classifier.classify(&SourceError::service("ServerBusy", "retry later")),
            ErrorClass::Transient
        );
        assert_eq!(
            classifier.classify(&SourceError::service(JOB_PREP_NOT_RUN_ON_NODE, "x")),
            ErrorClass::Fatal
        );
    }
}
