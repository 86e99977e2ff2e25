use async_trait::async_trait;

use crate::domain::errors::SourceError;
use crate::domain::models::{EntityFilter, EntityId, Observation};

/// Port for reading the state of remote entities following hexagonal architecture
///
/// The production implementation issues a GET against the batch service's task or
/// node endpoint. Implementations must be safe to call concurrently from every
/// poll worker.
///
/// # Examples
///
/// ```no_run
/// use batchwatch::domain::ports::EntityStateSource;
/// use batchwatch::domain::models::{EntityId, EntityState};
///
/// async fn is_done(source: &dyn EntityStateSource, id: &EntityId) -> bool {
///     matches!(
///         source.get_state(id).await,
///         Ok(obs) if obs.state == EntityState::Completed
///     )
/// }
/// ```
#[async_trait]
pub trait EntityStateSource: Send + Sync {
    /// Read the current state of one entity
    ///
    /// # Returns
    ///
    /// * `Ok(Observation)` - Current state and exit code, if any
    /// * `Err(SourceError)` - Classified by the retry classifier
    async fn get_state(&self, id: &EntityId) -> Result<Observation, SourceError>;

    /// List entities matching a filter
    ///
    /// Only needed when a wait is seeded from a listing (for example every node
    /// of a pool). The default implementation reports the operation as unsupported.
    async fn list_entities(&self, filter: &EntityFilter) -> Result<Vec<EntityId>, SourceError> {
        let _ = filter;
        Err(SourceError::Unsupported("list_entities"))
    }
}
