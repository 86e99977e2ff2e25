//! Domain ports (interfaces to remote services)

pub mod entity_state_source;
pub mod job_catalog;

pub use entity_state_source::EntityStateSource;
pub use job_catalog::JobCatalog;
