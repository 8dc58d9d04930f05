//! Holdings Synchronization Pipeline
//!
//! Periodically imports an externally-owned holdings catalog into a local
//! SQLite store so consumers can query it without hitting the slow,
//! rate-limited upstream provider. The pipeline asks the provider to
//! materialize a snapshot (or an incremental delta), waits for it to become
//! ready while tolerating transient failures, retrieves it page by page and
//! persists it, auditing every lifecycle transition along the way.

// Module declarations
pub mod domain;
pub mod application;
pub mod infrastructure;

// Re-export the main pipeline seams for easier access
pub use application::coordinator::{IngestionCoordinator, StartedLoad};
pub use application::retry::{RetryController, RetryPolicy};
pub use application::snapshot::SnapshotOrchestrator;
pub use domain::errors::PipelineError;
pub use domain::load_status::LoadStatus;
