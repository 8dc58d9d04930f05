//! Application module - pipeline orchestration
//!
//! Retry scheduling, snapshot orchestration strategies and the ingestion
//! coordinator that drives a whole load run per credentials id.

pub mod coordinator;
pub mod retry;
pub mod scheduler;
pub mod snapshot;

pub use coordinator::{IngestionCoordinator, StartedLoad};
pub use retry::{RetryController, RetryPolicy};
pub use scheduler::{ScheduledTimer, Scheduler, TokioScheduler};
pub use snapshot::SnapshotOrchestrator;
