//! Snapshot orchestration strategies
//!
//! The coordinator only depends on the common `create_snapshot` contract;
//! the two interchangeable strategies behind it either request a full
//! snapshot or manage upstream transactions and delta reports. Both share
//! the retry controller for status polling and announce every failed
//! attempt as a `SnapshotAttemptFailed` event.

pub mod delta;
pub mod full;

use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use tokio::sync::broadcast;

use super::retry::RetryController;
use crate::domain::errors::PipelineError;
use crate::domain::events::{LoadEvent, SnapshotOutcome};
use crate::infrastructure::upstream::UpstreamLoadingStatus;

pub use delta::TransactionDeltaOrchestrator;
pub use full::FullSnapshotOrchestrator;

/// Common contract of the snapshot strategies
#[async_trait]
pub trait SnapshotOrchestrator: Send + Sync {
    /// Drive the upstream provider until a snapshot is ready, or fail
    async fn create_snapshot(
        &self,
        credentials_id: &str,
    ) -> Result<SnapshotOutcome, PipelineError>;
}

/// Poll an upstream status endpoint through the retry controller until it
/// reports completion. A poll that reports the generation still pending
/// consumes a retry attempt exactly like an unreachable upstream does, so
/// the loop is always bounded.
pub(crate) async fn poll_until_completed<F, Fut>(
    retry: &RetryController,
    events: &broadcast::Sender<LoadEvent>,
    credentials_id: &str,
    fetch_status: F,
) -> Result<UpstreamLoadingStatus, PipelineError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<UpstreamLoadingStatus, PipelineError>>,
{
    retry
        .attempt(
            credentials_id,
            |_| {
                let status = fetch_status();
                async move {
                    let status = status.await?;
                    if status.is_completed() {
                        Ok(status)
                    } else {
                        Err(PipelineError::SnapshotPending(format!("{:?}", status.status)))
                    }
                }
            },
            |err, attempts_left| {
                let _ = events.send(LoadEvent::SnapshotAttemptFailed {
                    credentials_id: credentials_id.to_string(),
                    category: err.category().to_string(),
                    attempts_left,
                    timestamp: Utc::now(),
                });
            },
        )
        .await
}
