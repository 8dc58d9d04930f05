//! Full-snapshot strategy
//!
//! Asks the provider to materialize a complete holdings snapshot and polls
//! its status until ready. A snapshot the provider completed within the
//! freshness window is reused as-is, which makes duplicate triggers
//! idempotent: no new generation request is issued.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::{poll_until_completed, SnapshotOrchestrator};
use crate::application::retry::RetryController;
use crate::domain::errors::PipelineError;
use crate::domain::events::{LoadEvent, LoadPlan, SnapshotOutcome};
use crate::infrastructure::config::PipelineConfig;
use crate::infrastructure::upstream::{UpstreamClient, UpstreamLoadingStatus};

pub struct FullSnapshotOrchestrator {
    client: Arc<dyn UpstreamClient>,
    retry: Arc<RetryController>,
    config: PipelineConfig,
    events: broadcast::Sender<LoadEvent>,
}

impl FullSnapshotOrchestrator {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        retry: Arc<RetryController>,
        config: PipelineConfig,
        events: broadcast::Sender<LoadEvent>,
    ) -> Self {
        Self { client, retry, config, events }
    }

    fn outcome(&self, status: &UpstreamLoadingStatus) -> SnapshotOutcome {
        let total_count = status.total_count.unwrap_or(0);
        SnapshotOutcome {
            total_count,
            plan: LoadPlan::Full {
                transaction_id: None,
                page_count: self.config.page_count_for(total_count),
                page_size: self.config.page_size,
            },
        }
    }
}

#[async_trait]
impl SnapshotOrchestrator for FullSnapshotOrchestrator {
    async fn create_snapshot(
        &self,
        credentials_id: &str,
    ) -> Result<SnapshotOutcome, PipelineError> {
        // Idempotence guard: a recently completed snapshot is reused
        match self.client.get_status(credentials_id).await {
            Ok(status) if status.completed_within(self.config.freshness_window()) => {
                info!(
                    credentials_id,
                    total_count = status.total_count,
                    "Reusing fresh upstream snapshot"
                );
                return Ok(self.outcome(&status));
            }
            Ok(_) => {}
            Err(err) if err.is_retryable() => {
                warn!(credentials_id, "Status probe failed, requesting snapshot anyway: {err}");
            }
            Err(err) => return Err(err),
        }

        self.client.request_snapshot(credentials_id).await?;
        info!(credentials_id, "Requested snapshot generation");

        let status = poll_until_completed(&self.retry, &self.events, credentials_id, || {
            self.client.get_status(credentials_id)
        })
        .await?;

        info!(
            credentials_id,
            total_count = status.total_count,
            "Snapshot is ready"
        );
        Ok(self.outcome(&status))
    }
}
