//! Transaction+delta strategy
//!
//! The provider tracks each snapshot generation as a transaction. The first
//! run pages through the whole transaction; later runs request a delta
//! report comparing the previous transaction against the new one and only
//! the delta is applied. Transactions created within the freshness window
//! are reused instead of requesting new ones.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::{poll_until_completed, SnapshotOrchestrator};
use crate::application::retry::RetryController;
use crate::domain::errors::PipelineError;
use crate::domain::events::{LoadEvent, LoadPlan, SnapshotOutcome};
use crate::domain::transaction::HoldingsTransaction;
use crate::infrastructure::config::PipelineConfig;
use crate::infrastructure::transaction_repository::TransactionRepository;
use crate::infrastructure::upstream::{UpstreamClient, UpstreamTransaction};

pub struct TransactionDeltaOrchestrator {
    client: Arc<dyn UpstreamClient>,
    retry: Arc<RetryController>,
    transactions: TransactionRepository,
    config: PipelineConfig,
    events: broadcast::Sender<LoadEvent>,
}

impl TransactionDeltaOrchestrator {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        retry: Arc<RetryController>,
        transactions: TransactionRepository,
        config: PipelineConfig,
        events: broadcast::Sender<LoadEvent>,
    ) -> Self {
        Self { client, retry, transactions, config, events }
    }

    /// Reuse the newest upstream transaction when it is fresh enough
    async fn fresh_upstream_transaction(
        &self,
        credentials_id: &str,
    ) -> Result<Option<UpstreamTransaction>, PipelineError> {
        match self.client.list_transactions(credentials_id).await {
            Ok(transactions) => Ok(transactions
                .into_iter()
                .max_by_key(|transaction| transaction.created)
                .filter(|transaction| {
                    Utc::now() - transaction.created < self.config.freshness_window()
                })),
            Err(err) if err.is_retryable() => {
                warn!(credentials_id, "Transaction listing failed, creating a new one: {err}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl SnapshotOrchestrator for TransactionDeltaOrchestrator {
    async fn create_snapshot(
        &self,
        credentials_id: &str,
    ) -> Result<SnapshotOutcome, PipelineError> {
        self.transactions
            .purge_expired(credentials_id, self.config.transaction_expiry())
            .await?;

        // The comparison base must be read before the new transaction lands
        let previous = self.transactions.current(credentials_id).await?;

        let transaction = match self.fresh_upstream_transaction(credentials_id).await? {
            Some(transaction) => {
                info!(
                    credentials_id,
                    transaction_id = %transaction.transaction_id,
                    "Reusing fresh upstream transaction"
                );
                transaction
            }
            None => {
                let transaction = self.client.create_transaction(credentials_id).await?;
                info!(
                    credentials_id,
                    transaction_id = %transaction.transaction_id,
                    "Created upstream transaction"
                );
                transaction
            }
        };

        let record = HoldingsTransaction {
            credentials_id: credentials_id.to_string(),
            transaction_id: transaction.transaction_id.clone(),
            created_at: transaction.created,
        };
        self.transactions.save(&record).await?;

        let status = poll_until_completed(&self.retry, &self.events, credentials_id, || {
            self.client
                .get_transaction_status(credentials_id, &transaction.transaction_id)
        })
        .await?;
        let total_count = status.total_count.unwrap_or(0);

        let previous = previous
            .filter(|prev| prev.transaction_id != transaction.transaction_id);

        match previous {
            Some(prev) => {
                let delta_id = self
                    .client
                    .request_delta_report(
                        credentials_id,
                        &prev.transaction_id,
                        &transaction.transaction_id,
                    )
                    .await?;
                info!(credentials_id, delta_id = %delta_id, "Requested delta report");

                let delta_status =
                    poll_until_completed(&self.retry, &self.events, credentials_id, || {
                        self.client.get_delta_report_status(credentials_id, &delta_id)
                    })
                    .await?;
                let delta_count = delta_status.total_count.unwrap_or(0);

                Ok(SnapshotOutcome {
                    total_count: delta_count,
                    plan: LoadPlan::Delta {
                        delta_id,
                        page_count: self.config.page_count_for(delta_count),
                        page_size: self.config.page_size,
                    },
                })
            }
            None => Ok(SnapshotOutcome {
                total_count,
                plan: LoadPlan::Full {
                    transaction_id: Some(transaction.transaction_id),
                    page_count: self.config.page_count_for(total_count),
                    page_size: self.config.page_size,
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::retry::RetryPolicy;
    use crate::application::scheduler::ImmediateScheduler;
    use crate::domain::events::DeltaEntry;
    use crate::domain::holding::HoldingRecord;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use crate::infrastructure::upstream::{SnapshotStage, UpstreamLoadingStatus};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Upstream stub: transactions complete immediately, counters everywhere
    #[derive(Default)]
    struct StubUpstream {
        listed: Vec<UpstreamTransaction>,
        transaction_posts: AtomicU32,
        delta_posts: AtomicU32,
    }

    #[async_trait]
    impl UpstreamClient for StubUpstream {
        async fn get_status(
            &self,
            _credentials_id: &str,
        ) -> Result<UpstreamLoadingStatus, PipelineError> {
            Err(PipelineError::UpstreamBadRequest { status: 404 })
        }

        async fn request_snapshot(&self, _credentials_id: &str) -> Result<(), PipelineError> {
            Err(PipelineError::UpstreamBadRequest { status: 404 })
        }

        async fn get_snapshot_page(
            &self,
            _credentials_id: &str,
            _page: u32,
            _page_size: u32,
        ) -> Result<Vec<HoldingRecord>, PipelineError> {
            Ok(vec![])
        }

        async fn list_transactions(
            &self,
            _credentials_id: &str,
        ) -> Result<Vec<UpstreamTransaction>, PipelineError> {
            Ok(self.listed.clone())
        }

        async fn create_transaction(
            &self,
            _credentials_id: &str,
        ) -> Result<UpstreamTransaction, PipelineError> {
            let n = self.transaction_posts.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(UpstreamTransaction {
                transaction_id: format!("txn-{n}"),
                created: Utc::now(),
            })
        }

        async fn get_transaction_status(
            &self,
            _credentials_id: &str,
            _transaction_id: &str,
        ) -> Result<UpstreamLoadingStatus, PipelineError> {
            Ok(UpstreamLoadingStatus {
                status: SnapshotStage::Completed,
                created: Some(Utc::now()),
                total_count: Some(4000),
            })
        }

        async fn get_transaction_page(
            &self,
            _credentials_id: &str,
            _transaction_id: &str,
            _page: u32,
            _page_size: u32,
        ) -> Result<Vec<HoldingRecord>, PipelineError> {
            Ok(vec![])
        }

        async fn request_delta_report(
            &self,
            _credentials_id: &str,
            from: &str,
            to: &str,
        ) -> Result<String, PipelineError> {
            self.delta_posts.fetch_add(1, Ordering::SeqCst);
            Ok(format!("delta-{from}-{to}"))
        }

        async fn get_delta_report_status(
            &self,
            _credentials_id: &str,
            _delta_id: &str,
        ) -> Result<UpstreamLoadingStatus, PipelineError> {
            Ok(UpstreamLoadingStatus {
                status: SnapshotStage::Completed,
                created: Some(Utc::now()),
                total_count: Some(120),
            })
        }

        async fn get_delta_page(
            &self,
            _credentials_id: &str,
            _delta_id: &str,
            _page: u32,
            _page_size: u32,
        ) -> Result<Vec<DeltaEntry>, PipelineError> {
            Ok(vec![])
        }
    }

    async fn orchestrator(client: Arc<StubUpstream>) -> TransactionDeltaOrchestrator {
        let db = DatabaseConnection::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let transactions = TransactionRepository::new(db.pool().clone());
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        };
        let retry = Arc::new(RetryController::new(policy, Arc::new(ImmediateScheduler)));
        let (events, _rx) = broadcast::channel(64);
        let config = PipelineConfig { page_size: 1000, ..Default::default() };
        TransactionDeltaOrchestrator::new(client, retry, transactions, config, events)
    }

    #[tokio::test]
    async fn first_run_yields_a_full_plan() {
        let client = Arc::new(StubUpstream::default());
        let orchestrator = orchestrator(Arc::clone(&client)).await;

        let outcome = orchestrator.create_snapshot("creds-1").await.unwrap();
        assert_eq!(outcome.total_count, 4000);
        assert!(matches!(
            outcome.plan,
            LoadPlan::Full { transaction_id: Some(_), page_count: 4, .. }
        ));
        assert_eq!(client.transaction_posts.load(Ordering::SeqCst), 1);
        assert_eq!(client.delta_posts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_run_yields_a_delta_plan() {
        let client = Arc::new(StubUpstream::default());
        let orchestrator = orchestrator(Arc::clone(&client)).await;

        let first = orchestrator.create_snapshot("creds-1").await.unwrap();
        assert!(matches!(first.plan, LoadPlan::Full { .. }));

        let second = orchestrator.create_snapshot("creds-1").await.unwrap();
        assert_eq!(second.total_count, 120);
        assert!(matches!(second.plan, LoadPlan::Delta { page_count: 1, .. }));
        assert_eq!(client.delta_posts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fresh_upstream_transaction_is_reused() {
        let client = Arc::new(StubUpstream {
            listed: vec![UpstreamTransaction {
                transaction_id: "txn-existing".into(),
                created: Utc::now() - chrono::Duration::minutes(1),
            }],
            ..Default::default()
        });
        let orchestrator = orchestrator(Arc::clone(&client)).await;

        let outcome = orchestrator.create_snapshot("creds-1").await.unwrap();
        assert!(matches!(
            outcome.plan,
            LoadPlan::Full { transaction_id: Some(ref id), .. } if id == "txn-existing"
        ));
        assert_eq!(client.transaction_posts.load(Ordering::SeqCst), 0);
    }
}
