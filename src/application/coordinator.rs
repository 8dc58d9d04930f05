//! Load run coordination
//!
//! One coordinator instance serves all credentials ids. `start_load` gates
//! concurrent runs, stamps the new run with a fresh `run_seq` and spawns the
//! run loop; the snapshot orchestration itself runs in a second task and
//! hands its outcome back over a one-slot channel. Every state change goes
//! through the status repository, whose `run_seq` guard silently discards
//! writes from a run that has been superseded.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::retry::RetryController;
use crate::application::snapshot::SnapshotOrchestrator;
use crate::domain::errors::PipelineError;
use crate::domain::events::{LoadEvent, LoadPlan, SnapshotMessage, SnapshotOutcome};
use crate::domain::load_status::LoadStatus;
use crate::infrastructure::config::PipelineConfig;
use crate::infrastructure::holdings_repository::HoldingsRepository;
use crate::infrastructure::status_repository::LoadStatusRepository;
use crate::infrastructure::upstream::UpstreamClient;

/// Handle to a run accepted by [`IngestionCoordinator::start_load`]
#[derive(Debug)]
pub struct StartedLoad {
    pub credentials_id: String,
    pub run_seq: i64,
    handle: JoinHandle<()>,
}

impl StartedLoad {
    /// Wait for the spawned run to finish, whichever way it ends
    pub async fn wait(self) {
        if let Err(err) = self.handle.await {
            error!("Load run task panicked: {err}");
        }
    }
}

#[derive(Clone)]
pub struct IngestionCoordinator {
    status: LoadStatusRepository,
    holdings: HoldingsRepository,
    orchestrator: Arc<dyn SnapshotOrchestrator>,
    client: Arc<dyn UpstreamClient>,
    retry: Arc<RetryController>,
    config: PipelineConfig,
    events: broadcast::Sender<LoadEvent>,
}

impl IngestionCoordinator {
    pub fn new(
        status: LoadStatusRepository,
        holdings: HoldingsRepository,
        orchestrator: Arc<dyn SnapshotOrchestrator>,
        client: Arc<dyn UpstreamClient>,
        retry: Arc<RetryController>,
        config: PipelineConfig,
        events: broadcast::Sender<LoadEvent>,
    ) -> Self {
        Self { status, holdings, orchestrator, client, retry, config, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoadEvent> {
        self.events.subscribe()
    }

    pub async fn get_status(&self, credentials_id: &str) -> Result<LoadStatus, PipelineError> {
        self.status.get(credentials_id).await
    }

    /// Begin a load run for a credentials id.
    ///
    /// Rejected with [`PipelineError::Conflict`] while a recently updated run
    /// is in progress. A run that stopped updating its status for longer than
    /// the staleness window is treated as dead and overridden.
    pub async fn start_load(&self, credentials_id: &str) -> Result<StartedLoad, PipelineError> {
        if self
            .status
            .is_running_and_fresh(credentials_id, self.config.staleness_window())
            .await?
        {
            return Err(PipelineError::Conflict);
        }
        // A stale run being overridden may still sit on a pending retry
        // timer; cancel it so it cannot bleed into this run
        self.retry.reset(credentials_id).await;

        let purged = self
            .status
            .purge_audit_older_than(credentials_id, self.config.audit_retention())
            .await?;
        if purged > 0 {
            debug!(credentials_id, purged, "Purged expired audit records");
        }

        let run_seq = self.status.next_run_seq(credentials_id).await?;
        let status = LoadStatus::populating_staging_area(credentials_id, run_seq);
        if !self.status.transition(&status).await? {
            return Err(PipelineError::Conflict);
        }
        info!(credentials_id, run_seq, "Load run started");

        let coordinator = self.clone();
        let id = credentials_id.to_string();
        let started = status.started;
        let handle = tokio::spawn(async move {
            coordinator.run_load(&id, run_seq, started).await;
        });

        Ok(StartedLoad {
            credentials_id: credentials_id.to_string(),
            run_seq,
            handle,
        })
    }

    /// Drive one run to a terminal state. Never returns an error; failures
    /// are recorded as a FAILED transition and a `LoadFailed` event.
    async fn run_load(&self, credentials_id: &str, run_seq: i64, started: Option<DateTime<Utc>>) {
        let (tx, mut rx) = mpsc::channel::<SnapshotMessage>(1);
        let orchestrator = Arc::clone(&self.orchestrator);
        let id = credentials_id.to_string();
        tokio::spawn(async move {
            let message = match orchestrator.create_snapshot(&id).await {
                Ok(outcome) => SnapshotMessage::Ready(outcome),
                Err(err) => SnapshotMessage::Failed(err),
            };
            // Receiver gone means the run was torn down; nothing to do
            let _ = tx.send(message).await;
        });

        let outcome = match rx.recv().await {
            Some(SnapshotMessage::Ready(outcome)) => outcome,
            Some(SnapshotMessage::Failed(err)) => {
                self.fail_run(credentials_id, run_seq, started, &err).await;
                return;
            }
            None => {
                self.fail_run(credentials_id, run_seq, started, &PipelineError::Cancelled)
                    .await;
                return;
            }
        };

        info!(
            credentials_id,
            run_seq,
            total_count = outcome.total_count,
            page_count = outcome.plan.page_count(),
            "Snapshot ready, loading holdings"
        );
        let _ = self.events.send(LoadEvent::SnapshotReady {
            credentials_id: credentials_id.to_string(),
            total_count: outcome.total_count,
            page_count: outcome.plan.page_count(),
            timestamp: Utc::now(),
        });

        let status = LoadStatus::loading_holdings(
            credentials_id,
            run_seq,
            started,
            0,
            outcome.total_count,
        );
        match self.status.transition(&status).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(credentials_id, run_seq, "Run superseded before loading began");
                return;
            }
            Err(err) => {
                self.fail_run(credentials_id, run_seq, started, &err).await;
                return;
            }
        }

        // Any page failure restarts the whole sequence from page zero
        let loaded = self
            .retry
            .attempt(
                credentials_id,
                |_| self.ingest_pages(credentials_id, run_seq, started, &outcome),
                |err, attempts_left| {
                    warn!(
                        credentials_id,
                        attempts_left, "Page sequence failed, restarting from page zero: {err}"
                    );
                },
            )
            .await;

        match loaded {
            Ok(touched_at) => {
                if matches!(outcome.plan, LoadPlan::Full { .. }) {
                    match self
                        .holdings
                        .delete_not_touched_since(credentials_id, touched_at)
                        .await
                    {
                        Ok(swept) if swept > 0 => {
                            info!(credentials_id, swept, "Removed holdings absent from snapshot");
                        }
                        Ok(_) => {}
                        Err(err) => {
                            self.fail_run(credentials_id, run_seq, started, &err).await;
                            return;
                        }
                    }
                }

                let pages = outcome.plan.page_count();
                let status = LoadStatus::completed(
                    credentials_id,
                    run_seq,
                    started,
                    pages,
                    outcome.total_count,
                );
                match self.status.transition(&status).await {
                    Ok(accepted) => {
                        if accepted {
                            info!(credentials_id, run_seq, pages, "Load run completed");
                            let _ = self.events.send(LoadEvent::LoadCompleted {
                                credentials_id: credentials_id.to_string(),
                                imported_pages: pages,
                                total_count: outcome.total_count,
                                timestamp: Utc::now(),
                            });
                        }
                    }
                    Err(err) => self.fail_run(credentials_id, run_seq, started, &err).await,
                }
            }
            Err(PipelineError::Cancelled) => {
                // A newer run owns the status row; leave it untouched
                debug!(credentials_id, run_seq, "Run superseded during loading");
            }
            Err(err) => self.fail_run(credentials_id, run_seq, started, &err).await,
        }
    }

    /// One full pass over the plan's pages. Returns the stamp applied to
    /// every row touched by this pass so the caller can sweep leftovers.
    async fn ingest_pages(
        &self,
        credentials_id: &str,
        run_seq: i64,
        started: Option<DateTime<Utc>>,
        outcome: &SnapshotOutcome,
    ) -> Result<DateTime<Utc>, PipelineError> {
        let touched_at = Utc::now();
        for page in 0..outcome.plan.page_count() {
            let records = match &outcome.plan {
                LoadPlan::Full { transaction_id, page_size, .. } => {
                    let records = match transaction_id {
                        Some(id) => {
                            self.client
                                .get_transaction_page(credentials_id, id, page, *page_size)
                                .await?
                        }
                        None => {
                            self.client
                                .get_snapshot_page(credentials_id, page, *page_size)
                                .await?
                        }
                    };
                    self.holdings
                        .upsert_page(credentials_id, &records, touched_at)
                        .await?;
                    records.len() as u32
                }
                LoadPlan::Delta { delta_id, page_size, .. } => {
                    let entries = self
                        .client
                        .get_delta_page(credentials_id, delta_id, page, *page_size)
                        .await?;
                    self.holdings
                        .apply_delta(credentials_id, &entries, touched_at)
                        .await?;
                    entries.len() as u32
                }
            };

            let status = LoadStatus::loading_holdings(
                credentials_id,
                run_seq,
                started,
                page + 1,
                outcome.total_count,
            );
            if !self.status.transition(&status).await? {
                return Err(PipelineError::Cancelled);
            }
            let _ = self.events.send(LoadEvent::PageSaved {
                credentials_id: credentials_id.to_string(),
                page,
                records,
                timestamp: Utc::now(),
            });
        }
        Ok(touched_at)
    }

    async fn fail_run(
        &self,
        credentials_id: &str,
        run_seq: i64,
        started: Option<DateTime<Utc>>,
        err: &PipelineError,
    ) {
        error!(credentials_id, run_seq, "Load run failed: {err}");
        let status = LoadStatus::failed(credentials_id, run_seq, started);
        match self.status.transition(&status).await {
            Ok(true) => {
                let _ = self.events.send(LoadEvent::LoadFailed {
                    credentials_id: credentials_id.to_string(),
                    category: err.category().to_string(),
                    timestamp: Utc::now(),
                });
            }
            Ok(false) => {
                debug!(credentials_id, run_seq, "Failure from a superseded run discarded");
            }
            Err(store_err) => {
                error!(credentials_id, run_seq, "Could not record failure: {store_err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::retry::RetryPolicy;
    use crate::application::scheduler::{ImmediateScheduler, TokioScheduler};
    use crate::application::snapshot::FullSnapshotOrchestrator;
    use crate::domain::events::DeltaEntry;
    use crate::domain::holding::HoldingRecord;
    use crate::domain::load_status::{LoadStatusDetail, LoadStatusName};
    use crate::infrastructure::database_connection::DatabaseConnection;
    use crate::infrastructure::upstream::{
        SnapshotStage, UpstreamLoadingStatus, UpstreamTransaction,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Snapshot is always completed with 2 pages worth of records; pages
    /// fail `fail_pages` times before succeeding.
    struct PagedUpstream {
        total_count: u32,
        fail_pages: AtomicU32,
        fail_once_at: Mutex<Option<u32>>,
        page_calls: AtomicU32,
    }

    impl PagedUpstream {
        fn new(total_count: u32, fail_pages: u32) -> Self {
            Self {
                total_count,
                fail_pages: AtomicU32::new(fail_pages),
                fail_once_at: Mutex::new(None),
                page_calls: AtomicU32::new(0),
            }
        }

        /// Fails the first fetch of the given page index, all others succeed
        fn failing_once_at(total_count: u32, page: u32) -> Self {
            Self {
                total_count,
                fail_pages: AtomicU32::new(0),
                fail_once_at: Mutex::new(Some(page)),
                page_calls: AtomicU32::new(0),
            }
        }

        fn record(&self, n: i64) -> HoldingRecord {
            HoldingRecord {
                vendor_id: 1,
                package_id: 2,
                title_id: n,
                publication_title: format!("Title {n}"),
                publisher_name: None,
                resource_type: None,
                format: None,
                embargo: None,
            }
        }
    }

    #[async_trait]
    impl UpstreamClient for PagedUpstream {
        async fn get_status(
            &self,
            _credentials_id: &str,
        ) -> Result<UpstreamLoadingStatus, PipelineError> {
            Ok(UpstreamLoadingStatus {
                status: SnapshotStage::Completed,
                created: Some(Utc::now()),
                total_count: Some(self.total_count),
            })
        }

        async fn request_snapshot(&self, _credentials_id: &str) -> Result<(), PipelineError> {
            Ok(())
        }

        async fn get_snapshot_page(
            &self,
            _credentials_id: &str,
            page: u32,
            page_size: u32,
        ) -> Result<Vec<HoldingRecord>, PipelineError> {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            if self
                .fail_pages
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(PipelineError::UpstreamUnavailable {
                    status: 503,
                    message: "upstream hiccup".into(),
                });
            }
            {
                let mut fail_once = self.fail_once_at.lock().unwrap();
                if *fail_once == Some(page) {
                    *fail_once = None;
                    return Err(PipelineError::UpstreamUnavailable {
                        status: 503,
                        message: "upstream hiccup".into(),
                    });
                }
            }
            let base = (page * page_size) as i64;
            Ok((0..page_size as i64)
                .map(|n| self.record(base + n))
                .filter(|record| (record.title_id as u32) < self.total_count)
                .collect())
        }

        async fn list_transactions(
            &self,
            _credentials_id: &str,
        ) -> Result<Vec<UpstreamTransaction>, PipelineError> {
            Ok(vec![])
        }

        async fn create_transaction(
            &self,
            _credentials_id: &str,
        ) -> Result<UpstreamTransaction, PipelineError> {
            Err(PipelineError::UpstreamBadRequest { status: 404 })
        }

        async fn get_transaction_status(
            &self,
            _credentials_id: &str,
            _transaction_id: &str,
        ) -> Result<UpstreamLoadingStatus, PipelineError> {
            Err(PipelineError::UpstreamBadRequest { status: 404 })
        }

        async fn get_transaction_page(
            &self,
            _credentials_id: &str,
            _transaction_id: &str,
            _page: u32,
            _page_size: u32,
        ) -> Result<Vec<HoldingRecord>, PipelineError> {
            Err(PipelineError::UpstreamBadRequest { status: 404 })
        }

        async fn request_delta_report(
            &self,
            _credentials_id: &str,
            _from: &str,
            _to: &str,
        ) -> Result<String, PipelineError> {
            Err(PipelineError::UpstreamBadRequest { status: 404 })
        }

        async fn get_delta_report_status(
            &self,
            _credentials_id: &str,
            _delta_id: &str,
        ) -> Result<UpstreamLoadingStatus, PipelineError> {
            Err(PipelineError::UpstreamBadRequest { status: 404 })
        }

        async fn get_delta_page(
            &self,
            _credentials_id: &str,
            _delta_id: &str,
            _page: u32,
            _page_size: u32,
        ) -> Result<Vec<DeltaEntry>, PipelineError> {
            Err(PipelineError::UpstreamBadRequest { status: 404 })
        }
    }

    async fn coordinator(client: Arc<PagedUpstream>) -> IngestionCoordinator {
        let db = DatabaseConnection::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let status = LoadStatusRepository::new(db.pool().clone());
        let holdings = HoldingsRepository::new(db.pool().clone());
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        };
        let retry = Arc::new(RetryController::new(policy, Arc::new(ImmediateScheduler)));
        let (events, _rx) = broadcast::channel(256);
        let config = PipelineConfig { page_size: 10, ..Default::default() };
        let orchestrator = Arc::new(FullSnapshotOrchestrator::new(
            client.clone() as Arc<dyn UpstreamClient>,
            Arc::clone(&retry),
            config.clone(),
            events.clone(),
        ));
        IngestionCoordinator::new(
            status,
            holdings,
            orchestrator,
            client,
            retry,
            config,
            events,
        )
    }

    #[tokio::test]
    async fn successful_run_completes_and_persists_holdings() {
        let client = Arc::new(PagedUpstream::new(20, 0));
        let coordinator = coordinator(Arc::clone(&client)).await;
        let mut events = coordinator.subscribe();

        let started = coordinator.start_load("creds-1").await.unwrap();
        assert_eq!(started.run_seq, 1);
        started.wait().await;

        let status = coordinator.get_status("creds-1").await.unwrap();
        assert_eq!(status.name, LoadStatusName::Completed);
        assert_eq!(status.imported_pages, 2);
        assert_eq!(status.total_count, 20);
        assert!(status.started.unwrap() <= status.finished.unwrap());

        assert_eq!(coordinator.holdings.count("creds-1").await.unwrap(), 20);
        assert_eq!(client.page_calls.load(Ordering::SeqCst), 2);

        let mut saw_completed = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, LoadEvent::LoadCompleted { .. }) {
                saw_completed = true;
            }
        }
        assert!(saw_completed);
    }

    #[tokio::test]
    async fn page_failure_restarts_the_whole_sequence() {
        // First page fetch fails once: expect a full restart, so the 2-page
        // plan costs 1 failed call plus 2 successful ones.
        let client = Arc::new(PagedUpstream::new(20, 1));
        let coordinator = coordinator(Arc::clone(&client)).await;

        coordinator.start_load("creds-1").await.unwrap().wait().await;

        let status = coordinator.get_status("creds-1").await.unwrap();
        assert_eq!(status.name, LoadStatusName::Completed);
        assert_eq!(status.imported_pages, 2);
        assert_eq!(client.page_calls.load(Ordering::SeqCst), 3);
        assert_eq!(coordinator.holdings.count("creds-1").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn mid_sequence_page_failure_refetches_earlier_pages_too() {
        // Page 0 succeeds, page 1 fails once. The restart goes back to page
        // zero, so the 2-page plan costs exactly 4 fetches, not 3.
        let client = Arc::new(PagedUpstream::failing_once_at(20, 1));
        let coordinator = coordinator(Arc::clone(&client)).await;

        coordinator.start_load("creds-1").await.unwrap().wait().await;

        let status = coordinator.get_status("creds-1").await.unwrap();
        assert_eq!(status.name, LoadStatusName::Completed);
        assert_eq!(status.imported_pages, 2);
        assert_eq!(client.page_calls.load(Ordering::SeqCst), 4);
        assert_eq!(coordinator.holdings.count("creds-1").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn exhausted_page_retries_fail_the_run() {
        let client = Arc::new(PagedUpstream::new(20, u32::MAX));
        let coordinator = coordinator(Arc::clone(&client)).await;
        let mut events = coordinator.subscribe();

        coordinator.start_load("creds-1").await.unwrap().wait().await;

        let status = coordinator.get_status("creds-1").await.unwrap();
        assert_eq!(status.name, LoadStatusName::Failed);
        assert!(status.finished.is_some());
        // 3 attempts, each dying on its first page fetch
        assert_eq!(client.page_calls.load(Ordering::SeqCst), 3);

        let mut failed_category = None;
        while let Ok(event) = events.try_recv() {
            if let LoadEvent::LoadFailed { category, .. } = event {
                failed_category = Some(category);
            }
        }
        assert_eq!(failed_category.as_deref(), Some("RETRIES_EXHAUSTED"));
    }

    #[tokio::test]
    async fn concurrent_start_is_rejected_while_fresh() {
        let client = Arc::new(PagedUpstream::new(20, 0));
        let coordinator = coordinator(client).await;

        let run_seq = coordinator.status.next_run_seq("creds-1").await.unwrap();
        let running = LoadStatus::loading_holdings("creds-1", run_seq, Some(Utc::now()), 1, 20);
        assert!(coordinator.status.transition(&running).await.unwrap());

        let err = coordinator.start_load("creds-1").await.unwrap_err();
        assert!(matches!(err, PipelineError::Conflict));
    }

    #[tokio::test]
    async fn stale_run_is_overridden() {
        let client = Arc::new(PagedUpstream::new(10, 0));
        let coordinator = coordinator(Arc::clone(&client)).await;

        // A run whose last status write predates the staleness window
        let stale_updated = Utc::now() - coordinator.config.staleness_window()
            - chrono::Duration::hours(1);
        let mut stuck = LoadStatus::loading_holdings("creds-1", 1, Some(stale_updated), 1, 10);
        stuck.updated = Some(stale_updated);
        assert!(coordinator.status.transition(&stuck).await.unwrap());

        let started = coordinator.start_load("creds-1").await.unwrap();
        assert_eq!(started.run_seq, 2);
        started.wait().await;

        let status = coordinator.get_status("creds-1").await.unwrap();
        assert_eq!(status.name, LoadStatusName::Completed);
        assert_eq!(status.run_seq, 2);
    }

    #[tokio::test]
    async fn overriding_a_stale_run_cancels_its_pending_retry_timer() {
        let client = Arc::new(PagedUpstream::new(10, 0));
        let db = DatabaseConnection::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let status_repo = LoadStatusRepository::new(db.pool().clone());
        let holdings = HoldingsRepository::new(db.pool().clone());
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(3600),
            max_delay: Duration::from_secs(3600),
        };
        let retry = Arc::new(RetryController::new(policy, Arc::new(TokioScheduler)));
        let (events, _rx) = broadcast::channel(256);
        let config = PipelineConfig { page_size: 10, ..Default::default() };
        let orchestrator = Arc::new(FullSnapshotOrchestrator::new(
            client.clone() as Arc<dyn UpstreamClient>,
            Arc::clone(&retry),
            config.clone(),
            events.clone(),
        ));
        let coordinator = IngestionCoordinator::new(
            status_repo,
            holdings,
            orchestrator,
            client,
            Arc::clone(&retry),
            config,
            events,
        );

        // Dead run: an hour-long retry timer pending and a stale status row
        let stuck_loop = tokio::spawn({
            let retry = Arc::clone(&retry);
            async move {
                retry
                    .attempt(
                        "creds-1",
                        |_| async {
                            Err::<(), _>(PipelineError::UpstreamUnavailable {
                                status: 503,
                                message: "down".into(),
                            })
                        },
                        |_, _| {},
                    )
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stale_updated = Utc::now() - coordinator.config.staleness_window()
            - chrono::Duration::hours(1);
        let mut stuck = LoadStatus::loading_holdings("creds-1", 1, Some(stale_updated), 1, 10);
        stuck.updated = Some(stale_updated);
        assert!(coordinator.status.transition(&stuck).await.unwrap());

        let started = coordinator.start_load("creds-1").await.unwrap();
        let stuck_err = stuck_loop.await.unwrap().unwrap_err();
        assert!(matches!(stuck_err, PipelineError::Cancelled));

        started.wait().await;
        let status = coordinator.get_status("creds-1").await.unwrap();
        assert_eq!(status.name, LoadStatusName::Completed);
        assert_eq!(status.run_seq, 2);
    }

    #[tokio::test]
    async fn status_moves_through_loading_detail() {
        let client = Arc::new(PagedUpstream::new(20, 0));
        let coordinator = coordinator(client).await;
        let mut events = coordinator.subscribe();

        let started = coordinator.start_load("creds-1").await.unwrap();
        let during = coordinator.get_status("creds-1").await.unwrap();
        assert_eq!(during.name, LoadStatusName::InProgress);
        started.wait().await;

        let trail = coordinator.status.audit_trail("creds-1").await.unwrap();
        let details: Vec<_> = trail.iter().map(|r| (r.name, r.detail)).collect();
        assert_eq!(
            details.first(),
            Some(&(LoadStatusName::InProgress, LoadStatusDetail::PopulatingStagingArea))
        );
        assert!(details
            .contains(&(LoadStatusName::InProgress, LoadStatusDetail::LoadingHoldings)));
        assert_eq!(
            details.last(),
            Some(&(LoadStatusName::Completed, LoadStatusDetail::None))
        );

        let mut pages_saved = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, LoadEvent::PageSaved { .. }) {
                pages_saved += 1;
            }
        }
        assert_eq!(pages_saved, 2);
    }
}
