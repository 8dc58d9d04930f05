//! Bounded retry with backoff, one retry state per credentials id
//!
//! The controller wraps an async action in a bounded attempt loop: every
//! retryable failure decrements the budget and schedules the next try
//! through the timer abstraction, a terminal failure passes straight
//! through, and an exhausted budget reports `RetriesExhausted`. The same
//! controller instance drives snapshot status polling and the page-sequence
//! restart budget.
//!
//! Each attempt loop tags its state with an ownership token. A newer loop
//! for the same credentials id dispossesses the older one, whose later
//! bookkeeping and cleanup become no-ops, so a superseded run can never
//! cancel the timer of the run that replaced it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::scheduler::Scheduler;
use crate::domain::errors::PipelineError;
use crate::infrastructure::config::PipelineConfig;

/// Retry budget and backoff shape
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempt budget; values below 1 are treated as 1
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.retry_base_delay(),
            max_delay: config.retry_max_delay(),
        }
    }

    /// Exponential backoff `base * 2^(attempt-1)`, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let millis = (self.base_delay.as_millis() as u64).saturating_mul(1u64 << exponent);
        Duration::from_millis(millis.min(self.max_delay.as_millis() as u64))
    }
}

/// Mutable retry state of one credentials id
#[derive(Debug)]
struct RetryState {
    /// Token of the attempt loop this entry belongs to
    owner: u64,
    attempts_left: u32,
    /// Set iff a retry timer is currently pending
    timer: Option<CancellationToken>,
}

pub struct RetryController {
    policy: RetryPolicy,
    scheduler: Arc<dyn Scheduler>,
    states: RwLock<HashMap<String, RetryState>>,
    loop_seq: AtomicU64,
}

impl RetryController {
    pub fn new(policy: RetryPolicy, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            policy,
            scheduler,
            states: RwLock::new(HashMap::new()),
            loop_seq: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `action` with the bounded retry budget. `on_failure` is invoked
    /// once per failed attempt with the attempts left after it.
    pub async fn attempt<T, F, Fut, C>(
        &self,
        credentials_id: &str,
        action: F,
        mut on_failure: C,
    ) -> Result<T, PipelineError>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
        C: FnMut(&PipelineError, u32),
    {
        let owner = self.loop_seq.fetch_add(1, Ordering::Relaxed) + 1;
        // Entering an attempt loop re-arms the budget to the policy maximum
        // and dispossesses any lingering loop for the same credentials id
        let mut attempts_left = self.policy.max_attempts.max(1);
        {
            let mut states = self.states.write().await;
            states.insert(
                credentials_id.to_string(),
                RetryState { owner, attempts_left, timer: None },
            );
        }

        let mut attempt_no = 0u32;
        loop {
            attempt_no += 1;
            match action(attempt_no).await {
                Ok(value) => {
                    self.clear_owned(credentials_id, owner).await;
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    warn!(
                        credentials_id,
                        category = err.category(),
                        "Terminal failure, not retrying"
                    );
                    self.clear_owned(credentials_id, owner).await;
                    return Err(err);
                }
                Err(err) => {
                    attempts_left -= 1;
                    debug!(
                        credentials_id,
                        attempt = attempt_no,
                        attempts_left,
                        category = err.category(),
                        "Attempt failed"
                    );
                    on_failure(&err, attempts_left);

                    if attempts_left == 0 {
                        self.clear_owned(credentials_id, owner).await;
                        return Err(PipelineError::RetriesExhausted);
                    }

                    let delay = self.policy.backoff(attempt_no);
                    let timer = self.scheduler.schedule_after(delay);
                    {
                        let mut states = self.states.write().await;
                        match states.get_mut(credentials_id) {
                            Some(state) if state.owner == owner => {
                                state.attempts_left = attempts_left;
                                state.timer = Some(timer.cancellation());
                            }
                            // A newer loop took over; stop without touching it
                            _ => {
                                timer.cancellation().cancel();
                                return Err(PipelineError::Cancelled);
                            }
                        }
                    }

                    let fired = timer.wait().await;
                    {
                        let mut states = self.states.write().await;
                        if let Some(state) = states.get_mut(credentials_id) {
                            if state.owner == owner {
                                state.timer = None;
                            }
                        }
                    }
                    if !fired {
                        self.clear_owned(credentials_id, owner).await;
                        return Err(PipelineError::Cancelled);
                    }
                }
            }
        }
    }

    /// Cancel the active attempt loop for a credentials id, if any, and drop
    /// its state; idempotent. Called when a new run supersedes a stale one so
    /// the old run's pending timer never fires into the new run's window.
    pub async fn reset(&self, credentials_id: &str) {
        let mut states = self.states.write().await;
        if let Some(state) = states.remove(credentials_id) {
            if let Some(timer) = state.timer {
                timer.cancel();
            }
        }
    }

    /// Attempts left for a credentials id, if an attempt loop is active
    pub async fn attempts_left(&self, credentials_id: &str) -> Option<u32> {
        let states = self.states.read().await;
        states.get(credentials_id).map(|state| state.attempts_left)
    }

    /// Remove the entry only while this loop still owns it
    async fn clear_owned(&self, credentials_id: &str, owner: u64) {
        let mut states = self.states.write().await;
        if states
            .get(credentials_id)
            .is_some_and(|state| state.owner == owner)
        {
            if let Some(state) = states.remove(credentials_id) {
                if let Some(timer) = state.timer {
                    timer.cancel();
                }
            }
        }
    }
}
