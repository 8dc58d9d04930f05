//! Scheduled-task abstraction for retry timers
//!
//! Retry waits are realized as scheduled timers rather than blocking sleeps,
//! and every pending timer hands out a cancellation token so a finished or
//! superseded run can cancel it. The trait keeps timers mockable in tests.

use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// One pending timer. `wait` resolves to `true` when the timer fired and
/// `false` when it was cancelled first.
#[derive(Debug)]
pub struct ScheduledTimer {
    fired: oneshot::Receiver<()>,
    cancel: CancellationToken,
}

impl ScheduledTimer {
    pub fn new(fired: oneshot::Receiver<()>, cancel: CancellationToken) -> Self {
        Self { fired, cancel }
    }

    /// Token a caller can hold on to for cancelling this timer
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) -> bool {
        self.fired.await.is_ok()
    }
}

/// Produces cancellable one-shot timers
pub trait Scheduler: Send + Sync {
    fn schedule_after(&self, delay: Duration) -> ScheduledTimer;
}

/// Production scheduler backed by `tokio::time`
#[derive(Debug, Default, Clone)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration) -> ScheduledTimer {
        let (tx, rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = tx.send(());
                }
            }
        });
        ScheduledTimer::new(rx, cancel)
    }
}

/// Test scheduler whose timers fire immediately regardless of delay
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct ImmediateScheduler;

#[cfg(test)]
impl Scheduler for ImmediateScheduler {
    fn schedule_after(&self, _delay: Duration) -> ScheduledTimer {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(());
        ScheduledTimer::new(rx, CancellationToken::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timer_fires_after_delay() {
        let scheduler = TokioScheduler;
        let timer = scheduler.schedule_after(Duration::from_millis(1));
        assert!(timer.wait().await);
    }

    #[tokio::test]
    async fn cancelled_timer_never_fires() {
        let scheduler = TokioScheduler;
        let timer = scheduler.schedule_after(Duration::from_secs(3600));
        timer.cancellation().cancel();
        assert!(!timer.wait().await);
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let scheduler = TokioScheduler;
        let timer = scheduler.schedule_after(Duration::from_secs(3600));
        let token = timer.cancellation();
        token.cancel();
        token.cancel();
        assert!(!timer.wait().await);
    }
}
