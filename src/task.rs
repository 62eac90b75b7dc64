//! Cancellable background polling.

use std::future::Future;
use tokio::{
    task::JoinHandle,
    time::{Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Handle to a spawned polling task. Dropping the handle cancels the task.
#[derive(Debug)]
pub struct PollHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Spawns `f` with the token it must observe.
    pub fn spawn<F, Fut>(f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let task = tokio::spawn(f(token.clone()));
        Self {
            token,
            task: Some(task),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels the task and waits for it to wind down.
    pub async fn join(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(%err, "polling task failed");
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Ticking interval that delays instead of bursting after a slow tick.
pub fn interval(period: std::time::Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Waits for the next tick. `false` once cancelled.
pub async fn next_tick(interval: &mut Interval, token: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = interval.tick() => !token.is_cancelled(),
    }
}
