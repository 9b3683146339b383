use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::repositories::session::SessionRepository;
use crate::storage::KvStore;

/// Background task deleting expired session records.
///
/// The first sweep runs one interval after spawning. Cancellation is only
/// observed between sweeps, so a sweep in progress always completes.
pub struct Sweeper {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawns the sweep loop on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn spawn<S: KvStore>(
        repo: SessionRepository<S>,
        interval: Duration,
        token: CancellationToken,
    ) -> Self {
        assert!(!interval.is_zero(), "sweep interval must be non-zero");
        let handle = tokio::spawn(sweep_loop(repo, interval, token.clone()));
        Self { token, handle }
    }

    /// Signals the loop to stop at its next tick boundary.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancels the loop and waits for the worker to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!("❌ Session sweeper terminated abnormally: {}", e);
        }
    }
}

async fn sweep_loop<S: KvStore>(
    repo: SessionRepository<S>,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!("✅ Session sweeper started (every {:?})", interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = token.cancelled() => break,
        }

        sweep_once(&repo).await;
    }

    tracing::info!("🛑 Session sweeper stopped");
}

/// Runs one expiry pass on the blocking pool.
///
/// Failures are logged and reported as `None`; they never stop the loop.
pub async fn sweep_once<S: KvStore>(repo: &SessionRepository<S>) -> Option<usize> {
    tracing::debug!("🧹 Sweeping expired sessions...");

    let repo = repo.clone();
    match tokio::task::spawn_blocking(move || repo.delete_expired(Utc::now())).await {
        Ok(Ok(removed)) => {
            if removed > 0 {
                tracing::info!("🧹 Removed {} expired session(s)", removed);
            }
            Some(removed)
        }
        Ok(Err(e)) => {
            tracing::error!("❌ Session sweep failed: {}", e);
            None
        }
        Err(e) => {
            tracing::error!("❌ Session sweep task failed: {}", e);
            None
        }
    }
}
