//! Background sweep of expired pairing codes, sessions and rate-limit windows

use crate::pairing::PairingRegistry;
use crate::rate_limit::RateLimiter;
use crate::session::SessionStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// What one sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub codes: usize,
    pub sessions: usize,
    pub windows: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.codes == 0 && self.sessions == 0 && self.windows == 0
    }
}

/// Removes expired state on a fixed period
#[derive(Clone)]
pub struct CleanupScheduler {
    registry: Arc<PairingRegistry>,
    sessions: Arc<SessionStore>,
    limiter: Arc<RateLimiter>,
}

impl CleanupScheduler {
    pub fn new(
        registry: Arc<PairingRegistry>,
        sessions: Arc<SessionStore>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            registry,
            sessions,
            limiter,
        }
    }

    /// Run one sweep at `now`
    ///
    /// Each collection is locked only while its own entries are removed.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let report = SweepReport {
            codes: self.registry.purge_expired(now).await,
            sessions: self.sessions.purge_expired(now).await,
            windows: self.limiter.purge_expired(now).await,
        };
        if !report.is_empty() {
            debug!(
                codes = report.codes,
                sessions = report.sessions,
                windows = report.windows,
                "Swept expired entries"
            );
        }
        report
    }

    /// Start sweeping every `period` until the returned handle is shut down
    pub fn spawn(self, period: Duration) -> CleanupHandle {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // skip immediate first tick

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Cleanup scheduler shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        self.sweep(Utc::now()).await;
                    }
                }
            }
        });

        CleanupHandle { shutdown_tx, task }
    }
}

/// Handle to a running cleanup task
pub struct CleanupHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Stop the task and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
    }
}
