//! Periodic catalog refresh.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use trustdiff_core::Result;

use crate::cancel::CancellationToken;
use crate::provider::{ProgramCatalog, RefreshOutcome};

/// Default time between refreshes
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// Something the scheduler can refresh
#[async_trait]
pub trait RefreshTask: Send + Sync {
    /// Run one full refresh
    async fn refresh(&self, cancel: &CancellationToken) -> Result<RefreshOutcome>;
}

#[async_trait]
impl RefreshTask for ProgramCatalog {
    async fn refresh(&self, cancel: &CancellationToken) -> Result<RefreshOutcome> {
        Self::refresh(self, cancel).await
    }
}

/// Runs a refresh at startup and then once per interval.
pub struct Scheduler {
    task: Arc<dyn RefreshTask>,
    interval: Duration,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Scheduler with the default interval
    pub fn new(task: Arc<dyn RefreshTask>) -> Self {
        Self::with_interval(task, DEFAULT_REFRESH_INTERVAL)
    }

    /// Scheduler with a custom interval (at least one millisecond)
    pub fn with_interval(task: Arc<dyn RefreshTask>, interval: Duration) -> Self {
        Self {
            task,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Time between refreshes
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Loop until `cancel` fires. Refresh failures are logged, never returned.
    pub async fn run(&self, cancel: &CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "starting catalog refresh scheduler");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = cancel.cancelled() => break,
            }
            self.run_once(cancel).await;
            if cancel.is_cancelled() {
                break;
            }
        }

        info!("stopping catalog refresh scheduler");
    }

    async fn run_once(&self, cancel: &CancellationToken) {
        match self.task.refresh(cancel).await {
            Ok(RefreshOutcome::Completed { certificates }) => {
                info!(certificates, "scheduled refresh complete");
            }
            Ok(RefreshOutcome::AlreadyRunning) => {
                debug!("scheduled refresh skipped; another is running");
            }
            Err(e) if e.is_cancelled() => debug!("scheduled refresh cancelled"),
            Err(e) => error!(error = %e, "scheduled catalog refresh failed"),
        }
    }
}
