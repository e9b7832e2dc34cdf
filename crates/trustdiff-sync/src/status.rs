//! Thread-safe refresh progress tracking.

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use trustdiff_core::RefreshStatus;

/// Owns the [`RefreshStatus`] of one catalog.
///
/// Every mutation replaces the whole snapshot under a single lock, so
/// readers never observe a half-applied update.
#[derive(Debug, Default)]
pub struct RefreshStatusTracker {
    current: Mutex<Arc<RefreshStatus>>,
}

impl RefreshStatusTracker {
    /// Tracker that has never refreshed
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot
    #[must_use]
    pub fn status(&self) -> Arc<RefreshStatus> {
        Arc::clone(&self.lock())
    }

    /// Mark a refresh as started: counters reset, error cleared.
    pub fn begin_refresh(&self) {
        self.update(|status| {
            status.is_refreshing = true;
            status.total_certificates = 0;
            status.processed_certificates = 0;
            status.last_attempt_utc = Some(Utc::now());
            status.error_message = None;
        });
    }

    /// Record how many certificates the running refresh will fetch.
    pub fn set_total_certificates(&self, total: usize) {
        self.update(|status| {
            if status.is_refreshing {
                status.total_certificates = total;
                status.processed_certificates = status.processed_certificates.min(total);
            }
        });
    }

    /// Record how many certificates have been resolved so far.
    pub fn report_progress(&self, processed: usize) {
        self.update(|status| {
            if !status.is_refreshing {
                return;
            }
            status.processed_certificates = if status.total_certificates > 0 {
                processed.min(status.total_certificates)
            } else {
                processed
            };
        });
    }

    /// Mark the running refresh as successful.
    pub fn complete_success(&self) {
        self.update(|status| {
            let done = status.total_certificates.max(status.processed_certificates);
            status.is_refreshing = false;
            status.total_certificates = done;
            status.processed_certificates = done;
            status.last_success_utc = Some(Utc::now());
            status.error_message = None;
        });
    }

    /// Mark the running refresh as failed; counters are kept for display.
    pub fn complete_failure(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|status| {
            status.is_refreshing = false;
            status.error_message = Some(message);
        });
    }

    /// Leave the refreshing state without recording success or failure.
    pub(crate) fn abandon(&self) {
        self.update(|status| status.is_refreshing = false);
    }

    fn update(&self, apply: impl FnOnce(&mut RefreshStatus)) {
        let mut guard = self.lock();
        let mut next = RefreshStatus::clone(&guard);
        apply(&mut next);
        debug!(
            refreshing = next.is_refreshing,
            processed = next.processed_certificates,
            total = next.total_certificates,
            "refresh status updated"
        );
        *guard = Arc::new(next);
    }

    fn lock(&self) -> MutexGuard<'_, Arc<RefreshStatus>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
