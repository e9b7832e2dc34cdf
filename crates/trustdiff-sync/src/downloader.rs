//! Bounded-parallel certificate downloads with retry.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use trustdiff_client::TrustDiffClient;
use trustdiff_core::{Certificate, Fingerprint, Result, TrustDiffError};

use crate::cancel::CancellationToken;
use crate::status::RefreshStatusTracker;

/// Default number of downloads in flight
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Sleeps between attempts. Replaceable so tests can run without waiting.
pub type DelayFn = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

/// A certificate resolved from its fingerprint
#[derive(Debug, Clone)]
pub struct DownloadedCertificate {
    /// The parsed certificate
    pub certificate: Certificate,
    /// Attempts it took, including the successful one
    pub attempts: u32,
}

/// Resolves fingerprints to certificates through the client.
///
/// Item failures never fail the batch: a fingerprint that cannot be
/// resolved is logged and left out.
#[derive(Clone)]
pub struct Downloader {
    client: TrustDiffClient,
    concurrency: usize,
    delay: DelayFn,
}

impl fmt::Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("concurrency", &self.concurrency)
            .field("max_attempts", &self.client.retry_config().max_attempts)
            .finish_non_exhaustive()
    }
}

impl Downloader {
    /// Downloader using the client's retry policy and real sleeps
    #[must_use]
    pub fn new(client: TrustDiffClient) -> Self {
        Self {
            client,
            concurrency: DEFAULT_CONCURRENCY,
            delay: Arc::new(|wait| tokio::time::sleep(wait).boxed()),
        }
    }

    /// Set the number of downloads in flight (at least 1)
    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Replace the delay between attempts
    #[must_use]
    pub fn delay_fn<F>(mut self, delay: F) -> Self
    where
        F: Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        self.delay = Arc::new(delay);
        self
    }

    /// Configured parallelism
    #[must_use]
    pub const fn parallelism(&self) -> usize {
        self.concurrency
    }

    /// Download every fingerprint, reporting progress to `tracker`.
    ///
    /// Returns [`TrustDiffError::Cancelled`] if `cancel` fires before the
    /// batch completes.
    pub async fn download(
        &self,
        fingerprints: &[Fingerprint],
        tracker: &Arc<RefreshStatusTracker>,
        cancel: &CancellationToken,
    ) -> Result<Vec<DownloadedCertificate>> {
        if fingerprints.is_empty() {
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let processed = Arc::new(AtomicUsize::new(0));

        // Dropping the set aborts every worker, so an abandoned batch stops
        // fetching and stops touching the tracker.
        let mut workers = JoinSet::new();
        for fingerprint in fingerprints.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let processed = Arc::clone(&processed);
            let tracker = Arc::clone(tracker);
            let cancel = cancel.clone();
            let client = self.client.clone();
            let delay = Arc::clone(&self.delay);

            workers.spawn(async move {
                let _permit = tokio::select! {
                    permit = semaphore.acquire_owned() => permit
                        .map_err(|_| TrustDiffError::Cancelled)?,
                    () = cancel.cancelled() => return Err(TrustDiffError::Cancelled),
                };

                let outcome = fetch_with_retry(&client, &fingerprint, &delay, &cancel).await?;
                let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                tracker.report_progress(done);
                Ok::<_, TrustDiffError>(outcome)
            });
        }

        let mut resolved = Vec::new();
        let mut cancelled = false;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(Some(item))) => resolved.push(item),
                Ok(Ok(None)) => {}
                Ok(Err(e)) if e.is_cancelled() => cancelled = true,
                Ok(Err(e)) => warn!(error = %e, "download task failed"),
                Err(e) => error!(error = %e, "download task panicked"),
            }
        }

        if cancelled || cancel.is_cancelled() {
            info!(resolved = resolved.len(), "download batch cancelled");
            return Err(TrustDiffError::Cancelled);
        }

        info!(
            requested = fingerprints.len(),
            resolved = resolved.len(),
            "download batch complete"
        );
        Ok(resolved)
    }
}

/// Attempt one fingerprint until it resolves, fails terminally, or runs out of attempts.
async fn fetch_with_retry(
    client: &TrustDiffClient,
    fingerprint: &str,
    delay: &DelayFn,
    cancel: &CancellationToken,
) -> Result<Option<DownloadedCertificate>> {
    let retry = client.retry_config();
    let api = client.certificates();

    for attempt in 1..=retry.max_attempts {
        let result = tokio::select! {
            result = api.fetch(fingerprint) => result,
            () = cancel.cancelled() => return Err(TrustDiffError::Cancelled),
        };

        match result {
            Ok(certificate) => {
                debug!(fingerprint, attempt, "certificate resolved");
                return Ok(Some(DownloadedCertificate {
                    certificate,
                    attempts: attempt,
                }));
            }
            Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                let wait = retry.delay_for(attempt, e.retry_after());
                warn!(
                    fingerprint,
                    attempt,
                    wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "download failed, retrying"
                );
                tokio::select! {
                    () = delay(wait) => {}
                    () = cancel.cancelled() => return Err(TrustDiffError::Cancelled),
                }
            }
            Err(e) => {
                warn!(fingerprint, attempt, error = %e, "giving up on certificate");
                return Ok(None);
            }
        }
    }

    Ok(None)
}
