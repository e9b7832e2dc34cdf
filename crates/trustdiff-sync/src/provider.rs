//! The synchronized program catalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use trustdiff_client::TrustDiffClient;
use trustdiff_core::{Certificate, RefreshStatus, Result, TrustDiffError};

use crate::cache::CertificateCacheStore;
use crate::cancel::CancellationToken;
use crate::compare::CatalogProvider;
use crate::downloader::Downloader;
use crate::report::{distinct_fingerprints, parse_report};
use crate::status::RefreshStatusTracker;

/// Cache key the catalog is persisted under
pub const CATALOG_CACHE_KEY: &str = "MicrosoftTrustedRootProgramCertificates";

/// What a call to [`ProgramCatalog::refresh`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The catalog was rebuilt and saved
    Completed {
        /// Certificates persisted
        certificates: usize,
    },
    /// Another refresh held the catalog; this request was dropped
    AlreadyRunning,
}

/// Inclusion-report catalog backed by a cache store.
///
/// Cheap to clone; clones share the cache, tracker and single-flight flag.
#[derive(Clone)]
pub struct ProgramCatalog {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    client: TrustDiffClient,
    store: Arc<dyn CertificateCacheStore>,
    tracker: Arc<RefreshStatusTracker>,
    downloader: Downloader,
    cache_key: String,
    refreshing: AtomicBool,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for ProgramCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramCatalog")
            .field("cache_key", &self.inner.cache_key)
            .field("downloader", &self.inner.downloader)
            .field("refreshing", &self.inner.refreshing.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Holds the single-flight flag; releases it on drop.
///
/// A refresh future dropped mid-flight never reaches its completion
/// bookkeeping, so the tracker is taken out of the refreshing state here.
struct RefreshPermit {
    inner: Arc<CatalogInner>,
}

impl Drop for RefreshPermit {
    fn drop(&mut self) {
        if self.inner.tracker.status().is_refreshing {
            warn!("catalog refresh dropped before completion");
            self.inner.tracker.abandon();
        }
        self.inner.refreshing.store(false, Ordering::SeqCst);
    }
}

impl ProgramCatalog {
    /// Catalog with default settings
    pub fn new(client: TrustDiffClient, store: Arc<dyn CertificateCacheStore>) -> Self {
        Self::builder(client, store).build()
    }

    /// Builder for custom settings
    pub fn builder(
        client: TrustDiffClient,
        store: Arc<dyn CertificateCacheStore>,
    ) -> ProgramCatalogBuilder {
        ProgramCatalogBuilder::new(client, store)
    }

    /// Cached catalog certificates.
    ///
    /// When the cache is empty and nothing is refreshing, a background
    /// refresh is started and an empty list returned right away.
    pub async fn certificates(&self) -> Result<Vec<Certificate>> {
        let cached = self.inner.store.get(&self.inner.cache_key).await?;
        if !cached.is_empty() {
            return Ok(cached);
        }

        info!("catalog cache is empty; returning no certificates while a refresh is scheduled");
        if !self.inner.tracker.status().is_refreshing {
            self.schedule_refresh();
        }
        Ok(Vec::new())
    }

    /// Start a background refresh unless one is already running.
    ///
    /// Returns whether a refresh was started.
    pub fn schedule_refresh(&self) -> bool {
        let Some(permit) = self.try_acquire() else {
            return false;
        };

        let catalog = self.clone();
        tokio::spawn(async move {
            let cancel = catalog.inner.shutdown.clone();
            match catalog.refresh_with(permit, &cancel).await {
                Ok(_) => {}
                Err(e) if e.is_cancelled() => info!("background refresh cancelled"),
                Err(e) => error!(error = %e, "background catalog refresh failed"),
            }
        });
        true
    }

    /// Rebuild the catalog from the inclusion report and persist it.
    ///
    /// Failures are recorded on the tracker and returned. Cancellation is
    /// returned without being recorded as a failure.
    #[instrument(skip_all)]
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<RefreshOutcome> {
        let Some(permit) = self.try_acquire() else {
            info!("catalog refresh already running; request dropped");
            return Ok(RefreshOutcome::AlreadyRunning);
        };
        self.refresh_with(permit, cancel).await
    }

    async fn refresh_with(
        &self,
        _permit: RefreshPermit,
        cancel: &CancellationToken,
    ) -> Result<RefreshOutcome> {
        let tracker = &self.inner.tracker;
        info!("refreshing catalog");
        tracker.begin_refresh();

        match self.rebuild(cancel).await {
            Ok(certificates) => {
                tracker.complete_success();
                info!(certificates, "catalog persisted");
                Ok(RefreshOutcome::Completed { certificates })
            }
            Err(e) if e.is_cancelled() => {
                tracker.abandon();
                Err(e)
            }
            Err(e) => {
                tracker.complete_failure(e.to_string());
                Err(e)
            }
        }
    }

    async fn rebuild(&self, cancel: &CancellationToken) -> Result<usize> {
        let inner = &self.inner;

        let api = inner.client.report();
        let report = tokio::select! {
            report = api.fetch() => report?,
            () = cancel.cancelled() => return Err(TrustDiffError::Cancelled),
        };
        if report.trim().is_empty() {
            error!("inclusion report returned no content");
            return Err(TrustDiffError::EmptyResult(
                "inclusion report could not be retrieved".into(),
            ));
        }

        let entries = parse_report(&report, Utc::now())?;
        if entries.is_empty() {
            error!("inclusion report did not contain any active certificates");
            return Err(TrustDiffError::EmptyResult(
                "inclusion report did not contain any active certificates".into(),
            ));
        }

        let fingerprints = distinct_fingerprints(&entries);
        inner.tracker.set_total_certificates(fingerprints.len());

        let downloaded = inner
            .downloader
            .download(&fingerprints, &inner.tracker, cancel)
            .await?;
        if downloaded.is_empty() {
            error!(
                entries = entries.len(),
                "no certificates could be downloaded for the active entries"
            );
            return Err(TrustDiffError::EmptyResult(
                "catalog certificates could not be downloaded".into(),
            ));
        }
        if downloaded.len() < fingerprints.len() {
            warn!(
                requested = fingerprints.len(),
                resolved = downloaded.len(),
                "some catalog certificates could not be downloaded"
            );
        }

        let blobs: Vec<Vec<u8>> = downloaded
            .into_iter()
            .map(|item| item.certificate.into_der())
            .collect();
        inner.store.save(&inner.cache_key, &blobs).await?;
        Ok(blobs.len())
    }

    fn try_acquire(&self) -> Option<RefreshPermit> {
        self.inner
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RefreshPermit {
                inner: Arc::clone(&self.inner),
            })
    }

    /// Current refresh progress
    #[must_use]
    pub fn status(&self) -> Arc<RefreshStatus> {
        self.inner.tracker.status()
    }

    /// The tracker this catalog reports to
    #[must_use]
    pub fn tracker(&self) -> &Arc<RefreshStatusTracker> {
        &self.inner.tracker
    }

    /// When the cached catalog was last saved
    pub async fn last_updated(&self) -> Result<Option<DateTime<Utc>>> {
        self.inner.store.last_updated(&self.inner.cache_key).await
    }

    /// Cancel any background refresh started by this catalog.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }
}

#[async_trait]
impl CatalogProvider for ProgramCatalog {
    async fn catalog_certificates(&self) -> Result<Vec<Certificate>> {
        self.certificates().await
    }
}

/// Builder for a [`ProgramCatalog`]
pub struct ProgramCatalogBuilder {
    client: TrustDiffClient,
    store: Arc<dyn CertificateCacheStore>,
    downloader: Downloader,
    tracker: Option<Arc<RefreshStatusTracker>>,
    cache_key: String,
}

impl ProgramCatalogBuilder {
    fn new(client: TrustDiffClient, store: Arc<dyn CertificateCacheStore>) -> Self {
        Self {
            downloader: Downloader::new(client.clone()),
            client,
            store,
            tracker: None,
            cache_key: CATALOG_CACHE_KEY.to_string(),
        }
    }

    /// Number of certificate downloads in flight
    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.downloader = self.downloader.concurrency(concurrency);
        self
    }

    /// Replace the delay between download attempts
    #[must_use]
    pub fn delay_fn<F>(mut self, delay: F) -> Self
    where
        F: Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        self.downloader = self.downloader.delay_fn(delay);
        self
    }

    /// Share an existing tracker
    #[must_use]
    pub fn tracker(mut self, tracker: Arc<RefreshStatusTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Persist under a different cache key
    #[must_use]
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = key.into();
        self
    }

    /// Build the catalog
    #[must_use]
    pub fn build(self) -> ProgramCatalog {
        ProgramCatalog {
            inner: Arc::new(CatalogInner {
                client: self.client,
                store: self.store,
                tracker: self.tracker.unwrap_or_default(),
                downloader: self.downloader,
                cache_key: self.cache_key,
                refreshing: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use futures_util::FutureExt;
    use rcgen::{CertificateParams, DnType, KeyPair};
    use trustdiff_core::sha256_fingerprint;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HEADER: &str = "Microsoft Status,CA Owner,Subject,SHA-1 Fingerprint,SHA-256 Fingerprint,Valid From [GMT],Valid To [GMT]";

    struct Fixture {
        server: MockServer,
        store: Arc<MemoryCacheStore>,
        catalog: ProgramCatalog,
    }

    fn mint(name: &str) -> (Vec<u8>, String) {
        let key_pair = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, name);
        let der = params.self_signed(&key_pair).unwrap().der().to_vec();
        let fingerprint = sha256_fingerprint(&der);
        (der, fingerprint)
    }

    /// Colon-separated lower-case spelling, as some reports carry
    fn spaced(fingerprint: &str) -> String {
        fingerprint
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).to_lowercase())
            .collect::<Vec<_>>()
            .join(":")
    }

    async fn fixture(report: String) -> Fixture {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/report.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(report))
            .mount(&server)
            .await;

        let client = TrustDiffClient::builder().base_url(&server.uri()).build().unwrap();
        let store = Arc::new(MemoryCacheStore::new());
        let catalog = ProgramCatalog::builder(client, store.clone())
            .delay_fn(|_| async {}.boxed())
            .build();
        Fixture {
            server,
            store,
            catalog,
        }
    }

    async fn serve_certificate(server: &MockServer, der: Vec<u8>, fingerprint: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/cert/{fingerprint}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(der))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn refresh_persists_catalog() {
        let (der_a, fp_a) = mint("Catalog A");
        let (der_b, fp_b) = mint("Catalog B");
        let report = format!(
            "{HEADER}\n\
             Included,Owner,CN=Catalog A,,{},2020-01-01,2040-01-01\n\
             Included,Owner,CN=Catalog A dup,,{},2020-01-01,2040-01-01\n\
             Included,Owner,CN=Catalog B,,{fp_b},2020-01-01,2040-01-01\n\
             Included,Owner,CN=Expired,,FFFF,2000-01-01,2001-01-01\n",
            spaced(&fp_a),
            fp_a.to_lowercase(),
        );
        let f = fixture(report).await;
        serve_certificate(&f.server, der_a, &fp_a).await;
        serve_certificate(&f.server, der_b, &fp_b).await;

        let outcome = f.catalog.refresh(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Completed { certificates: 2 });

        let status = f.catalog.status();
        assert!(!status.is_refreshing);
        assert_eq!(status.total_certificates, 2);
        assert_eq!(status.processed_certificates, 2);
        assert!(status.last_success_utc.is_some());

        assert_eq!(f.store.get(CATALOG_CACHE_KEY).await.unwrap().len(), 2);
        assert!(f.catalog.last_updated().await.unwrap().is_some());
        assert_eq!(f.catalog.certificates().await.unwrap().len(), 2);

        // The duplicate spelling was fetched once
        let cert_requests = f
            .server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.url.path().starts_with("/cert/"))
            .count();
        assert_eq!(cert_requests, 2);
    }

    #[tokio::test]
    async fn rate_limited_certificate_is_retried() {
        let (der, fp) = mint("Throttled");
        let f = fixture(format!("{HEADER}\nIncluded,O,CN=Throttled,,{fp},,\n")).await;

        Mock::given(method("GET"))
            .and(path(format!("/cert/{fp}")))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&f.server)
            .await;
        serve_certificate(&f.server, der, &fp).await;

        let outcome = f.catalog.refresh(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Completed { certificates: 1 });
    }

    #[tokio::test]
    async fn failures_are_recorded() {
        let f = fixture(format!("{HEADER}\nIncluded,O,CN=Gone,,ABCD,,\n")).await;
        Mock::given(method("GET"))
            .and(path("/cert/ABCD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&f.server)
            .await;

        let err = f.catalog.refresh(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TrustDiffError::EmptyResult(_)));

        let status = f.catalog.status();
        assert!(!status.is_refreshing);
        assert!(status.error_message.is_some());
        assert!(f.catalog.last_updated().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn schema_errors_propagate() {
        let f = fixture("Subject,Owner\nCN=x,y\n".to_string()).await;
        let err = f.catalog.refresh(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TrustDiffError::Schema { .. }));
        assert!(f.catalog.status().error_message.is_some());
    }

    #[tokio::test]
    async fn report_without_active_rows_is_empty_result() {
        let f = fixture(format!("{HEADER}\nRevoked,O,CN=x,,AB,,\n")).await;
        let err = f.catalog.refresh(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TrustDiffError::EmptyResult(_)));
    }

    #[tokio::test]
    async fn cancellation_is_not_a_failure() {
        let f = fixture(format!("{HEADER}\nIncluded,O,CN=x,,AB,,\n")).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = f.catalog.refresh(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());

        let status = f.catalog.status();
        assert!(!status.is_refreshing);
        assert!(status.error_message.is_none());
    }

    #[tokio::test]
    async fn concurrent_refresh_is_dropped() {
        let f = fixture(format!("{HEADER}\nIncluded,O,CN=Slow,,AB,,\n")).await;
        Mock::given(method("GET"))
            .and(path("/cert/AB"))
            .respond_with(ResponseTemplate::new(404).set_delay(std::time::Duration::from_millis(300)))
            .mount(&f.server)
            .await;

        let first = {
            let catalog = f.catalog.clone();
            tokio::spawn(async move { catalog.refresh(&CancellationToken::new()).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let second = f.catalog.refresh(&CancellationToken::new()).await.unwrap();
        assert_eq!(second, RefreshOutcome::AlreadyRunning);
        assert!(first.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn empty_cache_schedules_background_refresh() {
        let (der, fp) = mint("Lazy");
        let f = fixture(format!("{HEADER}\nIncluded,O,CN=Lazy,,{fp},,\n")).await;
        serve_certificate(&f.server, der, &fp).await;

        assert!(f.catalog.certificates().await.unwrap().is_empty());

        let mut loaded = Vec::new();
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            loaded = f.store.get(CATALOG_CACHE_KEY).await.unwrap();
            if !loaded.is_empty() {
                break;
            }
        }
        assert_eq!(loaded.len(), 1);
        assert_eq!(f.catalog.certificates().await.unwrap()[0].subject(), "CN=Lazy");
    }

    async fn requests_to(server: &MockServer, prefix: &str) -> usize {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path().starts_with(prefix))
            .count()
    }

    #[tokio::test]
    async fn dropped_refresh_stops_downloads_and_releases_catalog() {
        let rows: String = (1..=12)
            .map(|i| format!("Included,O,CN=Slow {i},,A{i:02},,\n"))
            .collect();
        let f = fixture(format!("{HEADER}\n{rows}")).await;
        Mock::given(method("GET"))
            .and(path_regex("^/cert/"))
            .respond_with(ResponseTemplate::new(404).set_delay(std::time::Duration::from_millis(300)))
            .mount(&f.server)
            .await;

        // Four at a time: the second wave is in flight when the caller gives up.
        let dropped = tokio::time::timeout(
            std::time::Duration::from_millis(450),
            f.catalog.refresh(&CancellationToken::new()),
        )
        .await;
        assert!(dropped.is_err());

        let at_drop = requests_to(&f.server, "/cert/").await;
        assert!(at_drop < 12);
        tokio::time::sleep(std::time::Duration::from_millis(800)).await;
        assert_eq!(requests_to(&f.server, "/cert/").await, at_drop);

        let status = f.catalog.status();
        assert!(!status.is_refreshing);
        assert!(status.processed_certificates < 12);
        assert!(status.error_message.is_none());

        // The lazy path is open again
        assert!(f.catalog.certificates().await.unwrap().is_empty());
        let mut report_fetches = 0;
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            report_fetches = requests_to(&f.server, "/report.csv").await;
            if report_fetches == 2 {
                break;
            }
        }
        assert_eq!(report_fetches, 2);
        f.catalog.shutdown();
    }
}
