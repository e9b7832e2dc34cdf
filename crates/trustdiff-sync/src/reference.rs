//! Memoized reference root store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};
use trustdiff_client::TrustDiffClient;
use trustdiff_core::{Certificate, Result};

use crate::compare::ReferenceProvider;

/// How long a downloaded reference store is served before refetching
pub const DEFAULT_REFERENCE_TTL: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug)]
struct Snapshot {
    certificates: Vec<Certificate>,
    fetched_at: Instant,
    fetched_at_utc: DateTime<Utc>,
}

/// Reference root store, downloaded on demand and kept for a TTL.
pub struct ReferenceRootStore {
    client: TrustDiffClient,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl std::fmt::Debug for ReferenceRootStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceRootStore")
            .field("reference_url", &self.client.endpoints().reference_url)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ReferenceRootStore {
    /// Store with the default TTL
    #[must_use]
    pub fn new(client: TrustDiffClient) -> Self {
        Self::with_ttl(client, DEFAULT_REFERENCE_TTL)
    }

    /// Store with a custom TTL
    #[must_use]
    pub fn with_ttl(client: TrustDiffClient, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    /// Current certificates, fetching if the snapshot is missing or stale.
    ///
    /// A failed fetch is returned as an error; a stale snapshot is not served.
    pub async fn certificates(&self) -> Result<Vec<Certificate>> {
        if let Some(fresh) = self.fresh().await {
            return Ok(fresh);
        }

        let mut slot = self.snapshot.write().await;
        // Another caller may have refilled it while we waited for the lock.
        if let Some(snapshot) = slot.as_ref().filter(|s| s.fetched_at.elapsed() < self.ttl) {
            return Ok(snapshot.certificates.clone());
        }

        let certificates = self.client.reference().fetch().await?;
        info!(count = certificates.len(), "reference store cached");
        *slot = Some(Snapshot {
            certificates: certificates.clone(),
            fetched_at: Instant::now(),
            fetched_at_utc: Utc::now(),
        });
        Ok(certificates)
    }

    /// When the cached snapshot was downloaded
    pub async fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.read().await.as_ref().map(|s| s.fetched_at_utc)
    }

    /// Drop the cached snapshot so the next read refetches.
    pub async fn invalidate(&self) {
        *self.snapshot.write().await = None;
        debug!("reference store invalidated");
    }

    async fn fresh(&self) -> Option<Vec<Certificate>> {
        self.snapshot
            .read()
            .await
            .as_ref()
            .filter(|s| s.fetched_at.elapsed() < self.ttl)
            .map(|s| s.certificates.clone())
    }
}

#[async_trait]
impl ReferenceProvider for ReferenceRootStore {
    async fn reference_certificates(&self) -> Result<Vec<Certificate>> {
        self.certificates().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, DnType, KeyPair};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pem(name: &str) -> String {
        let key_pair = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, name);
        params.self_signed(&key_pair).unwrap().pem()
    }

    async fn server_with_store() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/root_store.certs"))
            .respond_with(ResponseTemplate::new(200).set_body_string(pem("Cached Root")))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn serves_from_cache_within_ttl() {
        let server = server_with_store().await;
        let client = TrustDiffClient::builder().base_url(&server.uri()).build().unwrap();
        let store = ReferenceRootStore::new(client);

        assert!(store.fetched_at().await.is_none());
        assert_eq!(store.certificates().await.unwrap().len(), 1);
        assert_eq!(store.certificates().await.unwrap().len(), 1);
        assert!(store.fetched_at().await.is_some());

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn refetches_when_stale_or_invalidated() {
        let server = server_with_store().await;
        let client = TrustDiffClient::builder().base_url(&server.uri()).build().unwrap();

        let expiring = ReferenceRootStore::with_ttl(client.clone(), Duration::ZERO);
        expiring.certificates().await.unwrap();
        expiring.certificates().await.unwrap();

        let store = ReferenceRootStore::new(client);
        store.certificates().await.unwrap();
        store.invalidate().await;
        store.certificates().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 4);
    }

    #[test]
    fn debug_names_endpoint_and_ttl() {
        let client = TrustDiffClient::builder()
            .base_url("http://127.0.0.1:9")
            .build()
            .unwrap();
        let rendered = format!("{:?}", ReferenceRootStore::with_ttl(client, Duration::from_secs(60)));
        assert!(rendered.starts_with("ReferenceRootStore"));
        assert!(rendered.contains("http://127.0.0.1:9/root_store.certs"));
        assert!(rendered.contains("60s"));
    }
}
