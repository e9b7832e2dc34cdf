//! Main HTTP client implementation.

use crate::api::{CertificateApi, ReferenceStoreApi, ReportApi};
use crate::config::{parse_retry_after, Endpoints, RetryConfig};
use chrono::Utc;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client as HttpClient, StatusCode};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use trustdiff_core::{Result, TrustDiffError};

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the upstream catalog, certificate and reference endpoints
#[derive(Clone)]
pub struct TrustDiffClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: HttpClient,
    endpoints: Endpoints,
    retry_config: RetryConfig,
    rate_limiter: Option<DefaultDirectRateLimiter>,
}

impl TrustDiffClient {
    /// Create a client with default endpoints and settings
    pub fn new() -> Result<Self> {
        TrustDiffClientBuilder::new().build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder() -> TrustDiffClientBuilder {
        TrustDiffClientBuilder::new()
    }

    /// Access the inclusion report endpoint
    #[must_use]
    pub fn report(&self) -> ReportApi<'_> {
        ReportApi::new(self)
    }

    /// Access per-certificate downloads
    #[must_use]
    pub fn certificates(&self) -> CertificateApi<'_> {
        CertificateApi::new(self)
    }

    /// Access the reference root store
    #[must_use]
    pub fn reference(&self) -> ReferenceStoreApi<'_> {
        ReferenceStoreApi::new(self)
    }

    /// Configured endpoints
    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.endpoints
    }

    /// Retry policy callers apply to per-certificate downloads
    #[must_use]
    pub fn retry_config(&self) -> &RetryConfig {
        &self.inner.retry_config
    }

    /// Perform a GET request, mapping non-2xx statuses to errors
    pub(crate) async fn get(&self, url: &str) -> Result<reqwest::Response> {
        if let Some(limiter) = &self.inner.rate_limiter {
            limiter.until_ready().await;
        }

        debug!(url = %url, "GET request");

        let response = self
            .inner
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TrustDiffError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "response received");

        if status.is_success() {
            Ok(response)
        } else {
            Err(classify_status(status, response.headers()))
        }
    }

    /// GET a text body
    pub(crate) async fn get_text(&self, url: &str) -> Result<String> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| TrustDiffError::Transport(e.to_string()))
    }

    /// GET a binary body
    pub(crate) async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.get(url)
            .await?
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| TrustDiffError::Transport(e.to_string()))
    }
}

/// Convert an error status into a retryable or terminal error
fn classify_status(status: StatusCode, headers: &HeaderMap) -> TrustDiffError {
    let retry_after = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, Utc::now()));

    match status.as_u16() {
        429 => {
            warn!(?retry_after, "rate limited by upstream");
            TrustDiffError::RateLimited { retry_after }
        }
        code if code >= 500 => TrustDiffError::Server {
            status: code,
            retry_after,
        },
        code => TrustDiffError::Client { status: code },
    }
}

/// Builder for configuring a [`TrustDiffClient`]
pub struct TrustDiffClientBuilder {
    endpoints: Endpoints,
    timeout: Duration,
    user_agent: String,
    retry_config: RetryConfig,
    requests_per_second: Option<u32>,
}

impl Default for TrustDiffClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustDiffClientBuilder {
    /// Create a new builder with default endpoints
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoints: Endpoints::default(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("trustdiff/{}", env!("CARGO_PKG_VERSION")),
            retry_config: RetryConfig::default(),
            requests_per_second: None,
        }
    }

    /// Replace all endpoints
    #[must_use]
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Point every endpoint at one base URL (useful for testing)
    #[must_use]
    pub fn base_url(mut self, url: &str) -> Self {
        self.endpoints = Endpoints::with_base(url);
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Set retry configuration
    #[must_use]
    pub const fn retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Throttle requests to at most this many per second; `0` disables it
    #[must_use]
    pub const fn requests_per_second(mut self, limit: u32) -> Self {
        self.requests_per_second = Some(limit);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<TrustDiffClient> {
        self.endpoints.validate()?;

        if self.retry_config.max_attempts == 0 {
            return Err(TrustDiffError::Config(
                "retry max_attempts must be at least 1".into(),
            ));
        }

        let http = HttpClient::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| TrustDiffError::Config(format!("failed to build HTTP client: {e}")))?;

        let rate_limiter = self
            .requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(TrustDiffClient {
            inner: Arc::new(ClientInner {
                http,
                endpoints: self.endpoints,
                retry_config: self.retry_config,
                rate_limiter,
            }),
        })
    }
}
