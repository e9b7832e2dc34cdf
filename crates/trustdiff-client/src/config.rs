//! Client configuration types.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;
use trustdiff_core::{Result, TrustDiffError};
use url::Url;

/// CCADB report listing the Microsoft Trusted Root Program's included CAs
pub const DEFAULT_REPORT_URL: &str =
    "https://ccadb.my.salesforce-sites.com/microsoft/IncludedCACertificateReportForMSFTCSV";

/// crt.sh download endpoint, templated by SHA-256 fingerprint
pub const DEFAULT_CERTIFICATE_URL_TEMPLATE: &str = "https://crt.sh/?d={fingerprint}";

/// Chrome Root Store source file, served base64-encoded by gitiles
pub const DEFAULT_REFERENCE_URL: &str = "https://chromium.googlesource.com/chromium/src/+/main/net/data/ssl/chrome_root_store/root_store.certs?format=TEXT";

/// Placeholder substituted with the fingerprint in the certificate URL template
pub const FINGERPRINT_PLACEHOLDER: &str = "{fingerprint}";

/// Upstream locations the client talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Inclusion report (CSV)
    pub report_url: String,

    /// Per-certificate download; must contain `{fingerprint}`
    pub certificate_url_template: String,

    /// Reference root store
    pub reference_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            report_url: DEFAULT_REPORT_URL.to_string(),
            certificate_url_template: DEFAULT_CERTIFICATE_URL_TEMPLATE.to_string(),
            reference_url: DEFAULT_REFERENCE_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Point every endpoint at one base URL (useful for testing)
    #[must_use]
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            report_url: format!("{base}/report.csv"),
            certificate_url_template: format!("{base}/cert/{FINGERPRINT_PLACEHOLDER}"),
            reference_url: format!("{base}/root_store.certs"),
        }
    }

    /// Check that every endpoint parses and the template has its placeholder
    pub fn validate(&self) -> Result<()> {
        parse_url(&self.report_url)?;
        parse_url(&self.reference_url)?;
        if !self.certificate_url_template.contains(FINGERPRINT_PLACEHOLDER) {
            return Err(TrustDiffError::Config(format!(
                "certificate URL template must contain {FINGERPRINT_PLACEHOLDER}"
            )));
        }
        self.certificate_url("00").map(|_| ())
    }

    /// Download URL for one fingerprint
    pub fn certificate_url(&self, fingerprint: &str) -> Result<Url> {
        parse_url(
            &self
                .certificate_url_template
                .replace(FINGERPRINT_PLACEHOLDER, fingerprint),
        )
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| TrustDiffError::InvalidUrl(format!("{raw}: {e}")))
}

/// Retry configuration for per-certificate downloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts per certificate, including the first
    pub max_attempts: u32,

    /// Backoff before the second attempt
    pub initial_backoff: Duration,

    /// Upper bound on exponential backoff
    pub max_backoff: Duration,

    /// Lower bound of the random jitter added to every delay
    pub jitter_min: Duration,

    /// Upper bound (exclusive) of the random jitter
    pub jitter_max: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: 6,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_millis(5000),
            jitter_min: Duration::from_millis(100),
            jitter_max: Duration::from_millis(300),
        }
    }

    /// Set maximum attempts
    #[must_use]
    pub const fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Set initial backoff duration
    #[must_use]
    pub const fn initial_backoff(mut self, duration: Duration) -> Self {
        self.initial_backoff = duration;
        self
    }

    /// Set maximum backoff duration
    #[must_use]
    pub const fn max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = duration;
        self
    }

    /// Set the jitter range
    #[must_use]
    pub const fn jitter(mut self, min: Duration, max: Duration) -> Self {
        self.jitter_min = min;
        self.jitter_max = max;
        self
    }

    /// Exponential backoff after the given (1-based) failed attempt, without jitter
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let backoff = self
            .initial_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff);
        backoff.min(self.max_backoff)
    }

    /// Delay before the next attempt: the server hint when positive, else
    /// exponential backoff, plus jitter either way.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base = retry_after
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| self.backoff_for(attempt));
        base + self.sample_jitter()
    }

    fn sample_jitter(&self) -> Duration {
        if self.jitter_max <= self.jitter_min {
            return self.jitter_min;
        }
        rand::thread_rng().gen_range(self.jitter_min..self.jitter_max)
    }
}

/// Parse a `Retry-After` header value: delta-seconds or an HTTP date.
///
/// Returns `None` for zero, past dates, or anything unparsable.
#[must_use]
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return (secs > 0).then(|| Duration::from_secs(secs));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    (date.with_timezone(&Utc) - now)
        .to_std()
        .ok()
        .filter(|d| !d.is_zero())
}
