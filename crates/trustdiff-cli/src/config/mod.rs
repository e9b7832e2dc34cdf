//! Configuration management.

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use trustdiff::{
    system_sources, CertificateSource, Endpoints, PemBundleSource, PemDirectorySource,
    RetryConfig, TrustDiffClient, TrustRootAggregator, DEFAULT_CONCURRENCY,
};

use crate::output::OutputFormat;

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default output format.
    pub output_format: Option<OutputFormat>,

    /// Upstream URLs.
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Certificate download tuning.
    #[serde(default)]
    pub download: DownloadConfig,

    /// Hours between refreshes in `watch` mode.
    #[serde(default = "default_refresh_interval_hours")]
    pub refresh_interval_hours: u64,

    /// Hours a downloaded reference store is reused.
    #[serde(default = "default_reference_ttl_hours")]
    pub reference_ttl_hours: u64,

    /// Where the catalog cache lives; defaults to the platform cache dir.
    pub cache_dir: Option<PathBuf>,

    /// Local trust stores to enumerate; empty means the system stores.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// Upstream URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Inclusion report CSV
    pub report_url: String,
    /// Per-certificate download, containing `{fingerprint}`
    pub certificate_url_template: String,
    /// Reference root store
    pub reference_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        let endpoints = Endpoints::default();
        Self {
            report_url: endpoints.report_url,
            certificate_url_template: endpoints.certificate_url_template,
            reference_url: endpoints.reference_url,
        }
    }
}

/// Certificate download tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Downloads in flight
    pub concurrency: usize,
    /// Attempts per certificate
    pub max_attempts: u32,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Client-side request limit; unset means unlimited
    pub requests_per_second: Option<u32>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: RetryConfig::new().max_attempts,
            request_timeout_secs: 30,
            requests_per_second: None,
        }
    }
}

/// A local trust store. Directories are scanned, files read as bundles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Provenance label
    pub name: String,
    /// Bundle file or anchor directory
    pub path: PathBuf,
}

const fn default_refresh_interval_hours() -> u64 {
    12
}

const fn default_reference_ttl_hours() -> u64 {
    12
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_format: None,
            endpoints: EndpointConfig::default(),
            download: DownloadConfig::default(),
            refresh_interval_hours: default_refresh_interval_hours(),
            reference_ttl_hours: default_reference_ttl_hours(),
            cache_dir: None,
            sources: Vec::new(),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "trustdiff", "trustdiff")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Directory holding the catalog cache.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.cache_dir().to_path_buf()),
        }
    }

    /// Time between refreshes in `watch` mode.
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_hours.saturating_mul(3600))
    }

    /// Watch interval, preferring an hour count given on the command line.
    pub const fn watch_interval(&self, override_hours: Option<u64>) -> Duration {
        match override_hours {
            Some(hours) => Duration::from_secs(hours.saturating_mul(3600)),
            None => self.refresh_interval(),
        }
    }

    /// How long the reference store is reused.
    pub const fn reference_ttl(&self) -> Duration {
        Duration::from_secs(self.reference_ttl_hours.saturating_mul(3600))
    }

    /// Build the HTTP client.
    pub fn client(&self) -> Result<TrustDiffClient> {
        let endpoints = Endpoints {
            report_url: self.endpoints.report_url.clone(),
            certificate_url_template: self.endpoints.certificate_url_template.clone(),
            reference_url: self.endpoints.reference_url.clone(),
        };

        let mut builder = TrustDiffClient::builder()
            .endpoints(endpoints)
            .timeout(Duration::from_secs(self.download.request_timeout_secs))
            .retry(RetryConfig::new().max_attempts(self.download.max_attempts));
        if let Some(rps) = self.download.requests_per_second {
            builder = builder.requests_per_second(rps);
        }

        Ok(builder.build()?)
    }

    /// Build the trust store aggregator.
    pub fn aggregator(&self) -> TrustRootAggregator {
        if self.sources.is_empty() {
            return TrustRootAggregator::new(system_sources());
        }

        let sources = self
            .sources
            .iter()
            .map(|source| -> Arc<dyn CertificateSource> {
                if source.path.is_dir() {
                    Arc::new(PemDirectorySource::new(&source.name, &source.path))
                } else {
                    Arc::new(PemBundleSource::new(&source.name, &source.path))
                }
            })
            .collect();
        TrustRootAggregator::new(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.refresh_interval(), Duration::from_secs(12 * 3600));
        assert_eq!(config.download.concurrency, 4);
        assert_eq!(config.download.max_attempts, 6);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
output_format = "json"
refresh_interval_hours = 6

[download]
concurrency = 8

[[sources]]
name = "Corporate Anchors"
path = "/etc/corp/anchors"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.output_format, Some(OutputFormat::Json));
        assert_eq!(config.refresh_interval_hours, 6);
        assert_eq!(config.download.concurrency, 8);
        assert_eq!(config.download.max_attempts, 6);
        assert_eq!(config.endpoints, EndpointConfig::default());
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn watch_interval_override_saturates() {
        let config = Config::default();
        assert_eq!(config.watch_interval(None), Duration::from_secs(12 * 3600));
        assert_eq!(config.watch_interval(Some(2)), Duration::from_secs(7200));
        assert_eq!(config.watch_interval(Some(u64::MAX)), Duration::from_secs(u64::MAX));

        let huge = Config {
            refresh_interval_hours: u64::MAX,
            ..Config::default()
        };
        assert_eq!(huge.refresh_interval(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            cache_dir: Some(dir.path().join("cache")),
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
        assert_eq!(config.cache_dir().unwrap(), dir.path().join("cache"));
    }

    #[test]
    fn invalid_template_fails_client_build() {
        let mut config = Config::default();
        config.endpoints.certificate_url_template = "https://crt.sh/".into();
        assert!(config.client().is_err());
        config.endpoints.certificate_url_template = "https://crt.sh/?d={fingerprint}".into();
        assert!(config.client().is_ok());
    }

    #[test]
    fn configured_sources_replace_system_stores() {
        let config = Config {
            sources: vec![SourceConfig {
                name: "Corp".into(),
                path: "/nonexistent/bundle.pem".into(),
            }],
            ..Config::default()
        };
        assert_eq!(config.aggregator().source_names().collect::<Vec<_>>(), ["Corp"]);
    }
}
