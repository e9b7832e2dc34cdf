//! Command implementations.

pub mod config;
pub mod diff;
pub mod listing;
pub mod refresh;
pub mod roots;
pub mod status;
pub mod watch;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use trustdiff::{
    CertificateCacheStore, ComparisonService, FileCacheStore, ProgramCatalog, ReferenceRootStore,
    TrustDiffClient,
};

use crate::config::Config;
use crate::output::OutputFormat;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded configuration
    pub config: Config,

    /// Where the configuration was loaded from
    pub config_path: PathBuf,

    /// Output format
    pub output_format: OutputFormat,

    /// Verbose output
    pub verbose: bool,
}

impl Context {
    /// Create an HTTP client from the configuration.
    pub fn client(&self) -> Result<TrustDiffClient> {
        self.config.client()
    }

    /// File-backed catalog cache.
    pub fn cache_store(&self) -> Result<Arc<FileCacheStore>> {
        Ok(Arc::new(FileCacheStore::new(self.config.cache_dir()?)))
    }

    /// Catalog over the configured cache.
    pub fn catalog(&self) -> Result<ProgramCatalog> {
        let store: Arc<dyn CertificateCacheStore> = self.cache_store()?;
        Ok(ProgramCatalog::builder(self.client()?, store)
            .concurrency(self.config.download.concurrency)
            .build())
    }

    /// Reference store with the configured TTL.
    pub fn reference_store(&self) -> Result<ReferenceRootStore> {
        Ok(ReferenceRootStore::with_ttl(
            self.client()?,
            self.config.reference_ttl(),
        ))
    }

    /// Catalog that has been refreshed at least once.
    ///
    /// A one-shot process cannot wait for a background refresh, so an
    /// empty cache is reported instead of silently comparing nothing.
    pub async fn populated_catalog(&self) -> Result<ProgramCatalog> {
        let catalog = self.catalog()?;
        if catalog.last_updated().await?.is_none() {
            anyhow::bail!(
                "The catalog cache is empty.\n\n\
                 Populate it with:\n  \
                 trustdiff refresh"
            );
        }
        Ok(catalog)
    }

    /// Comparison over the reference store, `catalog` and local trust stores.
    pub fn comparison(&self, catalog: ProgramCatalog) -> Result<ComparisonService> {
        Ok(ComparisonService::new(
            Arc::new(self.reference_store()?),
            Arc::new(catalog),
            Arc::new(self.config.aggregator()),
        ))
    }
}
