//! Catalog synchronization and comparison engine for trustdiff.
//!
//! - [`ProgramCatalog`] downloads the inclusion report, resolves every
//!   active entry to a certificate and persists the result in a
//!   [`CertificateCacheStore`]
//! - [`RefreshStatusTracker`] exposes live progress of that refresh
//! - [`TrustRootAggregator`] merges locally enumerated trust stores
//! - [`ComparisonService`] reports catalog certificates the reference
//!   root store lacks
//! - [`Scheduler`] repeats the refresh on an interval
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trustdiff_client::TrustDiffClient;
//! use trustdiff_sync::{CancellationToken, FileCacheStore, ProgramCatalog};
//!
//! #[tokio::main]
//! async fn main() -> trustdiff_core::Result<()> {
//!     let client = TrustDiffClient::new()?;
//!     let store = Arc::new(FileCacheStore::new("./cache"));
//!     let catalog = ProgramCatalog::new(client, store);
//!
//!     catalog.refresh(&CancellationToken::new()).await?;
//!     println!("{} certificates", catalog.certificates().await?.len());
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod cache;
mod cancel;
pub mod compare;
pub mod downloader;
pub mod provider;
pub mod reference;
pub mod report;
pub mod scheduler;
mod status;

pub use aggregator::{
    system_sources, CertificateSource, PemBundleSource, PemDirectorySource, SourceCertificate,
    StaticSource, TrustRootAggregator,
};
pub use cache::{CertificateCacheStore, FileCacheStore, MemoryCacheStore};
pub use cancel::CancellationToken;
pub use compare::{
    is_known_anchor, CatalogProvider, ComparisonService, ReferenceProvider, StaticCertificates,
    TrustedRootProvider, KNOWN_ANCHOR_MARKERS,
};
pub use downloader::{DownloadedCertificate, Downloader, DEFAULT_CONCURRENCY};
pub use provider::{ProgramCatalog, ProgramCatalogBuilder, RefreshOutcome, CATALOG_CACHE_KEY};
pub use reference::{ReferenceRootStore, DEFAULT_REFERENCE_TTL};
pub use report::{distinct_fingerprints, parse_report};
pub use scheduler::{RefreshTask, Scheduler, DEFAULT_REFRESH_INTERVAL};
pub use status::RefreshStatusTracker;
