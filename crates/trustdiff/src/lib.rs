//! Compare the Microsoft Trusted Root Program catalog against the Chrome
//! Root Store and locally installed trust stores.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trustdiff::{
//!     CancellationToken, ComparisonService, FileCacheStore, ProgramCatalog,
//!     ReferenceRootStore, TrustDiffClient, TrustRootAggregator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> trustdiff::Result<()> {
//!     let client = TrustDiffClient::new()?;
//!     let catalog = ProgramCatalog::new(client.clone(), Arc::new(FileCacheStore::new("./cache")));
//!     catalog.refresh(&CancellationToken::new()).await?;
//!
//!     let service = ComparisonService::new(
//!         Arc::new(ReferenceRootStore::new(client)),
//!         Arc::new(catalog),
//!         Arc::new(TrustRootAggregator::new(trustdiff::system_sources())),
//!     );
//!
//!     let result = service.differences(true).await;
//!     for record in &result.missing_in_reference {
//!         println!("{} {}", record.fingerprint, record.subject);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `default` - Uses rustls for TLS
//! - `rustls` - Use rustls for TLS (recommended)
//! - `native-tls` - Use system native TLS

// Re-export core types
pub use trustdiff_core::*;

// Re-export client
pub use trustdiff_client::{Endpoints, RetryConfig, TrustDiffClient, TrustDiffClientBuilder};

// Re-export the sync engine
pub use trustdiff_sync::*;

// Re-export runtime for convenience
pub use serde;
pub use serde_json;
pub use tokio;
