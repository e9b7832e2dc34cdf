//! HTTP client for trustdiff's upstream sources.
//!
//! [`TrustDiffClient`] talks to three endpoints:
//!
//! - the CCADB inclusion report (CSV),
//! - a per-certificate download templated by SHA-256 fingerprint (crt.sh),
//! - the reference root store (Chrome Root Store).
//!
//! Non-2xx responses become [`TrustDiffError`] values classified as
//! retryable (429, 5xx, transport) or terminal. The retry loop itself lives
//! with the caller; [`RetryConfig`] supplies the backoff schedule.

mod client;
mod config;
pub mod api;

pub use client::{TrustDiffClient, TrustDiffClientBuilder};
pub use config::*;
pub use trustdiff_core::{Result, TrustDiffError};
