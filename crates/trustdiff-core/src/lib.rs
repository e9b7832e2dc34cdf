//! Core types for trustdiff.
//!
//! This crate provides the foundations shared by the client, the
//! synchronization engine and the CLI:
//!
//! - **Types**: catalog entries, certificate records, refresh status and
//!   comparison results
//! - **Certificates**: owned X.509 certificates keyed by SHA-256 fingerprint
//! - **Errors**: the [`TrustDiffError`] taxonomy
//!
//! # Example
//!
//! ```rust,ignore
//! use trustdiff_core::{Certificate, CertificateRecord, Result};
//!
//! fn describe(der: &[u8]) -> Result<()> {
//!     let cert = Certificate::from_der(der)?;
//!     let record = CertificateRecord::from_program(&cert);
//!     println!("{} {}", record.fingerprint, record.subject);
//!     Ok(())
//! }
//! ```

mod certificate;
mod error;
pub mod fingerprint;
pub mod types;

pub use certificate::{looks_like_pem, pem_certificate_blocks, Certificate};
pub use error::{Result, TrustDiffError};
pub use fingerprint::{normalize_fingerprint, sha256_fingerprint, Fingerprint};
pub use types::*;
