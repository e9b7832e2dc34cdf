//! Comparison and listing results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{CertificateRecord, StoreCertificateRecord};

/// Certificates in the synchronized catalog that the reference collection lacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Missing certificates, sorted by subject then fingerprint
    pub missing_in_reference: Vec<CertificateRecord>,
    /// When the comparison ran
    pub retrieved_at_utc: DateTime<Utc>,
    /// User-facing error when inputs could not be gathered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Whether known vendor anchors were filtered out
    pub excluding_known_anchors: bool,
}

impl ComparisonResult {
    /// Successful comparison
    #[must_use]
    pub fn new(missing_in_reference: Vec<CertificateRecord>, excluding_known_anchors: bool) -> Self {
        Self {
            missing_in_reference,
            retrieved_at_utc: Utc::now(),
            error_message: None,
            excluding_known_anchors,
        }
    }

    /// Empty result carrying an error message
    #[must_use]
    pub fn failed(message: impl Into<String>, excluding_known_anchors: bool) -> Self {
        Self {
            missing_in_reference: Vec::new(),
            retrieved_at_utc: Utc::now(),
            error_message: Some(message.into()),
            excluding_known_anchors,
        }
    }

    /// Whether the comparison could not be completed
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error_message.is_some()
    }
}

/// Every certificate of one collection, cross-referenced against another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateListing {
    /// Records sorted by subject then fingerprint
    pub certificates: Vec<StoreCertificateRecord>,
    /// How many of them the other collection also has
    pub overlap_count: usize,
    /// When the listing was built
    pub retrieved_at_utc: DateTime<Utc>,
}
