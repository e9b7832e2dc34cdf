//! Inclusion report entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// Status prefix marking a certificate as part of the program.
pub const INCLUDED_STATUS_PREFIX: &str = "Included";

/// One row of the CA inclusion report.
///
/// Only lives for the duration of a refresh pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Program status, e.g. `Included` or `Included - NotBefore set`
    pub status: String,
    /// Normalized SHA-256 fingerprint
    pub sha256: Fingerprint,
    /// Normalized SHA-1 fingerprint, when the report carries one
    pub sha1: Option<Fingerprint>,
    /// Start of validity; `None` is open-ended
    pub not_before: Option<DateTime<Utc>>,
    /// End of validity; `None` is open-ended
    pub not_after: Option<DateTime<Utc>>,
}

impl CatalogEntry {
    /// Whether the entry describes a certificate that should be fetched at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if self.sha256.trim().is_empty() {
            return false;
        }
        if self.not_before.is_some_and(|nb| nb > now) {
            return false;
        }
        if self.not_after.is_some_and(|na| na < now) {
            return false;
        }
        is_included_status(&self.status)
    }
}

/// Case-insensitive `Included` prefix check.
#[must_use]
pub fn is_included_status(status: &str) -> bool {
    status
        .get(..INCLUDED_STATUS_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(INCLUDED_STATUS_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(status: &str) -> CatalogEntry {
        CatalogEntry {
            status: status.into(),
            sha256: "AABB".into(),
            sha1: None,
            not_before: None,
            not_after: None,
        }
    }

    #[test]
    fn status_prefix_is_case_insensitive() {
        let now = Utc::now();
        assert!(entry("Included").is_active(now));
        assert!(entry("INCLUDED - Disabled EKUs").is_active(now));
        assert!(!entry("Removed").is_active(now));
        assert!(!entry("").is_active(now));
        assert!(!entry("Inc").is_active(now));
    }

    #[test]
    fn validity_window_bounds() {
        let now = Utc::now();
        let mut e = entry("Included");
        e.not_after = Some(now - Duration::days(1));
        assert!(!e.is_active(now));

        e.not_after = Some(now + Duration::days(1));
        e.not_before = Some(now + Duration::hours(1));
        assert!(!e.is_active(now));

        e.not_before = Some(now);
        assert!(e.is_active(now));
    }

    #[test]
    fn blank_fingerprint_is_inactive() {
        let mut e = entry("Included");
        e.sha256 = "  ".into();
        assert!(!e.is_active(Utc::now()));
    }
}
