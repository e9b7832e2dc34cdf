//! Certificate records handed to reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::certificate::Certificate;
use crate::fingerprint::Fingerprint;

/// Provenance label of certificates synchronized from the inclusion report.
pub const PROGRAM_SOURCE: &str = "Microsoft Trusted Root Program";

/// Provenance label of certificates from the reference root store.
pub const REFERENCE_SOURCE: &str = "Chrome Root Store";

/// Set of provenance labels, deduplicated case-insensitively.
///
/// The first spelling seen wins. Iteration order is case-insensitive
/// alphabetical so output is stable regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceSet(Vec<String>);

impl SourceSet {
    /// Create an empty set
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a label; returns false if an equal label (ignoring case) was present.
    pub fn insert(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        if label.trim().is_empty() || self.contains(&label) {
            return false;
        }
        let pos = self
            .0
            .binary_search_by(|existing| compare_ignore_case(existing, &label))
            .unwrap_or_else(|e| e);
        self.0.insert(pos, label);
        true
    }

    /// Case-insensitive membership
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.0
            .iter()
            .any(|l| compare_ignore_case(l, label) == Ordering::Equal)
    }

    /// Add every label from another set
    pub fn extend_from(&mut self, other: &Self) {
        for label in &other.0 {
            self.insert(label.clone());
        }
    }

    /// Number of distinct labels
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate labels in display order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for SourceSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for label in iter {
            set.insert(label);
        }
        set
    }
}

/// Immutable view of a certificate for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    /// Subject distinguished name
    pub subject: String,
    /// Issuer distinguished name
    pub issuer: String,
    /// SHA-256 fingerprint (unique identity)
    pub fingerprint: Fingerprint,
    /// Start of validity
    pub not_before_utc: DateTime<Utc>,
    /// End of validity
    pub not_after_utc: DateTime<Utc>,
    /// One-based X.509 version
    pub version: u32,
    /// Collections the certificate was observed in
    pub sources: SourceSet,
    /// Name given by a source collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
}

impl CertificateRecord {
    /// Map a certificate plus known provenance to a record.
    #[must_use]
    pub fn from_certificate(certificate: &Certificate, sources: SourceSet) -> Self {
        Self {
            subject: certificate.subject().to_string(),
            issuer: certificate.issuer().to_string(),
            fingerprint: certificate.fingerprint().to_string(),
            not_before_utc: certificate.not_before(),
            not_after_utc: certificate.not_after(),
            version: certificate.version(),
            sources,
            friendly_name: certificate.friendly_name().map(str::to_string),
        }
    }

    /// Record for a certificate synchronized from the inclusion report
    #[must_use]
    pub fn from_program(certificate: &Certificate) -> Self {
        Self::from_certificate(certificate, std::iter::once(PROGRAM_SOURCE).collect())
    }

    /// Record for a certificate from the reference root store
    #[must_use]
    pub fn from_reference(certificate: &Certificate) -> Self {
        Self::from_certificate(certificate, std::iter::once(REFERENCE_SOURCE).collect())
    }

    /// Report ordering: subject, then fingerprint, both case-insensitive.
    #[must_use]
    pub fn report_order(&self, other: &Self) -> Ordering {
        compare_ignore_case(&self.subject, &other.subject)
            .then_with(|| compare_ignore_case(&self.fingerprint, &other.fingerprint))
    }
}

/// A certificate observed in one or more enumerated collections.
#[derive(Debug, Clone)]
pub struct TrustedRoot {
    /// The certificate (first occurrence)
    pub certificate: Certificate,
    /// Display labels of every collection it was found in
    pub sources: SourceSet,
}

/// A certificate in a listing, flagged with presence in the other collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCertificateRecord {
    /// The certificate
    pub certificate: CertificateRecord,
    /// Whether the other collection has the same fingerprint
    pub present_in_other: bool,
}

/// Case-insensitive string ordering used for every sorted listing.
#[must_use]
pub fn compare_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_set_dedups_ignoring_case() {
        let mut set = SourceSet::new();
        assert!(set.insert("Local Machine / Trusted Root"));
        assert!(!set.insert("local machine / trusted root"));
        assert!(set.insert("Current User / Trusted Root"));
        assert!(!set.insert(""));

        assert_eq!(set.len(), 2);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec!["Current User / Trusted Root", "Local Machine / Trusted Root"]
        );
    }

    #[test]
    fn source_set_folds_non_ascii_case() {
        let mut set = SourceSet::new();
        assert!(set.insert("Magasin ÉTAT"));
        assert!(!set.insert("magasin état"));
        assert!(set.insert("Zertifikate Ä"));
        assert!(!set.insert("zertifikate ä"));

        assert_eq!(set.len(), 2);
        assert!(set.contains("MAGASIN ÉTAT"));
        assert!(set.contains("ZERTIFIKATE ä"));
        assert!(!set.contains("Magasin Etat"));

        let merged: SourceSet = ["Ünterschrift", "ünterschrift", "ÜNTERSCHRIFT"].into_iter().collect();
        assert_eq!(merged.iter().collect::<Vec<_>>(), vec!["Ünterschrift"]);
    }

    #[test]
    fn source_set_serializes_as_list() {
        let set: SourceSet = ["b", "A"].into_iter().collect();
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["A","b"]"#);
    }

    #[test]
    fn ordering_ignores_case() {
        assert_eq!(compare_ignore_case("abc", "ABD"), Ordering::Less);
        assert_eq!(compare_ignore_case("CN=b", "cn=B"), Ordering::Equal);
    }
}
