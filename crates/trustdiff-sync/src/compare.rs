//! Catalog vs. reference comparison.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info};
use trustdiff_core::{
    Certificate, CertificateListing, CertificateRecord, ComparisonResult, Result, SourceSet,
    StoreCertificateRecord, TrustedRoot, PROGRAM_SOURCE,
};

/// Substrings marking a vendor's own anchors, matched case-insensitively
/// against subject, issuer and friendly name.
///
/// Best-effort string matching; it makes no trust decision.
pub const KNOWN_ANCHOR_MARKERS: [&str; 4] = ["microsoft", "ameroot", "ame root", "ame-root"];

/// Message surfaced when comparison inputs cannot be gathered
pub const COMPARISON_FAILED_MESSAGE: &str =
    "Unable to compare certificate stores. Please retry later or check application logs.";

/// The reference collection (e.g. the Chrome Root Store)
#[async_trait]
pub trait ReferenceProvider: Send + Sync {
    /// Every reference certificate
    async fn reference_certificates(&self) -> Result<Vec<Certificate>>;
}

/// The synchronized catalog
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Every catalog certificate currently available
    async fn catalog_certificates(&self) -> Result<Vec<Certificate>>;
}

/// Locally enumerated trust roots, used for provenance
#[async_trait]
pub trait TrustedRootProvider: Send + Sync {
    /// Every enumerated root with its source labels
    async fn trusted_roots(&self) -> Result<Vec<TrustedRoot>>;
}

/// Whether a certificate looks like one of the vendor's own anchors.
#[must_use]
pub fn is_known_anchor(certificate: &Certificate) -> bool {
    let fields = [
        Some(certificate.subject()),
        Some(certificate.issuer()),
        certificate.friendly_name(),
    ];
    fields.into_iter().flatten().any(|value| {
        let value = value.to_lowercase();
        KNOWN_ANCHOR_MARKERS.iter().any(|marker| value.contains(marker))
    })
}

fn fingerprint_set(certificates: &[Certificate]) -> HashSet<String> {
    certificates
        .iter()
        .map(|c| c.fingerprint().to_ascii_uppercase())
        .collect()
}

/// Computes what the catalog has that the reference lacks.
#[derive(Clone)]
pub struct ComparisonService {
    reference: Arc<dyn ReferenceProvider>,
    catalog: Arc<dyn CatalogProvider>,
    roots: Arc<dyn TrustedRootProvider>,
}

impl std::fmt::Debug for ComparisonService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparisonService").finish_non_exhaustive()
    }
}

impl ComparisonService {
    /// Service over the three collections
    pub fn new(
        reference: Arc<dyn ReferenceProvider>,
        catalog: Arc<dyn CatalogProvider>,
        roots: Arc<dyn TrustedRootProvider>,
    ) -> Self {
        Self {
            reference,
            catalog,
            roots,
        }
    }

    /// Catalog certificates missing from the reference.
    ///
    /// Never fails: if any input cannot be gathered the result is empty
    /// and carries an error message.
    pub async fn differences(&self, exclude_known_anchors: bool) -> ComparisonResult {
        match self.try_differences(exclude_known_anchors).await {
            Ok(missing) => {
                info!(missing = missing.len(), exclude_known_anchors, "comparison complete");
                ComparisonResult::new(missing, exclude_known_anchors)
            }
            Err(e) => {
                error!(error = %e, "certificate comparison failed");
                ComparisonResult::failed(COMPARISON_FAILED_MESSAGE, exclude_known_anchors)
            }
        }
    }

    async fn try_differences(&self, exclude_known_anchors: bool) -> Result<Vec<CertificateRecord>> {
        let (reference, catalog, roots) = tokio::try_join!(
            self.reference.reference_certificates(),
            self.catalog.catalog_certificates(),
            self.roots.trusted_roots(),
        )?;

        let in_reference = fingerprint_set(&reference);
        let provenance: HashMap<String, SourceSet> = roots
            .into_iter()
            .map(|root| (root.certificate.fingerprint().to_ascii_uppercase(), root.sources))
            .collect();

        let mut seen = HashSet::new();
        let mut missing: Vec<CertificateRecord> = catalog
            .iter()
            .filter(|cert| {
                let key = cert.fingerprint().to_ascii_uppercase();
                !in_reference.contains(&key) && seen.insert(key)
            })
            .filter(|cert| !(exclude_known_anchors && is_known_anchor(cert)))
            .map(|cert| {
                let mut sources: SourceSet = std::iter::once(PROGRAM_SOURCE).collect();
                if let Some(extra) = provenance.get(&cert.fingerprint().to_ascii_uppercase()) {
                    sources.extend_from(extra);
                }
                CertificateRecord::from_certificate(cert, sources)
            })
            .collect();

        missing.sort_by(CertificateRecord::report_order);
        Ok(missing)
    }

    /// Every catalog certificate, flagged with presence in the reference.
    pub async fn catalog_listing(&self) -> Result<CertificateListing> {
        let (catalog, reference) = tokio::try_join!(
            self.catalog.catalog_certificates(),
            self.reference.reference_certificates(),
        )?;
        Ok(listing(&catalog, &reference, CertificateRecord::from_program))
    }

    /// Every reference certificate, flagged with presence in the catalog.
    pub async fn reference_listing(&self) -> Result<CertificateListing> {
        let (reference, catalog) = tokio::try_join!(
            self.reference.reference_certificates(),
            self.catalog.catalog_certificates(),
        )?;
        Ok(listing(&reference, &catalog, CertificateRecord::from_reference))
    }
}

fn listing(
    certificates: &[Certificate],
    other: &[Certificate],
    to_record: fn(&Certificate) -> CertificateRecord,
) -> CertificateListing {
    let in_other = fingerprint_set(other);
    let mut records: Vec<StoreCertificateRecord> = certificates
        .iter()
        .map(|cert| StoreCertificateRecord {
            certificate: to_record(cert),
            present_in_other: in_other.contains(&cert.fingerprint().to_ascii_uppercase()),
        })
        .collect();
    records.sort_by(|a, b| a.certificate.report_order(&b.certificate));

    let overlap_count = records.iter().filter(|r| r.present_in_other).count();
    CertificateListing {
        certificates: records,
        overlap_count,
        retrieved_at_utc: chrono::Utc::now(),
    }
}

/// Fixed certificate lists, for wiring collections already in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCertificates(pub Vec<Certificate>);

#[async_trait]
impl ReferenceProvider for StaticCertificates {
    async fn reference_certificates(&self) -> Result<Vec<Certificate>> {
        Ok(self.0.clone())
    }
}

#[async_trait]
impl CatalogProvider for StaticCertificates {
    async fn catalog_certificates(&self) -> Result<Vec<Certificate>> {
        Ok(self.0.clone())
    }
}

#[async_trait]
impl TrustedRootProvider for Vec<TrustedRoot> {
    async fn trusted_roots(&self) -> Result<Vec<TrustedRoot>> {
        Ok(self.clone())
    }
}
