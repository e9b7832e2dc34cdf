//! Owned X.509 certificates parsed with `x509-parser`.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::{Result, TrustDiffError};
use crate::fingerprint::{sha256_fingerprint, Fingerprint};

const PEM_CERTIFICATE_TAG: &str = "CERTIFICATE";

/// A parsed certificate together with the DER bytes it came from.
///
/// Identity is the SHA-256 fingerprint of the DER encoding; two values
/// with the same fingerprint are the same certificate byte-for-byte.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    fingerprint: Fingerprint,
    subject: String,
    issuer: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    version: u32,
    friendly_name: Option<String>,
}

impl Certificate {
    /// Parse a single DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| TrustDiffError::CertificateParse(e.to_string()))?;

        let validity = cert.validity();
        let not_before = asn1_to_utc(validity.not_before)?;
        let not_after = asn1_to_utc(validity.not_after)?;

        Ok(Self {
            der: der.to_vec(),
            fingerprint: sha256_fingerprint(der),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            not_before,
            not_after,
            // X.509 versions are zero-based on the wire (v3 == 2).
            version: cert.version().0 + 1,
            friendly_name: None,
        })
    }

    /// Parse the first `CERTIFICATE` block of a PEM document.
    pub fn from_pem(pem_bytes: &[u8]) -> Result<Self> {
        let der = pem_certificate_blocks(pem_bytes)?
            .into_iter()
            .next()
            .ok_or_else(|| TrustDiffError::CertificateParse("no CERTIFICATE block".into()))?;
        Self::from_der(&der)
    }

    /// Parse a payload that is either PEM text or raw DER.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(TrustDiffError::CertificateParse("empty payload".into()));
        }
        if looks_like_pem(bytes) {
            Self::from_pem(bytes)
        } else {
            Self::from_der(bytes)
        }
    }

    /// Attach a human-readable name supplied by the collection it came from.
    #[must_use]
    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.friendly_name = if name.trim().is_empty() {
            None
        } else {
            Some(name)
        };
        self
    }

    /// DER encoding
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Consume the certificate, returning its DER encoding
    #[must_use]
    pub fn into_der(self) -> Vec<u8> {
        self.der
    }

    /// Upper-case hex SHA-256 of the DER encoding
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Subject distinguished name
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Issuer distinguished name
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Start of the validity period
    #[must_use]
    pub const fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// End of the validity period
    #[must_use]
    pub const fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// One-based X.509 version
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Name given by the source collection, if any
    #[must_use]
    pub fn friendly_name(&self) -> Option<&str> {
        self.friendly_name.as_deref()
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("fingerprint", &self.fingerprint)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

/// Extract the DER contents of every `CERTIFICATE` block in a PEM document.
///
/// Blocks with other tags (keys, CRLs) are ignored.
pub fn pem_certificate_blocks(pem_bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let blocks =
        pem::parse_many(pem_bytes).map_err(|e| TrustDiffError::CertificateParse(e.to_string()))?;

    Ok(blocks
        .into_iter()
        .filter(|p| p.tag() == PEM_CERTIFICATE_TAG)
        .map(pem::Pem::into_contents)
        .collect())
}

/// Whether a payload is PEM text rather than DER.
#[must_use]
pub fn looks_like_pem(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(b"-----BEGIN")
}

fn asn1_to_utc(t: x509_parser::time::ASN1Time) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(t.timestamp(), 0)
        .ok_or_else(|| TrustDiffError::CertificateParse(format!("validity out of range: {t}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};

    fn self_signed(common_name: &str) -> rcgen::Certificate {
        let key_pair = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.self_signed(&key_pair).unwrap()
    }

    #[test]
    fn parses_der() {
        let generated = self_signed("Core Test Root");
        let cert = Certificate::from_der(generated.der()).unwrap();

        assert_eq!(cert.subject(), "CN=Core Test Root");
        assert_eq!(cert.issuer(), "CN=Core Test Root");
        assert_eq!(cert.version(), 3);
        assert_eq!(cert.fingerprint(), sha256_fingerprint(generated.der()));
        assert!(cert.not_before() < cert.not_after());
        assert!(cert.friendly_name().is_none());
    }

    #[test]
    fn pem_and_der_agree() {
        let generated = self_signed("Pem Root");
        let from_pem = Certificate::from_bytes(generated.pem().as_bytes()).unwrap();
        let from_der = Certificate::from_bytes(generated.der()).unwrap();
        assert_eq!(from_pem, from_der);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Certificate::from_bytes(b"").is_err());
        assert!(Certificate::from_bytes(b"not a certificate").is_err());
        assert!(Certificate::from_bytes(b"-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n").is_err());
    }

    #[test]
    fn bundle_skips_other_tags() {
        let a = self_signed("Bundle A");
        let b = self_signed("Bundle B");
        let key = KeyPair::generate().unwrap();
        let bundle = format!("{}\n{}\n{}", a.pem(), key.serialize_pem(), b.pem());

        let blocks = pem_certificate_blocks(bundle.as_bytes()).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], a.der().to_vec());
    }

    #[test]
    fn blank_friendly_name_is_dropped() {
        let generated = self_signed("Named");
        let cert = Certificate::from_der(generated.der()).unwrap();
        assert_eq!(cert.clone().with_friendly_name("Named Root").friendly_name(), Some("Named Root"));
        assert!(cert.with_friendly_name("  ").friendly_name().is_none());
    }
}
