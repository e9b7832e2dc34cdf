//! Trust root enumeration across named certificate collections.
//!
//! Each [`CertificateSource`] is enumerated independently. A source that
//! cannot be read is logged and skipped; the remaining sources still
//! contribute. Certificates seen in more than one source are merged into
//! a single [`TrustedRoot`] carrying every source label.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use trustdiff_core::{
    looks_like_pem, pem_certificate_blocks, Certificate, Result, SourceSet, TrustDiffError,
    TrustedRoot,
};

use crate::compare::TrustedRootProvider;

/// Well-known trust bundle files.
const SYSTEM_BUNDLES: &[&str] = &[
    // Arch / Fedora / RHEL
    "/etc/ssl/certs/ca-certificates.crt",
    "/etc/ssl/certs/ca-bundle.crt",
    // SUSE
    "/etc/ssl/ca-bundle.pem",
    // Alpine
    "/etc/ssl/cert.pem",
    // p11-kit
    "/etc/ca-certificates/extracted/tls-ca-bundle.pem",
];

/// Well-known directories of individual anchors.
const SYSTEM_DIRECTORIES: &[&str] = &[
    "/usr/local/share/ca-certificates",
    "/etc/pki/ca-trust/source/anchors",
];

const CERTIFICATE_EXTENSIONS: [&str; 3] = ["pem", "crt", "cer"];

/// Raw certificate bytes as a source yields them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCertificate {
    /// DER or PEM encoding
    pub data: Vec<u8>,
    /// Name the collection gives this certificate
    pub friendly_name: Option<String>,
}

impl SourceCertificate {
    /// Blob without a friendly name
    #[must_use]
    pub const fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            friendly_name: None,
        }
    }

    /// Attach a friendly name
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }
}

/// A named collection of certificates.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Display label, used as the provenance of its certificates
    fn name(&self) -> &str;

    /// Every certificate in the collection, or an error if it cannot be read
    async fn certificates(&self) -> Result<Vec<SourceCertificate>>;
}

/// One PEM bundle or DER file.
#[derive(Debug, Clone)]
pub struct PemBundleSource {
    name: String,
    path: PathBuf,
}

impl PemBundleSource {
    /// Source reading `path`, labelled `name`
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl CertificateSource for PemBundleSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn certificates(&self) -> Result<Vec<SourceCertificate>> {
        let content = tokio::fs::read(&self.path).await.map_err(|e| {
            TrustDiffError::source_unavailable(&self.name, format!("{}: {e}", self.path.display()))
        })?;
        split_blobs(&content)
            .map_err(|e| TrustDiffError::source_unavailable(&self.name, e))
            .map(|blobs| blobs.into_iter().map(SourceCertificate::new).collect())
    }
}

/// Every `.pem`, `.crt` and `.cer` file in one directory.
///
/// The file stem becomes the friendly name of the certificates it holds.
#[derive(Debug, Clone)]
pub struct PemDirectorySource {
    name: String,
    dir: PathBuf,
}

impl PemDirectorySource {
    /// Source scanning `dir`, labelled `name`
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }
}

#[async_trait]
impl CertificateSource for PemDirectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn certificates(&self) -> Result<Vec<SourceCertificate>> {
        let unavailable = |e: std::io::Error| {
            TrustDiffError::source_unavailable(&self.name, format!("{}: {e}", self.dir.display()))
        };

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(unavailable)?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
            let path = entry.path();
            if has_certificate_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut found = Vec::new();
        for path in paths {
            let content = match tokio::fs::read(&path).await {
                Ok(content) => content,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            match split_blobs(&content) {
                Ok(blobs) => found.extend(
                    blobs
                        .into_iter()
                        .map(|blob| SourceCertificate::new(blob).named(stem.clone())),
                ),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping cert file"),
            }
        }

        Ok(found)
    }
}

fn has_certificate_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            CERTIFICATE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// PEM documents yield one blob per `CERTIFICATE` block; anything else is one DER blob.
fn split_blobs(content: &[u8]) -> Result<Vec<Vec<u8>>> {
    if looks_like_pem(content) {
        pem_certificate_blocks(content)
    } else if content.is_empty() {
        Ok(Vec::new())
    } else {
        Ok(vec![content.to_vec()])
    }
}

/// Fixed in-memory collection.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    certificates: Vec<SourceCertificate>,
}

impl StaticSource {
    /// Source yielding exactly these certificates
    pub fn new(name: impl Into<String>, certificates: Vec<SourceCertificate>) -> Self {
        Self {
            name: name.into(),
            certificates,
        }
    }
}

#[async_trait]
impl CertificateSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn certificates(&self) -> Result<Vec<SourceCertificate>> {
        Ok(self.certificates.clone())
    }
}

/// Sources for the operating system trust stores present on this host.
#[must_use]
pub fn system_sources() -> Vec<Arc<dyn CertificateSource>> {
    let mut sources: Vec<Arc<dyn CertificateSource>> = Vec::new();

    for bundle in SYSTEM_BUNDLES {
        if Path::new(bundle).is_file() {
            sources.push(Arc::new(PemBundleSource::new(
                format!("System Bundle / {bundle}"),
                bundle,
            )));
        } else {
            debug!(path = bundle, "trust bundle not found, skipping");
        }
    }
    for dir in SYSTEM_DIRECTORIES {
        if Path::new(dir).is_dir() {
            sources.push(Arc::new(PemDirectorySource::new(
                format!("System Anchors / {dir}"),
                dir,
            )));
        } else {
            debug!(path = dir, "anchor directory not found, skipping");
        }
    }

    sources
}

/// Merges named sources into one record per distinct certificate.
#[derive(Clone, Default)]
pub struct TrustRootAggregator {
    sources: Vec<Arc<dyn CertificateSource>>,
}

impl std::fmt::Debug for TrustRootAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|s| s.name()))
            .finish()
    }
}

impl TrustRootAggregator {
    /// Aggregator over these sources
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn CertificateSource>>) -> Self {
        Self { sources }
    }

    /// Add a source
    #[must_use]
    pub fn with_source(mut self, source: impl CertificateSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Labels of the configured sources
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.name())
    }

    /// Enumerate every source and merge by fingerprint.
    ///
    /// The first occurrence of a certificate owns it; later occurrences
    /// only add their label. Output is in report order.
    pub async fn aggregate(&self) -> Vec<TrustedRoot> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut roots: Vec<TrustedRoot> = Vec::new();

        for source in &self.sources {
            let name = source.name();
            let blobs = match source.certificates().await {
                Ok(blobs) => blobs,
                Err(e) => {
                    warn!(source = name, error = %e, "certificate source unavailable");
                    continue;
                }
            };

            let mut parsed = 0usize;
            for blob in blobs {
                let certificate = match Certificate::from_bytes(&blob.data) {
                    Ok(cert) => cert,
                    Err(e) => {
                        debug!(source = name, error = %e, "skipping unparsable certificate");
                        continue;
                    }
                };
                parsed += 1;

                let key = certificate.fingerprint().to_ascii_uppercase();
                if let Some(&existing) = index.get(&key) {
                    roots[existing].sources.insert(name);
                } else {
                    let certificate = match blob.friendly_name {
                        Some(friendly) => certificate.with_friendly_name(friendly),
                        None => certificate,
                    };
                    index.insert(key, roots.len());
                    roots.push(TrustedRoot {
                        certificate,
                        sources: std::iter::once(name).collect::<SourceSet>(),
                    });
                }
            }
            debug!(source = name, parsed, "source enumerated");
        }

        roots.sort_by(|a, b| {
            trustdiff_core::compare_ignore_case(a.certificate.subject(), b.certificate.subject())
                .then_with(|| a.certificate.fingerprint().cmp(b.certificate.fingerprint()))
        });
        info!(roots = roots.len(), sources = self.sources.len(), "trust roots aggregated");
        roots
    }
}

#[async_trait]
impl TrustedRootProvider for TrustRootAggregator {
    async fn trusted_roots(&self) -> Result<Vec<TrustedRoot>> {
        Ok(self.aggregate().await)
    }
}
