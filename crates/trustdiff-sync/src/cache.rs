//! Durable certificate cache.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use trustdiff_core::{Certificate, Result, TrustDiffError};

/// Keyed storage of certificate blobs with a last-updated timestamp.
///
/// A save replaces the whole record for its key.
#[async_trait]
pub trait CertificateCacheStore: Send + Sync {
    /// Replace the record for `key` with these DER blobs, stamped now.
    async fn save(&self, key: &str, certificates: &[Vec<u8>]) -> Result<()>;

    /// Certificates stored under `key`; empty when absent. Unparsable blobs are skipped.
    async fn get(&self, key: &str) -> Result<Vec<Certificate>>;

    /// When `key` was last saved
    async fn last_updated(&self, key: &str) -> Result<Option<DateTime<Utc>>>;
}

/// On-disk shape of one cache record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheDocument {
    last_updated_utc: DateTime<Utc>,
    #[serde(default)]
    certificates: Vec<String>,
}

impl CacheDocument {
    fn new(certificates: &[Vec<u8>]) -> Self {
        Self {
            last_updated_utc: Utc::now(),
            certificates: certificates.iter().map(|der| STANDARD.encode(der)).collect(),
        }
    }

    fn decode(&self, key: &str) -> Vec<Certificate> {
        self.certificates
            .iter()
            .filter(|blob| !blob.trim().is_empty())
            .filter_map(|blob| {
                let decoded = STANDARD
                    .decode(blob.trim())
                    .map_err(|e| TrustDiffError::Cache(e.to_string()))
                    .and_then(|der| Certificate::from_der(&der));
                match decoded {
                    Ok(cert) => Some(cert),
                    Err(e) => {
                        warn!(key, error = %e, "skipping unreadable cached certificate");
                        None
                    }
                }
            })
            .collect()
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(TrustDiffError::Config("cache key must not be blank".into()));
    }
    Ok(())
}

/// One JSON document per key under a base directory.
#[derive(Debug)]
pub struct FileCacheStore {
    base_dir: PathBuf,
    gate: Mutex<()>,
}

impl FileCacheStore {
    /// Store rooted at `base_dir`; the directory is created on first save.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            gate: Mutex::new(()),
        }
    }

    /// Directory holding the cache documents
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// File backing `key`
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_name = key.replace(['/', '\\'], "_");
        self.base_dir.join(format!("{file_name}.json"))
    }

    async fn read_document(&self, key: &str) -> Result<Option<CacheDocument>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            TrustDiffError::Cache(format!("corrupt cache document {}: {e}", path.display()))
        })
    }
}

#[async_trait]
impl CertificateCacheStore for FileCacheStore {
    async fn save(&self, key: &str, certificates: &[Vec<u8>]) -> Result<()> {
        check_key(key)?;
        let json = serde_json::to_vec(&CacheDocument::new(certificates))?;
        let path = self.path_for(key);
        let temp = path.with_extension("json.tmp");

        let _guard = self.gate.lock().await;
        tokio::fs::create_dir_all(&self.base_dir).await?;
        tokio::fs::write(&temp, &json).await?;
        tokio::fs::rename(&temp, &path).await?;

        debug!(key, count = certificates.len(), path = %path.display(), "cache saved");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<Certificate>> {
        check_key(key)?;
        let _guard = self.gate.lock().await;
        Ok(self
            .read_document(key)
            .await?
            .map(|doc| doc.decode(key))
            .unwrap_or_default())
    }

    async fn last_updated(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        check_key(key)?;
        let _guard = self.gate.lock().await;
        Ok(self.read_document(key).await?.map(|doc| doc.last_updated_utc))
    }
}

/// Process-local store with the same contract as [`FileCacheStore`].
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    records: RwLock<HashMap<String, CacheDocument>>,
}

impl MemoryCacheStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CertificateCacheStore for MemoryCacheStore {
    async fn save(&self, key: &str, certificates: &[Vec<u8>]) -> Result<()> {
        check_key(key)?;
        self.records
            .write()
            .await
            .insert(key.to_string(), CacheDocument::new(certificates));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<Certificate>> {
        check_key(key)?;
        Ok(self
            .records
            .read()
            .await
            .get(key)
            .map(|doc| doc.decode(key))
            .unwrap_or_default())
    }

    async fn last_updated(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        check_key(key)?;
        Ok(self.records.read().await.get(key).map(|doc| doc.last_updated_utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, DnType, KeyPair};
    use tempfile::TempDir;

    fn der(name: &str) -> Vec<u8> {
        let key_pair = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, name);
        params.self_signed(&key_pair).unwrap().der().to_vec()
    }

    #[tokio::test]
    async fn file_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path().join("cache"));

        assert!(store.get("roots").await.unwrap().is_empty());
        assert!(store.last_updated("roots").await.unwrap().is_none());

        store.save("roots", &[der("One"), der("Two")]).await.unwrap();

        let certs = store.get("roots").await.unwrap();
        let mut subjects: Vec<_> = certs.iter().map(|c| c.subject().to_string()).collect();
        subjects.sort();
        assert_eq!(subjects, ["CN=One", "CN=Two"]);
        assert!(store.last_updated("roots").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn document_shape_and_path() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path());
        store.save("a/b\\c", &[vec![1, 2, 3]]).await.unwrap();

        let path = dir.path().join("a_b_c.json");
        assert_eq!(store.path_for("a/b\\c"), path);

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(json["lastUpdatedUtc"].is_string());
        assert_eq!(json["certificates"][0], "AQID");
    }

    #[tokio::test]
    async fn corrupt_blobs_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path());
        store.save("roots", &[der("Good")]).await.unwrap();

        let path = store.path_for("roots");
        let mut json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        json["certificates"]
            .as_array_mut()
            .unwrap()
            .extend(["not base64!", "AQID", ""].map(serde_json::Value::from));
        std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

        let certs = store.get("roots").await.unwrap();
        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].subject(), "CN=Good");
    }

    #[tokio::test]
    async fn corrupt_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path());
        std::fs::write(store.path_for("roots"), b"{ nope").unwrap();
        assert!(matches!(
            store.get("roots").await,
            Err(TrustDiffError::Cache(_))
        ));
    }

    #[tokio::test]
    async fn save_replaces_whole_record() {
        let store = MemoryCacheStore::new();
        store.save("roots", &[der("Old"), der("Older")]).await.unwrap();
        let first = store.last_updated("roots").await.unwrap().unwrap();

        store.save("roots", &[der("New")]).await.unwrap();
        let certs = store.get("roots").await.unwrap();
        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].subject(), "CN=New");
        assert!(store.last_updated("roots").await.unwrap().unwrap() >= first);
    }

    #[tokio::test]
    async fn blank_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let file = FileCacheStore::new(dir.path());
        let memory = MemoryCacheStore::new();

        assert!(matches!(file.save(" ", &[]).await, Err(TrustDiffError::Config(_))));
        assert!(matches!(memory.get("").await, Err(TrustDiffError::Config(_))));
        assert!(matches!(
            memory.last_updated("\t").await,
            Err(TrustDiffError::Config(_))
        ));
    }
}
