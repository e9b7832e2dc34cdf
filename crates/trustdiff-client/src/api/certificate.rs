//! Per-certificate downloads by fingerprint.

use crate::TrustDiffClient;
use tracing::{debug, instrument};
use trustdiff_core::fingerprint::fingerprints_match;
use trustdiff_core::{Certificate, Result, TrustDiffError};

/// Per-certificate download endpoint
pub struct CertificateApi<'a> {
    client: &'a TrustDiffClient,
}

impl<'a> CertificateApi<'a> {
    pub(crate) fn new(client: &'a TrustDiffClient) -> Self {
        Self { client }
    }

    /// Make one download attempt for a normalized SHA-256 fingerprint.
    ///
    /// The payload may be DER or PEM. A payload whose fingerprint differs
    /// from the one requested is rejected as a parse error.
    #[instrument(skip(self))]
    pub async fn fetch(&self, fingerprint: &str) -> Result<Certificate> {
        let url = self.client.endpoints().certificate_url(fingerprint)?;
        let payload = self.client.get_bytes(url.as_str()).await?;

        if payload.is_empty() {
            return Err(TrustDiffError::CertificateParse("empty payload".into()));
        }

        let certificate = Certificate::from_bytes(&payload)?;
        if !fingerprints_match(certificate.fingerprint(), fingerprint) {
            return Err(TrustDiffError::CertificateParse(format!(
                "payload fingerprint {} does not match requested {fingerprint}",
                certificate.fingerprint()
            )));
        }

        debug!(subject = certificate.subject(), "certificate downloaded");
        Ok(certificate)
    }
}

#[cfg(test)]
mod tests {
    use crate::TrustDiffClient;
    use rcgen::{CertificateParams, DnType, KeyPair};
    use trustdiff_core::{sha256_fingerprint, TrustDiffError};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_certificate() -> (Vec<u8>, String) {
        let key_pair = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, "Download Test Root");
        let cert = params.self_signed(&key_pair).unwrap();
        let der = cert.der().to_vec();
        let fingerprint = sha256_fingerprint(&der);
        (der, fingerprint)
    }

    #[tokio::test]
    async fn downloads_matching_certificate() {
        let server = MockServer::start().await;
        let (der, fingerprint) = test_certificate();

        Mock::given(method("GET"))
            .and(path(format!("/cert/{fingerprint}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(der))
            .expect(1)
            .mount(&server)
            .await;

        let client = TrustDiffClient::builder().base_url(&server.uri()).build().unwrap();
        let cert = client.certificates().fetch(&fingerprint).await.unwrap();
        assert_eq!(cert.subject(), "CN=Download Test Root");
    }

    #[tokio::test]
    async fn rejects_mismatched_payload() {
        let server = MockServer::start().await;
        let (der, _) = test_certificate();
        let wrong = "AB".repeat(32);

        Mock::given(method("GET"))
            .and(path(format!("/cert/{wrong}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(der))
            .mount(&server)
            .await;

        let client = TrustDiffClient::builder().base_url(&server.uri()).build().unwrap();
        let err = client.certificates().fetch(&wrong).await.unwrap_err();
        assert!(matches!(err, TrustDiffError::CertificateParse(_)));
    }

    #[tokio::test]
    async fn classifies_error_statuses() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cert/AA"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cert/BB"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cert/CC"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = TrustDiffClient::builder().base_url(&server.uri()).build().unwrap();
        let api = client.certificates();

        let rate_limited = api.fetch("AA").await.unwrap_err();
        assert!(rate_limited.is_retryable());
        assert_eq!(
            rate_limited.retry_after(),
            Some(std::time::Duration::from_secs(1))
        );

        let missing = api.fetch("BB").await.unwrap_err();
        assert!(matches!(missing, TrustDiffError::Client { status: 404 }));

        let empty = api.fetch("CC").await.unwrap_err();
        assert!(matches!(empty, TrustDiffError::CertificateParse(_)));
    }
}
