//! Reference root store download.

use crate::TrustDiffClient;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{info, instrument, warn};
use trustdiff_core::{Certificate, Result, TrustDiffError};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Reference root store endpoint
pub struct ReferenceStoreApi<'a> {
    client: &'a TrustDiffClient,
}

impl<'a> ReferenceStoreApi<'a> {
    pub(crate) fn new(client: &'a TrustDiffClient) -> Self {
        Self { client }
    }

    /// Download the reference store and parse every PEM block in it.
    ///
    /// The body is either PEM text or base64 wrapping PEM text. Blocks that
    /// fail to parse are skipped with a warning.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Vec<Certificate>> {
        let url = &self.client.endpoints().reference_url;
        let body = self.client.get_text(url).await?;
        let text = decode_body(&body)?;

        let mut certificates = Vec::new();
        for (index, block) in split_pem_certificates(&text).into_iter().enumerate() {
            match Certificate::from_pem(block.as_bytes()) {
                Ok(cert) => certificates.push(cert),
                Err(e) => warn!(index, error = %e, "skipping unparsable reference block"),
            }
        }

        info!(count = certificates.len(), "reference store downloaded");
        Ok(certificates)
    }
}

fn decode_body(body: &str) -> Result<String> {
    if body.trim().is_empty() {
        return Err(TrustDiffError::EmptyResult(
            "reference store response was empty".into(),
        ));
    }
    if body.contains("-----BEGIN") {
        return Ok(body.to_string());
    }

    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let decoded = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| TrustDiffError::CertificateParse(format!("reference store is not base64: {e}")))?;
    String::from_utf8(decoded)
        .map_err(|e| TrustDiffError::CertificateParse(format!("reference store is not text: {e}")))
}

/// Slice out every `BEGIN CERTIFICATE` .. `END CERTIFICATE` block, markers included.
///
/// An unterminated trailing block is ignored.
#[must_use]
pub fn split_pem_certificates(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(PEM_BEGIN) {
        let tail = &rest[start..];
        let Some(end) = tail.find(PEM_END) else {
            break;
        };
        let stop = end + PEM_END.len();
        blocks.push(&tail[..stop]);
        rest = &tail[stop..];
    }
    blocks
}
