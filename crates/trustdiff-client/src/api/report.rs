//! Inclusion report endpoint.

use crate::TrustDiffClient;
use tracing::{info, instrument};
use trustdiff_core::Result;

/// Inclusion report endpoint
pub struct ReportApi<'a> {
    client: &'a TrustDiffClient,
}

impl<'a> ReportApi<'a> {
    pub(crate) fn new(client: &'a TrustDiffClient) -> Self {
        Self { client }
    }

    /// Download the raw CSV report
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<String> {
        let url = &self.client.endpoints().report_url;
        info!(url = %url, "downloading inclusion report");
        let body = self.client.get_text(url).await?;
        info!(bytes = body.len(), "inclusion report received");
        Ok(body)
    }
}
