//! Extraction pipeline: receipt URL to a validated receipt
//!
//! Fetch the page, hand the HTML to the model, and accept the answer only if
//! it passes the JSON contract. Nothing here writes to storage, so a failure
//! at any step leaves no trace and the call can simply be repeated.

use tracing::{debug, info};

use crate::ai::{AIBackend, AIClient};
use crate::error::Result;
use crate::fetch::PageFetcher;
use crate::models::ExtractedReceipt;

#[derive(Clone)]
pub struct ReceiptExtractor {
    fetcher: PageFetcher,
    ai: AIClient,
}

impl ReceiptExtractor {
    pub fn new(fetcher: PageFetcher, ai: AIClient) -> Self {
        Self { fetcher, ai }
    }

    pub fn ai(&self) -> &AIClient {
        &self.ai
    }

    /// Fetch `url` and extract its receipt
    ///
    /// One fetch and one model call; no retries.
    pub async fn extract(&self, url: &str) -> Result<ExtractedReceipt> {
        let html = self.fetcher.fetch(url).await?;
        debug!(url = %url, bytes = html.len(), model = %self.ai.model(), "Extracting receipt");

        let receipt = self.ai.extract_receipt(&html).await?;
        info!(
            url = %url,
            items = receipt.items.len(),
            "Receipt extracted"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ai::MockBackend;
    use crate::config::FetchConfig;
    use crate::test_utils::MockReceiptServer;

    fn fetcher() -> PageFetcher {
        PageFetcher::from_config(&FetchConfig {
            timeout: Duration::from_secs(5),
            user_agent: "nota-test".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_extract_passes_page_to_model() {
        let server = MockReceiptServer::start().await;
        let mock = MockBackend::new();
        let extractor = ReceiptExtractor::new(fetcher(), mock.clone().into());

        let receipt = extractor
            .extract(&server.receipt_url("35240111111111000111650010000000421"))
            .await
            .unwrap();
        assert_eq!(receipt.items.len(), 2);
        assert!(mock
            .last_html()
            .unwrap()
            .contains("35240111111111000111650010000000421"));
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_model() {
        let server = MockReceiptServer::start().await;
        let mock = MockBackend::new();
        let extractor = ReceiptExtractor::new(fetcher(), mock.clone().into());

        let err = extractor.extract(&server.missing_url()).await.unwrap_err();
        assert_eq!(err.label(), "FetchError");
        assert!(mock.last_html().is_none());
    }

    #[tokio::test]
    async fn test_malformed_answer() {
        let server = MockReceiptServer::start().await;
        let mock = MockBackend::new().with_extraction("```json\n{}\n```");
        let extractor = ReceiptExtractor::new(fetcher(), mock.into());

        let err = extractor
            .extract(&server.receipt_url("k"))
            .await
            .unwrap_err();
        assert_eq!(err.label(), "MalformedResponseError");
    }
}
