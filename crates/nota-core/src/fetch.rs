//! Receipt page retrieval

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::{Error, Result};

/// Message used when the page answers with nothing but whitespace
pub const EMPTY_PAGE: &str = "A URL não retornou nenhum conteúdo HTML.";

/// HTTP client for NFC-e consultation pages
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    timeout: Duration,
}

impl PageFetcher {
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    /// Fetch the page body
    ///
    /// Fails with `Fetch` on a bad URL, a connection problem, a non-2xx status
    /// or a blank body, and with `Timeout` when the deadline passes.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!(
                "Erro ao acessar a página: {} para {}",
                status, url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.request_error(url, e))?;
        if body.trim().is_empty() {
            return Err(Error::Fetch(EMPTY_PAGE.to_string()));
        }

        debug!(url = %url, bytes = body.len(), "Receipt page fetched");
        Ok(body)
    }

    fn request_error(&self, url: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                operation: format!("fetch {}", url),
                seconds: self.timeout.as_secs(),
            }
        } else {
            Error::Fetch(format!("Erro ao acessar a página: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockReceiptServer;

    fn fetcher(timeout: Duration) -> PageFetcher {
        PageFetcher::from_config(&FetchConfig {
            timeout,
            user_agent: "nota-test".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_page() {
        let server = MockReceiptServer::start().await;
        let body = fetcher(Duration::from_secs(5))
            .fetch(&server.receipt_url("abc123"))
            .await
            .unwrap();
        assert!(body.contains("abc123"));
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let server = MockReceiptServer::start().await;
        let err = fetcher(Duration::from_secs(5))
            .fetch(&server.missing_url())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(ref m) if m.contains("404")));
    }

    #[tokio::test]
    async fn test_fetch_empty_body() {
        let server = MockReceiptServer::start().await;
        let err = fetcher(Duration::from_secs(5))
            .fetch(&server.empty_url())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(ref m) if m == EMPTY_PAGE));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockReceiptServer::start().await;
        let err = fetcher(Duration::from_millis(200))
            .fetch(&server.slow_url())
            .await
            .unwrap_err();
        assert_eq!(err.label(), "TimeoutError");
    }

    #[tokio::test]
    async fn test_fetch_bad_url() {
        let err = fetcher(Duration::from_secs(1))
            .fetch("not a url")
            .await
            .unwrap_err();
        assert_eq!(err.label(), "FetchError");
    }
}
