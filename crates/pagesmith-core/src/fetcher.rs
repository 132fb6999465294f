//! HTTP client for downloading page assets with retry support.
//!
//! Network errors and 5xx responses are retried with exponential backoff
//! up to a fixed ceiling; 4xx responses and malformed content are not,
//! since repeating those requests cannot succeed.

use crate::config::DownloadConfig;
use crate::{Error, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP fetcher shared by all downloads in a batch.
pub struct AssetFetcher {
    client: Client,
    config: DownloadConfig,
}

impl AssetFetcher {
    /// Creates a fetcher with default download settings.
    pub fn new() -> Result<Self> {
        Self::with_config(DownloadConfig::default())
    }

    /// Creates a fetcher with explicit download settings.
    pub fn with_config(config: DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("pagesmith/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client, config })
    }

    /// Fetches a URL as raw bytes, retrying transient failures.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let mut delay = Duration::from_millis(self.config.backoff_base_ms);
        let mut last_error: Option<Error> = None;

        for attempt in 1..=self.config.max_attempts {
            match self.fetch_once(url).await {
                Ok(bytes) => {
                    debug!("Fetched {} bytes from {}", bytes.len(), url);
                    return Ok(bytes);
                },
                Err(e) if e.is_recoverable() && attempt < self.config.max_attempts => {
                    warn!(
                        "Fetch attempt {attempt}/{} failed for {url}: {e}; retrying",
                        self.config.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    last_error = Some(e);
                },
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::Timeout(format!("Fetch retry budget exhausted for {url}"))))
    }

    /// Fetches a URL as UTF-8 text (stylesheets), retrying transient
    /// failures. Non-UTF-8 bytes are replaced rather than rejected.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let bytes = self.fetch_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status.is_server_error() {
            // Recoverable: surface as a timeout-class error so the retry
            // loop picks it up.
            return Err(Error::Timeout(format!("Server error {status} from {url}")));
        }

        if !status.is_success() {
            if status == StatusCode::NOT_FOUND {
                return Err(Error::NotFound(format!("Asset not found at '{url}'")));
            }
            match response.error_for_status() {
                Ok(_) => {
                    return Err(Error::InvalidUrl(format!(
                        "Unexpected status {status} from {url}"
                    )));
                },
                Err(err) => return Err(Error::Network(err)),
            }
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick_config() -> DownloadConfig {
        DownloadConfig {
            backoff_base_ms: 5,
            request_timeout_secs: 5,
            ..DownloadConfig::default()
        }
    }

    #[tokio::test]
    async fn fetcher_creation_succeeds() {
        assert!(AssetFetcher::new().is_ok());
    }

    #[tokio::test]
    #[ignore = "network: run in CI"]
    async fn fetch_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-bytes".to_vec()))
            .mount(&server)
            .await;

        let fetcher = AssetFetcher::with_config(quick_config()).unwrap();
        let bytes = fetcher
            .fetch_bytes(&format!("{}/logo.png", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"png-bytes");
    }

    #[tokio::test]
    #[ignore = "network: run in CI"]
    async fn server_errors_are_retried_until_success() {
        let server = MockServer::start().await;

        // First attempt fails with 500, the retry succeeds.
        Mock::given(method("GET"))
            .and(path("/flaky.css"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky.css"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body{}"))
            .mount(&server)
            .await;

        let fetcher = AssetFetcher::with_config(quick_config()).unwrap();
        let text = fetcher
            .fetch_text(&format!("{}/flaky.css", server.uri()))
            .await
            .unwrap();
        assert_eq!(text, "body{}");
    }

    #[tokio::test]
    #[ignore = "network: run in CI"]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = AssetFetcher::with_config(quick_config()).unwrap();
        let result = fetcher
            .fetch_bytes(&format!("{}/gone.png", server.uri()))
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    #[ignore = "network: run in CI"]
    async fn retry_budget_is_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/always-500"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = AssetFetcher::with_config(quick_config()).unwrap();
        let result = fetcher
            .fetch_bytes(&format!("{}/always-500", server.uri()))
            .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }
}
