//! HTTP fetching.
//!
//! Fetches the source page as text and recipe images as raw bytes. Images are
//! buffered whole because they are re-sent with an explicit length.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::ScraperConfig;

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Wrong status code: {status} {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Content too large: {size} bytes (max {max_size})")]
    ContentTooLarge { size: u64, max_size: u64 },
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Maximum body size to accept (default 50MB)
    pub max_content_size: usize,

    /// Request timeout, connect plus read
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_content_size: 50 * 1024 * 1024, // 50MB
            timeout: Duration::from_secs(60),
            user_agent: format!("recipe-box-sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&ScraperConfig> for FetcherConfig {
    fn from(scraper: &ScraperConfig) -> Self {
        Self {
            timeout: scraper.timeout(),
            user_agent: scraper.user_agent.clone(),
            ..Default::default()
        }
    }
}

/// Anything that can hand back the bytes behind a URL.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn download(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Plain HTTP GET client.
pub struct Fetcher {
    client: Client,
    config: FetcherConfig,
}

impl Fetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("recipe-box-sync")),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    /// Fetch a page body as text.
    pub async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        let bytes = self.fetch_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Fetch a body fully into memory.
    pub async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        debug!("GET {}", url);

        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let max_size = self.config.max_content_size as u64;
        if let Some(declared) = response.content_length() {
            check_size(declared, max_size)?;
        }

        let content = response.bytes().await?;
        check_size(content.len() as u64, max_size)?;

        Ok(content.to_vec())
    }
}

fn check_size(size: u64, max_size: u64) -> Result<(), FetchError> {
    if size > max_size {
        return Err(FetchError::ContentTooLarge { size, max_size });
    }
    Ok(())
}

#[async_trait]
impl ImageSource for Fetcher {
    async fn download(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        self.fetch_bytes(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn test_fetcher() -> Fetcher {
        Fetcher::new(FetcherConfig {
            max_content_size: 64,
            timeout: Duration::from_secs(5),
            user_agent: "test-agent".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_fetcher_config_default() {
        let config = FetcherConfig::default();

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_content_size, 50 * 1024 * 1024);
        assert!(config.user_agent.starts_with("recipe-box-sync/"));
    }

    #[test]
    fn test_fetcher_config_from_scraper() {
        let scraper = ScraperConfig {
            url: "https://box.test/".to_string(),
            timeout: "2m".to_string(),
            user_agent: "cron".to_string(),
        };
        let config = FetcherConfig::from(&scraper);

        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.user_agent, "cron");
    }

    #[test]
    fn test_check_size_compares_full_width() {
        // 5 GB would wrap to a small value if narrowed to 32 bits.
        let five_gb = 5 * 1024 * 1024 * 1024_u64;
        assert!(matches!(
            check_size(five_gb, 50 * 1024 * 1024),
            Err(FetchError::ContentTooLarge { size, .. }) if size == five_gb
        ));
        assert!(check_size(64, 64).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_text_sends_user_agent() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/recettes")
                .header("user-agent", "test-agent");
            then.status(200).body("<html>ok</html>");
        });

        let url = Url::parse(&server.url("/recettes")).unwrap();
        let body = test_fetcher().fetch_text(&url).await.unwrap();

        assert_eq!(body, "<html>ok</html>");
        mock.assert();
    }

    #[tokio::test]
    async fn test_fetch_bytes_rejects_non_success() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/missing.jpg");
            then.status(404);
        });

        let url = Url::parse(&server.url("/missing.jpg")).unwrap();
        let err = test_fetcher().fetch_bytes(&url).await.unwrap_err();

        match err {
            FetchError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_bytes_enforces_max_size() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/huge.jpg");
            then.status(200).body(vec![0u8; 128]);
        });

        let url = Url::parse(&server.url("/huge.jpg")).unwrap();
        let err = test_fetcher().fetch_bytes(&url).await.unwrap_err();

        assert!(matches!(
            err,
            FetchError::ContentTooLarge { size: 128, max_size: 64 }
        ));
    }

    #[tokio::test]
    async fn test_image_source_downloads_bytes() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/img/gratin.jpg");
            then.status(200).body("JFIF");
        });

        let source: &dyn ImageSource = &test_fetcher();
        let url = Url::parse(&server.url("/img/gratin.jpg")).unwrap();

        assert_eq!(source.download(&url).await.unwrap(), b"JFIF".to_vec());
    }

    #[tokio::test]
    async fn test_fetch_transport_error() {
        // Nothing listens on port 9 (discard) in the test environment.
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let err = test_fetcher().fetch_bytes(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Http(_)));
    }
}
