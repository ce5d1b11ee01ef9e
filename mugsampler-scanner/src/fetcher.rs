use crate::error::{Result, ScanError};
use crate::page::Page;
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

/// Capability to load listing pages and raw image bytes.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Load and return the HTML page at `url`.
    async fn navigate(&self, url: &str) -> Result<Page>;

    /// Download the raw body at `url`.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// `PageFetcher` over plain HTTP. Requests are issued one at a time and may
/// be spaced out by a courtesy delay.
pub struct HttpFetcher {
    client: Client,
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_timeout(30)
    }

    pub fn with_timeout(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .user_agent(concat!("mugsampler/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            delay: Duration::ZERO,
            last_request: Mutex::new(None),
        }
    }

    /// Minimum spacing between two consecutive requests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;
        self.pace().await;

        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        debug!(url, status = status.as_u16(), elapsed = ?start.elapsed(), "fetched");

        if !status.is_success() {
            return Err(ScanError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn navigate(&self, url: &str) -> Result<Page> {
        let response = self.get(url).await?;
        // Relative links resolve against the post-redirect location
        let final_url = response.url().clone();
        let body = response.text().await?;
        Ok(Page::new(final_url, body))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
